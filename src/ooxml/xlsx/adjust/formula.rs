//! Reference shifting inside formula text.
//!
//! The scanner recognizes A1-style reference tokens (`B3`, `$B$3`,
//! `B3:C4`, `B:C`, `3:4`), optionally qualified with a plain or quoted sheet
//! name. String literals, structured references in brackets and error
//! literals are copied through untouched, as is anything that does not
//! parse as a reference within the sheet limits (function names, defined
//! names, numbers).

use super::{Axis, Edit};
use crate::common::error::Result;
use crate::ooxml::xlsx::cell::{
    TOTAL_ROWS, column_name_to_number, format_cell_name, push_column_letters,
};
use std::borrow::Cow;

const REF_ERROR: &str = "#REF!";

/// One side of a reference token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Part {
    col: Option<(u32, bool)>,
    row: Option<(u32, bool)>,
}

impl Part {
    fn is_cell(&self) -> bool {
        self.col.is_some() && self.row.is_some()
    }

    fn is_column(&self) -> bool {
        self.col.is_some() && self.row.is_none()
    }

    fn is_row(&self) -> bool {
        self.col.is_none() && self.row.is_some()
    }

    fn write(&self, out: &mut String) {
        match (self.col, self.row) {
            (Some((col, abs_col)), Some((row, abs_row))) => {
                out.push_str(&format_cell_name(col, row, abs_col, abs_row));
            },
            (Some((col, abs_col)), None) => {
                if abs_col {
                    out.push('$');
                }
                push_column_letters(out, col);
            },
            (None, Some((row, abs_row))) => {
                if abs_row {
                    out.push('$');
                }
                out.push_str(itoa::Buffer::new().format(row));
            },
            (None, None) => {},
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Token {
    first: Part,
    last: Option<Part>,
}

fn is_word_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'.' || byte == b'$' || byte >= 0x80
}

/// Parse `[$]letters[$]digits`, `[$]letters` or `[$]digits` at `pos`.
fn parse_part(bytes: &[u8], mut pos: usize) -> Option<(Part, usize)> {
    let mut part = Part { col: None, row: None };

    let abs_col = bytes.get(pos) == Some(&b'$');
    let start = pos + abs_col as usize;
    let mut end = start;
    while end < bytes.len() && bytes[end].is_ascii_alphabetic() {
        end += 1;
    }
    if end > start {
        if end - start > 3 {
            return None;
        }
        let letters = std::str::from_utf8(&bytes[start..end]).ok()?;
        let col = column_name_to_number(letters).ok()?;
        part.col = Some((col, abs_col));
        pos = end;
    } else if abs_col {
        pos = start - 1;
    }

    let abs_row = bytes.get(pos) == Some(&b'$');
    let start = pos + abs_row as usize;
    let mut end = start;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end > start {
        let row = atoi_simd::parse_pos::<u32, false>(&bytes[start..end]).ok()?;
        if row == 0 || row > TOTAL_ROWS {
            return None;
        }
        part.row = Some((row, abs_row));
        pos = end;
    } else if abs_row {
        return None;
    }

    if part.col.is_none() && part.row.is_none() {
        return None;
    }
    Some((part, pos))
}

/// Parse a complete reference token at `pos`, checking that it ends on a
/// token boundary.
fn parse_token(bytes: &[u8], pos: usize) -> Option<(Token, usize)> {
    let (first, mut end) = parse_part(bytes, pos)?;
    let mut last = None;
    if bytes.get(end) == Some(&b':') {
        if let Some((part, after)) = parse_part(bytes, end + 1) {
            let compatible = (first.is_cell() && part.is_cell())
                || (first.is_column() && part.is_column())
                || (first.is_row() && part.is_row());
            if compatible {
                last = Some(part);
                end = after;
            }
        }
    }
    if last.is_none() && !first.is_cell() {
        return None;
    }
    match bytes.get(end) {
        Some(&b) if is_word_byte(b) || b == b'(' || b == b'!' => None,
        _ => Some((Token { first, last }, end)),
    }
}

/// Apply the edit to a token. `None` means the token was consumed.
fn shift_token(edit: &Edit, token: Token) -> Result<Option<Token>> {
    let pick = |part: &Part| match edit.axis {
        Axis::Rows => part.row,
        Axis::Columns => part.col,
    };
    let store = |part: &mut Part, value: u32| {
        let slot = match edit.axis {
            Axis::Rows => &mut part.row,
            Axis::Columns => &mut part.col,
        };
        if let Some((_, absolute)) = *slot {
            *slot = Some((value, absolute));
        }
    };

    let mut token = token;
    match token.last.as_mut() {
        None => {
            let Some((value, _)) = pick(&token.first) else {
                return Ok(Some(token));
            };
            match super::shift_point(edit, value)? {
                Some(shifted) => store(&mut token.first, shifted),
                None => return Ok(None),
            }
        },
        Some(last) => {
            let (Some((p1, _)), Some((p2, _))) = (pick(&token.first), pick(last)) else {
                return Ok(Some(token));
            };
            match super::shift_span(edit, p1.min(p2), p1.max(p2))? {
                Some((n1, n2)) => {
                    let (a, b) = if p1 <= p2 { (n1, n2) } else { (n2, n1) };
                    store(&mut token.first, a);
                    store(last, b);
                },
                None => return Ok(None),
            }
        },
    }
    Ok(Some(token))
}

fn sheet_matches(qualifier: &str, sheet: &str) -> bool {
    qualifier.eq_ignore_ascii_case(sheet) || qualifier.to_lowercase() == sheet.to_lowercase()
}

/// Shift the references in `formula` for an edit on `sheet`.
///
/// `home_sheet` is the sheet the formula lives on when unqualified tokens
/// should be treated as references into it; defined names pass `None`.
/// Returns the input unchanged (borrowed) when no token moved.
///
/// # Errors
/// `RowOutOfRange`/`ColumnOutOfRange` when an insertion pushes a reference
/// past the sheet limits.
pub fn adjust_formula<'a>(
    formula: &'a str,
    sheet: &str,
    home_sheet: Option<&str>,
    edit: &Edit,
) -> Result<Cow<'a, str>> {
    let unqualified_applies = home_sheet.is_some_and(|home| sheet_matches(home, sheet));
    let bytes = formula.as_bytes();
    let mut out = String::new();
    let mut copied = 0;
    let mut changed = false;
    let mut pos = 0;

    while pos < bytes.len() {
        let byte = bytes[pos];
        match byte {
            b'"' => {
                pos += 1;
                while pos < bytes.len() {
                    if bytes[pos] == b'"' {
                        if bytes.get(pos + 1) == Some(&b'"') {
                            pos += 2;
                            continue;
                        }
                        break;
                    }
                    pos += 1;
                }
                pos += 1;
            },
            b'[' => {
                let mut depth = 0usize;
                while pos < bytes.len() {
                    match bytes[pos] {
                        b'[' => depth += 1,
                        b']' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        },
                        _ => {},
                    }
                    pos += 1;
                }
                pos += 1;
            },
            b'#' => {
                pos += 1;
                while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'/') {
                    pos += 1;
                }
                if matches!(bytes.get(pos), Some(b'!' | b'?')) {
                    pos += 1;
                }
            },
            b'\'' => {
                let mut end = pos + 1;
                let mut name = String::new();
                let mut closed = false;
                while end < bytes.len() {
                    if bytes[end] == b'\'' {
                        if bytes.get(end + 1) == Some(&b'\'') {
                            name.push('\'');
                            end += 2;
                            continue;
                        }
                        closed = true;
                        break;
                    }
                    let ch_len = utf8_len(bytes[end]);
                    name.push_str(&formula[end..(end + ch_len).min(bytes.len())]);
                    end += ch_len;
                }
                if !closed {
                    break;
                }
                end += 1;
                if bytes.get(end) != Some(&b'!') {
                    pos = end;
                    continue;
                }
                let ref_start = end + 1;
                pos = rewrite_at(
                    formula,
                    ref_start,
                    sheet_matches(&name, sheet),
                    edit,
                    &mut out,
                    &mut copied,
                    &mut changed,
                )?;
            },
            _ if is_word_byte(byte) && byte != b'.' => {
                let mut end = pos;
                while end < bytes.len() && is_word_byte(bytes[end]) {
                    end += 1;
                }
                if bytes.get(end) == Some(&b'!') {
                    let qualifier = &formula[pos..end];
                    pos = rewrite_at(
                        formula,
                        end + 1,
                        sheet_matches(qualifier, sheet),
                        edit,
                        &mut out,
                        &mut copied,
                        &mut changed,
                    )?;
                } else {
                    let next = rewrite_at(
                        formula,
                        pos,
                        unqualified_applies,
                        edit,
                        &mut out,
                        &mut copied,
                        &mut changed,
                    )?;
                    pos = next.max(end);
                }
            },
            _ => pos += 1,
        }
    }

    if !changed {
        return Ok(Cow::Borrowed(formula));
    }
    out.push_str(&formula[copied..]);
    Ok(Cow::Owned(out))
}

fn utf8_len(lead: u8) -> usize {
    match lead {
        0xF0..=0xFF => 4,
        0xE0..=0xEF => 3,
        0xC0..=0xDF => 2,
        _ => 1,
    }
}

/// Try a reference token at `start`; when it applies, write its shifted
/// form. Returns the position to continue scanning from.
fn rewrite_at(
    formula: &str,
    start: usize,
    applies: bool,
    edit: &Edit,
    out: &mut String,
    copied: &mut usize,
    changed: &mut bool,
) -> Result<usize> {
    let bytes = formula.as_bytes();
    let Some((token, end)) = parse_token(bytes, start) else {
        // Skip the rest of the word so its digits are not read as a token.
        let mut pos = start;
        while pos < bytes.len() && is_word_byte(bytes[pos]) {
            pos += 1;
        }
        return Ok(pos.max(start + 1));
    };
    if !applies {
        return Ok(end);
    }

    let shifted = shift_token(edit, token)?;
    if shifted == Some(token) {
        return Ok(end);
    }

    out.push_str(&formula[*copied..start]);
    match shifted {
        Some(token) => {
            token.first.write(out);
            if let Some(last) = token.last {
                out.push(':');
                last.write(out);
            }
        },
        None => out.push_str(REF_ERROR),
    }
    *copied = end;
    *changed = true;
    Ok(end)
}
