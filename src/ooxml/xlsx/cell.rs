//! Cell reference codec.
//!
//! Conversion between A1-style cell names and 1-based `(column, row)`
//! coordinates. Every other module parses references through these
//! functions; none of them re-implements the grammar.
//!
//! Column letters form a bijective base-26 numeral (`A` = 1, `Z` = 26,
//! `AA` = 27). A `$` marks an absolute axis and carries no meaning for the
//! coordinates, so it is skipped when parsing.
//!
//! # Example
//!
//! ```
//! use longan::ooxml::xlsx::cell::{cell_name_to_coordinates, coordinates_to_cell_name};
//!
//! assert_eq!(cell_name_to_coordinates("AK74").unwrap(), (37, 74));
//! assert_eq!(coordinates_to_cell_name(1, 1, true).unwrap(), "$A$1");
//! ```

use crate::common::error::{Error, Result};

/// Highest column number of a worksheet (`XFD`).
pub const MAX_COLUMNS: u32 = 16_384;

/// Highest row number of a worksheet.
pub const TOTAL_ROWS: u32 = 1_048_576;

/// Split a cell name into column letters and row number.
///
/// `$` characters are skipped; the letters are returned as written.
///
/// # Errors
/// `InvalidCellName` when the name is not letters followed by a positive
/// row number. Rows too large for `u32` come back as `u32::MAX`.
pub fn split_cell_name(cell: &str) -> Result<(String, u32)> {
    let invalid = || Error::InvalidCellName(cell.to_string());

    let mut letters = String::with_capacity(3);
    let mut digits_start = None;
    for (pos, byte) in cell.bytes().enumerate() {
        match byte {
            b'$' => {},
            b'A'..=b'Z' | b'a'..=b'z' if digits_start.is_none() => letters.push(byte as char),
            b'0'..=b'9' if !letters.is_empty() => {
                digits_start.get_or_insert(pos);
            },
            _ => return Err(invalid()),
        }
    }

    let start = digits_start.ok_or_else(invalid)?;
    // Rows past u32 saturate so the caller reports them as out of range.
    let row = cell.as_bytes()[start..]
        .iter()
        .filter(|b| **b != b'$')
        .fold(0u64, |row, b| {
            row.saturating_mul(10).saturating_add((b - b'0') as u64)
        });
    match row {
        0 => Err(invalid()),
        row => Ok((letters, row.min(u32::MAX as u64) as u32)),
    }
}

/// Join column letters and a row number into an upper-case cell name.
pub fn join_cell_name(col: &str, row: u32) -> Result<String> {
    if col.is_empty() || !col.bytes().all(|b| b.is_ascii_alphabetic()) {
        return Err(Error::InvalidColumnName(col.to_string()));
    }
    if row < 1 {
        return Err(Error::InvalidRowNumber(row as i64));
    }
    Ok(format!("{}{}", col.to_ascii_uppercase(), row))
}

/// Convert column letters (case-insensitive) to a column number.
///
/// # Errors
/// `InvalidColumnName` on empty or non-letter input, `ColumnOutOfRange`
/// beyond `XFD`.
pub fn column_name_to_number(name: &str) -> Result<u32> {
    if name.is_empty() {
        return Err(Error::InvalidColumnName(name.to_string()));
    }

    let mut col: u64 = 0;
    for byte in name.bytes() {
        let digit = match byte {
            b'A'..=b'Z' => byte - b'A' + 1,
            b'a'..=b'z' => byte - b'a' + 1,
            _ => return Err(Error::InvalidColumnName(name.to_string())),
        };
        col = col * 26 + digit as u64;
        // Keeps long inputs from overflowing before the range check.
        if col > MAX_COLUMNS as u64 {
            return Err(Error::ColumnOutOfRange);
        }
    }
    Ok(col as u32)
}

/// Convert a column number to its letters.
pub fn column_number_to_name(num: u32) -> Result<String> {
    if !(1..=MAX_COLUMNS).contains(&num) {
        return Err(Error::ColumnOutOfRange);
    }

    let mut name = String::with_capacity(3);
    push_column_letters(&mut name, num);
    Ok(name)
}

/// Append the letters of a column already known to be in range.
pub(crate) fn push_column_letters(out: &mut String, num: u32) {
    let mut letters = [0u8; 3];
    let mut pos = letters.len();
    let mut n = num;
    while n > 0 && pos > 0 {
        pos -= 1;
        letters[pos] = b'A' + ((n - 1) % 26) as u8;
        n = (n - 1) / 26;
    }
    for &letter in &letters[pos..] {
        out.push(letter as char);
    }
}

/// Format a cell name from coordinates already validated against the sheet
/// limits, optionally marking each axis absolute.
pub(crate) fn format_cell_name(col: u32, row: u32, abs_col: bool, abs_row: bool) -> String {
    debug_assert!((1..=MAX_COLUMNS).contains(&col) && (1..=TOTAL_ROWS).contains(&row));
    let mut name = String::with_capacity(10);
    if abs_col {
        name.push('$');
    }
    push_column_letters(&mut name, col);
    if abs_row {
        name.push('$');
    }
    name.push_str(itoa::Buffer::new().format(row));
    name
}

/// Convert a cell name to `(column, row)`.
///
/// # Errors
/// `CellNameToCoordinates` wrapping the split failure, `RowOutOfRange`
/// above row 1048576, or the column conversion error.
pub fn cell_name_to_coordinates(cell: &str) -> Result<(u32, u32)> {
    let (letters, row) =
        split_cell_name(cell).map_err(|err| Error::cell_to_coordinates(cell, err))?;
    if row > TOTAL_ROWS {
        return Err(Error::RowOutOfRange);
    }
    let col = column_name_to_number(&letters)?;
    Ok((col, row))
}

/// Convert `(column, row)` to a cell name, `$`-prefixing both axes when
/// `absolute` is set.
pub fn coordinates_to_cell_name(col: u32, row: u32, absolute: bool) -> Result<String> {
    if col < 1 || row < 1 {
        return Err(Error::InvalidCoordinates {
            col: col as i64,
            row: row as i64,
        });
    }
    if row > TOTAL_ROWS {
        return Err(Error::RowOutOfRange);
    }
    let sign = if absolute { "$" } else { "" };
    let name = column_number_to_name(col)?;
    Ok(format!("{sign}{name}{sign}{row}"))
}

/// Convert a range reference such as `B2:$D$5` to `[c1, r1, c2, r2]`.
///
/// The corners are returned in the order written; see [`sort_coordinates`].
pub fn range_ref_to_coordinates(reference: &str) -> Result<[u32; 4]> {
    let mut parts = reference.split(':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(first), Some(last), None) => {
            cell_refs_to_coordinates(&first.replace('$', ""), &last.replace('$', ""))
        },
        _ => Err(Error::InvalidRange(reference.to_string())),
    }
}

/// Convert two cell names to `[c1, r1, c2, r2]`.
pub fn cell_refs_to_coordinates(first: &str, last: &str) -> Result<[u32; 4]> {
    let (c1, r1) = cell_name_to_coordinates(first)?;
    let (c2, r2) = cell_name_to_coordinates(last)?;
    Ok([c1, r1, c2, r2])
}

/// Swap corners so that the first pair is the top-left one: `C1:B3` becomes
/// `B1:C3`.
#[inline]
pub fn sort_coordinates(coordinates: &mut [u32; 4]) {
    if coordinates[2] < coordinates[0] {
        coordinates.swap(0, 2);
    }
    if coordinates[3] < coordinates[1] {
        coordinates.swap(1, 3);
    }
}

/// Convert `[c1, r1, c2, r2]` back to `A1:B2` form.
pub fn coordinates_to_range_ref(coordinates: &[u32; 4]) -> Result<String> {
    let first = coordinates_to_cell_name(coordinates[0], coordinates[1], false)?;
    let last = coordinates_to_cell_name(coordinates[2], coordinates[3], false)?;
    Ok(format!("{first}:{last}"))
}
