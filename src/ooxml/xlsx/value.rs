//! Cell values and their worksheet encoding.
//!
//! [`CellValue`] is what callers hand to the stream writer and to
//! `Workbook::set_cell_value`. Encoding turns it into the `t` attribute and
//! `<v>` text of a `<c>` element; rich text needs the shared-string pool and
//! is resolved by the caller.

use crate::common::error::{Error, Result};
use crate::ooxml::xlsx::date::{duration_to_days, to_excel_serial};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, TimeZone};
use std::fmt::Display;

/// Longest text a cell can hold, in characters.
pub const TOTAL_CELL_CHARS: usize = 32_767;

/// Tallest row height Excel accepts, in points.
pub const MAX_ROW_HEIGHT: f64 = 409.0;

/// Built-in number format used for date-times written without a style.
pub const DEFAULT_DATE_NUM_FMT: u32 = 22;

/// Font properties of a rich text run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RichTextFont {
    pub bold: bool,
    pub italic: bool,
    /// `single`, `double`, ...
    pub underline: Option<String>,
    pub strike: bool,
    pub family: Option<String>,
    pub size: Option<f64>,
    /// RGB or ARGB hex, without `#`.
    pub color: Option<String>,
    /// `superscript` or `subscript`.
    pub vert_align: Option<String>,
}

/// One run of rich text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RichTextRun {
    pub text: String,
    pub font: Option<RichTextFont>,
}

impl RichTextRun {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            font: None,
        }
    }
}

/// A value with an explicit style and optional formula.
#[derive(Debug, Clone, PartialEq)]
pub struct StyledCell {
    pub style: u32,
    pub formula: Option<String>,
    pub value: CellValue,
}

/// A value to write into a cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum CellValue {
    /// Leaves the position untouched.
    #[default]
    Nil,
    Int(i64),
    UInt(u64),
    Float(f64),
    Float32(f32),
    String(String),
    Bytes(Vec<u8>),
    Duration(TimeDelta),
    DateTime(NaiveDateTime),
    Bool(bool),
    RichText(Vec<RichTextRun>),
    Styled(Box<StyledCell>),
}

impl CellValue {
    /// Text of any displayable value, for types without a dedicated variant.
    pub fn display(value: impl Display) -> Self {
        CellValue::String(value.to_string())
    }

    /// Wrap a value with a style id and optional formula.
    pub fn styled(style: u32, formula: Option<&str>, value: impl Into<CellValue>) -> Self {
        CellValue::Styled(Box::new(StyledCell {
            style,
            formula: formula.map(str::to_string),
            value: value.into(),
        }))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, CellValue::Nil)
    }
}

macro_rules! impl_from {
    ($variant:ident: $($ty:ty),+) => {
        $(impl From<$ty> for CellValue {
            fn from(value: $ty) -> Self {
                CellValue::$variant(value.into())
            }
        })+
    };
}

impl_from!(Int: i8, i16, i32, i64);
impl_from!(UInt: u8, u16, u32, u64);
impl_from!(Float: f64);
impl_from!(Float32: f32);
impl_from!(String: String, &str);
impl_from!(Bytes: Vec<u8>, &[u8]);
impl_from!(Duration: TimeDelta);
impl_from!(DateTime: NaiveDateTime);
impl_from!(Bool: bool);
impl_from!(RichText: Vec<RichTextRun>);

impl From<isize> for CellValue {
    fn from(value: isize) -> Self {
        CellValue::Int(value as i64)
    }
}

impl From<usize> for CellValue {
    fn from(value: usize) -> Self {
        CellValue::UInt(value as u64)
    }
}

impl From<NaiveDate> for CellValue {
    fn from(value: NaiveDate) -> Self {
        CellValue::DateTime(value.and_hms_opt(0, 0, 0).unwrap_or_default())
    }
}

/// Zoned date-times are written as their local wall-clock time.
impl<Tz: TimeZone> From<DateTime<Tz>> for CellValue {
    fn from(value: DateTime<Tz>) -> Self {
        CellValue::DateTime(value.naive_local())
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(CellValue::Nil, Into::into)
    }
}

/// Row-level options of a streamed row.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RowOptions {
    /// Height in points; 0 keeps the default.
    pub height: f64,
    pub hidden: bool,
    /// Style applied to every cell of the row without its own style.
    pub style: u32,
}

impl RowOptions {
    /// Attribute text of a `<row>` start tag.
    pub(crate) fn attributes(&self) -> Result<String> {
        if self.height > MAX_ROW_HEIGHT {
            return Err(Error::RowHeightTooLarge);
        }
        let mut attrs = String::new();
        if self.style > 0 {
            attrs.push_str(&format!(r#" s="{}" customFormat="true""#, self.style));
        }
        if self.height > 0.0 {
            attrs.push_str(&format!(r#" ht="{}" customHeight="true""#, self.height));
        }
        if self.hidden {
            attrs.push_str(r#" hidden="true""#);
        }
        Ok(attrs)
    }
}

/// `t` attribute and `<v>` text of a scalar value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EncodedValue {
    pub cell_type: Option<&'static str>,
    pub value: String,
    /// Text with leading or trailing whitespace needs `xml:space="preserve"`.
    pub preserve_space: bool,
    /// A date-time serial that should get a date style if the cell has none.
    pub is_date: bool,
}

impl EncodedValue {
    fn number(value: String) -> Self {
        Self {
            value,
            ..Default::default()
        }
    }
}

/// Truncate to the cell limit and flag surrounding whitespace.
pub fn encode_text(text: &str) -> EncodedValue {
    let text = match text.char_indices().nth(TOTAL_CELL_CHARS) {
        Some((cut, _)) => &text[..cut],
        None => text,
    };
    EncodedValue {
        cell_type: Some("str"),
        value: text.to_string(),
        preserve_space: text.trim() != text,
        is_date: false,
    }
}

fn encode_float(value: f64, text: String) -> EncodedValue {
    if value.is_finite() {
        EncodedValue::number(text)
    } else {
        encode_text(&text)
    }
}

/// Encode a scalar value. `Nil`, rich text and styled wrappers are the
/// caller's business and come back as `None`.
pub fn encode_value(value: &CellValue, date1904: bool) -> Option<EncodedValue> {
    let encoded = match value {
        CellValue::Nil | CellValue::RichText(_) | CellValue::Styled(_) => return None,
        CellValue::Int(v) => EncodedValue::number(itoa::Buffer::new().format(*v).to_string()),
        CellValue::UInt(v) => EncodedValue::number(itoa::Buffer::new().format(*v).to_string()),
        CellValue::Float(v) => encode_float(*v, v.to_string()),
        CellValue::Float32(v) => encode_float(*v as f64, v.to_string()),
        CellValue::String(s) => encode_text(s),
        CellValue::Bytes(b) => encode_text(&String::from_utf8_lossy(b)),
        CellValue::Duration(d) => EncodedValue::number(duration_to_days(*d).to_string()),
        CellValue::DateTime(dt) => match to_excel_serial(*dt, date1904) {
            Some(serial) => EncodedValue {
                is_date: true,
                ..EncodedValue::number(serial.to_string())
            },
            None => encode_text(&dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
        },
        CellValue::Bool(b) => EncodedValue {
            cell_type: Some("b"),
            value: if *b { "1" } else { "0" }.to_string(),
            ..Default::default()
        },
    };
    Some(encoded)
}
