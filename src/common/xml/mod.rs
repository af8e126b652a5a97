//! XML helpers shared by the package and spreadsheet layers.

pub mod attrs;
pub mod encoding;
pub mod escape;

pub use attrs::{RawAttributes, attr_string, attr_u32, parse_bool, raw_attributes};
pub use encoding::transcode_to_utf8;
pub use escape::{escape_xml, escape_xml_cow, unescape_xml};
