//! Attribute access on quick-xml start tags.
//!
//! Values come back unescaped for modelled attributes. Attributes that a
//! model does not understand are kept verbatim (still escaped) so they can
//! be written back byte-for-byte.

use crate::common::error::Result;
use crate::common::xml::escape::unescape_xml;
use quick_xml::events::BytesStart;
use smallvec::SmallVec;

/// Raw attribute list: qualified name and still-escaped value.
pub type RawAttributes = SmallVec<[(String, String); 2]>;

/// Get an attribute by qualified name, unescaped.
pub fn attr_string(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>> {
    let mut attributes = e.attributes();
    attributes.with_checks(false);
    for attr in attributes {
        let attr = attr?;
        if attr.key.as_ref() == key {
            let raw = std::str::from_utf8(&attr.value)?;
            return Ok(Some(unescape_xml(raw)));
        }
    }
    Ok(None)
}

/// Get an unsigned integer attribute. Unparsable values read as `None`.
pub fn attr_u32(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<u32>> {
    let mut attributes = e.attributes();
    attributes.with_checks(false);
    for attr in attributes {
        let attr = attr?;
        if attr.key.as_ref() == key {
            return Ok(atoi_simd::parse_pos::<u32, false>(attr.value.trim_ascii()).ok());
        }
    }
    Ok(None)
}

/// Collect every attribute whose name is not in `skip`, values kept escaped.
pub fn raw_attributes(e: &BytesStart<'_>, skip: &[&[u8]]) -> Result<RawAttributes> {
    let mut out = RawAttributes::new();
    let mut attributes = e.attributes();
    attributes.with_checks(false);
    for attr in attributes {
        let attr = attr?;
        let key = attr.key.as_ref();
        if skip.contains(&key) {
            continue;
        }
        out.push((
            std::str::from_utf8(key)?.to_string(),
            std::str::from_utf8(&attr.value)?.to_string(),
        ));
    }
    Ok(out)
}

/// Parse a boolean attribute value (`1`, `true`).
#[inline]
pub fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_and_skips_attributes() {
        let tag = BytesStart::from_content(r#"c r="B2" s="3" t="s" cm="1" note="a&amp;b""#, 1);
        assert_eq!(attr_string(&tag, b"r").unwrap().as_deref(), Some("B2"));
        assert_eq!(attr_u32(&tag, b"s").unwrap(), Some(3));
        assert_eq!(attr_string(&tag, b"note").unwrap().as_deref(), Some("a&b"));

        let rest = raw_attributes(&tag, &[b"r", b"s", b"t"]).unwrap();
        assert_eq!(rest.len(), 2);
        assert_eq!(rest[1], ("note".to_string(), "a&amp;b".to_string()));
    }
}
