//! Shared strings table for Excel files.
//!
//! Excel stores cell strings once in `xl/sharedStrings.xml` and refers to
//! them by index. Items are kept as their raw `<si>` markup so rich text and
//! phonetic runs survive a round trip untouched; the plain text is derived
//! for lookups.
//!
//! Performance optimizations:
//! - Borrowing quick-xml reader over the part bytes
//! - HashMap from plain text to index for deduplication of new strings

use crate::common::error::Result;
use crate::common::xml::{attr_u32, escape_xml};
use crate::ooxml::opc::constants::namespace;
use crate::ooxml::xlsx::parsers::{read_inner, read_text};
use crate::ooxml::xlsx::value::{RichTextRun, encode_text};
use quick_xml::Reader;
use quick_xml::events::Event;
use std::collections::HashMap;
use std::fmt::Write as FmtWrite;

/// One `<si>` item.
#[derive(Debug, Clone, PartialEq)]
struct SharedItem {
    /// Inner markup of `<si>`.
    xml: String,
    /// Concatenated text of the item, phonetic runs excluded.
    text: String,
    rich: bool,
}

/// Shared strings table.
#[derive(Debug, Default)]
pub struct SharedStrings {
    items: Vec<SharedItem>,
    /// Plain (non-rich) strings to their index.
    string_to_index: HashMap<String, usize>,
    /// Total reference count as read, kept for `count`.
    count: usize,
    dirty: bool,
}

impl SharedStrings {
    /// Create a new empty shared strings table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse shared strings from xl/sharedStrings.xml content.
    pub fn parse(xml: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(xml);
        let mut table = Self::new();

        loop {
            match reader.read_event()? {
                Event::Start(e) if e.local_name().as_ref() == b"sst" => {
                    table.count = attr_u32(&e, b"count")?.unwrap_or(0) as usize;
                },
                Event::Start(e) if e.local_name().as_ref() == b"si" => {
                    let inner = read_inner(&mut reader, xml, e.name())?;
                    let (text, rich) = item_text(inner.as_bytes())?;
                    table.push(SharedItem {
                        xml: inner,
                        text,
                        rich,
                    });
                },
                Event::Empty(e) if e.local_name().as_ref() == b"si" => {
                    table.push(SharedItem {
                        xml: String::new(),
                        text: String::new(),
                        rich: false,
                    });
                },
                Event::Eof => break,
                _ => {},
            }
        }
        table.count = table.count.max(table.items.len());
        Ok(table)
    }

    fn push(&mut self, item: SharedItem) -> usize {
        let index = self.items.len();
        if !item.rich {
            self.string_to_index.entry(item.text.clone()).or_insert(index);
        }
        self.items.push(item);
        index
    }

    /// Get the text of an item.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.items.get(index).map(|item| item.text.as_str())
    }

    /// Get the number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Add a plain string and return its index.
    ///
    /// If the string already exists, returns the existing index.
    pub fn add_string(&mut self, s: &str) -> usize {
        self.count += 1;
        if let Some(&index) = self.string_to_index.get(s) {
            return index;
        }
        let encoded = encode_text(s);
        let tag = if encoded.preserve_space {
            r#"<t xml:space="preserve">"#
        } else {
            "<t>"
        };
        self.dirty = true;
        self.push(SharedItem {
            xml: format!("{tag}{}</t>", escape_xml(&encoded.value)),
            text: encoded.value,
            rich: false,
        })
    }

    /// Append a rich text item and return its index. Rich items are never
    /// deduplicated.
    pub fn append_rich_text(&mut self, runs: &[RichTextRun]) -> Result<usize> {
        let mut xml = String::new();
        let mut text = String::new();
        for run in runs {
            let encoded = encode_text(&run.text);
            xml.push_str("<r>");
            if let Some(font) = &run.font {
                xml.push_str("<rPr>");
                if font.bold {
                    xml.push_str("<b/>");
                }
                if font.italic {
                    xml.push_str("<i/>");
                }
                if font.strike {
                    xml.push_str("<strike/>");
                }
                if let Some(underline) = &font.underline {
                    write!(xml, r#"<u val="{}"/>"#, escape_xml(underline))?;
                }
                if let Some(align) = &font.vert_align {
                    write!(xml, r#"<vertAlign val="{}"/>"#, escape_xml(align))?;
                }
                if let Some(size) = font.size {
                    write!(xml, r#"<sz val="{}"/>"#, size)?;
                }
                if let Some(color) = &font.color {
                    let color = color.trim_start_matches('#');
                    let argb = if color.len() == 6 {
                        format!("FF{color}")
                    } else {
                        color.to_string()
                    };
                    write!(xml, r#"<color rgb="{}"/>"#, escape_xml(&argb.to_uppercase()))?;
                }
                if let Some(family) = &font.family {
                    write!(xml, r#"<rFont val="{}"/>"#, escape_xml(family))?;
                }
                xml.push_str("</rPr>");
            }
            if encoded.preserve_space {
                xml.push_str(r#"<t xml:space="preserve">"#);
            } else {
                xml.push_str("<t>");
            }
            xml.push_str(&escape_xml(&encoded.value));
            xml.push_str("</t></r>");
            text.push_str(&encoded.value);
        }

        self.count += 1;
        self.dirty = true;
        Ok(self.push(SharedItem {
            xml,
            text,
            rich: true,
        }))
    }

    /// Serialize the shared strings table to XML.
    pub fn to_xml(&self) -> Result<String> {
        let mut xml = String::with_capacity(128 + self.items.len() * 32);
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        write!(
            xml,
            r#"<sst xmlns="{}" count="{}" uniqueCount="{}">"#,
            namespace::SML_MAIN,
            self.count.max(self.items.len()),
            self.items.len()
        )?;
        for item in &self.items {
            if item.xml.is_empty() {
                xml.push_str("<si/>");
            } else {
                write!(xml, "<si>{}</si>", item.xml)?;
            }
        }
        xml.push_str("</sst>");
        Ok(xml)
    }
}

/// Text of an `<si>` body: the `<t>` children of the item and its runs,
/// skipping phonetic runs.
pub(crate) fn item_text(inner: &[u8]) -> Result<(String, bool)> {
    let mut reader = Reader::from_reader(inner);
    let mut text = String::new();
    let mut rich = false;
    let mut in_phonetic = false;
    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"t" if !in_phonetic => text.push_str(&read_text(&mut reader, b"t")?),
                b"r" => rich = true,
                b"rPh" => in_phonetic = true,
                _ => {},
            },
            Event::End(e) if e.local_name().as_ref() == b"rPh" => in_phonetic = false,
            Event::Eof => break,
            _ => {},
        }
    }
    Ok((text, rich))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::xlsx::value::RichTextFont;

    #[test]
    fn test_shared_strings() {
        let mut ss = SharedStrings::new();
        let idx1 = ss.add_string("Hello");
        let idx2 = ss.add_string("World");
        let idx3 = ss.add_string("Hello"); // Duplicate

        assert_eq!(idx1, 0);
        assert_eq!(idx2, 1);
        assert_eq!(idx3, 0); // Same as first "Hello"
        assert_eq!(ss.len(), 2);
        assert!(ss.is_dirty());
    }

    #[test]
    fn test_parse_keeps_rich_items() {
        let xml = br#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="5" uniqueCount="3"><si><t>plain &amp; simple</t></si><si><r><rPr><b/></rPr><t>bold</t></r><r><t xml:space="preserve"> tail</t></r></si><si><t>kanji</t><rPh sb="0" eb="1"><t>kana</t></rPh></si></sst>"#;
        let mut ss = SharedStrings::parse(xml).unwrap();

        assert_eq!(ss.get(0), Some("plain & simple"));
        assert_eq!(ss.get(1), Some("bold tail"));
        assert_eq!(ss.get(2), Some("kanji"));
        assert!(!ss.is_dirty());

        assert_eq!(ss.add_string("plain & simple"), 0);
        assert_eq!(ss.add_string("bold tail"), 3);

        let out = ss.to_xml().unwrap();
        assert!(out.contains(r#"count="7" uniqueCount="4""#));
        assert!(out.contains(r#"<si><r><rPr><b/></rPr><t>bold</t></r><r><t xml:space="preserve"> tail</t></r></si>"#));
    }

    #[test]
    fn test_append_rich_text() {
        let mut ss = SharedStrings::new();
        let runs = vec![
            RichTextRun {
                text: "Red".into(),
                font: Some(RichTextFont {
                    bold: true,
                    color: Some("#ff0000".into()),
                    size: Some(11.0),
                    ..Default::default()
                }),
            },
            RichTextRun::new(" plain"),
        ];
        assert_eq!(ss.append_rich_text(&runs).unwrap(), 0);
        assert_eq!(ss.append_rich_text(&runs).unwrap(), 1);
        assert_eq!(ss.get(0), Some("Red plain"));

        let out = ss.to_xml().unwrap();
        assert!(out.contains(
            r#"<si><r><rPr><b/><sz val="11"/><color rgb="FFFF0000"/></rPr><t>Red</t></r><r><t xml:space="preserve"> plain</t></r></si>"#
        ));
    }
}
