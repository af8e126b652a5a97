//! Cell format registry over `xl/styles.xml`.
//!
//! The style sheet is kept as markup. Only the `<cellXfs>` list is split
//! out, so new cell formats can be appended and the count kept right while
//! fonts, fills, borders and everything else pass through untouched.

use crate::common::error::{Error, Result};
use crate::common::xml::attr_u32;
use crate::ooxml::xlsx::parsers::unexpected_eof;
use crate::ooxml::xlsx::value::DEFAULT_DATE_NUM_FMT;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

#[derive(Debug, Clone, PartialEq)]
pub struct StyleSheet {
    /// Markup before `<cellXfs>`.
    prefix: String,
    /// Each `<xf>` of `<cellXfs>`.
    cell_xfs: Vec<String>,
    /// Markup after `</cellXfs>`.
    suffix: String,
    date_style: Option<u32>,
    dirty: bool,
}

impl StyleSheet {
    /// Parse `styles.xml`.
    pub fn parse(xml: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(xml)?;
        let mut reader = Reader::from_reader(xml);
        let mut cell_xfs = Vec::new();
        let mut date_style = None;
        let mut bounds = None;

        loop {
            let start = reader.buffer_position() as usize;
            match reader.read_event()? {
                Event::Empty(e) if e.local_name().as_ref() == b"cellXfs" => {
                    bounds = Some((start, reader.buffer_position() as usize));
                },
                Event::Start(e) if e.local_name().as_ref() == b"cellXfs" => {
                    loop {
                        let xf_start = reader.buffer_position() as usize;
                        match reader.read_event()? {
                            Event::Empty(xf) if xf.local_name().as_ref() == b"xf" => {
                                note_date_style(&xf, cell_xfs.len(), &mut date_style)?;
                                let end = reader.buffer_position() as usize;
                                cell_xfs.push(text[xf_start..end].trim().to_string());
                            },
                            Event::Start(xf) if xf.local_name().as_ref() == b"xf" => {
                                reader.read_to_end(xf.name())?;
                                let end = reader.buffer_position() as usize;
                                cell_xfs.push(text[xf_start..end].trim().to_string());
                            },
                            Event::End(end) if end.local_name().as_ref() == b"cellXfs" => break,
                            Event::Eof => return Err(unexpected_eof(b"cellXfs")),
                            _ => {},
                        }
                    }
                    bounds = Some((start, reader.buffer_position() as usize));
                },
                Event::Eof => break,
                _ => {},
            }
        }

        let (start, end) =
            bounds.ok_or_else(|| Error::XmlError("styles.xml has no cellXfs".to_string()))?;
        Ok(Self {
            prefix: text[..start].to_string(),
            cell_xfs,
            suffix: text[end..].to_string(),
            date_style,
            dirty: false,
        })
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Number of cell formats.
    pub fn len(&self) -> usize {
        self.cell_xfs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cell_xfs.is_empty()
    }

    /// Index of a plain cell format showing a date-time (`numFmtId` 22),
    /// appending one on first use.
    pub fn register_date_style(&mut self) -> u32 {
        if let Some(style) = self.date_style {
            return style;
        }
        let style = self.cell_xfs.len() as u32;
        self.cell_xfs.push(format!(
            r#"<xf numFmtId="{DEFAULT_DATE_NUM_FMT}" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/>"#
        ));
        self.date_style = Some(style);
        self.dirty = true;
        style
    }

    pub fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(
            self.prefix.len() + self.suffix.len() + 32 + self.cell_xfs.len() * 80,
        );
        xml.push_str(&self.prefix);
        xml.push_str(r#"<cellXfs count=""#);
        xml.push_str(itoa::Buffer::new().format(self.cell_xfs.len()));
        xml.push_str(r#"">"#);
        for xf in &self.cell_xfs {
            xml.push_str(xf);
        }
        xml.push_str("</cellXfs>");
        xml.push_str(&self.suffix);
        xml
    }
}

/// Remember the first format that is exactly the default with the date
/// number format.
fn note_date_style(xf: &BytesStart<'_>, index: usize, date_style: &mut Option<u32>) -> Result<()> {
    if date_style.is_some() || attr_u32(xf, b"numFmtId")? != Some(DEFAULT_DATE_NUM_FMT) {
        return Ok(());
    }
    for key in [b"fontId".as_slice(), b"fillId", b"borderId"] {
        if attr_u32(xf, key)?.unwrap_or(0) != 0 {
            return Ok(());
        }
    }
    *date_style = Some(index as u32);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::xlsx::template::STYLES_XML;

    #[test]
    fn test_register_date_style() {
        let mut styles = StyleSheet::parse(STYLES_XML.as_bytes()).unwrap();
        assert_eq!(styles.len(), 1);
        assert!(!styles.is_dirty());

        assert_eq!(styles.register_date_style(), 1);
        assert_eq!(styles.register_date_style(), 1);

        let xml = styles.to_xml();
        assert!(xml.contains(r#"<cellXfs count="2"><xf numFmtId="0""#));
        assert!(xml.contains(r#"<xf numFmtId="22" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/></cellXfs><cellStyles"#));
        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><styleSheet"#));

        let reparsed = StyleSheet::parse(xml.as_bytes()).unwrap();
        assert_eq!(reparsed.len(), 2);
        assert_eq!(reparsed.date_style, Some(1));
    }

    #[test]
    fn existing_date_style_is_reused() {
        let xml = br#"<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><cellXfs count="3"><xf numFmtId="0"/><xf numFmtId="22" fontId="2"/><xf numFmtId="22" fontId="0" fillId="0" borderId="0"><alignment horizontal="left"/></xf></cellXfs></styleSheet>"#;
        let mut styles = StyleSheet::parse(xml).unwrap();
        assert_eq!(styles.len(), 3);
        assert_eq!(styles.register_date_style(), 3);

        let xml = br#"<styleSheet><cellXfs count="2"><xf numFmtId="0"/><xf numFmtId="22" applyNumberFormat="1"/></cellXfs></styleSheet>"#;
        let mut styles = StyleSheet::parse(xml).unwrap();
        assert_eq!(styles.register_date_style(), 1);
        assert!(!styles.is_dirty());
    }

    #[test]
    fn empty_cell_xfs_is_expanded() {
        let xml = br#"<styleSheet><cellXfs/><cellStyles/></styleSheet>"#;
        let mut styles = StyleSheet::parse(xml).unwrap();
        assert!(styles.is_empty());
        styles.register_date_style();
        assert_eq!(
            styles.to_xml(),
            r#"<styleSheet><cellXfs count="1"><xf numFmtId="22" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/></cellXfs><cellStyles/></styleSheet>"#
        );
    }
}
