//! The [Content_Types].xml part.
//!
//! Maps file extensions (Default elements) and individual part names
//! (Override elements) to content types.

use crate::common::error::{Error, Result};
use crate::common::xml::{attr_string, escape_xml};
use crate::ooxml::opc::constants::{content_type as ct, namespace};
use crate::ooxml::opc::packuri;
use quick_xml::Reader;
use quick_xml::events::Event;
use std::fmt::Write as FmtWrite;

/// Content type map read from and written to `[Content_Types].xml`.
///
/// Override part names are stored without their leading slash so they
/// line up with member names.
#[derive(Debug, Clone, Default)]
pub struct ContentTypeMap {
    /// Maps file extensions to default content types, in document order
    defaults: Vec<(String, String)>,
    /// Maps specific partnames to override content types, in document order
    overrides: Vec<(String, String)>,
}

impl ContentTypeMap {
    /// Create a map with the defaults every package carries.
    pub fn new() -> Self {
        Self {
            defaults: vec![
                ("rels".to_string(), ct::OPC_RELATIONSHIPS.to_string()),
                ("xml".to_string(), ct::XML.to_string()),
            ],
            overrides: Vec::new(),
        }
    }

    /// Parse content types from [Content_Types].xml.
    pub fn from_xml(xml: &[u8]) -> Result<Self> {
        let mut map = Self::default();
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(true);

        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                    b"Default" => {
                        // <Default Extension="xml" ContentType="application/xml"/>
                        if let (Some(ext), Some(ct)) =
                            (attr_string(e, b"Extension")?, attr_string(e, b"ContentType")?)
                        {
                            map.set_default(&ext, &ct);
                        }
                    },
                    b"Override" => {
                        // <Override PartName="/xl/workbook.xml" ContentType="..."/>
                        if let (Some(pn), Some(ct)) =
                            (attr_string(e, b"PartName")?, attr_string(e, b"ContentType")?)
                        {
                            map.set_override(pn.trim_start_matches('/'), &ct);
                        }
                    },
                    _ => {},
                },
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::XmlError(format!(
                        "Content types parse error: {}",
                        e
                    )));
                },
                _ => {},
            }
            buf.clear();
        }

        Ok(map)
    }

    /// Add or replace a default content type mapping for a file extension.
    pub fn set_default(&mut self, extension: &str, content_type: &str) {
        let extension = extension.to_ascii_lowercase();
        match self.defaults.iter_mut().find(|(ext, _)| *ext == extension) {
            Some(entry) => entry.1 = content_type.to_string(),
            None => self.defaults.push((extension, content_type.to_string())),
        }
    }

    /// Add or replace an override content type mapping for a part.
    pub fn set_override(&mut self, part: &str, content_type: &str) {
        match self.overrides.iter_mut().find(|(name, _)| name == part) {
            Some(entry) => entry.1 = content_type.to_string(),
            None => self
                .overrides
                .push((part.to_string(), content_type.to_string())),
        }
    }

    /// Drop the override for a part, if any.
    pub fn remove_override(&mut self, part: &str) {
        self.overrides.retain(|(name, _)| name != part);
    }

    /// Get the content type for a part.
    ///
    /// First checks for an override, then falls back to the default
    /// based on file extension.
    pub fn get(&self, part: &str) -> Option<&str> {
        if let Some((_, ct)) = self.overrides.iter().find(|(name, _)| name == part) {
            return Some(ct);
        }
        let ext = packuri::extension(part);
        self.defaults
            .iter()
            .find(|(e, _)| e.eq_ignore_ascii_case(ext))
            .map(|(_, ct)| ct.as_str())
    }

    /// Parts overridden with the given content type, in document order.
    pub fn parts_of_type<'a>(&'a self, content_type: &'a str) -> impl Iterator<Item = &'a str> {
        self.overrides
            .iter()
            .filter(move |(_, ct)| ct == content_type)
            .map(|(name, _)| name.as_str())
    }

    /// Generate the XML for [Content_Types].xml.
    pub fn to_xml(&self) -> Result<String> {
        let mut xml = String::with_capacity(256 + self.overrides.len() * 128);

        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        write!(xml, r#"<Types xmlns="{}">"#, namespace::OPC_CONTENT_TYPES)?;

        for (ext, content_type) in &self.defaults {
            write!(
                xml,
                r#"<Default Extension="{}" ContentType="{}"/>"#,
                escape_xml(ext),
                escape_xml(content_type)
            )?;
        }

        for (part, content_type) in &self.overrides {
            write!(
                xml,
                r#"<Override PartName="/{}" ContentType="{}"/>"#,
                escape_xml(part),
                escape_xml(content_type)
            )?;
        }

        xml.push_str("</Types>");

        Ok(xml)
    }
}
