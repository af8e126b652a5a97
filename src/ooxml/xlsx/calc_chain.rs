//! Calculation chain (`xl/calcChain.xml`).
//!
//! Each `<c>` entry names a formula cell and the sheet it lives on. The
//! sheet id (`i`) may be omitted, in which case the entry belongs to the
//! same sheet as the one before it; parsing resolves that inheritance so
//! every entry carries its sheet explicitly.

use crate::common::error::Result;
use crate::common::xml::{RawAttributes, attr_string, attr_u32, escape_xml, raw_attributes};
use crate::ooxml::opc::constants::namespace;
use quick_xml::Reader;
use quick_xml::events::Event;
use std::fmt::Write as FmtWrite;

/// One calculation chain entry.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CalcEntry {
    /// Cell reference, exactly as stored.
    pub reference: String,
    /// Sheet id of the cell, after inheritance.
    pub sheet_id: u32,
    /// Remaining attributes (`l`, `a`, `s`, `t`), still escaped.
    pub extra: RawAttributes,
}

/// Parsed calculation chain.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CalcChain {
    pub entries: Vec<CalcEntry>,
}

impl CalcChain {
    /// Parse `calcChain.xml`.
    pub fn parse(xml: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(true);

        let mut entries = Vec::new();
        let mut sheet_id = 0;
        loop {
            match reader.read_event()? {
                Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"c" => {
                    if let Some(id) = attr_u32(&e, b"i")? {
                        sheet_id = id;
                    }
                    entries.push(CalcEntry {
                        reference: attr_string(&e, b"r")?.unwrap_or_default(),
                        sheet_id,
                        extra: raw_attributes(&e, &[b"r", b"i"])?,
                    });
                },
                Event::Eof => break,
                _ => {},
            }
        }
        Ok(Self { entries })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize the chain, writing `i` only where the sheet changes.
    pub fn to_xml(&self) -> Result<String> {
        let mut xml = String::with_capacity(128 + self.entries.len() * 24);
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        write!(xml, r#"<calcChain xmlns="{}">"#, namespace::SML_MAIN)?;

        let mut previous = None;
        for entry in &self.entries {
            write!(xml, r#"<c r="{}""#, escape_xml(&entry.reference))?;
            if previous != Some(entry.sheet_id) {
                write!(xml, r#" i="{}""#, entry.sheet_id)?;
                previous = Some(entry.sheet_id);
            }
            for (key, value) in &entry.extra {
                write!(xml, r#" {}="{}""#, key, value)?;
            }
            xml.push_str("/>");
        }
        xml.push_str("</calcChain>");
        Ok(xml)
    }
}
