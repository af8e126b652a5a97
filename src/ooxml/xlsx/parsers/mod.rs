//! XML parsing modules for Excel files.
//!
//! This module contains specialized parsers for different XML files
//! within an Excel workbook (.xlsx), plus the event helpers they share.
//! All parsers run over in-memory UTF-8 input (see
//! [`OpcPackage::read_xml`](crate::ooxml::opc::OpcPackage::read_xml)).

pub mod workbook_parser;
pub mod worksheet_parser;

use crate::common::error::{Error, Result};
use crate::common::xml::{escape_xml, unescape_xml};
use quick_xml::Reader;
use quick_xml::events::Event;

/// Collect the text content up to the closing tag `end`, unescaped.
///
/// Nested markup is skipped; only character data counts.
pub(crate) fn read_text(reader: &mut Reader<&[u8]>, end: &[u8]) -> Result<String> {
    let mut raw = String::new();
    loop {
        match reader.read_event()? {
            Event::Text(text) => raw.push_str(std::str::from_utf8(&text)?),
            Event::GeneralRef(entity) => {
                raw.push('&');
                raw.push_str(std::str::from_utf8(&entity)?);
                raw.push(';');
            },
            Event::CData(data) => raw.push_str(&escape_xml(std::str::from_utf8(&data)?)),
            Event::End(e) if e.local_name().as_ref() == end => break,
            Event::Eof => return Err(unexpected_eof(end)),
            _ => {},
        }
    }
    Ok(unescape_xml(&raw))
}

/// Raw inner markup of the element whose start tag was just read.
pub(crate) fn read_inner<'a>(
    reader: &mut Reader<&'a [u8]>,
    xml: &'a [u8],
    name: quick_xml::name::QName<'_>,
) -> Result<String> {
    let span = reader.read_to_end(name)?;
    let inner = &xml[span.start as usize..span.end as usize];
    Ok(std::str::from_utf8(inner)?.to_string())
}

pub(crate) fn unexpected_eof(element: &[u8]) -> Error {
    Error::XmlError(format!(
        "unexpected end of document inside <{}>",
        String::from_utf8_lossy(element)
    ))
}
