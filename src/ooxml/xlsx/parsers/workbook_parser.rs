//! Parser for Excel workbook.xml files.
//!
//! Extracts the sheet list, the defined names and the workbook properties;
//! the remaining children are sliced out of the input as raw markup.

use crate::common::error::Result;
use crate::common::xml::{attr_string, attr_u32, parse_bool, raw_attributes};
use crate::ooxml::xlsx::book::{DefinedName, SheetEntry, WorkbookChild, WorkbookPart, WorkbookPr};
use crate::ooxml::xlsx::parsers::{read_text, unexpected_eof};
use crate::ooxml::xlsx::worksheet::PreservedElement;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

// Performance: Pre-allocate typical capacity for worksheets
const INITIAL_SHEETS_CAPACITY: usize = 16;

/// Parse workbook.xml.
pub fn parse_workbook(xml: &[u8]) -> Result<WorkbookPart> {
    let mut reader = Reader::from_reader(xml);
    let mut part = WorkbookPart::default();
    part.sheets.reserve(INITIAL_SHEETS_CAPACITY);

    loop {
        let start = reader.buffer_position() as usize;
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"workbook" => {
                part.root_attributes = raw_attributes(&e, &[])?;
            },
            Event::Start(e) => match e.local_name().as_ref() {
                b"sheets" => {
                    parse_sheets(&mut reader, &mut part.sheets)?;
                    part.children.push(WorkbookChild::Sheets);
                },
                b"definedNames" => {
                    parse_defined_names(&mut reader, &mut part.defined_names)?;
                    part.children.push(WorkbookChild::DefinedNames);
                },
                b"workbookPr" => {
                    part.properties = workbook_pr(&e)?;
                    part.children.push(WorkbookChild::WorkbookPr);
                    reader.read_to_end(e.name())?;
                },
                _ => {
                    reader.read_to_end(e.name())?;
                    let end = reader.buffer_position() as usize;
                    part.children.push(raw_child(&e, &xml[start..end])?);
                },
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"sheets" => part.children.push(WorkbookChild::Sheets),
                b"definedNames" => {},
                b"workbookPr" => {
                    part.properties = workbook_pr(&e)?;
                    part.children.push(WorkbookChild::WorkbookPr);
                },
                _ => {
                    let end = reader.buffer_position() as usize;
                    part.children.push(raw_child(&e, &xml[start..end])?);
                },
            },
            Event::Eof => break,
            _ => {},
        }
    }

    Ok(part)
}

fn flag(e: &BytesStart<'_>, key: &[u8]) -> Result<bool> {
    Ok(attr_string(e, key)?.is_some_and(|v| parse_bool(&v)))
}

fn workbook_pr(e: &BytesStart<'_>) -> Result<WorkbookPr> {
    Ok(WorkbookPr {
        date1904: flag(e, b"date1904")?,
        filter_privacy: flag(e, b"filterPrivacy")?,
        code_name: attr_string(e, b"codeName")?,
        extra: raw_attributes(e, &[b"date1904", b"filterPrivacy", b"codeName"])?,
    })
}

fn raw_child(e: &BytesStart<'_>, markup: &[u8]) -> Result<WorkbookChild> {
    Ok(WorkbookChild::Raw(PreservedElement {
        name: std::str::from_utf8(e.local_name().as_ref())?.to_string(),
        xml: std::str::from_utf8(markup)?.trim().to_string(),
    }))
}

fn parse_sheets(reader: &mut Reader<&[u8]>, sheets: &mut Vec<SheetEntry>) -> Result<()> {
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                sheets.push(SheetEntry {
                    name: attr_string(&e, b"name")?.unwrap_or_default(),
                    sheet_id: attr_u32(&e, b"sheetId")?.unwrap_or(0),
                    r_id: attr_string(&e, b"r:id")?.unwrap_or_default(),
                    extra: raw_attributes(&e, &[b"name", b"sheetId", b"r:id"])?,
                });
            },
            Event::End(e) if e.local_name().as_ref() == b"sheets" => return Ok(()),
            Event::Eof => return Err(unexpected_eof(b"sheets")),
            _ => {},
        }
    }
}

fn parse_defined_names(reader: &mut Reader<&[u8]>, names: &mut Vec<DefinedName>) -> Result<()> {
    loop {
        match reader.read_event()? {
            Event::Start(e) if e.local_name().as_ref() == b"definedName" => {
                let mut name = defined_name(&e)?;
                name.value = read_text(reader, b"definedName")?;
                names.push(name);
            },
            Event::Empty(e) if e.local_name().as_ref() == b"definedName" => {
                names.push(defined_name(&e)?);
            },
            Event::End(e) if e.local_name().as_ref() == b"definedNames" => return Ok(()),
            Event::Eof => return Err(unexpected_eof(b"definedNames")),
            _ => {},
        }
    }
}

fn defined_name(e: &BytesStart<'_>) -> Result<DefinedName> {
    Ok(DefinedName {
        name: attr_string(e, b"name")?.unwrap_or_default(),
        value: String::new(),
        local_sheet_id: attr_u32(e, b"localSheetId")?,
        comment: attr_string(e, b"comment")?,
        hidden: attr_string(e, b"hidden")?.is_some_and(|v| parse_bool(&v)),
        extra: raw_attributes(e, &[b"name", b"localSheetId", b"comment", b"hidden"])?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><workbookPr date1904="1"/><bookViews><workbookView activeTab="0"/></bookViews><sheets><sheet name="Data &amp; More" sheetId="1" r:id="rId1"/><sheet name="Hidden" sheetId="4" state="hidden" r:id="rId2"/></sheets><definedNames><definedName name="_xlnm.Print_Area" localSheetId="0">'Data &amp; More'!$A$1:$C$9</definedName></definedNames><calcPr calcId="191029"/></workbook>"#;

    #[test]
    fn test_parse_workbook() {
        let part = parse_workbook(WORKBOOK.as_bytes()).unwrap();

        assert!(part.properties.date1904);
        assert!(!part.properties.filter_privacy);
        assert_eq!(part.sheets.len(), 2);
        assert_eq!(part.sheets[0].name, "Data & More");
        assert_eq!(part.sheets[1].sheet_id, 4);
        assert_eq!(part.sheets[1].r_id, "rId2");
        assert_eq!(part.sheets[1].extra[0], ("state".to_string(), "hidden".to_string()));

        assert_eq!(part.defined_names.len(), 1);
        assert_eq!(part.defined_names[0].value, "'Data & More'!$A$1:$C$9");
        assert_eq!(part.defined_names[0].local_sheet_id, Some(0));

        let names: Vec<&str> = part
            .children
            .iter()
            .map(|child| match child {
                WorkbookChild::WorkbookPr => "workbookPr",
                WorkbookChild::Sheets => "sheets",
                WorkbookChild::DefinedNames => "definedNames",
                WorkbookChild::Raw(element) => element.name.as_str(),
            })
            .collect();
        assert_eq!(names, ["workbookPr", "bookViews", "sheets", "definedNames", "calcPr"]);
    }

    #[test]
    fn sheet_lookup_ignores_case() {
        let part = parse_workbook(WORKBOOK.as_bytes()).unwrap();
        assert_eq!(part.sheet("hidden").unwrap().sheet_id, 4);
        assert_eq!(part.sheet_index("DATA & MORE"), Some(0));
        assert_eq!(part.next_sheet_id(), 5);
    }
}
