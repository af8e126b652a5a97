//! workbook.xml serialization.
//!
//! Children are written back in the order they were read; only
//! `<workbookPr>`, `<sheets>` and `<definedNames>` are regenerated from the
//! model.

use crate::common::error::Result;
use crate::common::xml::escape_xml;
use crate::ooxml::opc::constants::namespace;
use crate::ooxml::xlsx::book::{WorkbookChild, WorkbookPart};
use crate::ooxml::xlsx::writer::sheet::write_raw_attributes;
use std::fmt::Write as FmtWrite;

/// Generate workbook.xml content.
pub fn serialize_workbook(part: &WorkbookPart) -> Result<String> {
    let mut xml = String::with_capacity(2048);
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push_str("<workbook");
    if part.root_attributes.is_empty() {
        write!(
            xml,
            r#" xmlns="{}" xmlns:r="{}""#,
            namespace::SML_MAIN,
            namespace::OFC_RELATIONSHIPS
        )?;
    } else {
        write_raw_attributes(&mut xml, &part.root_attributes)?;
    }
    xml.push('>');

    for child in &part.children {
        match child {
            WorkbookChild::WorkbookPr => {
                let pr = &part.properties;
                xml.push_str("<workbookPr");
                if pr.date1904 {
                    xml.push_str(r#" date1904="1""#);
                }
                if pr.filter_privacy {
                    xml.push_str(r#" filterPrivacy="1""#);
                }
                if let Some(code_name) = &pr.code_name {
                    write!(xml, r#" codeName="{}""#, escape_xml(code_name))?;
                }
                write_raw_attributes(&mut xml, &pr.extra)?;
                xml.push_str("/>");
            },
            WorkbookChild::Sheets => {
                xml.push_str("<sheets>");
                for sheet in &part.sheets {
                    write!(
                        xml,
                        r#"<sheet name="{}" sheetId="{}""#,
                        escape_xml(&sheet.name),
                        sheet.sheet_id
                    )?;
                    write_raw_attributes(&mut xml, &sheet.extra)?;
                    write!(xml, r#" r:id="{}"/>"#, escape_xml(&sheet.r_id))?;
                }
                xml.push_str("</sheets>");
            },
            WorkbookChild::DefinedNames => {
                if part.defined_names.is_empty() {
                    continue;
                }
                xml.push_str("<definedNames>");
                for name in &part.defined_names {
                    write!(xml, r#"<definedName name="{}""#, escape_xml(&name.name))?;
                    if let Some(comment) = &name.comment {
                        write!(xml, r#" comment="{}""#, escape_xml(comment))?;
                    }
                    if let Some(sheet) = name.local_sheet_id {
                        write!(xml, r#" localSheetId="{}""#, sheet)?;
                    }
                    if name.hidden {
                        xml.push_str(r#" hidden="1""#);
                    }
                    write_raw_attributes(&mut xml, &name.extra)?;
                    write!(xml, ">{}</definedName>", escape_xml(&name.value))?;
                }
                xml.push_str("</definedNames>");
            },
            WorkbookChild::Raw(element) => xml.push_str(&element.xml),
        }
    }

    xml.push_str("</workbook>");
    Ok(xml)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::xlsx::book::{DefinedName, SheetEntry};
    use crate::ooxml::xlsx::parsers::workbook_parser::parse_workbook;

    #[test]
    fn test_workbook_pr_attributes() {
        let source = r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><workbookPr defaultThemeVersion="166925"/><sheets/></workbook>"#;
        let mut part = parse_workbook(source.as_bytes()).unwrap();
        part.properties.filter_privacy = true;
        part.properties.code_name = Some("Book<1>".into());

        let xml = serialize_workbook(&part).unwrap();
        assert!(xml.contains(
            r#"<workbookPr filterPrivacy="1" codeName="Book&lt;1&gt;" defaultThemeVersion="166925"/>"#
        ));
        let reparsed = parse_workbook(xml.as_bytes()).unwrap();
        assert_eq!(reparsed.properties, part.properties);
    }

    #[test]
    fn test_round_trip_keeps_unmodelled_children() {
        let source = r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><workbookPr date1904="1"/><bookViews><workbookView activeTab="0"/></bookViews><sheets><sheet name="A&amp;B" sheetId="1" r:id="rId1"/></sheets><calcPr calcId="191029"/></workbook>"#;
        let mut part = parse_workbook(source.as_bytes()).unwrap();
        part.sheets.push(SheetEntry {
            name: "Second".into(),
            sheet_id: 2,
            r_id: "rId9".into(),
            ..Default::default()
        });
        part.set_defined_name(DefinedName {
            name: "Total".into(),
            value: "'A&B'!$A$1".into(),
            ..Default::default()
        });

        let xml = serialize_workbook(&part).unwrap();
        assert!(xml.contains(r#"<workbookPr date1904="1"/><bookViews><workbookView activeTab="0"/></bookViews>"#));
        assert!(xml.contains(
            r#"<sheets><sheet name="A&amp;B" sheetId="1" r:id="rId1"/><sheet name="Second" sheetId="2" r:id="rId9"/></sheets><definedNames><definedName name="Total">&apos;A&amp;B&apos;!$A$1</definedName></definedNames><calcPr"#
        ));

        let reparsed = parse_workbook(xml.as_bytes()).unwrap();
        assert_eq!(reparsed.properties, part.properties);
        assert_eq!(reparsed.sheets, part.sheets);
        assert_eq!(reparsed.defined_names, part.defined_names);
    }
}
