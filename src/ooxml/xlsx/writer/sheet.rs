//! Worksheet XML serialization.
//!
//! Elements are written in [`WORKSHEET_ELEMENT_ORDER`]: modelled
//! structures from their fields, everything else from the preserved
//! markup. The stream writer reuses [`write_element`] for the parts of the
//! sheet around its own sheet data.

use crate::common::error::Result;
use crate::common::xml::{RawAttributes, escape_xml};
use crate::ooxml::opc::constants::namespace;
use crate::ooxml::xlsx::worksheet::{
    Cell, CellFormula, Row, WORKSHEET_ELEMENT_ORDER, Worksheet, element_rank,
};
use std::fmt::Write as FmtWrite;

/// Serialize a worksheet to XML.
pub fn serialize_worksheet(ws: &Worksheet) -> Result<String> {
    let mut xml = String::with_capacity(4096 + ws.rows.len() * 128);
    write_worksheet_start(&mut xml, &ws.root_attributes)?;
    for name in WORKSHEET_ELEMENT_ORDER {
        write_element(&mut xml, ws, name)?;
    }
    xml.push_str("</worksheet>");
    Ok(xml)
}

/// Write the XML declaration and the `<worksheet>` start tag.
///
/// A worksheet without recorded root attributes gets the main and
/// relationship namespace declarations.
pub(crate) fn write_worksheet_start(xml: &mut String, root: &RawAttributes) -> Result<()> {
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push_str("<worksheet");
    if root.is_empty() {
        write!(
            xml,
            r#" xmlns="{}" xmlns:r="{}""#,
            namespace::SML_MAIN,
            namespace::OFC_RELATIONSHIPS
        )?;
    } else {
        write_raw_attributes(xml, root)?;
    }
    xml.push('>');
    Ok(())
}

/// Write one element of [`WORKSHEET_ELEMENT_ORDER`] from the worksheet.
///
/// Preserved elements whose name is not in the order list are written
/// together with `extLst`, ahead of it.
pub(crate) fn write_element(xml: &mut String, ws: &Worksheet, name: &str) -> Result<()> {
    match name {
        "dimension" => write!(xml, r#"<dimension ref="{}"/>"#, ws.dimension()?)?,
        "sheetData" => {
            xml.push_str("<sheetData>");
            for row in &ws.rows {
                write_row(xml, row)?;
            }
            xml.push_str("</sheetData>");
        },
        "autoFilter" => {
            if let Some(filter) = &ws.auto_filter {
                write!(xml, r#"<autoFilter ref="{}""#, escape_xml(&filter.reference))?;
                write_raw_attributes(xml, &filter.extra)?;
                if filter.inner.is_empty() {
                    xml.push_str("/>");
                } else {
                    write!(xml, ">{}</autoFilter>", filter.inner)?;
                }
            }
        },
        "mergeCells" => write_merge_cells(xml, &ws.merge_cells)?,
        "hyperlinks" => {
            if !ws.hyperlinks.is_empty() {
                xml.push_str("<hyperlinks>");
                for link in &ws.hyperlinks {
                    write!(xml, r#"<hyperlink ref="{}""#, escape_xml(&link.reference))?;
                    if let Some(r_id) = &link.r_id {
                        write!(xml, r#" r:id="{}""#, escape_xml(r_id))?;
                    }
                    write_raw_attributes(xml, &link.extra)?;
                    xml.push_str("/>");
                }
                xml.push_str("</hyperlinks>");
            }
        },
        "tableParts" => write_table_parts(xml, &ws.table_parts)?,
        _ => {
            if name == "extLst" {
                for element in ws
                    .preserved
                    .iter()
                    .filter(|e| e.name != "extLst" && element_rank(&e.name) == element_rank("extLst"))
                {
                    xml.push_str(&element.xml);
                }
            }
            for element in ws.preserved(name) {
                xml.push_str(&element.xml);
            }
        },
    }
    Ok(())
}

/// Write a `<mergeCells>` block; nothing for an empty list.
pub(crate) fn write_merge_cells(xml: &mut String, merges: &[String]) -> Result<()> {
    if merges.is_empty() {
        return Ok(());
    }
    write!(xml, r#"<mergeCells count="{}">"#, merges.len())?;
    for reference in merges {
        write!(xml, r#"<mergeCell ref="{}"/>"#, escape_xml(reference))?;
    }
    xml.push_str("</mergeCells>");
    Ok(())
}

/// Write a `<tableParts>` block; nothing for an empty list.
pub(crate) fn write_table_parts(xml: &mut String, r_ids: &[String]) -> Result<()> {
    if r_ids.is_empty() {
        return Ok(());
    }
    write!(xml, r#"<tableParts count="{}">"#, r_ids.len())?;
    for r_id in r_ids {
        write!(xml, r#"<tablePart r:id="{}"/>"#, escape_xml(r_id))?;
    }
    xml.push_str("</tableParts>");
    Ok(())
}

/// Write a row with its non-blank cells. Blank rows are skipped.
fn write_row(xml: &mut String, row: &Row) -> Result<()> {
    if row.is_blank() {
        return Ok(());
    }

    write!(xml, r#"<row r="{}""#, row.number)?;
    if let Some(style) = row.style {
        write!(xml, r#" s="{}""#, style)?;
    }
    if row.custom_format {
        xml.push_str(r#" customFormat="1""#);
    }
    if let Some(height) = row.height {
        write!(xml, r#" ht="{}""#, height)?;
    }
    if row.custom_height {
        xml.push_str(r#" customHeight="1""#);
    }
    if row.hidden {
        xml.push_str(r#" hidden="1""#);
    }
    write_raw_attributes(xml, &row.extra)?;

    let mut cells = row.cells.iter().filter(|cell| !cell.is_blank()).peekable();
    if cells.peek().is_none() {
        xml.push_str("/>");
        return Ok(());
    }
    xml.push('>');
    for cell in cells {
        write_cell(xml, cell)?;
    }
    xml.push_str("</row>");
    Ok(())
}

fn write_cell(xml: &mut String, cell: &Cell) -> Result<()> {
    write!(xml, r#"<c r="{}""#, escape_xml(&cell.reference))?;
    if cell.style != 0 {
        write!(xml, r#" s="{}""#, cell.style)?;
    }
    if let Some(cell_type) = &cell.cell_type {
        write!(xml, r#" t="{}""#, escape_xml(cell_type))?;
    }
    write_raw_attributes(xml, &cell.extra)?;

    if cell.formula.is_none() && cell.value.is_none() && cell.inline_string.is_none() {
        xml.push_str("/>");
        return Ok(());
    }
    xml.push('>');
    if let Some(formula) = &cell.formula {
        write_formula(xml, formula)?;
    }
    if let Some(value) = &cell.value {
        write!(xml, "<v>{}</v>", escape_xml(value))?;
    }
    if let Some(inline) = &cell.inline_string {
        write!(xml, "<is>{}</is>", inline)?;
    }
    xml.push_str("</c>");
    Ok(())
}

fn write_formula(xml: &mut String, formula: &CellFormula) -> Result<()> {
    xml.push_str("<f");
    if let Some(kind) = &formula.kind {
        write!(xml, r#" t="{}""#, escape_xml(kind))?;
    }
    if let Some(reference) = &formula.reference {
        write!(xml, r#" ref="{}""#, escape_xml(reference))?;
    }
    if let Some(si) = formula.shared_index {
        write!(xml, r#" si="{}""#, si)?;
    }
    write_raw_attributes(xml, &formula.extra)?;
    if formula.text.is_empty() {
        xml.push_str("/>");
    } else {
        write!(xml, ">{}</f>", escape_xml(&formula.text))?;
    }
    Ok(())
}

/// Write attributes whose values are still escaped.
pub(crate) fn write_raw_attributes(xml: &mut String, attributes: &RawAttributes) -> Result<()> {
    for (key, value) in attributes {
        write!(xml, r#" {}="{}""#, key, value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::xlsx::grid::normalize_worksheet;
    use crate::ooxml::xlsx::parsers::worksheet_parser::parse_worksheet;

    const SHEET: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><dimension ref="A1"/><sheetViews><sheetView workbookViewId="0"/></sheetViews><sheetData><row r="2" ht="20" customHeight="1"><c r="B2" t="s"><v>0</v></c></row><row r="1"><c r="A1"><f>A2&amp;"x"</f><v>1</v></c></row></sheetData><pageMargins left="0.7" right="0.7" top="0.75" bottom="0.75" header="0.3" footer="0.3"/><mergeCells count="1"><mergeCell ref="A3:B3"/></mergeCells></worksheet>"#;

    #[test]
    fn test_serialize_in_schema_order() {
        let mut ws = parse_worksheet(SHEET.as_bytes()).unwrap();
        normalize_worksheet(&mut ws).unwrap();
        let xml = serialize_worksheet(&ws).unwrap();

        assert!(xml.contains(r#"<dimension ref="A1:B2"/>"#));
        assert!(xml.contains(
            r#"<sheetData><row r="1"><c r="A1"><f>A2&amp;&quot;x&quot;</f><v>1</v></c></row><row r="2" ht="20" customHeight="1"><c r="B2" t="s"><v>0</v></c></row></sheetData>"#
        ));
        let merge = xml.find("<mergeCells").unwrap();
        let margins = xml.find("<pageMargins").unwrap();
        assert!(xml.find("<sheetViews").unwrap() < xml.find("<sheetData").unwrap());
        assert!(merge < margins);
        assert!(xml.ends_with("</worksheet>"));
    }

    #[test]
    fn serialized_sheet_parses_back_identically() {
        let mut ws = parse_worksheet(SHEET.as_bytes()).unwrap();
        normalize_worksheet(&mut ws).unwrap();
        let xml = serialize_worksheet(&ws).unwrap();

        let mut reparsed = parse_worksheet(xml.as_bytes()).unwrap();
        normalize_worksheet(&mut reparsed).unwrap();
        assert_eq!(reparsed.rows, ws.rows);
        assert_eq!(reparsed.merge_cells, ws.merge_cells);
        assert_eq!(reparsed.preserved, ws.preserved);
    }

    #[test]
    fn empty_worksheet_gets_default_namespaces() {
        let xml = serialize_worksheet(&Worksheet::default()).unwrap();
        assert!(xml.contains(r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main""#));
        assert!(xml.contains("<sheetData></sheetData>"));
        assert!(!xml.contains("<mergeCells"));
    }
}
