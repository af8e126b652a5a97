//! Table XML serialization for XLSX.

use crate::common::error::Result;
use crate::common::xml::escape_xml;
use crate::ooxml::opc::constants::namespace;
use crate::ooxml::xlsx::table::{Table, TableStyleInfo};
use std::fmt::Write as FmtWrite;

/// Serialize a table to XML.
pub fn serialize_table(table: &Table) -> Result<String> {
    let mut xml = String::with_capacity(512 + table.columns.len() * 48);

    write!(
        xml,
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><table xmlns="{}" id="{}" name="{}" displayName="{}" ref="{}">"#,
        namespace::SML_MAIN,
        table.id,
        escape_xml(&table.name),
        escape_xml(&table.display_name),
        escape_xml(&table.reference)
    )?;

    write!(xml, r#"<autoFilter ref="{}"/>"#, escape_xml(&table.reference))?;

    write!(xml, r#"<tableColumns count="{}">"#, table.columns.len())?;
    for column in &table.columns {
        write!(
            xml,
            r#"<tableColumn id="{}" name="{}"/>"#,
            column.id,
            escape_xml(&column.name)
        )?;
    }
    xml.push_str("</tableColumns>");

    if let Some(style_info) = &table.style_info {
        serialize_table_style_info(&mut xml, style_info)?;
    }

    xml.push_str("</table>");
    Ok(xml)
}

fn serialize_table_style_info(xml: &mut String, style_info: &TableStyleInfo) -> Result<()> {
    let flag = |v: bool| if v { 1 } else { 0 };
    write!(
        xml,
        r#"<tableStyleInfo name="{}" showFirstColumn="{}" showLastColumn="{}" showRowStripes="{}" showColumnStripes="{}"/>"#,
        escape_xml(&style_info.name),
        flag(style_info.show_first_column),
        flag(style_info.show_last_column),
        flag(style_info.show_row_stripes),
        flag(style_info.show_column_stripes)
    )?;
    Ok(())
}
