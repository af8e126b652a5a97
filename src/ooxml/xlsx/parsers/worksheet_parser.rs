//! Parser for Excel worksheet XML files.
//!
//! This module parses individual worksheet XML files (sheet1.xml,
//! sheet2.xml, etc.) into a [`Worksheet`]. Rows come back exactly as
//! declared: unsorted, sparse, duplicated or numbered 0. Turning them into
//! a dense grid is the job of [`grid`](crate::ooxml::xlsx::grid).
//!
//! Performance optimizations:
//! - Borrowing quick-xml reader over the part bytes
//! - Uses atoi_simd for fast integer parsing
//! - Uses fast_float2 for fast float parsing
//! - Unmodelled elements are sliced out of the input, not re-serialized

use crate::common::error::{Error, Result};
use crate::common::xml::{attr_string, attr_u32, parse_bool, raw_attributes};
use crate::ooxml::xlsx::parsers::{read_inner, read_text, unexpected_eof};
use crate::ooxml::xlsx::worksheet::{
    AutoFilter, Cell, CellFormula, Hyperlink, PreservedElement, Row, Worksheet,
};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

// Performance: Pre-allocate typical capacities to reduce reallocations
const INITIAL_ROW_CAPACITY: usize = 256;
const INITIAL_COL_CAPACITY: usize = 16;

const ROW_ATTRIBUTES: &[&[u8]] = &[
    b"r",
    b"spans",
    b"ht",
    b"customHeight",
    b"hidden",
    b"s",
    b"customFormat",
];
const CELL_ATTRIBUTES: &[&[u8]] = &[b"r", b"s", b"t"];
const FORMULA_ATTRIBUTES: &[&[u8]] = &[b"t", b"ref", b"si"];

/// Parse worksheet XML into an unnormalized worksheet.
pub fn parse_worksheet(xml: &[u8]) -> Result<Worksheet> {
    let mut reader = Reader::from_reader(xml);
    let mut ws = Worksheet::default();

    loop {
        let start = reader.buffer_position() as usize;
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"worksheet" => {
                ws.root_attributes = raw_attributes(&e, &[])?;
            },
            Event::Start(e) => match e.local_name().as_ref() {
                b"sheetData" => parse_sheet_data(&mut reader, xml, &mut ws.rows)?,
                b"mergeCells" => parse_merge_cells(&mut reader, &mut ws.merge_cells)?,
                b"hyperlinks" => parse_hyperlinks(&mut reader, &mut ws.hyperlinks)?,
                b"tableParts" => parse_table_parts(&mut reader, &mut ws.table_parts)?,
                b"autoFilter" => {
                    let mut filter = parse_auto_filter(&e)?;
                    filter.inner = read_inner(&mut reader, xml, e.name())?;
                    ws.auto_filter = Some(filter);
                },
                b"dimension" => {
                    reader.read_to_end(e.name())?;
                },
                _ => {
                    reader.read_to_end(e.name())?;
                    let end = reader.buffer_position() as usize;
                    ws.preserved.push(preserve(&e, &xml[start..end])?);
                },
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"sheetData" | b"mergeCells" | b"hyperlinks" | b"tableParts" | b"dimension" => {},
                b"autoFilter" => ws.auto_filter = Some(parse_auto_filter(&e)?),
                _ => {
                    let end = reader.buffer_position() as usize;
                    ws.preserved.push(preserve(&e, &xml[start..end])?);
                },
            },
            Event::Eof => break,
            _ => {},
        }
    }

    Ok(ws)
}

fn preserve(e: &BytesStart<'_>, markup: &[u8]) -> Result<PreservedElement> {
    Ok(PreservedElement {
        name: std::str::from_utf8(e.local_name().as_ref())?.to_string(),
        xml: std::str::from_utf8(markup)?.trim().to_string(),
    })
}

fn parse_sheet_data<'a>(
    reader: &mut Reader<&'a [u8]>,
    xml: &'a [u8],
    rows: &mut Vec<Row>,
) -> Result<()> {
    rows.reserve(INITIAL_ROW_CAPACITY);
    loop {
        match reader.read_event()? {
            Event::Start(e) if e.local_name().as_ref() == b"row" => {
                let mut row = parse_row_attributes(&e)?;
                parse_row_cells(reader, xml, &mut row)?;
                rows.push(row);
            },
            Event::Empty(e) if e.local_name().as_ref() == b"row" => {
                rows.push(parse_row_attributes(&e)?);
            },
            Event::End(e) if e.local_name().as_ref() == b"sheetData" => return Ok(()),
            Event::Eof => return Err(unexpected_eof(b"sheetData")),
            _ => {},
        }
    }
}

fn parse_row_attributes(e: &BytesStart<'_>) -> Result<Row> {
    let mut row = Row::new(attr_u32(e, b"r")?.unwrap_or(0));
    row.height = attr_string(e, b"ht")?.and_then(|h| fast_float2::parse::<f64, _>(h.trim()).ok());
    row.custom_height = attr_string(e, b"customHeight")?.is_some_and(|v| parse_bool(&v));
    row.hidden = attr_string(e, b"hidden")?.is_some_and(|v| parse_bool(&v));
    row.style = attr_u32(e, b"s")?;
    row.custom_format = attr_string(e, b"customFormat")?.is_some_and(|v| parse_bool(&v));
    row.extra = raw_attributes(e, ROW_ATTRIBUTES)?;
    Ok(row)
}

fn parse_row_cells<'a>(
    reader: &mut Reader<&'a [u8]>,
    xml: &'a [u8],
    row: &mut Row,
) -> Result<()> {
    row.cells.reserve(INITIAL_COL_CAPACITY);
    loop {
        match reader.read_event()? {
            Event::Start(e) if e.local_name().as_ref() == b"c" => {
                let mut cell = parse_cell_attributes(&e)?;
                parse_cell_content(reader, xml, &mut cell)?;
                row.cells.push(cell);
            },
            Event::Empty(e) if e.local_name().as_ref() == b"c" => {
                row.cells.push(parse_cell_attributes(&e)?);
            },
            Event::Start(e) => {
                // Row-level extensions are not modelled.
                reader.read_to_end(e.name())?;
            },
            Event::End(e) if e.local_name().as_ref() == b"row" => return Ok(()),
            Event::Eof => return Err(unexpected_eof(b"row")),
            _ => {},
        }
    }
}

fn parse_cell_attributes(e: &BytesStart<'_>) -> Result<Cell> {
    Ok(Cell {
        reference: attr_string(e, b"r")?.unwrap_or_default(),
        style: attr_u32(e, b"s")?.unwrap_or(0),
        cell_type: attr_string(e, b"t")?,
        extra: raw_attributes(e, CELL_ATTRIBUTES)?,
        ..Default::default()
    })
}

fn parse_cell_content<'a>(
    reader: &mut Reader<&'a [u8]>,
    xml: &'a [u8],
    cell: &mut Cell,
) -> Result<()> {
    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"v" => cell.value = Some(read_text(reader, b"v")?),
                b"f" => {
                    let mut formula = parse_formula_attributes(&e)?;
                    formula.text = read_text(reader, b"f")?;
                    cell.formula = Some(formula);
                },
                b"is" => cell.inline_string = Some(read_inner(reader, xml, e.name())?),
                _ => {
                    reader.read_to_end(e.name())?;
                },
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"v" => cell.value = Some(String::new()),
                b"f" => cell.formula = Some(parse_formula_attributes(&e)?),
                b"is" => cell.inline_string = Some(String::new()),
                _ => {},
            },
            Event::End(e) if e.local_name().as_ref() == b"c" => return Ok(()),
            Event::Eof => return Err(unexpected_eof(b"c")),
            _ => {},
        }
    }
}

fn parse_formula_attributes(e: &BytesStart<'_>) -> Result<CellFormula> {
    Ok(CellFormula {
        kind: attr_string(e, b"t")?,
        reference: attr_string(e, b"ref")?,
        shared_index: attr_u32(e, b"si")?,
        extra: raw_attributes(e, FORMULA_ATTRIBUTES)?,
        ..Default::default()
    })
}

fn parse_merge_cells(reader: &mut Reader<&[u8]>, merges: &mut Vec<String>) -> Result<()> {
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"mergeCell" => {
                if let Some(reference) = attr_string(&e, b"ref")? {
                    merges.push(reference);
                }
            },
            Event::End(e) if e.local_name().as_ref() == b"mergeCells" => return Ok(()),
            Event::Eof => return Err(unexpected_eof(b"mergeCells")),
            _ => {},
        }
    }
}

fn parse_hyperlinks(reader: &mut Reader<&[u8]>, links: &mut Vec<Hyperlink>) -> Result<()> {
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"hyperlink" => {
                links.push(Hyperlink {
                    reference: attr_string(&e, b"ref")?.unwrap_or_default(),
                    r_id: attr_string(&e, b"r:id")?,
                    extra: raw_attributes(&e, &[b"ref", b"r:id"])?,
                });
            },
            Event::End(e) if e.local_name().as_ref() == b"hyperlinks" => return Ok(()),
            Event::Eof => return Err(unexpected_eof(b"hyperlinks")),
            _ => {},
        }
    }
}

fn parse_table_parts(reader: &mut Reader<&[u8]>, parts: &mut Vec<String>) -> Result<()> {
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"tablePart" => {
                let r_id = attr_string(&e, b"r:id")?
                    .ok_or_else(|| Error::XmlError("tablePart without r:id".to_string()))?;
                parts.push(r_id);
            },
            Event::End(e) if e.local_name().as_ref() == b"tableParts" => return Ok(()),
            Event::Eof => return Err(unexpected_eof(b"tableParts")),
            _ => {},
        }
    }
}

fn parse_auto_filter(e: &BytesStart<'_>) -> Result<AutoFilter> {
    Ok(AutoFilter {
        reference: attr_string(e, b"ref")?.unwrap_or_default(),
        extra: raw_attributes(e, &[b"ref"])?,
        inner: String::new(),
    })
}
