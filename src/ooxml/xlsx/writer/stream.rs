//! Streaming worksheet writer.
//!
//! [`StreamWriter`] writes a worksheet row by row straight into XML, without
//! building a grid. Output goes to a [`SpillBuffer`], so arbitrarily large
//! sheets need a bounded amount of memory. Rows are written in call order
//! and their order is not checked; callers write them ascending.
//!
//! ```rust,no_run
//! use longan::{CellValue, RowOptions, Workbook};
//!
//! let workbook = Workbook::new()?;
//! let mut writer = workbook.new_stream_writer("Sheet1")?;
//! writer.set_column_width(1, 2, 18.0)?;
//! writer.set_row("A1", &["Name".into(), "Age".into()], RowOptions::default())?;
//! writer.set_row("A2", &["Ada".into(), 36.into()], RowOptions::default())?;
//! writer.add_table("A1", "B2", None)?;
//! writer.flush()?;
//! workbook.save("people.xlsx")?;
//! # Ok::<(), longan::Error>(())
//! ```

use crate::common::error::{Error, Result};
use crate::common::xml::{attr_string, attr_u32, escape_xml, unescape_xml};
use crate::ooxml::xlsx::cell::{
    MAX_COLUMNS, cell_name_to_coordinates, cell_refs_to_coordinates, coordinates_to_range_ref,
    format_cell_name, sort_coordinates,
};
use crate::ooxml::xlsx::table::{Table, TableOptions};
use crate::ooxml::xlsx::value::{
    CellValue, EncodedValue, RowOptions, encode_text, encode_value,
};
use crate::ooxml::xlsx::workbook::Workbook;
use crate::ooxml::xlsx::worksheet::{WORKSHEET_ELEMENT_ORDER, Worksheet};
use crate::ooxml::xlsx::writer::buffer::SpillBuffer;
use crate::ooxml::xlsx::writer::sheet::{
    write_element, write_merge_cells, write_table_parts, write_worksheet_start,
};
use quick_xml::Reader;
use quick_xml::events::Event;
use std::fmt::Write as FmtWrite;
use std::io::BufReader;

/// Widest column Excel accepts, in characters.
pub const MAX_COLUMN_WIDTH: f64 = 255.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    /// No row written yet; column widths may still be set.
    Created,
    /// `<sheetData>` is open.
    Writing,
    Flushed,
}

/// Append-only writer for one worksheet.
///
/// Created by [`Workbook::new_stream_writer`]. Until [`flush`](Self::flush)
/// the sheet is closed to grid access; after it the streamed XML is the
/// sheet's content. Dropping an unflushed writer leaves the sheet as it was.
#[derive(Debug)]
pub struct StreamWriter<'a> {
    workbook: &'a Workbook,
    sheet: String,
    part: String,
    /// Elements of the sheet around its sheet data.
    layout: Worksheet,
    date1904: bool,
    data: SpillBuffer,
    cols: String,
    merge_cells: Vec<String>,
    table_parts: Vec<String>,
    table_added: bool,
    state: StreamState,
}

impl<'a> StreamWriter<'a> {
    pub(crate) fn new(
        workbook: &'a Workbook,
        sheet: String,
        part: String,
        layout: Worksheet,
        date1904: bool,
    ) -> Result<Self> {
        let mut head = String::with_capacity(1024);
        write_worksheet_start(&mut head, &layout.root_attributes)?;
        for name in ["sheetPr", "sheetViews", "sheetFormatPr"] {
            write_element(&mut head, &layout, name)?;
        }
        let mut data = SpillBuffer::new();
        data.push_str(&head);

        Ok(Self {
            workbook,
            sheet,
            part,
            table_parts: layout.table_parts.clone(),
            layout,
            date1904,
            data,
            cols: String::new(),
            merge_cells: Vec::new(),
            table_added: false,
            state: StreamState::Created,
        })
    }

    /// Name of the sheet being written.
    pub fn sheet(&self) -> &str {
        &self.sheet
    }

    fn check_open(&self) -> Result<()> {
        if self.state == StreamState::Flushed {
            return Err(Error::StreamWriterFlushed);
        }
        Ok(())
    }

    fn open_sheet_data(&mut self) {
        if self.state != StreamState::Created {
            return;
        }
        if !self.cols.is_empty() {
            self.data.push_str("<cols>");
            self.data.push_str(&self.cols);
            self.data.push_str("</cols>");
        }
        self.data.push_str("<sheetData>");
        self.state = StreamState::Writing;
    }

    /// Set the width of columns `min..=max`. Only allowed before the first
    /// row is written.
    pub fn set_column_width(&mut self, min: u32, max: u32, width: f64) -> Result<()> {
        self.check_open()?;
        if self.state != StreamState::Created {
            return Err(Error::ColumnWidthAfterRowsWritten);
        }
        let columns = 1..=MAX_COLUMNS;
        if !columns.contains(&min) || !columns.contains(&max) {
            return Err(Error::ColumnOutOfRange);
        }
        if width > MAX_COLUMN_WIDTH {
            return Err(Error::ColumnWidthTooLarge);
        }
        let (min, max) = if min > max { (max, min) } else { (min, max) };
        write!(
            self.cols,
            r#"<col min="{min}" max="{max}" width="{width:.6}" customWidth="1"/>"#
        )?;
        Ok(())
    }

    /// Write `values` as row cells starting at `cell`.
    ///
    /// [`CellValue::Nil`] entries leave their position empty. A
    /// [`CellValue::Styled`] entry replaces the row style for its cell. On
    /// error nothing of the row is written.
    pub fn set_row(&mut self, cell: &str, values: &[CellValue], options: RowOptions) -> Result<()> {
        self.check_open()?;
        let (col, row) = cell_name_to_coordinates(cell)?;
        let attributes = options.attributes()?;

        let mut xml = String::with_capacity(32 + values.len() * 32);
        write!(xml, r#"<row r="{row}"{attributes}>"#)?;
        for (offset, value) in values.iter().enumerate() {
            if value.is_nil() {
                continue;
            }
            let col = col as u64 + offset as u64;
            if col > MAX_COLUMNS as u64 {
                return Err(Error::ColumnOutOfRange);
            }
            let reference = format_cell_name(col as u32, row, false, false);
            self.write_cell(&mut xml, &reference, value, options.style)?;
        }
        xml.push_str("</row>");

        self.open_sheet_data();
        self.data.push_str(&xml);
        self.data.sync()
    }

    fn write_cell(
        &self,
        xml: &mut String,
        reference: &str,
        value: &CellValue,
        row_style: u32,
    ) -> Result<()> {
        let mut style = row_style;
        let mut formula = None;
        let mut value = value;
        while let CellValue::Styled(cell) = value {
            style = cell.style;
            formula = cell.formula.as_deref().filter(|f| !f.is_empty());
            value = &cell.value;
        }

        let encoded = match value {
            CellValue::Nil => encode_text(""),
            CellValue::RichText(runs) => EncodedValue {
                cell_type: Some("s"),
                value: self.workbook.append_rich_text(runs)?.to_string(),
                ..Default::default()
            },
            other => encode_value(other, self.date1904).unwrap_or_default(),
        };
        if encoded.is_date && style == 0 {
            style = self.workbook.register_date_style()?;
        }

        xml.push_str("<c");
        if encoded.preserve_space {
            xml.push_str(r#" xml:space="preserve""#);
        }
        write!(xml, r#" r="{reference}""#)?;
        if style != 0 {
            write!(xml, r#" s="{style}""#)?;
        }
        if let Some(cell_type) = encoded.cell_type {
            write!(xml, r#" t="{cell_type}""#)?;
        }
        xml.push('>');
        if let Some(formula) = formula {
            write!(xml, "<f>{}</f>", escape_xml(formula))?;
        }
        if !encoded.value.is_empty() {
            write!(xml, "<v>{}</v>", escape_xml(&encoded.value))?;
        }
        xml.push_str("</c>");
        Ok(())
    }

    /// Merge the range between two corner cells.
    pub fn merge_cell(&mut self, top_left: &str, bottom_right: &str) -> Result<()> {
        self.check_open()?;
        cell_refs_to_coordinates(top_left, bottom_right)?;
        self.merge_cells.push(format!("{top_left}:{bottom_right}"));
        Ok(())
    }

    /// Add a table over a range whose first row has been written.
    ///
    /// Column names are read back from the written header row. A range of
    /// a single row is extended by one, since a table needs a data row.
    /// Only one table can be added per writer.
    pub fn add_table(
        &mut self,
        top_left: &str,
        bottom_right: &str,
        options: Option<&TableOptions>,
    ) -> Result<()> {
        self.check_open()?;
        if self.state != StreamState::Writing {
            return Err(Error::TableBeforeRows);
        }
        if self.table_added {
            return Err(Error::TableAlreadyAdded);
        }
        let options = options.cloned().unwrap_or_default();
        options.validate()?;

        let mut coordinates = cell_refs_to_coordinates(top_left, bottom_right)?;
        sort_coordinates(&mut coordinates);
        if coordinates[1] == coordinates[3] {
            coordinates[3] += 1;
        }
        let reference = coordinates_to_range_ref(&coordinates)?;
        let headers = self.header_values(coordinates[1], coordinates[0], coordinates[2])?;

        let r_id = self.workbook.add_table_part(&self.part, |id| {
            Table::new(id, reference, &headers, &options)
        })?;
        self.table_parts.push(r_id);
        self.table_added = true;
        Ok(())
    }

    /// Values of columns `first..=last` of the first written row numbered
    /// `row`, read back from the output.
    fn header_values(&self, row: u32, first: u32, last: u32) -> Result<Vec<String>> {
        let mut headers = vec![String::new(); (last - first + 1) as usize];
        let mut reader = Reader::from_reader(BufReader::new(self.data.reader()?));
        let mut buf = Vec::new();
        let mut in_row = false;
        // Column of the current cell and whether it holds a shared string.
        let mut cell: Option<(u32, bool)> = None;
        let mut text: Option<String> = None;

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) if e.local_name().as_ref() == b"row" => {
                    in_row = attr_u32(&e, b"r")? == Some(row);
                },
                Event::End(e) if in_row && e.local_name().as_ref() == b"row" => break,
                Event::Start(e) if in_row && e.local_name().as_ref() == b"c" => {
                    let reference = attr_string(&e, b"r")?.unwrap_or_default();
                    let (col, _) = cell_name_to_coordinates(&reference)?;
                    let shared = attr_string(&e, b"t")?.as_deref() == Some("s");
                    cell = Some((col, shared));
                },
                Event::Start(e) if cell.is_some() && e.local_name().as_ref() == b"v" => {
                    text = Some(String::new());
                },
                Event::Text(t) => {
                    if let Some(text) = text.as_mut() {
                        text.push_str(std::str::from_utf8(&t)?);
                    }
                },
                Event::GeneralRef(entity) => {
                    if let Some(text) = text.as_mut() {
                        text.push('&');
                        text.push_str(std::str::from_utf8(&entity)?);
                        text.push(';');
                    }
                },
                Event::End(e) if e.local_name().as_ref() == b"v" => {
                    let (Some((col, shared)), Some(raw)) = (cell, text.take()) else {
                        continue;
                    };
                    if (first..=last).contains(&col) {
                        let value = unescape_xml(&raw);
                        headers[(col - first) as usize] = if shared {
                            self.shared_text(&value)
                        } else {
                            value
                        };
                    }
                },
                Event::End(e) if e.local_name().as_ref() == b"c" => cell = None,
                Event::Eof => break,
                _ => {},
            }
            buf.clear();
        }
        Ok(headers)
    }

    fn shared_text(&self, index: &str) -> String {
        atoi_simd::parse_pos::<usize, false>(index.as_bytes())
            .ok()
            .and_then(|index| self.workbook.shared_string(index))
            .unwrap_or_else(|| index.to_string())
    }

    /// Close the sheet and hand the streamed XML to the workbook.
    pub fn flush(&mut self) -> Result<()> {
        self.check_open()?;
        self.open_sheet_data();

        let mut tail = String::from("</sheetData>");
        let after_sheet_data = WORKSHEET_ELEMENT_ORDER
            .iter()
            .skip_while(|name| **name != "sheetData")
            .skip(1);
        for name in after_sheet_data {
            match *name {
                "mergeCells" => write_merge_cells(&mut tail, &self.merge_cells)?,
                "tableParts" => write_table_parts(&mut tail, &self.table_parts)?,
                other => write_element(&mut tail, &self.layout, other)?,
            }
        }
        tail.push_str("</worksheet>");
        self.data.push_str(&tail);

        self.state = StreamState::Flushed;
        let data = match std::mem::take(&mut self.data).into_part_data() {
            Ok(data) => data,
            Err(err) => {
                self.workbook.abandon_stream(&self.part);
                return Err(err);
            },
        };
        log::debug!("stream writer flushed sheet {}", self.sheet);
        self.workbook.finish_stream(&self.part, data);
        Ok(())
    }
}

impl Drop for StreamWriter<'_> {
    fn drop(&mut self) {
        if self.state != StreamState::Flushed {
            self.workbook.abandon_stream(&self.part);
        }
    }
}
