//! Longan - read, edit and stream-write Excel (.xlsx) workbooks
//!
//! # Features
//!
//! - **Coordinate codec**: convert between `A1`-style references and
//!   numeric coordinates
//! - **Grid normalization**: sparse, out-of-order sheet data becomes a dense
//!   grid on first access
//! - **Structural edits**: insert and delete rows and columns, rewriting
//!   formulas, merged ranges, auto-filters, hyperlinks, defined names and
//!   the calculation chain
//! - **Streaming writer**: write very large sheets row by row with bounded
//!   memory
//!
//! # Example - Editing a workbook
//!
//! ```no_run
//! use longan::Workbook;
//!
//! # fn main() -> longan::Result<()> {
//! let workbook = Workbook::open("book.xlsx")?;
//! workbook.insert_row("Sheet1", 3)?;
//! workbook.set_cell_value("Sheet1", "A3", "new row")?;
//! workbook.save("book.xlsx")?;
//! # Ok(())
//! # }
//! ```
//!
//! # Example - Streaming rows
//!
//! ```no_run
//! use longan::{CellValue, RowOptions, Workbook};
//!
//! # fn main() -> longan::Result<()> {
//! let workbook = Workbook::new()?;
//! let mut writer = workbook.new_stream_writer("Sheet1")?;
//! for row in 1..=100_000u32 {
//!     let cell = longan::coordinates_to_cell_name(1, row, false)?;
//!     writer.set_row(&cell, &[CellValue::from(row), CellValue::from("item")], RowOptions::default())?;
//! }
//! writer.flush()?;
//! workbook.save("large.xlsx")?;
//! # Ok(())
//! # }
//! ```

pub mod common;

/// OOXML (Office Open XML) packages and spreadsheets
pub mod ooxml;

pub use common::{Error, Result};
pub use ooxml::xlsx::cell::{
    cell_name_to_coordinates, column_name_to_number, column_number_to_name,
    coordinates_to_cell_name, join_cell_name, split_cell_name,
};
pub use ooxml::xlsx::{
    CellValue, DefinedName, Options, RichTextFont, RichTextRun, RowOptions, StreamWriter,
    TableOptions, Workbook, WorkbookPrOptions,
};
