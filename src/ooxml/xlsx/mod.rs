//! Excel (.xlsx) spreadsheet support.
//!
//! The layers, bottom-up:
//!
//! - `cell`: conversion between `A1` references and numeric coordinates
//! - `worksheet`, `grid`: the worksheet model and its dense, normalized grid
//! - `adjust`: reference rewriting for row and column insertion and deletion
//! - `writer`: part serializers and the streaming row writer
//! - `workbook`: the [`Workbook`] document tying the parts together
//!
//! # Example
//!
//! ```rust,no_run
//! use longan::ooxml::xlsx::Workbook;
//!
//! let workbook = Workbook::open("book.xlsx")?;
//! workbook.remove_col("Sheet1", "C")?;
//! for row in workbook.get_rows("Sheet1")? {
//!     println!("{}", row.join("\t"));
//! }
//! # Ok::<(), longan::Error>(())
//! ```

pub mod adjust;
pub mod book;
pub mod cache;
pub mod calc_chain;
pub mod cell;
pub mod date;
pub mod grid;
pub mod options;
pub mod parsers;
pub mod shared_strings;
pub mod styles;
pub mod table;
pub mod template;
pub mod value;
pub mod workbook;
pub mod worksheet;
pub mod writer;

pub use book::{DefinedName, WorkbookPrOptions};
pub use options::Options;
pub use table::TableOptions;
pub use value::{CellValue, RichTextFont, RichTextRun, RowOptions};
pub use workbook::Workbook;
pub use worksheet::Worksheet;
pub use writer::StreamWriter;
