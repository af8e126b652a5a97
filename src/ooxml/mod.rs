//! Office Open XML (OOXML) support.
//!
//! 1. **OPC Layer** (`opc`): ZIP container, parts, relationships and
//!    content types
//! 2. **Spreadsheet Layer** (`xlsx`): workbook and worksheet parts

pub mod opc;
pub mod xlsx;

pub use opc::OpcPackage;
