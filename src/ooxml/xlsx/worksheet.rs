//! Worksheet model.
//!
//! Only the structures that carry cell references or that structural edits
//! and the stream writer need to understand are modelled: sheet data, merge
//! cells, auto-filter, hyperlinks and table parts. Every other top-level
//! element is preserved verbatim and written back in schema order.

use crate::common::error::Result;
use crate::common::xml::RawAttributes;
use crate::ooxml::xlsx::cell::{coordinates_to_cell_name, coordinates_to_range_ref};
use crate::ooxml::xlsx::grid::cell_slot;

/// Child elements of `<worksheet>` in the order the schema requires.
///
/// Shared by the full serializer and the stream writer so that both emit
/// the same ordering.
pub const WORKSHEET_ELEMENT_ORDER: &[&str] = &[
    "sheetPr",
    "dimension",
    "sheetViews",
    "sheetFormatPr",
    "cols",
    "sheetData",
    "sheetCalcPr",
    "sheetProtection",
    "protectedRanges",
    "scenarios",
    "autoFilter",
    "sortState",
    "dataConsolidate",
    "customSheetViews",
    "mergeCells",
    "phoneticPr",
    "conditionalFormatting",
    "dataValidations",
    "hyperlinks",
    "printOptions",
    "pageMargins",
    "pageSetup",
    "headerFooter",
    "rowBreaks",
    "colBreaks",
    "customProperties",
    "cellWatches",
    "ignoredErrors",
    "smartTags",
    "drawing",
    "legacyDrawing",
    "legacyDrawingHF",
    "drawingHF",
    "picture",
    "oleObjects",
    "controls",
    "webPublishItems",
    "tableParts",
    "extLst",
];

/// Position of an element in [`WORKSHEET_ELEMENT_ORDER`]; unknown elements
/// sort just before `extLst`.
pub fn element_rank(name: &str) -> usize {
    WORKSHEET_ELEMENT_ORDER
        .iter()
        .position(|known| *known == name)
        .unwrap_or(WORKSHEET_ELEMENT_ORDER.len() - 1)
}

/// Formula of a cell (`<f>`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellFormula {
    /// Formula text, unescaped
    pub text: String,
    /// `t` attribute: `shared`, `array`, `dataTable` or absent for normal
    pub kind: Option<String>,
    /// `ref` attribute: range covered by a shared or array formula
    pub reference: Option<String>,
    /// `si` attribute of shared formulas
    pub shared_index: Option<u32>,
    pub extra: RawAttributes,
}

/// A cell record (`<c>`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cell {
    /// Cell reference such as `B2`; may be empty in parsed input
    pub reference: String,
    /// Style index (`s`), 0 when absent
    pub style: u32,
    /// Type tag (`t`): `s`, `str`, `b`, `e`, `n`, `inlineStr`, `d`
    pub cell_type: Option<String>,
    /// Content of `<v>`, unescaped
    pub value: Option<String>,
    pub formula: Option<CellFormula>,
    /// Raw inner XML of `<is>`
    pub inline_string: Option<String>,
    pub extra: RawAttributes,
}

impl Cell {
    /// An empty placeholder cell.
    pub fn empty(reference: String) -> Self {
        Self {
            reference,
            ..Default::default()
        }
    }

    /// Whether the cell carries a value, formula, type tag or inline string.
    #[inline]
    pub fn has_value(&self) -> bool {
        self.value.is_some()
            || self.formula.is_some()
            || self.cell_type.is_some()
            || self.inline_string.is_some()
    }

    /// Whether the cell is a bare placeholder that need not be written.
    #[inline]
    pub fn is_blank(&self) -> bool {
        !self.has_value() && self.style == 0 && self.extra.is_empty()
    }

    /// Drop value, type and formula, keeping reference and style.
    pub fn clear_value(&mut self) {
        self.cell_type = None;
        self.value = None;
        self.formula = None;
        self.inline_string = None;
    }
}

/// A row record (`<row>`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    /// Row number (`r`), 0 when the row is numbered by position
    pub number: u32,
    pub cells: Vec<Cell>,
    pub height: Option<f64>,
    pub custom_height: bool,
    pub hidden: bool,
    pub style: Option<u32>,
    pub custom_format: bool,
    pub extra: RawAttributes,
}

impl Row {
    pub fn new(number: u32) -> Self {
        Self {
            number,
            ..Default::default()
        }
    }

    /// Whether any row-level attribute is set.
    pub fn has_attributes(&self) -> bool {
        self.height.is_some()
            || self.custom_height
            || self.hidden
            || self.style.is_some()
            || self.custom_format
            || !self.extra.is_empty()
    }

    /// Whether the row would be written at all.
    pub fn is_blank(&self) -> bool {
        !self.has_attributes() && self.cells.iter().all(Cell::is_blank)
    }
}

/// The worksheet auto-filter (`<autoFilter>`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AutoFilter {
    pub reference: String,
    pub extra: RawAttributes,
    /// Raw child elements (filter columns, sort state)
    pub inner: String,
}

/// A hyperlink (`<hyperlink>`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Hyperlink {
    /// Cell or range the link is anchored on
    pub reference: String,
    /// Relationship of an external link target
    pub r_id: Option<String>,
    pub extra: RawAttributes,
}

/// A top-level element kept verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct PreservedElement {
    /// Local element name
    pub name: String,
    /// Complete element markup
    pub xml: String,
}

/// An in-memory worksheet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Worksheet {
    /// Attributes of the `<worksheet>` root, namespace declarations included
    pub root_attributes: RawAttributes,
    pub rows: Vec<Row>,
    /// Merged ranges (`<mergeCell ref>`)
    pub merge_cells: Vec<String>,
    pub auto_filter: Option<AutoFilter>,
    pub hyperlinks: Vec<Hyperlink>,
    /// Relationship ids of `<tablePart>` entries
    pub table_parts: Vec<String>,
    /// Unmodelled elements in document order
    pub preserved: Vec<PreservedElement>,
}

impl Worksheet {
    /// Preserved elements with the given name.
    pub fn preserved(&self, name: &str) -> impl Iterator<Item = &PreservedElement> {
        self.preserved.iter().filter(move |e| e.name == name)
    }

    /// Copy of the sheet without sheet data and merged ranges, the parts a
    /// stream writer replaces.
    pub fn layout(&self) -> Worksheet {
        Worksheet {
            root_attributes: self.root_attributes.clone(),
            rows: Vec::new(),
            merge_cells: Vec::new(),
            auto_filter: self.auto_filter.clone(),
            hyperlinks: self.hyperlinks.clone(),
            table_parts: self.table_parts.clone(),
            preserved: self.preserved.clone(),
        }
    }

    /// Mutable access to the cell at `(col, row)`, growing the grid as
    /// needed. The grid must be normalized.
    #[inline]
    pub fn cell_mut(&mut self, col: u32, row: u32) -> Result<&mut Cell> {
        cell_slot(&mut self.rows, col, row)
    }

    /// The cell at `(col, row)` of a normalized grid, if present.
    pub fn cell(&self, col: u32, row: u32) -> Option<&Cell> {
        self.rows
            .get(row.checked_sub(1)? as usize)?
            .cells
            .get(col.checked_sub(1)? as usize)
    }

    /// Used range of the sheet in `A1:C3` form, `A1` for an empty sheet.
    ///
    /// Cells count when they hold a value or a style.
    pub fn dimension(&self) -> Result<String> {
        let mut bounds: Option<[u32; 4]> = None;
        for (row_idx, row) in self.rows.iter().enumerate() {
            let row_num = row_idx as u32 + 1;
            for (col_idx, cell) in row.cells.iter().enumerate() {
                if !cell.has_value() && cell.style == 0 {
                    continue;
                }
                let col_num = col_idx as u32 + 1;
                let b = bounds.get_or_insert([col_num, row_num, col_num, row_num]);
                b[0] = b[0].min(col_num);
                b[1] = b[1].min(row_num);
                b[2] = b[2].max(col_num);
                b[3] = b[3].max(row_num);
            }
        }

        match bounds {
            None => Ok("A1".to_string()),
            Some([c1, r1, c2, r2]) if c1 == c2 && r1 == r2 => coordinates_to_cell_name(c1, r1, false),
            Some(coordinates) => coordinates_to_range_ref(&coordinates),
        }
    }
}
