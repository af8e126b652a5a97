//! Structural edits: inserting or deleting one row or column.
//!
//! An edit moves every reference-bearing structure of the sheet together
//! with its cells: merged ranges, the auto-filter, hyperlinks, formula text
//! and shared/array formula ranges, plus the workbook-level calculation
//! chain and defined names.
//!
//! Each step first computes its result into a staged value without touching
//! the worksheet. [`WorksheetPlan::commit`] runs only after every stage
//! succeeded, and nothing in it can fail, so a malformed reference anywhere
//! leaves the whole document as it was.

pub mod formula;

use crate::common::error::{Error, Result};
use crate::ooxml::xlsx::book::{DefinedName, FILTER_DATABASE};
use crate::ooxml::xlsx::calc_chain::CalcChain;
use crate::ooxml::xlsx::cell::{
    MAX_COLUMNS, TOTAL_ROWS, cell_name_to_coordinates, coordinates_to_cell_name,
    coordinates_to_range_ref, format_cell_name, range_ref_to_coordinates, sort_coordinates,
};
use crate::ooxml::xlsx::worksheet::{AutoFilter, Cell, CellFormula, Hyperlink, Row, Worksheet};
use log::{debug, warn};

pub use formula::adjust_formula;

/// The axis an edit runs along.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Rows,
    Columns,
}

impl Axis {
    pub(crate) fn limit(self) -> u32 {
        match self {
            Axis::Rows => TOTAL_ROWS,
            Axis::Columns => MAX_COLUMNS,
        }
    }

    pub(crate) fn out_of_range(self) -> Error {
        match self {
            Axis::Rows => Error::RowOutOfRange,
            Axis::Columns => Error::ColumnOutOfRange,
        }
    }
}

/// One structural edit: insert (`delta == 1`) or delete (`delta == -1`)
/// the line at `position`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edit {
    pub axis: Axis,
    pub position: u32,
    pub delta: i8,
}

impl Edit {
    pub fn insert(axis: Axis, position: u32) -> Self {
        Self {
            axis,
            position,
            delta: 1,
        }
    }

    pub fn delete(axis: Axis, position: u32) -> Self {
        Self {
            axis,
            position,
            delta: -1,
        }
    }

    #[inline]
    pub fn is_insert(&self) -> bool {
        self.delta > 0
    }
}

/// Shift one coordinate. `None` means the line holding it was deleted.
pub(crate) fn shift_point(edit: &Edit, value: u32) -> Result<Option<u32>> {
    if edit.is_insert() {
        if value < edit.position {
            return Ok(Some(value));
        }
        if value >= edit.axis.limit() {
            return Err(edit.axis.out_of_range());
        }
        Ok(Some(value + 1))
    } else if value == edit.position {
        Ok(None)
    } else if value > edit.position {
        Ok(Some(value - 1))
    } else {
        Ok(Some(value))
    }
}

/// Shift a sorted span `p1..=p2` on the edit's axis. `None` means the span
/// was exactly the deleted line.
pub(crate) fn shift_span(edit: &Edit, p1: u32, p2: u32) -> Result<Option<(u32, u32)>> {
    let pos = edit.position;
    if edit.is_insert() {
        if pos <= p1 {
            if p2 >= edit.axis.limit() {
                return Err(edit.axis.out_of_range());
            }
            Ok(Some((p1 + 1, p2 + 1)))
        } else if pos <= p2 {
            if p2 >= edit.axis.limit() {
                return Err(edit.axis.out_of_range());
            }
            Ok(Some((p1, p2 + 1)))
        } else {
            Ok(Some((p1, p2)))
        }
    } else if p1 == pos && p2 == pos {
        Ok(None)
    } else if pos < p1 {
        Ok(Some((p1 - 1, p2 - 1)))
    } else if pos <= p2 {
        Ok(Some((p1, p2 - 1)))
    } else {
        Ok(Some((p1, p2)))
    }
}

/// Index pair of the edit's axis within `[c1, r1, c2, r2]`.
fn axis_slots(axis: Axis) -> (usize, usize) {
    match axis {
        Axis::Columns => (0, 2),
        Axis::Rows => (1, 3),
    }
}

/// Shift a range given as sorted coordinates. `None` means it vanished.
fn shift_area(edit: &Edit, mut coordinates: [u32; 4]) -> Result<Option<[u32; 4]>> {
    let (a, b) = axis_slots(edit.axis);
    match shift_span(edit, coordinates[a], coordinates[b])? {
        Some((p1, p2)) => {
            coordinates[a] = p1;
            coordinates[b] = p2;
            Ok(Some(coordinates))
        },
        None => Ok(None),
    }
}

/// Parse a single cell or `A1:B2` range into sorted coordinates.
fn area_coordinates(reference: &str) -> Result<[u32; 4]> {
    let mut coordinates = if reference.contains(':') {
        range_ref_to_coordinates(reference)?
    } else {
        let (col, row) = cell_name_to_coordinates(reference)?;
        [col, row, col, row]
    };
    sort_coordinates(&mut coordinates);
    Ok(coordinates)
}

/// Write sorted coordinates back in the shape the input had.
fn area_reference(coordinates: &[u32; 4], was_range: bool) -> Result<String> {
    if was_range {
        coordinates_to_range_ref(coordinates)
    } else {
        coordinates_to_cell_name(coordinates[0], coordinates[1], false)
    }
}

/// Adjust merged ranges.
///
/// A merge spanning exactly the deleted line disappears, and so does one
/// that collapses to a single cell.
pub fn adjust_merge_cells(merges: &[String], edit: &Edit) -> Result<Vec<String>> {
    let mut adjusted = Vec::with_capacity(merges.len());
    for reference in merges {
        let coordinates = area_coordinates(reference)?;
        let Some(shifted) = shift_area(edit, coordinates)? else {
            continue;
        };
        if shifted[0] == shifted[2] && shifted[1] == shifted[3] {
            continue;
        }
        adjusted.push(coordinates_to_range_ref(&shifted)?);
    }
    if adjusted.len() != merges.len() {
        debug!("dropped {} merged range(s)", merges.len() - adjusted.len());
    }
    Ok(adjusted)
}

/// Staged auto-filter outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterChange {
    pub filter: Option<AutoFilter>,
    /// Rows to unhide, inclusive, in pre-edit numbering.
    pub unhide: Option<(u32, u32)>,
}

/// Adjust the auto-filter.
///
/// Deleting the header row, or the only column of a single-column filter,
/// removes the filter and unhides the rows it covered.
pub fn adjust_auto_filter(filter: Option<&AutoFilter>, edit: &Edit) -> Result<FilterChange> {
    let Some(filter) = filter else {
        return Ok(FilterChange {
            filter: None,
            unhide: None,
        });
    };
    let coordinates = area_coordinates(&filter.reference)?;
    let [x1, y1, x2, y2] = coordinates;

    let removed = !edit.is_insert()
        && match edit.axis {
            Axis::Rows => y1 == edit.position,
            Axis::Columns => x1 == edit.position && x2 == edit.position,
        };
    if removed {
        return Ok(FilterChange {
            filter: None,
            unhide: (y2 > y1).then_some((y1 + 1, y2)),
        });
    }

    let filter = match shift_area(edit, coordinates)? {
        Some(shifted) => Some(AutoFilter {
            reference: coordinates_to_range_ref(&shifted)?,
            ..filter.clone()
        }),
        None => None,
    };
    Ok(FilterChange {
        filter,
        unhide: None,
    })
}

/// Adjust hyperlinks; links on the deleted line disappear.
pub fn adjust_hyperlinks(links: &[Hyperlink], edit: &Edit) -> Result<Vec<Hyperlink>> {
    let mut adjusted = Vec::with_capacity(links.len());
    for link in links {
        let coordinates = area_coordinates(&link.reference)?;
        if let Some(shifted) = shift_area(edit, coordinates)? {
            adjusted.push(Hyperlink {
                reference: area_reference(&shifted, link.reference.contains(':'))?,
                ..link.clone()
            });
        }
    }
    Ok(adjusted)
}

/// Adjust the calculation chain entries of one sheet.
pub fn adjust_calc_chain(chain: &CalcChain, sheet_id: u32, edit: &Edit) -> Result<CalcChain> {
    let mut adjusted = CalcChain {
        entries: Vec::with_capacity(chain.entries.len()),
    };
    for entry in &chain.entries {
        if entry.sheet_id != sheet_id {
            adjusted.entries.push(entry.clone());
            continue;
        }
        let (col, row) = cell_name_to_coordinates(&entry.reference)?;
        let (value, other) = match edit.axis {
            Axis::Rows => (row, col),
            Axis::Columns => (col, row),
        };
        let Some(shifted) = shift_point(edit, value)? else {
            continue;
        };
        let (col, row) = match edit.axis {
            Axis::Rows => (other, shifted),
            Axis::Columns => (shifted, other),
        };
        let mut entry = entry.clone();
        entry.reference = coordinates_to_cell_name(col, row, false)?;
        adjusted.entries.push(entry);
    }
    Ok(adjusted)
}

/// Adjust the sheet-qualified references of defined names.
pub fn adjust_defined_names(
    names: &[DefinedName],
    sheet: &str,
    edit: &Edit,
) -> Result<Vec<DefinedName>> {
    names
        .iter()
        .map(|name| {
            let value = adjust_formula(&name.value, sheet, None, edit)?;
            Ok(DefinedName {
                value: value.into_owned(),
                ..name.clone()
            })
        })
        .collect()
}

/// A formula rewrite for the cell at `(row index, column index)`.
#[derive(Debug)]
struct FormulaChange {
    row: usize,
    col: usize,
    formula: CellFormula,
}

/// Every worksheet-level rewrite of one edit, computed but not applied.
#[derive(Debug)]
pub struct WorksheetPlan {
    edit: Edit,
    merge_cells: Vec<String>,
    filter: FilterChange,
    /// The edit deletes the auto-filter outright
    filter_removed: bool,
    hyperlinks: Vec<Hyperlink>,
    formulas: Vec<FormulaChange>,
}

impl WorksheetPlan {
    /// Stage the edit for the worksheet named `sheet`.
    ///
    /// # Errors
    /// The codec error of the first malformed reference, or
    /// `RowOutOfRange`/`ColumnOutOfRange` when an insertion would push
    /// content past the sheet limits.
    pub fn new(ws: &Worksheet, sheet: &str, edit: Edit) -> Result<Self> {
        let merge_cells = adjust_merge_cells(&ws.merge_cells, &edit)?;
        let filter = adjust_auto_filter(ws.auto_filter.as_ref(), &edit)?;
        let hyperlinks = adjust_hyperlinks(&ws.hyperlinks, &edit)?;
        let formulas = stage_formulas(ws, sheet, &edit)?;
        check_capacity(ws, &edit)?;

        Ok(Self {
            edit,
            merge_cells,
            filter_removed: ws.auto_filter.is_some() && filter.filter.is_none(),
            filter,
            hyperlinks,
            formulas,
        })
    }

    /// Whether committing removes the sheet's auto-filter.
    pub fn removes_auto_filter(&self) -> bool {
        self.filter_removed
    }

    /// Apply the staged rewrites and move the sheet data.
    pub fn commit(self, ws: &mut Worksheet) {
        for change in self.formulas {
            if let Some(cell) = ws
                .rows
                .get_mut(change.row)
                .and_then(|row| row.cells.get_mut(change.col))
            {
                cell.formula = Some(change.formula);
            }
        }

        if let Some((first, last)) = self.filter.unhide {
            for row in ws
                .rows
                .iter_mut()
                .filter(|row| row.number >= first && row.number <= last)
            {
                row.hidden = false;
            }
        }

        match (self.edit.axis, self.edit.is_insert()) {
            (Axis::Rows, true) => insert_row(&mut ws.rows, self.edit.position),
            (Axis::Rows, false) => remove_row(&mut ws.rows, self.edit.position),
            (Axis::Columns, true) => insert_column(&mut ws.rows, self.edit.position),
            (Axis::Columns, false) => remove_column(&mut ws.rows, self.edit.position),
        }

        ws.merge_cells = self.merge_cells;
        ws.auto_filter = self.filter.filter;
        ws.hyperlinks = self.hyperlinks;
    }
}

/// Stage formula text and shared/array range rewrites.
fn stage_formulas(ws: &Worksheet, sheet: &str, edit: &Edit) -> Result<Vec<FormulaChange>> {
    let mut changes = Vec::new();
    for (row_idx, row) in ws.rows.iter().enumerate() {
        for (col_idx, cell) in row.cells.iter().enumerate() {
            let Some(formula) = &cell.formula else {
                continue;
            };
            let text = adjust_formula(&formula.text, sheet, Some(sheet), edit)?;
            let reference = match &formula.reference {
                Some(reference) => {
                    let coordinates = area_coordinates(reference)?;
                    match shift_area(edit, coordinates)? {
                        Some(shifted) => Some(area_reference(&shifted, reference.contains(':'))?),
                        None => None,
                    }
                },
                None => None,
            };
            if text != formula.text || reference != formula.reference {
                changes.push(FormulaChange {
                    row: row_idx,
                    col: col_idx,
                    formula: CellFormula {
                        text: text.into_owned(),
                        reference,
                        ..formula.clone()
                    },
                });
            }
        }
    }
    Ok(changes)
}

/// Insertion must not push a non-blank row or cell past the sheet limits.
fn check_capacity(ws: &Worksheet, edit: &Edit) -> Result<()> {
    if !edit.is_insert() {
        return Ok(());
    }
    let limit = edit.axis.limit() as usize;
    let overflows = match edit.axis {
        Axis::Rows => ws.rows.len() >= limit && ws.rows.last().is_some_and(|row| !row.is_blank()),
        Axis::Columns => ws
            .rows
            .iter()
            .any(|row| row.cells.len() >= limit && row.cells.last().is_some_and(|c| !c.is_blank())),
    };
    if overflows {
        return Err(edit.axis.out_of_range());
    }
    Ok(())
}

fn renumber_rows(rows: &mut [Row], from: usize) {
    for (idx, row) in rows.iter_mut().enumerate().skip(from) {
        let number = idx as u32 + 1;
        row.number = number;
        for (col_idx, cell) in row.cells.iter_mut().enumerate() {
            cell.reference = format_cell_name(col_idx as u32 + 1, number, false, false);
        }
    }
}

fn renumber_cells(row: &mut Row, from: usize) {
    let number = row.number;
    for (col_idx, cell) in row.cells.iter_mut().enumerate().skip(from) {
        cell.reference = format_cell_name(col_idx as u32 + 1, number, false, false);
    }
}

fn insert_row(rows: &mut Vec<Row>, position: u32) {
    let idx = position as usize - 1;
    if idx >= rows.len() {
        return;
    }
    rows.insert(idx, Row::new(position));
    rows.truncate(Axis::Rows.limit() as usize);
    renumber_rows(rows, idx);
}

fn remove_row(rows: &mut Vec<Row>, position: u32) {
    let idx = position as usize - 1;
    if idx >= rows.len() {
        return;
    }
    rows.remove(idx);
    renumber_rows(rows, idx);
}

fn insert_column(rows: &mut [Row], position: u32) {
    let idx = position as usize - 1;
    for row in rows.iter_mut().filter(|row| row.cells.len() > idx) {
        row.cells.insert(idx, Cell::default());
        row.cells.truncate(Axis::Columns.limit() as usize);
        renumber_cells(row, idx);
    }
}

fn remove_column(rows: &mut [Row], position: u32) {
    let idx = position as usize - 1;
    for row in rows.iter_mut().filter(|row| row.cells.len() > idx) {
        row.cells.remove(idx);
        renumber_cells(row, idx);
    }
}

/// Staged workbook-level rewrites that accompany a [`WorksheetPlan`].
#[derive(Debug)]
pub struct WorkbookPlan {
    pub calc_chain: Option<CalcChain>,
    pub defined_names: Vec<DefinedName>,
}

impl WorkbookPlan {
    pub fn new(
        calc_chain: Option<&CalcChain>,
        defined_names: &[DefinedName],
        sheet: &str,
        sheet_id: u32,
        edit: &Edit,
    ) -> Result<Self> {
        let calc_chain = calc_chain
            .map(|chain| adjust_calc_chain(chain, sheet_id, edit))
            .transpose()?;
        if calc_chain.as_ref().is_some_and(CalcChain::is_empty) {
            warn!("calculation chain emptied by structural edit on {sheet:?}");
        }
        Ok(Self {
            calc_chain,
            defined_names: adjust_defined_names(defined_names, sheet, edit)?,
        })
    }

    /// Drop the hidden filter range name scoped to the sheet at
    /// `local_sheet_id`, for an edit that removes its auto-filter.
    pub fn drop_filter_database(&mut self, local_sheet_id: u32) {
        self.defined_names.retain(|name| {
            !(name.name.eq_ignore_ascii_case(FILTER_DATABASE)
                && name.local_sheet_id == Some(local_sheet_id))
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::xlsx::calc_chain::CalcEntry;
    use crate::ooxml::xlsx::grid::normalize_worksheet;

    fn merges(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_merge_cells_on_insertion() {
        let cases = [
            (Edit::insert(Axis::Rows, 2), "A3:B4"),
            (Edit::insert(Axis::Rows, 3), "A2:B4"),
            (Edit::insert(Axis::Columns, 1), "B2:C3"),
        ];
        for (edit, expected) in cases {
            let adjusted = adjust_merge_cells(&merges(&["A2:B3"]), &edit).unwrap();
            assert_eq!(adjusted, [expected], "{edit:?}");
        }
    }

    #[test]
    fn test_merge_cells_on_deletion() {
        let cases = [
            (Edit::delete(Axis::Rows, 2), "A2:B2"),
            (Edit::delete(Axis::Rows, 3), "A2:B2"),
            (Edit::delete(Axis::Columns, 1), "A2:A3"),
            (Edit::delete(Axis::Columns, 2), "A2:A3"),
        ];
        for (edit, expected) in cases {
            let adjusted = adjust_merge_cells(&merges(&["A2:B3"]), &edit).unwrap();
            assert_eq!(adjusted, [expected], "{edit:?}");
        }
    }

    #[test]
    fn collapsed_merges_are_removed() {
        let adjusted = adjust_merge_cells(&merges(&["A2:B2"]), &Edit::delete(Axis::Rows, 2)).unwrap();
        assert!(adjusted.is_empty());

        let adjusted =
            adjust_merge_cells(&merges(&["B2:B2"]), &Edit::delete(Axis::Columns, 2)).unwrap();
        assert!(adjusted.is_empty());

        let adjusted = adjust_merge_cells(&merges(&["A1:B1"]), &Edit::delete(Axis::Columns, 2)).unwrap();
        assert!(adjusted.is_empty());
    }

    #[test]
    fn malformed_references_name_the_literal() {
        for bad in ["A:B1", "A1:B"] {
            let err = adjust_merge_cells(&merges(&[bad]), &Edit::insert(Axis::Rows, 1)).unwrap_err();
            let literal = if bad == "A:B1" { "A" } else { "B" };
            assert_eq!(
                err.to_string(),
                format!(
                    "cannot convert cell \"{literal}\" to coordinates: invalid cell name \"{literal}\""
                )
            );

            let filter = AutoFilter {
                reference: bad.to_string(),
                ..Default::default()
            };
            let err = adjust_auto_filter(Some(&filter), &Edit::delete(Axis::Rows, 1)).unwrap_err();
            assert!(err.to_string().contains(&format!("invalid cell name \"{literal}\"")));
        }
    }

    #[test]
    fn test_auto_filter_header_deletion_unhides_rows() {
        let mut ws = Worksheet {
            rows: (1..=3).map(Row::new).collect(),
            auto_filter: Some(AutoFilter {
                reference: "A1:A3".into(),
                ..Default::default()
            }),
            ..Default::default()
        };
        ws.rows[1].hidden = true;

        let plan = WorksheetPlan::new(&ws, "Sheet1", Edit::delete(Axis::Rows, 1)).unwrap();
        plan.commit(&mut ws);

        assert!(ws.auto_filter.is_none());
        assert_eq!(ws.rows.len(), 2);
        assert!(ws.rows.iter().all(|row| !row.hidden));
    }

    #[test]
    fn test_auto_filter_shifts_and_single_column_removal() {
        let filter = AutoFilter {
            reference: "B2:C5".into(),
            ..Default::default()
        };
        let change = adjust_auto_filter(Some(&filter), &Edit::insert(Axis::Rows, 1)).unwrap();
        assert_eq!(change.filter.unwrap().reference, "B3:C6");

        let change = adjust_auto_filter(Some(&filter), &Edit::delete(Axis::Columns, 2)).unwrap();
        assert_eq!(change.filter.unwrap().reference, "B2:B5");

        let single = AutoFilter {
            reference: "B1:B4".into(),
            ..Default::default()
        };
        let change = adjust_auto_filter(Some(&single), &Edit::delete(Axis::Columns, 2)).unwrap();
        assert!(change.filter.is_none());
        assert_eq!(change.unhide, Some((2, 4)));
    }

    fn sample_sheet() -> Worksheet {
        let xml = br#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheetData><row r="1"><c r="A1"><v>1</v></c><c r="B1"><v>2</v></c><c r="C1"><f>A1+B1</f><v>3</v></c></row><row r="2"><c r="A2"><f t="shared" ref="A2:A3" si="0">A1*2</f><v>2</v></c></row><row r="3"><c r="A3"><f t="shared" si="0"/><v>4</v></c><c r="C3"><v>x</v></c></row></sheetData><mergeCells count="1"><mergeCell ref="A2:B3"/></mergeCells><hyperlinks><hyperlink ref="C3" r:id="rId1"/><hyperlink ref="A2" location="Sheet1!A1"/></hyperlinks></worksheet>"#;
        let mut ws = crate::ooxml::xlsx::parsers::worksheet_parser::parse_worksheet(xml).unwrap();
        normalize_worksheet(&mut ws).unwrap();
        ws
    }

    #[test]
    fn test_insert_row_moves_everything() {
        let mut ws = sample_sheet();
        WorksheetPlan::new(&ws, "Sheet1", Edit::insert(Axis::Rows, 2))
            .unwrap()
            .commit(&mut ws);

        assert_eq!(ws.rows.len(), 4);
        for (idx, row) in ws.rows.iter().enumerate() {
            assert_eq!(row.number, idx as u32 + 1);
        }
        assert!(ws.rows[1].cells.is_empty());
        assert_eq!(ws.rows[2].cells[0].reference, "A3");
        assert_eq!(ws.rows[3].cells[2].reference, "C4");
        assert_eq!(ws.rows[3].cells[2].value.as_deref(), Some("x"));

        let shared = ws.rows[2].cells[0].formula.as_ref().unwrap();
        assert_eq!(shared.reference.as_deref(), Some("A3:A4"));
        assert_eq!(shared.text, "A1*2");
        assert_eq!(ws.rows[0].cells[2].formula.as_ref().unwrap().text, "A1+B1");

        assert_eq!(ws.merge_cells, ["A3:B4"]);
        assert_eq!(ws.hyperlinks[0].reference, "C4");
        assert_eq!(ws.hyperlinks[1].reference, "A3");
    }

    #[test]
    fn test_remove_column_moves_everything() {
        let mut ws = sample_sheet();
        WorksheetPlan::new(&ws, "Sheet1", Edit::delete(Axis::Columns, 1))
            .unwrap()
            .commit(&mut ws);

        assert_eq!(ws.rows[0].cells.len(), 2);
        assert_eq!(ws.rows[0].cells[1].reference, "B1");
        assert_eq!(ws.rows[0].cells[1].formula.as_ref().unwrap().text, "#REF!+A1");
        assert!(ws.rows[1].cells.is_empty());
        assert_eq!(ws.merge_cells, ["A2:A3"]);
        assert_eq!(ws.hyperlinks.len(), 1);
        assert_eq!(ws.hyperlinks[0].reference, "B3");
    }

    #[test]
    fn malformed_reference_leaves_sheet_untouched() {
        let mut ws = sample_sheet();
        ws.merge_cells.push("A:B1".into());
        let before = ws.clone();

        let err = WorksheetPlan::new(&ws, "Sheet1", Edit::insert(Axis::Rows, 1)).unwrap_err();
        assert!(matches!(err, Error::CellNameToCoordinates { .. }));
        assert_eq!(ws, before);
    }

    #[test]
    fn insertion_past_the_last_row_fails() {
        let ws = Worksheet {
            merge_cells: merges(&["A1048576:B1048576"]),
            ..Default::default()
        };
        let err = WorksheetPlan::new(&ws, "Sheet1", Edit::insert(Axis::Rows, 1)).unwrap_err();
        assert!(matches!(err, Error::RowOutOfRange));

        let ws = Worksheet {
            merge_cells: merges(&["XFD1:XFD2"]),
            ..Default::default()
        };
        let err = WorksheetPlan::new(&ws, "Sheet1", Edit::insert(Axis::Columns, 3)).unwrap_err();
        assert!(matches!(err, Error::ColumnOutOfRange));
    }

    fn chain() -> CalcChain {
        CalcChain {
            entries: vec![
                CalcEntry {
                    reference: "B2".into(),
                    sheet_id: 2,
                    ..Default::default()
                },
                CalcEntry {
                    reference: "B2".into(),
                    sheet_id: 1,
                    ..Default::default()
                },
            ],
        }
    }

    #[test]
    fn test_calc_chain_shifts_only_the_edited_sheet() {
        let adjusted = adjust_calc_chain(&chain(), 1, &Edit::insert(Axis::Columns, 1)).unwrap();
        assert_eq!(adjusted.entries[0].reference, "B2");
        assert_eq!(adjusted.entries[1].reference, "C2");

        let adjusted = adjust_calc_chain(&chain(), 1, &Edit::insert(Axis::Rows, 1)).unwrap();
        assert_eq!(adjusted.entries[1].reference, "B3");

        let adjusted = adjust_calc_chain(&chain(), 1, &Edit::delete(Axis::Rows, 2)).unwrap();
        assert_eq!(adjusted.entries.len(), 1);
        assert_eq!(adjusted.entries[0].sheet_id, 2);
    }

    #[test]
    fn invalid_calc_chain_reference_is_reported() {
        let mut chain = chain();
        chain.entries[1].reference = "invalid coordinates".into();
        let err = adjust_calc_chain(&chain, 1, &Edit::insert(Axis::Columns, 1)).unwrap_err();
        assert!(
            err.to_string()
                .starts_with("cannot convert cell \"invalid coordinates\" to coordinates")
        );
    }

    #[test]
    fn test_defined_names_follow_their_sheet() {
        let names = vec![
            DefinedName {
                name: "Data".into(),
                value: "Sheet1!$A$2:$B$5".into(),
                ..Default::default()
            },
            DefinedName {
                name: "Elsewhere".into(),
                value: "Sheet2!$A$2".into(),
                ..Default::default()
            },
        ];
        let adjusted = adjust_defined_names(&names, "Sheet1", &Edit::delete(Axis::Rows, 2)).unwrap();
        assert_eq!(adjusted[0].value, "Sheet1!$A$2:$B$4");
        assert_eq!(adjusted[1].value, "Sheet2!$A$2");
    }

    #[test]
    fn test_shift_span_rules() {
        let insert = Edit::insert(Axis::Rows, 3);
        assert_eq!(shift_span(&insert, 3, 5).unwrap(), Some((4, 6)));
        assert_eq!(shift_span(&insert, 2, 5).unwrap(), Some((2, 6)));
        assert_eq!(shift_span(&insert, 1, 2).unwrap(), Some((1, 2)));

        let delete = Edit::delete(Axis::Rows, 3);
        assert_eq!(shift_span(&delete, 3, 3).unwrap(), None);
        assert_eq!(shift_span(&delete, 4, 6).unwrap(), Some((3, 5)));
        assert_eq!(shift_span(&delete, 3, 6).unwrap(), Some((3, 5)));
        assert_eq!(shift_span(&delete, 1, 2).unwrap(), Some((1, 2)));
    }
}
