//! Sheet grid normalization.
//!
//! Parsed sheet data is a list of row records in whatever order and shape
//! the producer wrote them. Everything that addresses cells by position
//! works on the dense form built here: `rows[i].number == i + 1`, and
//! `cells[j]` of every row is column `j + 1`, with empty placeholders at
//! positions no record covered.
//!
//! A leading record numbered 0 is not a positional row but a row-zero
//! overlay whose cells act as defaults for otherwise empty positions. It is
//! set aside by [`normalize_rows`] and applied by
//! [`apply_row_zero_overlay`].

use crate::common::error::{Error, Result};
use crate::ooxml::xlsx::cell::{
    MAX_COLUMNS, TOTAL_ROWS, cell_name_to_coordinates, coordinates_to_cell_name,
};
use crate::ooxml::xlsx::worksheet::{Cell, Row, Worksheet};
use std::collections::HashMap;

/// Normalize parsed rows into a dense grid.
///
/// Returns the dense rows and the row-zero overlay, if the first record was
/// one.
///
/// # Errors
/// The codec error of the first malformed cell reference, or
/// `RowOutOfRange`/`ColumnOutOfRange` when positional numbering runs past
/// the sheet limits.
pub fn normalize_rows(mut rows: Vec<Row>) -> Result<(Vec<Row>, Option<Row>)> {
    let overlay = match rows.first() {
        Some(first) if first.number == 0 => Some(rows.remove(0)),
        _ => None,
    };

    let mut placed: Vec<Row> = Vec::with_capacity(rows.len());
    let mut index: HashMap<u32, usize> = HashMap::with_capacity(rows.len());
    let mut counter: u32 = 0;

    for mut row in rows {
        if row.number == 0 {
            row.number = counter + 1;
        }
        if row.number > TOTAL_ROWS {
            return Err(Error::RowOutOfRange);
        }
        counter = row.number;

        match index.get(&row.number) {
            Some(&existing) => merge_duplicate(&mut placed[existing], row),
            None => {
                index.insert(row.number, placed.len());
                placed.push(row);
            },
        }
    }

    let target = placed.iter().map(|row| row.number).max().unwrap_or(0);
    let mut dense: Vec<Option<Row>> = Vec::new();
    dense.resize_with(target as usize, || None);
    for row in placed {
        let slot = row.number as usize - 1;
        dense[slot] = Some(row);
    }

    let mut normalized = Vec::with_capacity(dense.len());
    for (idx, row) in dense.into_iter().enumerate() {
        let number = idx as u32 + 1;
        let mut row = row.unwrap_or_else(|| Row::new(number));
        row.cells = densify_cells(number, std::mem::take(&mut row.cells))?;
        normalized.push(row);
    }

    Ok((normalized, overlay))
}

/// Fold a later record with the same number into the earlier one.
fn merge_duplicate(earlier: &mut Row, later: Row) {
    if !earlier.has_attributes() {
        earlier.height = later.height;
        earlier.custom_height = later.custom_height;
        earlier.hidden = later.hidden;
        earlier.style = later.style;
        earlier.custom_format = later.custom_format;
        earlier.extra = later.extra;
    }
    earlier.cells.extend(later.cells);
}

/// Place each cell at its column and fill the gaps.
fn densify_cells(row: u32, cells: Vec<Cell>) -> Result<Vec<Cell>> {
    let mut slots: Vec<Option<Cell>> = Vec::with_capacity(cells.len());
    let mut next: u32 = 1;

    for mut cell in cells {
        let col = if cell.reference.is_empty() {
            next
        } else {
            cell_name_to_coordinates(&cell.reference)?.0
        };
        if col > MAX_COLUMNS {
            return Err(Error::ColumnOutOfRange);
        }
        next = col + 1;
        cell.reference = coordinates_to_cell_name(col, row, false)?;

        let pos = col as usize - 1;
        if slots.len() <= pos {
            slots.resize_with(pos + 1, || None);
        }
        match &slots[pos] {
            Some(_) if !cell.has_value() && cell.style == 0 => {},
            _ => slots[pos] = Some(cell),
        }
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(idx, slot)| match slot {
            Some(cell) => Ok(cell),
            None => Ok(Cell::empty(coordinates_to_cell_name(idx as u32 + 1, row, false)?)),
        })
        .collect()
}

/// Mutable access to `(col, row)` in a dense grid, growing rows and cells
/// with placeholders until the position exists.
pub fn cell_slot(rows: &mut Vec<Row>, col: u32, row: u32) -> Result<&mut Cell> {
    if col == 0 || row == 0 {
        return Err(Error::InvalidCoordinates {
            col: col as i64,
            row: row as i64,
        });
    }
    if row > TOTAL_ROWS {
        return Err(Error::RowOutOfRange);
    }
    if col > MAX_COLUMNS {
        return Err(Error::ColumnOutOfRange);
    }

    while rows.len() < row as usize {
        let number = rows.len() as u32 + 1;
        rows.push(Row::new(number));
    }
    let cells = &mut rows[row as usize - 1].cells;
    while cells.len() < col as usize {
        let reference = coordinates_to_cell_name(cells.len() as u32 + 1, row, false)?;
        cells.push(Cell::empty(reference));
    }
    Ok(&mut cells[col as usize - 1])
}

/// Apply row-zero overlay cells as defaults.
///
/// Each overlay cell lands at the position its reference names (a cell
/// without a reference is positioned by its index in row 1). It replaces
/// the target only when the target has no value.
pub fn apply_row_zero_overlay(rows: &mut Vec<Row>, overlay: Row) -> Result<()> {
    for (idx, cell) in overlay.cells.into_iter().enumerate() {
        let (col, row) = if cell.reference.is_empty() {
            (idx as u32 + 1, 1)
        } else {
            cell_name_to_coordinates(&cell.reference)?
        };

        let target = cell_slot(rows, col, row)?;
        if !target.has_value() {
            let reference = std::mem::take(&mut target.reference);
            *target = Cell { reference, ..cell };
        }
    }
    Ok(())
}

/// Normalize a freshly parsed worksheet in place and resolve its row-zero
/// overlay.
pub fn normalize_worksheet(ws: &mut Worksheet) -> Result<()> {
    let (mut rows, overlay) = normalize_rows(std::mem::take(&mut ws.rows))?;
    if let Some(overlay) = overlay {
        apply_row_zero_overlay(&mut rows, overlay)?;
    }
    ws.rows = rows;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(reference: &str, value: &str) -> Cell {
        Cell {
            reference: reference.to_string(),
            value: Some(value.to_string()),
            ..Default::default()
        }
    }

    fn row(number: u32, cells: Vec<Cell>) -> Row {
        Row {
            number,
            cells,
            ..Default::default()
        }
    }

    fn value(rows: &[Row], col: usize, row: usize) -> Option<&str> {
        rows[row - 1].cells.get(col - 1)?.value.as_deref()
    }

    #[test]
    fn test_normalize_sparse_unordered_rows() {
        let rows = vec![
            row(4, vec![cell("C4", "c")]),
            row(2, vec![cell("B2", "b")]),
        ];
        let (grid, overlay) = normalize_rows(rows).unwrap();

        assert!(overlay.is_none());
        assert_eq!(grid.len(), 4);
        for (i, r) in grid.iter().enumerate() {
            assert_eq!(r.number, i as u32 + 1);
        }
        assert_eq!(grid[1].cells.len(), 2);
        assert_eq!(grid[1].cells[0].reference, "A2");
        assert!(!grid[1].cells[0].has_value());
        assert_eq!(value(&grid, 2, 2), Some("b"));
        assert_eq!(value(&grid, 3, 4), Some("c"));
        assert!(grid[2].cells.is_empty());
    }

    #[test]
    fn test_implicit_numbers_and_duplicates() {
        let rows = vec![
            row(2, vec![cell("A2", "a")]),
            row(0, vec![cell("", "x"), cell("", "y")]),
            row(2, vec![cell("C2", "c")]),
        ];
        let (grid, _) = normalize_rows(rows).unwrap();

        assert_eq!(grid.len(), 3);
        assert_eq!(value(&grid, 1, 2), Some("a"));
        assert_eq!(value(&grid, 3, 2), Some("c"));
        assert_eq!(value(&grid, 1, 3), Some("x"));
        assert_eq!(value(&grid, 2, 3), Some("y"));
        assert_eq!(grid[2].cells[1].reference, "B3");
    }

    #[test]
    fn later_duplicate_cell_replaces_only_with_content() {
        let blank = Cell {
            reference: "A1".to_string(),
            ..Default::default()
        };
        let rows = vec![row(1, vec![cell("A1", "keep"), blank, cell("B1", "b"), cell("B1", "b2")])];
        let (grid, _) = normalize_rows(rows).unwrap();

        assert_eq!(value(&grid, 1, 1), Some("keep"));
        assert_eq!(value(&grid, 2, 1), Some("b2"));
    }

    #[test]
    fn empty_and_overlay_only_sheets_have_no_rows() {
        let (grid, overlay) = normalize_rows(Vec::new()).unwrap();
        assert!(grid.is_empty() && overlay.is_none());

        let (grid, overlay) = normalize_rows(vec![row(0, vec![cell("B2", "X")])]).unwrap();
        assert!(grid.is_empty());
        assert!(overlay.is_some());
    }

    #[test]
    fn normalization_is_idempotent() {
        let rows = vec![
            row(3, vec![cell("D3", "d")]),
            row(1, vec![cell("B1", "b")]),
            row(0, vec![cell("", "e")]),
        ];
        let (once, _) = normalize_rows(rows).unwrap();
        let (twice, overlay) = normalize_rows(once.clone()).unwrap();

        assert!(overlay.is_none());
        assert_eq!(once, twice);
    }

    #[test]
    fn malformed_cell_reference_is_an_error() {
        let rows = vec![row(1, vec![cell("A:B1", "x")])];
        assert!(matches!(
            normalize_rows(rows),
            Err(Error::CellNameToCoordinates { .. })
        ));
    }

    #[test]
    fn overlay_fills_only_empty_positions() {
        let mut ws = Worksheet {
            rows: vec![
                row(0, vec![cell("B2", "X")]),
                row(2, vec![cell("A2", "1")]),
            ],
            ..Default::default()
        };
        normalize_worksheet(&mut ws).unwrap();
        assert_eq!(value(&ws.rows, 2, 2), Some("X"));
        assert_eq!(value(&ws.rows, 1, 2), Some("1"));

        let mut ws = Worksheet {
            rows: vec![
                row(0, vec![cell("B2", "X")]),
                row(2, vec![cell("A2", "1"), cell("B2", "Y")]),
            ],
            ..Default::default()
        };
        normalize_worksheet(&mut ws).unwrap();
        assert_eq!(value(&ws.rows, 2, 2), Some("Y"));
    }

    #[test]
    fn overlay_grows_the_grid() {
        let mut rows = Vec::new();
        apply_row_zero_overlay(&mut rows, row(0, vec![cell("C5", "z")])).unwrap();

        assert_eq!(rows.len(), 5);
        assert_eq!(rows[4].cells.len(), 3);
        assert_eq!(value(&rows, 3, 5), Some("z"));
        assert_eq!(rows[4].cells[2].reference, "C5");
    }

    #[test]
    fn malformed_overlay_reference_is_an_error() {
        let mut rows = Vec::new();
        let err = apply_row_zero_overlay(&mut rows, row(0, vec![cell("1B", "z")])).unwrap_err();
        assert!(matches!(err, Error::CellNameToCoordinates { .. }));
    }
}
