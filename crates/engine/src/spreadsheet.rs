//! First-sheet row reading for `.xlsx` / `.xls` workbooks.

use calamine::{Data, Range, Reader, Xlsx, open_workbook, open_workbook_auto};
use std::path::Path;
use thiserror::Error;

use crate::extract::FileKind;

#[derive(Debug, Error)]
pub enum SpreadsheetError {
    #[error("{0}")]
    Workbook(#[from] calamine::Error),

    #[error("{0}")]
    Xlsx(#[from] calamine::XlsxError),

    #[error("workbook has no sheets")]
    NoSheets,
}

/// Reads up to `max_rows` rows of the first sheet, one tab-joined string per row.
///
/// Row numbering follows the sheet: empty leading rows come back as empty
/// strings and empty leading columns as empty cells. `.xlsx` sheets are
/// streamed and reading stops at the first cell past `max_rows`; `.xls`
/// sheets are loaded whole by the reader.
///
/// # Errors
/// Returns the reader's error when the workbook cannot be opened or parsed.
pub fn read_first_rows(path: &Path, max_rows: usize) -> Result<Vec<String>, SpreadsheetError> {
    if FileKind::from_path(path) == FileKind::Xlsx {
        return read_xlsx_rows(path, max_rows);
    }
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(SpreadsheetError::NoSheets)??;
    Ok(rows_from_range(&range, max_rows))
}

fn read_xlsx_rows(path: &Path, max_rows: usize) -> Result<Vec<String>, SpreadsheetError> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let first = workbook
        .sheet_names()
        .into_iter()
        .next()
        .ok_or(SpreadsheetError::NoSheets)?;
    let mut cells = workbook.worksheet_cells_reader(&first)?;
    let mut grid = RowGrid::new(max_rows);
    while let Some(cell) = cells.next_cell()? {
        let (row, col) = cell.get_position();
        let text = cell_text(&Data::from(cell.get_value().clone()));
        if !grid.place(row as usize, col as usize, text) {
            break;
        }
    }
    Ok(grid.into_rows())
}

fn rows_from_range(range: &Range<Data>, max_rows: usize) -> Vec<String> {
    let Some((first_row, first_col)) = range.start() else {
        return Vec::new();
    };
    let mut grid = RowGrid::new(max_rows);
    for (row, col, value) in range.used_cells() {
        let (row, col) = (first_row as usize + row, first_col as usize + col);
        if !grid.place(row, col, cell_text(value)) {
            break;
        }
    }
    grid.into_rows()
}

/// The first `max_rows` sheet rows, filled from cells arriving in row order.
#[derive(Debug)]
struct RowGrid {
    max_rows: usize,
    rows: Vec<Vec<String>>,
}

impl RowGrid {
    fn new(max_rows: usize) -> Self {
        Self {
            max_rows,
            rows: Vec::new(),
        }
    }

    /// Returns `false` once `row` is past the cap; every earlier row is then present.
    fn place(&mut self, row: usize, col: usize, text: String) -> bool {
        if row >= self.max_rows {
            self.rows.resize_with(self.max_rows, Vec::new);
            return false;
        }
        if text.is_empty() {
            return true;
        }
        if self.rows.len() <= row {
            self.rows.resize_with(row + 1, Vec::new);
        }
        let cells = &mut self.rows[row];
        if cells.len() <= col {
            cells.resize(col + 1, String::new());
        }
        cells[col] = text;
        true
    }

    fn into_rows(self) -> Vec<String> {
        self.rows.into_iter().map(join_cells).collect()
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

/// Tab-joins cells and trims trailing whitespace.
fn join_cells<I>(cells: I) -> String
where
    I: IntoIterator<Item = String>,
{
    let joined = cells.into_iter().collect::<Vec<_>>().join("\t");
    joined.trim_end().to_string()
}
