use crate::error::RustySeekError;
use crate::source::cell::Cell;
use crate::table::unique_headers;
use crate::table::Table;
use crate::table::Value;

/// Cells collected from one worksheet, with the bounds of the used range.
pub(crate) struct Sheet {
    pub(crate) cells: Vec<Cell>,
    pub(crate) row_lower_bound: Option<usize>,
    pub(crate) row_upper_bound: Option<usize>,
    pub(crate) col_lower_bound: Option<usize>,
    pub(crate) col_upper_bound: Option<usize>,
}

impl Sheet {
    pub(crate) fn new() -> Self {
        Self {
            cells: Vec::new(),
            row_lower_bound: None,
            row_upper_bound: None,
            col_lower_bound: None,
            col_upper_bound: None,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub(crate) fn push(&mut self, cell: Cell) {
        self.row_lower_bound = Some(self.row_lower_bound.map_or(cell.row, |row| row.min(cell.row)));
        self.row_upper_bound = Some(self.row_upper_bound.map_or(cell.row, |row| row.max(cell.row)));
        self.col_lower_bound = Some(self.col_lower_bound.map_or(cell.col, |col| col.min(cell.col)));
        self.col_upper_bound = Some(self.col_upper_bound.map_or(cell.col, |col| col.max(cell.col)));
        self.cells.push(cell);
    }

    /// Lays the cells out as a table.
    ///
    /// The first used row supplies the header and the used column range the columns. Every
    /// later row up to the last used one becomes a data row, so blank rows in the middle are
    /// kept as all-null rows. Empty strings load as null.
    pub(crate) fn into_table(self, shared_strings: &[String]) -> Result<Table, RustySeekError> {
        let (Some(row_lower), Some(row_upper), Some(col_lower), Some(col_upper)) =
            (self.row_lower_bound, self.row_upper_bound, self.col_lower_bound, self.col_upper_bound)
        else {
            return Ok(Table::default());
        };
        let width = col_upper - col_lower + 1;
        let mut header = vec![String::new(); width];
        let mut rows = vec![vec![Value::Null; width]; row_upper - row_lower];
        for cell in &self.cells {
            let value = match cell.to_value(shared_strings)? {
                Value::String(text) if text.is_empty() => Value::Null,
                value => value,
            };
            let col = cell.col - col_lower;
            if cell.row == row_lower {
                header[col] = value.to_string();
            } else {
                rows[cell.row - row_lower - 1][col] = value;
            }
        }
        Ok(Table::new(unique_headers(header), rows))
    }
}
