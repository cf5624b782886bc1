//! # Sheet Searcher
//!
//! Linear, case-insensitive substring search over one in-memory table. Every cell is
//! stringified with [`Value::search_text`] and tested against the lowercased query, visiting
//! rows in source order and the columns of a row left to right. There is no index and no early
//! exit, so the matches of one sheet always come out in (row, column) order.
pub(crate) mod orchestrator;
pub(crate) mod results;

pub use orchestrator::Engine;
pub use orchestrator::SearchBatch;
pub use orchestrator::SearchEvent;
pub use orchestrator::SearchHandle;

use crate::error::SearchError;
use crate::table::Table;
use crate::table::Value;
use std::sync::Arc;
use tracing::debug;

/// One query hit, holding the whole source row it was found in.
///
/// The row and the column list are shared with the loaded table and never change after the
/// match is made, so a record stays valid even after another file is loaded.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchRecord {
    sheet_name: String,
    row: usize,
    column: usize,
    value: String,
    columns: Arc<[String]>,
    full_row: Arc<[Value]>,
}

impl MatchRecord {
    pub fn sheet_name(&self) -> &str {
        &self.sheet_name
    }

    /// 1-based row number among the data rows.
    pub fn row(&self) -> usize {
        self.row
    }

    /// 1-based column number.
    pub fn column(&self) -> usize {
        self.column
    }

    pub fn column_name(&self) -> &str {
        &self.columns[self.column - 1]
    }

    /// The matched cell as the searcher saw it.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Column names of the sheet at match time, in sheet order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Original values of the matched row, aligned with [`MatchRecord::columns`].
    pub fn full_row(&self) -> &[Value] {
        &self.full_row
    }

    /// Value of the named column in the matched row.
    pub fn get(&self, column_name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|name| name == column_name)
            .map(|index| &self.full_row[index])
    }

    /// Column name followed by the row number, e.g. `Age5`.
    pub fn cell_label(&self) -> String {
        format!("{}{}", self.column_name(), self.row)
    }
}

/// Searches every cell of `table` for `query`.
///
/// The query is trimmed and compared case-insensitively. A sheet without matches yields an
/// empty vector.
///
/// # Errors
///
/// * [`SearchError::EmptyQuery`] when the query is blank
/// * [`SearchError::RaggedRow`] when a row is not exactly as wide as the header
pub fn search_table(sheet_name: &str, table: &Table, query: &str) -> Result<Vec<MatchRecord>, SearchError> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        Err(SearchError::EmptyQuery)?;
    }

    let columns = table.columns();
    let mut matches = Vec::new();
    for (row_index, row) in table.rows().iter().enumerate() {
        if row.len() != columns.len() {
            Err(SearchError::RaggedRow {
                sheet: sheet_name.to_owned(),
                row: row_index + 1,
                expected: columns.len(),
                actual: row.len(),
            })?;
        }
        for (column_index, cell) in row.iter().enumerate() {
            let text = cell.search_text();
            if text.to_lowercase().contains(&needle) {
                matches.push(MatchRecord {
                    sheet_name: sheet_name.to_owned(),
                    row: row_index + 1,
                    column: column_index + 1,
                    value: text.into_owned(),
                    columns: Arc::clone(columns),
                    full_row: Arc::clone(row),
                });
            }
        }
    }

    debug!(sheet = sheet_name, rows = table.len(), matches = matches.len(), "sheet scanned");
    Ok(matches)
}
