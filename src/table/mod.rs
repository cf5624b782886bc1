//! In-memory sheet data.

mod schema;
mod value;

pub use schema::Column;
pub use schema::ColumnType;
pub use schema::Schema;
pub use value::Value;

pub(crate) use value::format_number;

use std::collections::HashMap;
use std::sync::Arc;

/// One sheet held fully in memory.
///
/// Rows are stored in source order. Each row is shared behind an `Arc` so a match can keep
/// the whole source row without copying it.
#[derive(Clone, Debug, Default)]
pub struct Table {
    columns: Arc<[String]>,
    rows: Vec<Arc<[Value]>>,
}

impl Table {
    /// Builds a table from its header and rows.
    /// Loaders hand in rows exactly as wide as the header; the searcher re-checks widths.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Table {
        Table {
            columns: columns.into(),
            rows: rows.into_iter().map(Arc::from).collect(),
        }
    }

    pub fn columns(&self) -> &Arc<[String]> {
        &self.columns
    }

    pub fn rows(&self) -> &[Arc<[Value]>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Makes header names unique within a sheet.
///
/// A blank name becomes `Unnamed: <index>` (zero-based column index), and a repeated name
/// gets the first free `.<n>` suffix: `Name`, `Name.1`, `Name.2`.
pub(crate) fn unique_headers<I: IntoIterator<Item = String>>(names: I) -> Vec<String> {
    let names: Vec<String> = names
        .into_iter()
        .enumerate()
        .map(|(index, name)| {
            if name.trim().is_empty() {
                format!("Unnamed: {index}")
            } else {
                name
            }
        })
        .collect();

    let mut counts = HashMap::<String, usize>::new();
    let mut headers = Vec::with_capacity(names.len());
    for name in names {
        let mut candidate = name;
        let mut count = counts.get(&candidate).copied().unwrap_or(0);
        while count > 0 {
            counts.insert(candidate.clone(), count + 1);
            candidate = format!("{candidate}.{count}");
            count = counts.get(&candidate).copied().unwrap_or(0);
        }
        counts.insert(candidate.clone(), 1);
        headers.push(candidate);
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        unique_headers(names.iter().map(|name| name.to_string()))
    }

    #[test]
    fn renames_blank_and_repeated_headers() {
        assert_eq!(headers(&["Name", "", "Name", "Name"]), vec!["Name", "Unnamed: 1", "Name.1", "Name.2"]);
        assert_eq!(headers(&["A", "A.1", "A"]), vec!["A", "A.1", "A.1.1"]);
        assert_eq!(headers(&["Age", "Score"]), vec!["Age", "Score"]);
    }

    #[test]
    fn shares_rows() {
        let table = Table::new(vec!["Name".to_owned()], vec![vec![Value::from("Alice")]]);
        let row = Arc::clone(&table.rows()[0]);
        assert_eq!(row[0], Value::from("Alice"));
        assert_eq!(table.len(), 1);
        assert!(!table.is_empty());
    }
}
