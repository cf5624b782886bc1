//! # Column Projection
//!
//! Turns match records into export rows. Every projected row carries the two fixed headers,
//! `worksheet` (the sheet name) and `célula` (the cell label), followed by the data columns
//! chosen for its sheet, or all of them when the sheet has no selection.
mod selection;

pub use selection::ColumnCatalog;
pub use selection::ColumnSelection;
pub use selection::SelectionDraft;

use crate::search::MatchRecord;
use crate::table::Value;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

pub const WORKSHEET_HEADER: &str = "worksheet";
pub const CELL_HEADER: &str = "célula";

/// Header to value mapping for one record.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProjectedRow {
    values: BTreeMap<String, Value>,
}

impl ProjectedRow {
    pub fn get(&self, header: &str) -> Option<&Value> {
        self.values.get(header)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Headers present in this row, in export order.
    pub fn headers(&self) -> Vec<String> {
        order_headers(self.values.keys().map(String::as_str))
    }
}

/// Projects one record through the selection.
///
/// Selected columns the record does not have are left out; exporters fill them in as empty.
/// The fixed headers always win over data columns of the same name.
pub fn project(record: &MatchRecord, selection: &ColumnSelection) -> ProjectedRow {
    let selected = selection.selected_columns(record.sheet_name());
    let mut values: BTreeMap<String, Value> = record
        .columns()
        .iter()
        .zip(record.full_row())
        .filter(|(name, _)| selected.is_empty() || selected.contains(&name.as_str()))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    values.insert(WORKSHEET_HEADER.to_owned(), Value::from(record.sheet_name()));
    values.insert(CELL_HEADER.to_owned(), Value::from(record.cell_label()));
    ProjectedRow { values }
}

/// The header list shared by every exporter.
///
/// With any selection in place this is the union of all selected columns; otherwise the union
/// of every column of every record. `worksheet` and `célula` come first, the rest sorted.
pub fn all_headers(records: &[Arc<MatchRecord>], selection: &ColumnSelection) -> Vec<String> {
    if selection.is_empty() {
        order_headers(records.iter().flat_map(|record| record.columns().iter().map(String::as_str)))
    } else {
        order_headers(selection.all_columns())
    }
}

fn order_headers<'a, I: IntoIterator<Item = &'a str>>(names: I) -> Vec<String> {
    let rest: BTreeSet<&str> = names
        .into_iter()
        .filter(|name| *name != WORKSHEET_HEADER && *name != CELL_HEADER)
        .collect();
    [WORKSHEET_HEADER, CELL_HEADER]
        .into_iter()
        .chain(rest)
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::search_table;
    use crate::table::Table;

    fn records() -> Vec<Arc<MatchRecord>> {
        let people = Table::new(
            vec!["Name".to_owned(), "Age".to_owned()],
            vec![vec![Value::from("Alice"), Value::Number(30.0)], vec![Value::from("Bob"), Value::Number(25.0)]],
        );
        let cities = Table::new(
            vec!["City".to_owned(), "worksheet".to_owned()],
            vec![vec![Value::from("Boston"), Value::from("shadowed")]],
        );
        let mut records = search_table("Sheet1", &people, "bob").unwrap();
        records.extend(search_table("Cities", &cities, "bos").unwrap());
        records.into_iter().map(Arc::new).collect()
    }

    #[test]
    fn headers_without_selection_cover_every_column() {
        let headers = all_headers(&records(), &ColumnSelection::default());
        assert_eq!(headers, ["worksheet", "célula", "Age", "City", "Name"]);
        assert_eq!(all_headers(&[], &ColumnSelection::default()), ["worksheet", "célula"]);
    }

    #[test]
    fn headers_with_selection_cover_selected_columns() {
        let mut selection = ColumnSelection::default();
        selection.set("Sheet1", "Name", true);
        selection.set("Elsewhere", "Zip", true);
        assert_eq!(all_headers(&records(), &selection), ["worksheet", "célula", "Name", "Zip"]);
    }

    #[test]
    fn projects_selected_columns_only_for_that_sheet() {
        let records = records();
        let mut selection = ColumnSelection::default();
        selection.set("Sheet1", "Name", true);

        let row = project(&records[0], &selection);
        assert_eq!(row.headers(), ["worksheet", "célula", "Name"]);
        assert_eq!(row.get("worksheet"), Some(&Value::from("Sheet1")));
        assert_eq!(row.get("célula"), Some(&Value::from("Name2")));
        assert_eq!(row.get("Name"), Some(&Value::from("Bob")));
        assert_eq!(row.get("Age"), None);

        // no selection for Cities, so every column is kept
        let row = project(&records[1], &selection);
        assert_eq!(row.headers(), ["worksheet", "célula", "City"]);
        assert_eq!(row.get("worksheet"), Some(&Value::from("Cities")));
    }

    #[test]
    fn selected_columns_missing_from_the_record_are_skipped() {
        let records = records();
        let mut selection = ColumnSelection::default();
        selection.set("Sheet1", "Name", true);
        selection.set("Sheet1", "Salary", true);
        let row = project(&records[0], &selection);
        assert_eq!(row.len(), 3);
        assert_eq!(row.get("Salary"), None);
    }
}
