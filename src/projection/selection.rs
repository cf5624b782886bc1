use crate::search::MatchRecord;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Columns chosen per sheet.
///
/// A sheet that is absent has no filter. Sheets whose last column is removed are dropped, so
/// the selection is empty exactly when no sheet has a selected column.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ColumnSelection {
    sheets: BTreeMap<String, BTreeSet<String>>,
}

impl ColumnSelection {
    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    /// Selected columns of a sheet in name order. Empty means the sheet is not filtered.
    pub fn selected_columns(&self, sheet_name: &str) -> Vec<&str> {
        self.sheets
            .get(sheet_name)
            .map(|columns| columns.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn is_selected(&self, sheet_name: &str, column_name: &str) -> bool {
        self.sheets
            .get(sheet_name)
            .is_some_and(|columns| columns.contains(column_name))
    }

    /// Sheets with at least one selected column, in name order.
    pub fn sheet_names(&self) -> impl Iterator<Item = &str> {
        self.sheets.keys().map(String::as_str)
    }

    /// Every selected column name across all sheets, repeats included.
    pub fn all_columns(&self) -> impl Iterator<Item = &str> {
        self.sheets.values().flatten().map(String::as_str)
    }

    /// Selects or deselects one column. Setting a column to its current state changes nothing.
    pub fn set(&mut self, sheet_name: &str, column_name: &str, on: bool) {
        if on {
            self.sheets
                .entry(sheet_name.to_owned())
                .or_default()
                .insert(column_name.to_owned());
        } else if let Some(columns) = self.sheets.get_mut(sheet_name) {
            columns.remove(column_name);
            if columns.is_empty() {
                self.sheets.remove(sheet_name);
            }
        }
    }

    pub fn toggle(&mut self, sheet_name: &str, column_name: &str) {
        let on = !self.is_selected(sheet_name, column_name);
        self.set(sheet_name, column_name, on);
    }

    /// Selects or deselects every catalog column of the named sheets. An empty list means
    /// every sheet in the catalog.
    pub fn set_all(&mut self, catalog: &ColumnCatalog, sheet_names: &[&str], on: bool) {
        for (sheet_name, column_name) in catalog.entries() {
            if sheet_names.is_empty() || sheet_names.iter().any(|name| *name == sheet_name) {
                self.set(sheet_name, column_name, on);
            }
        }
    }

    /// Selects or deselects the catalog columns whose name contains `filter`, ignoring case.
    /// A blank filter changes nothing.
    pub fn set_filtered(&mut self, catalog: &ColumnCatalog, filter: &str, on: bool) {
        if filter.is_empty() {
            return;
        }
        for (sheet_name, columns) in catalog.visible(filter) {
            for column_name in columns {
                self.set(sheet_name, column_name, on);
            }
        }
    }

    /// Selects `column_name` in every catalog sheet that has it.
    pub fn mark_same_name(&mut self, catalog: &ColumnCatalog, column_name: &str) {
        for sheet_name in catalog.sheets_with(column_name) {
            self.set(sheet_name, column_name, true);
        }
    }

    /// Deselects `column_name` in every sheet.
    pub fn remove_everywhere(&mut self, column_name: &str) {
        for columns in self.sheets.values_mut() {
            columns.remove(column_name);
        }
        self.sheets.retain(|_, columns| !columns.is_empty());
    }
}

/// Columns available for selection: per sheet, the columns seen in the current results.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ColumnCatalog {
    sheets: BTreeMap<String, BTreeSet<String>>,
}

impl ColumnCatalog {
    pub fn from_records(records: &[Arc<MatchRecord>]) -> ColumnCatalog {
        let mut sheets: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for record in records {
            sheets
                .entry(record.sheet_name().to_owned())
                .or_default()
                .extend(record.columns().iter().cloned());
        }
        ColumnCatalog { sheets }
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    pub fn sheet_names(&self) -> impl Iterator<Item = &str> {
        self.sheets.keys().map(String::as_str)
    }

    pub fn columns(&self, sheet_name: &str) -> Vec<&str> {
        self.sheets
            .get(sheet_name)
            .map(|columns| columns.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// `(sheet, column)` pairs sorted by sheet then column.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.sheets
            .iter()
            .flat_map(|(sheet, columns)| columns.iter().map(move |column| (sheet.as_str(), column.as_str())))
    }

    /// Sheets having a column with exactly this name.
    pub fn sheets_with<'a>(&'a self, column_name: &'a str) -> impl Iterator<Item = &'a str> {
        self.sheets
            .iter()
            .filter(move |(_, columns)| columns.contains(column_name))
            .map(|(sheet, _)| sheet.as_str())
    }

    /// Columns whose name contains `filter` (ignoring case), grouped by sheet.
    /// Sheets without any such column are left out; a blank filter shows everything.
    pub fn visible(&self, filter: &str) -> Vec<(&str, Vec<&str>)> {
        let filter = filter.to_lowercase();
        self.sheets
            .iter()
            .filter_map(|(sheet, columns)| {
                let columns: Vec<&str> = columns
                    .iter()
                    .map(String::as_str)
                    .filter(|column| column.to_lowercase().contains(&filter))
                    .collect();
                (!columns.is_empty()).then_some((sheet.as_str(), columns))
            })
            .collect()
    }
}

/// An editable copy of the applied selection.
///
/// Edits stay local to the draft until [`SelectionDraft::apply`]; [`SelectionDraft::cancel`]
/// hands back the selection the draft started from.
#[derive(Clone, Debug)]
pub struct SelectionDraft {
    original: ColumnSelection,
    edited: ColumnSelection,
    catalog: ColumnCatalog,
}

impl SelectionDraft {
    pub fn new(selection: ColumnSelection, catalog: ColumnCatalog) -> SelectionDraft {
        SelectionDraft {
            original: selection.clone(),
            edited: selection,
            catalog,
        }
    }

    pub fn catalog(&self) -> &ColumnCatalog {
        &self.catalog
    }

    /// The selection as edited so far.
    pub fn selection(&self) -> &ColumnSelection {
        &self.edited
    }

    pub fn set(&mut self, sheet_name: &str, column_name: &str, on: bool) {
        self.edited.set(sheet_name, column_name, on);
    }

    pub fn toggle(&mut self, sheet_name: &str, column_name: &str) {
        self.edited.toggle(sheet_name, column_name);
    }

    pub fn set_all(&mut self, sheet_names: &[&str], on: bool) {
        self.edited.set_all(&self.catalog, sheet_names, on);
    }

    pub fn set_filtered(&mut self, filter: &str, on: bool) {
        self.edited.set_filtered(&self.catalog, filter, on);
    }

    pub fn mark_same_name(&mut self, column_name: &str) {
        self.edited.mark_same_name(&self.catalog, column_name);
    }

    pub fn remove_everywhere(&mut self, column_name: &str) {
        self.edited.remove_everywhere(column_name);
    }

    pub fn apply(self) -> ColumnSelection {
        self.edited
    }

    pub fn cancel(self) -> ColumnSelection {
        self.original
    }
}
