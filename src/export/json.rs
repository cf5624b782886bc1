use crate::error::ExportError;
use crate::export::ExportTable;
use crate::projection::ProjectedRow;
use crate::table::Value;
use serde::ser::SerializeMap;
use serde::ser::SerializeSeq;
use serde::Serialize;
use serde::Serializer;

// A header the row lacks is written as an empty string.
const MISSING: Value = Value::String(String::new());

struct Document<'a>(&'a ExportTable);

struct Row<'a> {
    table: &'a ExportTable,
    row: &'a ProjectedRow,
}

impl Serialize for Document<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.0.rows().len()))?;
        for row in self.0.rows() {
            seq.serialize_element(&Row { table: self.0, row })?;
        }
        seq.end()
    }
}

impl Serialize for Row<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.table.headers().len()))?;
        for (header, value) in self.table.headers().iter().zip(self.table.cells(self.row)) {
            map.serialize_entry(header, value.unwrap_or(&MISSING))?;
        }
        map.end()
    }
}

/// An array of objects with keys in header order, indented by two spaces.
pub(super) fn render(table: &ExportTable) -> Result<Vec<u8>, ExportError> {
    Ok(serde_json::to_vec_pretty(&Document(table))?)
}
