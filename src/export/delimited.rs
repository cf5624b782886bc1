use crate::error::ExportError;
use crate::export::ExportTable;

/// Comma-separated text with a header row, UTF-8 without a byte-order mark.
pub(super) fn render(table: &ExportTable) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(table.headers())?;
    for row in table.rows() {
        writer.write_record(
            table
                .cells(row)
                .map(|value| value.map(ToString::to_string).unwrap_or_default()),
        )?;
    }
    Ok(writer
        .into_inner()
        .map_err(|error| csv::Error::from(error.into_error()))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::tests::snapshot;
    use crate::export::ExportSnapshot;
    use crate::projection::ColumnSelection;

    #[test]
    fn writes_header_then_one_line_per_match() {
        let text = String::from_utf8(render(&snapshot().table()).unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            [
                "worksheet,célula,Active,Age,City,Name",
                "Sheet1,Name1,True,30,,Alice",
                "Sheet1,Name2,,2.5,,Adão",
                "Cities,City1,,,Lisbon,",
            ]
        );
    }

    #[test]
    fn selection_narrows_columns() {
        let mut selection = ColumnSelection::default();
        selection.set("Sheet1", "Name", true);
        let snapshot = ExportSnapshot::new(snapshot().records().to_vec(), selection);

        let text = String::from_utf8(render(&snapshot.table()).unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "worksheet,célula,Name");
        assert_eq!(lines[1], "Sheet1,Name1,Alice");
        assert_eq!(lines[3], "Cities,City1,");
    }

    #[test]
    fn empty_results_write_only_the_header() {
        let table = ExportSnapshot::default().table();
        assert_eq!(render(&table).unwrap(), b"worksheet,c\xc3\xa9lula\n");
    }
}
