use crate::error::ExportError;
use crate::export::ExportTable;
use crate::source::reference::MAX_COLUMNS;
use crate::source::reference::MAX_ROWS;
use crate::table::Value;
use rust_xlsxwriter::Workbook;

const SHEET_NAME: &str = "Sheet1";

/// One worksheet holding the header row and a row per match.
/// Cells keep their string, number or boolean type; null and missing cells stay blank.
pub(super) fn render(table: &ExportTable) -> Result<Vec<u8>, ExportError> {
    let rows = table.rows().len() + 1;
    let columns = table.headers().len();
    if rows > MAX_ROWS || columns > MAX_COLUMNS {
        Err(ExportError::SheetLimit { rows, columns })?;
    }

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;
    for (col, header) in (0u16..).zip(table.headers()) {
        worksheet.write_string(0, col, header)?;
    }
    for (row, projected) in (1u32..).zip(table.rows()) {
        for (col, value) in (0u16..).zip(table.cells(projected)) {
            match value {
                Some(Value::String(text)) => {
                    worksheet.write_string(row, col, text)?;
                }
                Some(Value::Number(number)) if number.is_finite() => {
                    worksheet.write_number(row, col, *number)?;
                }
                Some(Value::Boolean(flag)) => {
                    worksheet.write_boolean(row, col, *flag)?;
                }
                _ => {}
            }
        }
    }
    Ok(workbook.save_to_buffer()?)
}
