//! Delimited text files (`.csv`, `.tsv`, `.txt`).

use crate::error::RustySeekError;
use crate::source::Workbook;
use crate::source::SpreadsheetError;
use crate::table::unique_headers;
use crate::table::Table;
use crate::table::Value;
use encoding_rs::UTF_8;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

/// Name of the single sheet a delimited file loads as.
pub const DELIMITED_SHEET_NAME: &str = "Sheet1";

// Checked in this order against the first line only
const DELIMITERS: [u8; 3] = [b';', b',', b'\t'];

#[derive(Error, Debug)]
pub enum DelimitedError {
    #[error("File is not valid UTF-8 text")]
    EncodingError,

    #[error("Line {line} has {actual} fields but the header has {expected}")]
    TooManyFieldsError { line: u64, expected: usize, actual: usize },
}

/// Picks the first of `;`, `,` and tab present in the first line, defaulting to `,`.
pub(crate) fn detect_delimiter(text: &str) -> u8 {
    let first_line = text.lines().next().unwrap_or_default();
    DELIMITERS
        .into_iter()
        .find(|delimiter| first_line.as_bytes().contains(delimiter))
        .unwrap_or(b',')
}

/// A delimited file parsed into its single table.
pub(crate) struct DelimitedWorkbook {
    table: Option<Table>,
}

impl DelimitedWorkbook {
    pub(crate) fn open(path: &Path) -> Result<Self, RustySeekError> {
        Self::from_reader(std::fs::File::open(path)?)
    }

    pub(crate) fn from_reader<R: Read>(mut reader: R) -> Result<Self, RustySeekError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(&bytes);
        let text = UTF_8
            .decode_without_bom_handling_and_without_replacement(bytes)
            .ok_or(DelimitedError::EncodingError)?;
        Ok(DelimitedWorkbook {
            table: Some(parse(&text)?),
        })
    }
}

impl Workbook for DelimitedWorkbook {
    fn sheet_names(&self) -> Vec<String> {
        vec![DELIMITED_SHEET_NAME.to_owned()]
    }

    fn read_sheet(&mut self, index: usize) -> Result<Table, RustySeekError> {
        match (index, self.table.take()) {
            (0, Some(table)) => Ok(table),
            _ => Err(SpreadsheetError::FileError(format!("sheet #{index}")))?,
        }
    }
}

/// Parses the text with the first record as header.
/// Blank lines are skipped; short records are padded with nulls.
fn parse(text: &str) -> Result<Table, RustySeekError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(detect_delimiter(text))
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut records = reader.records();
    let Some(header) = records.next().transpose()? else {
        return Ok(Table::default());
    };
    let columns = unique_headers(header.iter().map(str::to_owned));

    let mut rows = Vec::new();
    for record in records {
        let record = record?;
        if record.len() > columns.len() {
            Err(DelimitedError::TooManyFieldsError {
                line: record.position().map(|position| position.line()).unwrap_or_default(),
                expected: columns.len(),
                actual: record.len(),
            })?;
        }
        let mut row: Vec<Value> = record.iter().map(Value::infer).collect();
        row.resize(columns.len(), Value::Null);
        rows.push(row);
    }
    Ok(Table::new(columns, rows))
}
