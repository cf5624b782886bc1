//! # Tabular Source Loader
//!
//! Turns a file on disk into one in-memory [`Table`] per sheet. The file kind is detected
//! purely from its extension:
//!
//! - `.csv`, `.tsv`, `.txt` - delimited text, loaded as a single sheet named `Sheet1`
//! - `.xlsx`, `.xlsm` - Office Open XML workbooks
//! - `.xls` - BIFF8 workbooks stored in an OLE compound file
//!
//! Every sheet is read eagerly and kept behind an `Arc` so searches can share it across
//! worker threads without copying.
pub(crate) mod cell;
pub mod delimited;
pub(crate) mod excel;
pub(crate) mod reference;
pub(crate) mod sheet;
pub mod xls;
pub(crate) mod xlsx;

use crate::error::LoadError;
use crate::error::ResultMessage;
use crate::error::RustySeekError;
use crate::error::SearchError;
use crate::search::search_table;
use crate::search::MatchRecord;
use crate::source::delimited::DelimitedWorkbook;
use crate::source::xls::XlsWorkbook;
use crate::source::xlsx::XlsxWorkbook;
use crate::table::Schema;
use crate::table::Table;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Structural problems shared by the workbook readers.
#[derive(Error, Debug)]
pub enum SpreadsheetError {
    #[error("Missing part '{0}'")]
    FileError(String),

    #[error("Spreadsheet '{0}' has no worksheets")]
    SpreadsheetEmptyError(String),

    #[error("Spreadsheet '{0}' is password protected")]
    SpreadsheetPasswordProtectedError(String),

    #[error("Invalid value '{1}' in cell {0}")]
    CellValueError(String, String),

    #[error("Invalid cell reference '{0}'")]
    CellReferenceError(String),
}

/// A workbook whose sheets can be read one at a time by position.
pub(crate) trait Workbook {
    /// Sheet names in workbook order.
    fn sheet_names(&self) -> Vec<String>;

    /// Reads the sheet at `index` (zero-based, in `sheet_names` order) into a table.
    fn read_sheet(&mut self, index: usize) -> Result<Table, RustySeekError>;
}

/// File kinds the loader understands.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SourceKind {
    Delimited,
    Xlsx,
    Xls,
}

impl SourceKind {
    /// Detects the kind from the file extension, ignoring case.
    pub fn detect(path: &Path) -> Option<Self> {
        let extension = path.extension().and_then(OsStr::to_str)?.to_ascii_lowercase();
        match extension.as_str() {
            "csv" | "tsv" | "txt" => Some(Self::Delimited),
            "xlsx" | "xlsm" => Some(Self::Xlsx),
            "xls" => Some(Self::Xls),
            _ => None,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Delimited => "delimited",
            Self::Xlsx => "xlsx",
            Self::Xls => "xls",
        }
    }

    fn open(&self, path: &Path) -> Result<Box<dyn Workbook>, RustySeekError> {
        Ok(match self {
            Self::Delimited => Box::new(DelimitedWorkbook::open(path)?),
            Self::Xlsx => Box::new(XlsxWorkbook::open(path)?),
            Self::Xls => Box::new(XlsWorkbook::open(path)?),
        })
    }
}

struct LoadedSheet {
    table: Arc<Table>,
    schema: Schema,
}

/// One loaded file: its sheets in workbook order with their tables and schemas.
pub struct TabularSource {
    path: PathBuf,
    sheet_names: Vec<String>,
    sheets: HashMap<String, LoadedSheet>,
}

impl TabularSource {
    /// Loads every sheet of the file at `path`.
    ///
    /// This call blocks on file I/O and parsing; the engine runs it on the blocking pool.
    ///
    /// # Errors
    ///
    /// * [`LoadError::UnsupportedExtension`] when the extension is not recognized
    /// * [`LoadError::Io`] when the file cannot be read
    /// * [`LoadError::Parse`] when any sheet fails to decode
    pub fn load(path: impl AsRef<Path>) -> Result<TabularSource, LoadError> {
        let path = path.as_ref();
        let kind = SourceKind::detect(path).ok_or_else(|| LoadError::UnsupportedExtension(path.to_path_buf()))?;
        debug!(path = %path.display(), kind = kind.as_str(), "loading tabular source");

        let mut workbook = kind.open(path).map_err(|error| LoadError::from_reader(path, error))?;
        let mut sheet_names = Vec::new();
        let mut sheets = HashMap::new();
        for (index, name) in workbook.sheet_names().into_iter().enumerate() {
            let table = workbook
                .read_sheet(index)
                .with_prefix(&format!("Sheet '{name}'"))
                .map_err(|error| LoadError::from_reader(path, error))?;
            if sheets.contains_key(&name) {
                debug!(sheet = %name, "skipping sheet with a repeated name");
                continue;
            }
            debug!(sheet = %name, rows = table.len(), columns = table.columns().len(), "sheet loaded");
            let schema = Schema::infer(&table);
            sheets.insert(
                name.clone(),
                LoadedSheet {
                    table: Arc::new(table),
                    schema,
                },
            );
            sheet_names.push(name);
        }

        Ok(TabularSource {
            path: path.to_path_buf(),
            sheet_names,
            sheets,
        })
    }

    /// Wraps already-built tables, mostly useful for tests and embedding.
    pub fn from_tables<I>(path: impl Into<PathBuf>, tables: I) -> TabularSource
    where
        I: IntoIterator<Item = (String, Table)>,
    {
        let mut sheet_names = Vec::new();
        let mut sheets = HashMap::new();
        for (name, table) in tables {
            if sheets.contains_key(&name) {
                continue;
            }
            let schema = Schema::infer(&table);
            sheets.insert(
                name.clone(),
                LoadedSheet {
                    table: Arc::new(table),
                    schema,
                },
            );
            sheet_names.push(name);
        }
        TabularSource {
            path: path.into(),
            sheet_names,
            sheets,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sheet_names(&self) -> &[String] {
        &self.sheet_names
    }

    pub fn table(&self, sheet_name: &str) -> Option<&Arc<Table>> {
        self.sheets.get(sheet_name).map(|sheet| &sheet.table)
    }

    pub fn schema(&self, sheet_name: &str) -> Option<&Schema> {
        self.sheets.get(sheet_name).map(|sheet| &sheet.schema)
    }

    /// Runs a case-insensitive substring search over one sheet.
    pub fn search(&self, sheet_name: &str, query: &str) -> Result<Vec<MatchRecord>, SearchError> {
        let table = self
            .table(sheet_name)
            .ok_or_else(|| SearchError::SheetNotFound(sheet_name.to_owned()))?;
        search_table(sheet_name, table, query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::ColumnType;
    use crate::table::Value;
    use rust_xlsxwriter::Workbook as XlsxWriter;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    /// A one-sheet workbook holding only the parts the reader needs.
    fn minimal_xlsx(sheet_data: &str) -> NamedTempFile {
        let file = tempfile::Builder::new().suffix(".xlsx").tempfile().unwrap();
        let mut zip = ZipWriter::new(file.reopen().unwrap());
        let parts = [
            (
                "xl/workbook.xml",
                r#"<workbook xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Data" sheetId="1" r:id="rId1"/></sheets></workbook>"#.to_owned(),
            ),
            (
                "xl/_rels/workbook.xml.rels",
                r#"<Relationships><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#.to_owned(),
            ),
            ("xl/worksheets/sheet1.xml", format!("<worksheet><sheetData>{sheet_data}</sheetData></worksheet>")),
        ];
        for (name, contents) in parts {
            zip.start_file(name, SimpleFileOptions::default()).unwrap();
            zip.write_all(contents.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
        file
    }

    #[test]
    fn detects_kind_from_extension() {
        assert_eq!(SourceKind::detect(Path::new("a.CSV")), Some(SourceKind::Delimited));
        assert_eq!(SourceKind::detect(Path::new("a.tsv")), Some(SourceKind::Delimited));
        assert_eq!(SourceKind::detect(Path::new("a.txt")), Some(SourceKind::Delimited));
        assert_eq!(SourceKind::detect(Path::new("dir/a.Xlsm")), Some(SourceKind::Xlsx));
        assert_eq!(SourceKind::detect(Path::new("a.xls")), Some(SourceKind::Xls));
        assert_eq!(SourceKind::detect(Path::new("a.ods")), None);
        assert_eq!(SourceKind::detect(Path::new("no_extension")), None);
    }

    #[test]
    fn loads_delimited_file_as_one_sheet() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(b"Name;Age\nAlice;30\n").unwrap();

        let source = TabularSource::load(file.path()).unwrap();
        assert_eq!(source.sheet_names(), ["Sheet1"]);
        assert_eq!(source.path(), file.path());
        let table = source.table("Sheet1").unwrap();
        assert_eq!(table.rows()[0].as_ref(), [Value::from("Alice"), Value::Number(30.0)]);
        let schema = source.schema("Sheet1").unwrap();
        assert_eq!(schema.column("Age").map(|column| column.kind), Some(ColumnType::BigInt));
    }

    #[test]
    fn loads_workbook_sheets_in_order() {
        let mut writer = XlsxWriter::new();
        for name in ["Zeta", "Alpha"] {
            let sheet = writer.add_worksheet();
            sheet.set_name(name).unwrap();
            sheet.write_string(0, 0, "Key").unwrap();
            sheet.write_string(1, 0, name).unwrap();
        }
        let file = tempfile::Builder::new().suffix(".xlsx").tempfile().unwrap();
        writer.save(file.path()).unwrap();

        let source = TabularSource::load(file.path()).unwrap();
        assert_eq!(source.sheet_names(), ["Zeta", "Alpha"]);
        assert_eq!(source.table("Alpha").unwrap().rows()[0].as_ref(), [Value::from("Alpha")]);
    }

    #[test]
    fn reports_unsupported_and_missing_files() {
        let error = TabularSource::load("report.ods").err().unwrap();
        assert!(matches!(error, LoadError::UnsupportedExtension(_)));

        let dir = tempfile::tempdir().unwrap();
        let error = TabularSource::load(dir.path().join("missing.csv")).err().unwrap();
        assert!(matches!(error, LoadError::Io { .. }));
        assert!(error.to_string().contains("missing.csv"));
    }

    #[test]
    fn reports_malformed_files_with_path() {
        let mut file = tempfile::Builder::new().suffix(".xlsx").tempfile().unwrap();
        file.write_all(b"Name,Age\n").unwrap();
        let error = TabularSource::load(file.path()).err().unwrap();
        assert!(matches!(error, LoadError::Parse { .. }));
    }

    #[test]
    fn rejects_cells_outside_the_worksheet_grid() {
        let sane = minimal_xlsx(
            r#"<row r="1"><c r="A1" t="inlineStr"><is><t>Name</t></is></c></row><row r="3"><c r="A3" t="inlineStr"><is><t>Bob</t></is></c></row>"#,
        );
        let source = TabularSource::load(sane.path()).unwrap();
        assert_eq!(source.table("Data").unwrap().len(), 2);

        for sheet_data in [
            r#"<row r="1"><c r="A1" t="inlineStr"><is><t>Name</t></is></c></row><row r="2"><c r="A999999999999999999" t="inlineStr"><is><t>Bob</t></is></c></row>"#,
            r#"<row r="1"><c r="A1" t="inlineStr"><is><t>Name</t></is></c></row><row r="100000000"><c t="inlineStr"><is><t>Bob</t></is></c></row>"#,
            r#"<row r="1"><c r="XFE1" t="inlineStr"><is><t>Name</t></is></c></row>"#,
        ] {
            let file = minimal_xlsx(sheet_data);
            let error = TabularSource::load(file.path()).err().unwrap();
            assert!(matches!(error, LoadError::Parse { .. }), "{error}");
            assert!(error.to_string().contains("Invalid cell reference"), "{error}");
        }
    }

    #[test]
    fn searches_loaded_sheets_by_name() {
        let table = Table::new(vec!["Name".to_owned()], vec![vec![Value::from("Bob")]]);
        let source = TabularSource::from_tables("memory.csv", [("Sheet1".to_owned(), table)]);
        assert_eq!(source.search("Sheet1", "B").unwrap().len(), 1);
        assert!(matches!(source.search("Other", "B"), Err(SearchError::SheetNotFound(_))));
    }
}
