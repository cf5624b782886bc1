use std::path::Path;
use std::path::PathBuf;
use thiserror::Error;

/// Aggregate error for the file readers.
/// Collects failures from the standard library, the archive/XML/CSV stacks and the helper modules
/// so that reader code can propagate everything with `?`.
#[derive(Error, Debug)]
pub enum RustySeekError {
    #[error("{0}")]
    WithContextError(String),

    // Standard library errors
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    ParseIntError(#[from] std::num::ParseIntError),

    #[error("{0}")]
    ParseFloatError(#[from] std::num::ParseFloatError),

    // Third-party library errors
    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("{0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("{0}")]
    XmlEncodingError(#[from] quick_xml::encoding::EncodingError),

    #[error("{0}")]
    XmlAttributeError(#[from] quick_xml::events::attributes::AttrError),

    #[error("{0}")]
    CsvError(#[from] csv::Error),

    // Helper module errors
    #[error("{0}")]
    CfbHelperError(#[from] crate::helpers::cfb::CfbError),

    #[error("{0}")]
    XmlHelperError(#[from] crate::helpers::xml::XmlError),

    #[error("{0}")]
    Biff8HelperError(#[from] crate::helpers::biff8::Biff8Error),

    // Source module errors
    #[error("{0}")]
    SpreadsheetError(#[from] crate::source::SpreadsheetError),

    #[error("{0}")]
    XlsError(#[from] crate::source::xls::XlsError),

    #[error("{0}")]
    DelimitedError(#[from] crate::source::delimited::DelimitedError),
}

/// Failure to turn a file into a `TabularSource`.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Cannot read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported file type '{}' (expected .csv, .tsv, .txt, .xlsx, .xlsm or .xls)", .0.display())]
    UnsupportedExtension(PathBuf),

    #[error("Failed to parse '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: RustySeekError,
    },

    #[error("Loader for '{}' stopped unexpectedly: {message}", path.display())]
    Worker { path: PathBuf, message: String },
}

impl LoadError {
    /// Attaches the failing path to a reader error, keeping plain I/O failures distinguishable.
    pub(crate) fn from_reader(path: &Path, error: RustySeekError) -> Self {
        match error {
            RustySeekError::IoError(source) => LoadError::Io {
                path: path.to_path_buf(),
                source,
            },
            source => LoadError::Parse {
                path: path.to_path_buf(),
                source,
            },
        }
    }
}

/// Failure of one sheet's search.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Sheet '{0}' is not loaded")]
    SheetNotFound(String),

    #[error("No file is loaded")]
    NothingLoaded,

    #[error("Search query is empty")]
    EmptyQuery,

    #[error("Sheet '{sheet}' row {row} has {actual} cells but the sheet has {expected} columns")]
    RaggedRow {
        sheet: String,
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Search of sheet '{sheet}' stopped unexpectedly: {message}")]
    WorkerFailed { sheet: String, message: String },
}

/// Failure to write an export file.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Cannot write '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV serialization failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("Spreadsheet serialization failed: {0}")]
    Spreadsheet(#[from] rust_xlsxwriter::XlsxError),

    #[error("Result set of {rows} rows and {columns} columns does not fit in one worksheet")]
    SheetLimit { rows: usize, columns: usize },

    #[error("Unknown export format '{0}' (expected json, csv or xlsx)")]
    UnknownFormat(String),

    #[error("Export stopped unexpectedly: {0}")]
    Worker(String),
}

pub(crate) trait ResultOptionChain {
    fn ok_none_else<F>(self, f: F) -> Self
    where
        F: FnOnce() -> Self;
}

impl<T, E> ResultOptionChain for Result<Option<T>, E> {
    fn ok_none_else<F>(self, f: F) -> Self
    where
        F: FnOnce() -> Self,
    {
        match self {
            Ok(None) => f(),
            _ => self,
        }
    }
}

pub(crate) trait ResultMessage {
    fn with_prefix(self, message: &str) -> Self;
}

impl<T> ResultMessage for Result<T, RustySeekError> {
    fn with_prefix(self, message: &str) -> Self {
        self.map_err(|e| RustySeekError::WithContextError(format!("{}: {}", message, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_prefix_keeps_the_cause() {
        let result: Result<(), RustySeekError> =
            Err(std::io::Error::new(std::io::ErrorKind::Other, "disk on fire").into());
        let error = result.with_prefix("Sheet 'Data'").unwrap_err();
        assert_eq!(error.to_string(), "Sheet 'Data': disk on fire");
    }

    #[test]
    fn ok_none_else_falls_back_only_on_none() {
        let first: Result<Option<u8>, ()> = Ok(None);
        assert_eq!(first.ok_none_else(|| Ok(Some(2))), Ok(Some(2)));
        let second: Result<Option<u8>, ()> = Ok(Some(1));
        assert_eq!(second.ok_none_else(|| Ok(Some(2))), Ok(Some(1)));
    }

    #[test]
    fn load_error_separates_io_from_parse() {
        let path = Path::new("data.csv");
        let io = LoadError::from_reader(
            path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing").into(),
        );
        assert!(matches!(io, LoadError::Io { .. }));
        let parse = LoadError::from_reader(path, RustySeekError::WithContextError("bad".to_owned()));
        assert!(matches!(parse, LoadError::Parse { .. }));
        assert!(parse.to_string().contains("data.csv"));
    }
}
