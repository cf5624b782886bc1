//! # Exporters
//!
//! Writes the accumulated results, projected through the column selection, as JSON, CSV or a
//! single-sheet xlsx workbook. All formats share the header list from
//! [`all_headers`](crate::projection::all_headers) and the rows from
//! [`project`](crate::projection::project).
//!
//! A document is rendered fully in memory, written to a temporary file next to the destination
//! and then renamed over it, so an existing destination is either replaced whole or left alone.
mod delimited;
mod json;
mod spreadsheet;

use crate::error::ExportError;
use crate::projection::all_headers;
use crate::projection::project;
use crate::projection::ColumnSelection;
use crate::projection::ProjectedRow;
use crate::search::MatchRecord;
use crate::table::Value;
use std::ffi::OsStr;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::info;

/// Output document kinds.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
    Xlsx,
}

impl ExportFormat {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Xlsx => "xlsx",
        }
    }

    /// Parses a format name (case-insensitive):
    /// - Json: "json"
    /// - Csv: "csv"
    /// - Xlsx: "xlsx", "excel", "spreadsheet"
    pub fn parse(name: &str) -> Result<Self, ExportError> {
        match name.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "xlsx" | "excel" | "spreadsheet" => Ok(Self::Xlsx),
            _ => Err(ExportError::UnknownFormat(name.to_owned())),
        }
    }

    /// Infers the format from the destination's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(OsStr::to_str)
            .and_then(|extension| Self::parse(extension).ok())
    }

    fn render(&self, table: &ExportTable) -> Result<Vec<u8>, ExportError> {
        match self {
            Self::Json => json::render(table),
            Self::Csv => delimited::render(table),
            Self::Xlsx => spreadsheet::render(table),
        }
    }
}

/// Records and selection captured together for one export.
#[derive(Clone, Debug, Default)]
pub struct ExportSnapshot {
    records: Vec<Arc<MatchRecord>>,
    selection: ColumnSelection,
}

impl ExportSnapshot {
    pub fn new(records: Vec<Arc<MatchRecord>>, selection: ColumnSelection) -> ExportSnapshot {
        ExportSnapshot { records, selection }
    }

    pub fn records(&self) -> &[Arc<MatchRecord>] {
        &self.records
    }

    pub fn selection(&self) -> &ColumnSelection {
        &self.selection
    }

    /// Projects every record and computes the shared header list.
    pub fn table(&self) -> ExportTable {
        ExportTable {
            headers: all_headers(&self.records, &self.selection),
            rows: self
                .records
                .iter()
                .map(|record| project(record, &self.selection))
                .collect(),
        }
    }
}

/// Headers and projected rows, ready to be written.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExportTable {
    headers: Vec<String>,
    rows: Vec<ProjectedRow>,
}

impl ExportTable {
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[ProjectedRow] {
        &self.rows
    }

    /// Cells of one row in header order; `None` where the row lacks a header.
    pub fn cells<'a>(&'a self, row: &'a ProjectedRow) -> impl Iterator<Item = Option<&'a Value>> + 'a {
        self.headers.iter().map(move |header| row.get(header))
    }
}

/// Renders the snapshot and replaces `destination` with it.
///
/// Blocks on file I/O; the engine calls it from the blocking pool.
pub fn export_to_path(snapshot: &ExportSnapshot, format: ExportFormat, destination: &Path) -> Result<(), ExportError> {
    let table = snapshot.table();
    let bytes = format.render(&table)?;
    write_atomically(destination, &bytes)?;
    info!(
        path = %destination.display(),
        format = format.as_str(),
        rows = table.rows().len(),
        "export written"
    );
    Ok(())
}

fn write_atomically(destination: &Path, bytes: &[u8]) -> Result<(), ExportError> {
    let io_error = |source| ExportError::Io {
        path: destination.to_path_buf(),
        source,
    };
    // `parent` is `Some("")` for bare file names
    let directory = destination
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut file = NamedTempFile::new_in(directory).map_err(io_error)?;
    file.write_all(bytes).map_err(io_error)?;
    file.as_file().sync_all().map_err(io_error)?;
    file.persist(destination).map_err(|error| io_error(error.error))?;
    Ok(())
}
