//! # Rusty Seek
//!
//! A local search engine for tabular files. It loads a delimited text file or a multi-sheet
//! workbook into memory, runs case-insensitive substring queries across one or all sheets
//! concurrently, accumulates the matches, and exports them under a chosen set of columns.
//!
//! ## Features
//!
//! - **File formats**: delimited text (`.csv`, `.tsv`, `.txt`) with delimiter detection, Office
//!   Open XML workbooks (`.xlsx`, `.xlsm`) and legacy Excel workbooks (`.xls`)
//! - **Typed cells**: strings, numbers, booleans and nulls, with date and time cells rendered
//!   ISO-style from the workbook's number formats
//! - **Concurrent search**: one task per sheet on a tokio runtime, bounded by a semaphore, with
//!   completions reported through a channel
//! - **Column projection**: per-sheet column selection edited through an apply/cancel draft
//! - **Export**: JSON, CSV or single-sheet xlsx, written atomically
//!
//! ## Example
//!
//! ```no_run
//! use rusty_seek::{Engine, EngineConfig, ExportFormat};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let (engine, mut events) = Engine::new(EngineConfig::default(), tokio::runtime::Handle::current());
//! engine.load("people.csv").await?;
//! let batch = engine.search_all("bob");
//! for _ in 0..batch.len() {
//!     if let Some(event) = events.recv().await {
//!         println!("{event:?}");
//!     }
//! }
//! engine.export(ExportFormat::Json, "matches.json").await?;
//! # Ok(())
//! # }
//! ```
pub mod config;
pub mod error;
pub mod export;
mod helpers;
pub mod projection;
pub mod search;
pub mod source;
pub mod table;

pub use config::EngineConfig;
pub use error::ExportError;
pub use error::LoadError;
pub use error::SearchError;
pub use export::ExportFormat;
pub use projection::ColumnCatalog;
pub use projection::ColumnSelection;
pub use projection::SelectionDraft;
pub use search::Engine;
pub use search::MatchRecord;
pub use search::SearchBatch;
pub use search::SearchEvent;
pub use search::SearchHandle;
pub use source::TabularSource;
pub use table::Schema;
pub use table::Table;
pub use table::Value;
