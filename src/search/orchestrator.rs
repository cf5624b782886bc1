//! # Search Orchestrator
//!
//! The [`Engine`] owns the loaded source, the accumulated results and the applied column
//! selection. Searches run as tokio tasks, one per sheet, with the scan itself on the blocking
//! pool. Each task appends its matches as one batch and reports through the event channel
//! returned by [`Engine::new`]; callers never wait on a search unless they choose to join it.
use crate::config::EngineConfig;
use crate::error::ExportError;
use crate::error::LoadError;
use crate::error::SearchError;
use crate::export::export_to_path;
use crate::export::ExportFormat;
use crate::projection::ColumnCatalog;
use crate::projection::ColumnSelection;
use crate::projection::SelectionDraft;
use crate::search::results::ResultStore;
use crate::search::MatchRecord;
use crate::source::TabularSource;
use crate::table::Schema;
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc::unbounded_channel;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

/// Completion notice of one sheet's search.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SearchEvent {
    Completed { sheet_name: String, match_count: usize },
    Failed { sheet_name: String, message: String },
}

impl SearchEvent {
    pub fn sheet_name(&self) -> &str {
        match self {
            Self::Completed { sheet_name, .. } | Self::Failed { sheet_name, .. } => sheet_name,
        }
    }
}

/// A running search of one sheet.
pub struct SearchHandle {
    sheet_name: String,
    handle: JoinHandle<Result<usize, SearchError>>,
}

impl SearchHandle {
    pub fn sheet_name(&self) -> &str {
        &self.sheet_name
    }

    /// Waits for the search and returns how many matches it appended.
    pub async fn join(self) -> Result<usize, SearchError> {
        let SearchHandle { sheet_name, handle } = self;
        handle.await.map_err(|error| SearchError::WorkerFailed {
            sheet: sheet_name,
            message: error.to_string(),
        })?
    }
}

/// The searches started by one [`Engine::search_all`] call.
pub struct SearchBatch {
    handles: Vec<SearchHandle>,
}

impl SearchBatch {
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn sheet_names(&self) -> impl Iterator<Item = &str> {
        self.handles.iter().map(SearchHandle::sheet_name)
    }

    /// Waits for every search, returning each sheet's outcome in sheet order.
    pub async fn join(self) -> Vec<(String, Result<usize, SearchError>)> {
        let mut outcomes = Vec::with_capacity(self.handles.len());
        for handle in self.handles {
            let sheet_name = handle.sheet_name.clone();
            outcomes.push((sheet_name, handle.join().await));
        }
        outcomes
    }
}

struct Inner {
    runtime: Handle,
    config: EngineConfig,
    source: RwLock<Option<Arc<TabularSource>>>,
    results: ResultStore,
    permits: Semaphore,
    events: UnboundedSender<SearchEvent>,
}

/// Entry point for loading, searching, selecting and exporting.
///
/// Cloning is cheap; clones share the same state.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<Inner>,
}

impl Engine {
    /// Creates an engine spawning its work on `runtime`, plus the receiver of its search events.
    pub fn new(config: EngineConfig, runtime: Handle) -> (Engine, UnboundedReceiver<SearchEvent>) {
        let (events, receiver) = unbounded_channel();
        let permits = Semaphore::new(config.max_concurrent_searches.max(1));
        let engine = Engine {
            inner: Arc::new(Inner {
                runtime,
                config,
                source: RwLock::new(None),
                results: ResultStore::default(),
                permits,
                events,
            }),
        };
        (engine, receiver)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Loads a file and replaces the current source with it.
    ///
    /// On failure the previous source stays loaded. Searches already running keep the source
    /// they started with.
    pub async fn load(&self, path: impl Into<PathBuf>) -> Result<Vec<String>, LoadError> {
        let path = path.into();
        let worker_path = path.clone();
        let source = self
            .inner
            .runtime
            .spawn_blocking(move || TabularSource::load(&worker_path))
            .await
            .map_err(|error| LoadError::Worker {
                path: path.clone(),
                message: error.to_string(),
            })??;

        let sheet_names = source.sheet_names().to_vec();
        info!(path = %path.display(), sheets = sheet_names.len(), "file loaded");
        *self.inner.source.write() = Some(Arc::new(source));
        Ok(sheet_names)
    }

    /// The currently loaded source, if any.
    pub fn source(&self) -> Option<Arc<TabularSource>> {
        self.inner.source.read().clone()
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.source()
            .map(|source| source.sheet_names().to_vec())
            .unwrap_or_default()
    }

    pub fn schema(&self, sheet_name: &str) -> Option<Schema> {
        self.source()?.schema(sheet_name).cloned()
    }

    /// Starts searching one sheet. The outcome arrives as a [`SearchEvent`].
    pub fn search_one(&self, sheet_name: &str, query: &str) -> SearchHandle {
        self.spawn_search(self.source(), sheet_name.to_owned(), Arc::from(query))
    }

    /// Starts one search per loaded sheet. Nothing loaded means an empty batch.
    pub fn search_all(&self, query: &str) -> SearchBatch {
        let Some(source) = self.source() else {
            return SearchBatch { handles: Vec::new() };
        };
        let query: Arc<str> = Arc::from(query);
        debug!(sheets = source.sheet_names().len(), "searching all sheets");
        let handles = source
            .sheet_names()
            .iter()
            .map(|sheet_name| self.spawn_search(Some(Arc::clone(&source)), sheet_name.clone(), Arc::clone(&query)))
            .collect();
        SearchBatch { handles }
    }

    fn spawn_search(&self, source: Option<Arc<TabularSource>>, sheet_name: String, query: Arc<str>) -> SearchHandle {
        let inner = Arc::clone(&self.inner);
        let task_sheet = sheet_name.clone();
        let handle = self.inner.runtime.spawn(async move {
            match run_search(&inner, source, &task_sheet, query).await {
                Ok(match_count) => {
                    info!(sheet = %task_sheet, matches = match_count, "sheet searched");
                    let _ = inner.events.send(SearchEvent::Completed {
                        sheet_name: task_sheet,
                        match_count,
                    });
                    Ok(match_count)
                }
                Err(error) => {
                    warn!(sheet = %task_sheet, %error, "sheet search failed");
                    let _ = inner.events.send(SearchEvent::Failed {
                        sheet_name: task_sheet,
                        message: error.to_string(),
                    });
                    Err(error)
                }
            }
        });
        SearchHandle { sheet_name, handle }
    }

    /// Snapshot of the accumulated matches.
    pub fn results(&self) -> Vec<Arc<MatchRecord>> {
        self.inner.results.snapshot()
    }

    pub fn result_count(&self) -> usize {
        self.inner.results.len()
    }

    /// Drops every accumulated match. The selection is kept.
    pub fn clear_results(&self) {
        self.inner.results.clear();
        debug!("results cleared");
    }

    pub fn selection(&self) -> ColumnSelection {
        self.inner.results.selection()
    }

    pub fn set_selection(&self, selection: ColumnSelection) {
        self.inner.results.set_selection(selection);
    }

    /// Starts editing the selection against the columns of the current results.
    pub fn begin_selection(&self) -> SelectionDraft {
        let catalog = ColumnCatalog::from_records(&self.results());
        SelectionDraft::new(self.selection(), catalog)
    }

    /// Writes the current results, projected through the selection, to `destination`.
    pub async fn export(&self, format: ExportFormat, destination: impl Into<PathBuf>) -> Result<(), ExportError> {
        let destination = destination.into();
        let snapshot = self.inner.results.export_snapshot();
        let worker_destination = destination.clone();
        let result = self
            .inner
            .runtime
            .spawn_blocking(move || export_to_path(&snapshot, format, &worker_destination))
            .await
            .map_err(|error| ExportError::Worker(error.to_string()))
            .and_then(|result| result);
        if let Err(error) = &result {
            error!(path = %destination.display(), format = format.as_str(), %error, "export failed");
        }
        result
    }
}

async fn run_search(
    inner: &Inner,
    source: Option<Arc<TabularSource>>,
    sheet_name: &str,
    query: Arc<str>,
) -> Result<usize, SearchError> {
    let source = source.ok_or(SearchError::NothingLoaded)?;
    let worker_failed = |message: String| SearchError::WorkerFailed {
        sheet: sheet_name.to_owned(),
        message,
    };
    let _permit = inner
        .permits
        .acquire()
        .await
        .map_err(|error| worker_failed(error.to_string()))?;

    debug!(sheet = sheet_name, "scanning sheet");
    let sheet = sheet_name.to_owned();
    let matches = tokio::task::spawn_blocking(move || source.search(&sheet, &query))
        .await
        .map_err(|error| worker_failed(error.to_string()))??;
    let match_count = matches.len();
    inner.results.append_batch(matches);
    Ok(match_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Table;
    use crate::table::Value;

    fn column(name: &str, values: &[&str]) -> Table {
        Table::new(vec![name.to_owned()], values.iter().map(|value| vec![Value::from(*value)]).collect())
    }

    fn engine_with(tables: Vec<(&str, Table)>, jobs: usize) -> (Engine, UnboundedReceiver<SearchEvent>) {
        let config = EngineConfig::default().with_max_concurrent_searches(jobs);
        let (engine, events) = Engine::new(config, Handle::current());
        let source = TabularSource::from_tables(
            "memory",
            tables.into_iter().map(|(name, table)| (name.to_owned(), table)),
        );
        *engine.inner.source.write() = Some(Arc::new(source));
        (engine, events)
    }

    fn three_sheets() -> Vec<(&'static str, Table)> {
        vec![
            ("A", column("Word", &["needle", "hay"])),
            ("B", column("Word", &["hay", "hay", "straw"])),
            ("C", column("Word", &["NEEDLE"])),
        ]
    }

    #[tokio::test]
    async fn search_all_merges_every_sheet() {
        let (engine, mut events) = engine_with(three_sheets(), 2);
        let batch = engine.search_all("needle");
        assert_eq!(batch.sheet_names().collect::<Vec<_>>(), ["A", "B", "C"]);

        let outcomes = batch.join().await;
        let counts: Vec<usize> = outcomes.into_iter().map(|(_, outcome)| outcome.unwrap()).collect();
        assert_eq!(counts, [1, 0, 1]);
        assert_eq!(engine.result_count(), 2);

        let mut completed = Vec::new();
        for _ in 0..3 {
            completed.push(events.recv().await.unwrap());
        }
        completed.sort_by(|a, b| a.sheet_name().cmp(b.sheet_name()));
        assert_eq!(
            completed,
            [
                SearchEvent::Completed { sheet_name: "A".to_owned(), match_count: 1 },
                SearchEvent::Completed { sheet_name: "B".to_owned(), match_count: 0 },
                SearchEvent::Completed { sheet_name: "C".to_owned(), match_count: 1 },
            ]
        );
    }

    #[tokio::test]
    async fn repeated_searches_accumulate_until_cleared() {
        let (engine, _events) = engine_with(three_sheets(), 1);
        engine.search_one("A", "hay").join().await.unwrap();
        engine.search_one("B", "hay").join().await.unwrap();
        assert_eq!(engine.result_count(), 3);

        engine.clear_results();
        assert!(engine.results().is_empty());
        engine.search_all("straw").join().await;
        assert_eq!(engine.results()[0].cell_label(), "Word3");
    }

    #[tokio::test]
    async fn failures_are_reported_per_sheet() {
        let (engine, mut events) = engine_with(three_sheets(), 4);
        let error = engine.search_one("Missing", "x").join().await.unwrap_err();
        assert!(matches!(error, SearchError::SheetNotFound(_)));
        match events.recv().await.unwrap() {
            SearchEvent::Failed { sheet_name, message } => {
                assert_eq!(sheet_name, "Missing");
                assert!(message.contains("Missing"));
            }
            other => panic!("unexpected event {other:?}"),
        }

        let outcomes = engine.search_all("  ").join().await;
        assert!(outcomes.iter().all(|(_, outcome)| matches!(outcome, Err(SearchError::EmptyQuery))));
    }

    #[tokio::test]
    async fn nothing_loaded() {
        let (engine, mut events) = Engine::new(EngineConfig::default(), Handle::current());
        assert!(engine.search_all("x").is_empty());
        assert!(engine.sheet_names().is_empty());
        assert!(engine.schema("Sheet1").is_none());

        let error = engine.search_one("Sheet1", "x").join().await.unwrap_err();
        assert!(matches!(error, SearchError::NothingLoaded));
        assert!(matches!(events.recv().await, Some(SearchEvent::Failed { .. })));
    }

    #[tokio::test]
    async fn selection_survives_clearing_and_cancelled_drafts() {
        let (engine, _events) = engine_with(three_sheets(), 2);
        engine.search_all("needle").join().await;

        let mut draft = engine.begin_selection();
        draft.set_all(&[], true);
        engine.set_selection(draft.apply());
        assert_eq!(engine.selection().selected_columns("A"), ["Word"]);

        let mut draft = engine.begin_selection();
        draft.set_all(&["A", "B", "C"], false);
        engine.set_selection(draft.cancel());
        assert_eq!(engine.selection().selected_columns("C"), ["Word"]);

        engine.clear_results();
        assert!(!engine.selection().is_empty());
    }
}
