use crate::export::ExportSnapshot;
use crate::projection::ColumnSelection;
use crate::search::MatchRecord;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Default)]
struct Session {
    records: Vec<Arc<MatchRecord>>,
    selection: ColumnSelection,
}

/// Accumulated matches and the applied column selection, guarded by one lock.
///
/// A batch is appended under a single lock acquisition, so readers and `clear` observe either
/// all of a sheet's matches or none of them.
#[derive(Default)]
pub(crate) struct ResultStore {
    session: Mutex<Session>,
}

impl ResultStore {
    /// Appends one sheet's matches and returns the new total.
    pub(crate) fn append_batch(&self, batch: Vec<MatchRecord>) -> usize {
        let mut session = self.session.lock();
        session.records.extend(batch.into_iter().map(Arc::new));
        session.records.len()
    }

    pub(crate) fn clear(&self) {
        self.session.lock().records.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.session.lock().records.len()
    }

    pub(crate) fn snapshot(&self) -> Vec<Arc<MatchRecord>> {
        self.session.lock().records.clone()
    }

    pub(crate) fn selection(&self) -> ColumnSelection {
        self.session.lock().selection.clone()
    }

    pub(crate) fn set_selection(&self, selection: ColumnSelection) {
        self.session.lock().selection = selection;
    }

    /// Records and selection copied together.
    pub(crate) fn export_snapshot(&self) -> ExportSnapshot {
        let session = self.session.lock();
        ExportSnapshot::new(session.records.clone(), session.selection.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::search_table;
    use crate::search::tests::people;
    use std::thread;

    #[test]
    fn appends_and_clears() {
        let store = ResultStore::default();
        let batch = search_table("Sheet1", &people(), "a").unwrap();
        assert_eq!(store.append_batch(batch.clone()), 3);
        assert_eq!(store.append_batch(batch), 6);
        assert_eq!(store.snapshot()[3].cell_label(), "Name1");

        store.clear();
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn clear_keeps_the_selection() {
        let store = ResultStore::default();
        let mut selection = ColumnSelection::default();
        selection.set("Sheet1", "Name", true);
        store.set_selection(selection.clone());
        store.clear();
        assert_eq!(store.selection(), selection);
    }

    #[test]
    fn concurrent_clear_never_splits_a_batch() {
        let store = Arc::new(ResultStore::default());
        let batch = search_table("Sheet1", &people(), "a").unwrap();
        let batch_size = batch.len();

        let writers: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let batch = batch.clone();
                thread::spawn(move || {
                    for _ in 0..50 {
                        store.append_batch(batch.clone());
                    }
                })
            })
            .collect();
        let clearer = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..50 {
                    store.clear();
                    assert_eq!(store.len() % batch_size, 0);
                }
            })
        };
        for writer in writers {
            writer.join().unwrap();
        }
        clearer.join().unwrap();

        let records = store.snapshot();
        assert_eq!(records.len() % batch_size, 0);
        for chunk in records.chunks(batch_size) {
            let labels: Vec<String> = chunk.iter().map(|record| record.cell_label()).collect();
            assert_eq!(labels, ["Name1", "Name3", "Active3"]);
        }
    }
}
