//! In-memory record store shared by the coordinator's workers
//!
//! Records live in a vector allocated once at load time, in manifest order.
//! Locations are immutable; the mutable part of each record sits behind its
//! own slot lock. The coordinator hands every id to exactly one worker, so
//! those locks are never contended during a run; they exist so that the
//! summarizer and tests can read state through a shared `Arc<RecordStore>`.

use crate::manifest::ManifestRow;
use crate::types::{RecordId, UsedLocation};
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Mutable per-record state
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecordState {
    /// Diagnostic of the most recent failed attempt
    pub last_error: Option<String>,
    /// Location that produced the artifact, if any
    pub used: UsedLocation,
    /// Location of the most recent fetch issued; `None` if no fetch ran
    pub attempted: UsedLocation,
    /// Whether a worker has finished with this record
    pub processed: bool,
}

/// One manifest record plus its run state
#[derive(Debug)]
pub struct Record {
    /// Record id
    pub id: RecordId,
    /// Preferred location (empty if the loader had none)
    pub primary: String,
    /// Fallback location (empty if the loader had none)
    pub secondary: String,
    state: Mutex<RecordState>,
}

impl Record {
    /// Create an unprocessed record
    pub fn new(id: RecordId, primary: impl Into<String>, secondary: impl Into<String>) -> Self {
        Self {
            id,
            primary: primary.into(),
            secondary: secondary.into(),
            state: Mutex::new(RecordState::default()),
        }
    }

    /// Copy of the current state
    pub async fn state(&self) -> RecordState {
        self.state.lock().await.clone()
    }

    /// Store a failure diagnostic, replacing any earlier one
    pub async fn set_error(&self, error: impl Into<String>) {
        self.state.lock().await.last_error = Some(error.into());
    }

    /// Note that a fetch against `location` is about to start
    pub async fn begin_attempt(&self, location: UsedLocation) {
        self.state.lock().await.attempted = location;
    }

    /// Mark the record as finished with the given location
    pub async fn finish(&self, used: UsedLocation) {
        let mut state = self.state.lock().await;
        state.used = used;
        state.processed = true;
    }
}

impl From<ManifestRow> for Record {
    fn from(row: ManifestRow) -> Self {
        Record::new(row.id, row.primary, row.secondary)
    }
}

/// id → record mapping, iterated in load order
#[derive(Debug, Default)]
pub struct RecordStore {
    records: Vec<Record>,
    index: HashMap<RecordId, usize>,
    loaded: bool,
}

impl RecordStore {
    /// Build a store from manifest rows
    ///
    /// A later row with an id already present replaces nothing; the first
    /// occurrence wins. The manifest loader rejects duplicates before this.
    pub fn from_rows(rows: impl IntoIterator<Item = ManifestRow>) -> Self {
        Self::from_records(rows.into_iter().map(Record::from))
    }

    /// Build a store from prepared records
    pub fn from_records(records: impl IntoIterator<Item = Record>) -> Self {
        let mut store = RecordStore {
            loaded: true,
            ..Default::default()
        };
        for record in records {
            if store.index.contains_key(&record.id) {
                tracing::warn!(record_id = %record.id, "ignoring duplicate record");
                continue;
            }
            store.index.insert(record.id.clone(), store.records.len());
            store.records.push(record);
        }
        store
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store holds no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether the store was populated by a loader
    ///
    /// A loaded store may still be empty, e.g. when every manifest row was
    /// already downloaded. `RecordStore::default()` is the unloaded state.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Look up a record by id
    pub fn get(&self, id: &RecordId) -> Option<&Record> {
        self.index.get(id).map(|&i| &self.records[i])
    }

    /// Records in load order
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    /// The first `limit` ids in load order
    pub fn ids(&self, limit: usize) -> Vec<RecordId> {
        self.records
            .iter()
            .take(limit)
            .map(|r| r.id.clone())
            .collect()
    }
}
