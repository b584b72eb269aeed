use log::debug;
use std::sync::RwLock;

use crate::data_types::coordinates::InternalSpan;
use crate::data_types::stored_call::{CallKey, StoredCall};
use crate::store::record_table::RecordTable;
use crate::store::{CallPredicate, KnowledgeBaseStore, RecordScan, RemovalOutcome, StoreError};

/// A store that keeps everything in a `RecordTable` behind a reader/writer lock.
/// Writers hold the write lock for the whole upsert or removal, so writes to the same key never interleave.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    table: RwLock<RecordTable>
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KnowledgeBaseStore for InMemoryStore {
    fn insert(&self, call: StoredCall) -> Result<(), StoreError> {
        let key = call.call_key();
        let document_id = key.document_id();
        let mut table = self.table.write().map_err(|_| StoreError::poisoned())?;
        if table.upsert(call, document_id, &[]).is_some() {
            debug!("Superseded existing call {key}");
        } else {
            debug!("Inserted call {key}");
        }
        Ok(())
    }

    fn remove_by_key(&self, key: &CallKey) -> Result<RemovalOutcome, StoreError> {
        let mut table = self.table.write().map_err(|_| StoreError::poisoned())?;
        Ok(remove_locked(&mut table, key))
    }

    fn scan_overlapping(&self, chromosome: &str, span: &InternalSpan) -> Result<RecordScan, StoreError> {
        let table = self.table.read().map_err(|_| StoreError::poisoned())?;
        Ok(table.overlapping(chromosome, span).into_iter())
    }

    fn clear(&self, predicate: CallPredicate<'_>) -> Result<RemovalOutcome, StoreError> {
        let mut table = self.table.write().map_err(|_| StoreError::poisoned())?;
        let mut outcome = RemovalOutcome::default();
        for key in table.matching_keys(predicate) {
            outcome.merge(remove_locked(&mut table, &key));
        }
        Ok(outcome)
    }

    fn len(&self) -> Result<usize, StoreError> {
        let table = self.table.read().map_err(|_| StoreError::poisoned())?;
        Ok(table.len())
    }
}

/// Memory documents cannot fail to delete, so this only counts
fn remove_locked(table: &mut RecordTable, key: &CallKey) -> RemovalOutcome {
    let mut outcome = RemovalOutcome::default();
    let documents = match table.get(key) {
        Some(entry) => entry.documents().map(str::to_string).collect::<Vec<_>>(),
        None => {
            debug!("No call found for {key}, nothing to remove");
            return outcome;
        }
    };
    for _doc in documents.iter() {
        outcome.add_removed();
    }
    table.detach_documents(key, &documents);
    debug!("Removed call {key}");
    outcome
}
