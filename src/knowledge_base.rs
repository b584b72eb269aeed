/*!
# Review knowledge base
The public entry point for adding, removing, and querying reviewed calls.
All coordinates crossing this API are external (0-based, half-open); conversion to the stored convention happens here.
*/
use log::{debug, trace};

use crate::config::{KnowledgeBaseConfig, StoreBackend};
use crate::data_types::consensus::{build_consensus, ConsensusCall};
use crate::data_types::coordinates::query_span;
use crate::data_types::stored_call::{CallKey, StoredCall};
use crate::data_types::variant_record::{ValidationError, VariantRecord};
use crate::store::directory::DirectoryStore;
use crate::store::memory::InMemoryStore;
use crate::store::{KnowledgeBaseStore, RemovalOutcome, StoreError};

#[derive(thiserror::Error, Debug)]
pub enum KnowledgeBaseError {
    #[error("invalid call: {0}")]
    Validation(#[from] ValidationError),
    #[error("store failure: {0}")]
    Store(#[from] StoreError)
}

/// Records returned by an interval query, already in external coordinates.
/// The query collects every match up front rather than streaming from the store:
/// a call that fails to convert fails the whole query instead of cutting the sequence short,
/// and writes made after the query returned are not seen by this iterator. Query again to pick them up.
#[derive(Debug)]
pub struct VariantIter {
    inner: std::vec::IntoIter<VariantRecord>
}

impl VariantIter {
    fn empty() -> Self {
        Self { inner: Vec::new().into_iter() }
    }
}

impl Iterator for VariantIter {
    type Item = VariantRecord;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for VariantIter {}

pub struct ReviewKnowledgeBase {
    /// The backend holding every call
    store: Box<dyn KnowledgeBaseStore>
}

impl std::fmt::Debug for ReviewKnowledgeBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReviewKnowledgeBase").finish_non_exhaustive()
    }
}

impl ReviewKnowledgeBase {
    /// Opens the backend described by `config`.
    /// The handle is released when the knowledge base is dropped.
    /// # Errors
    /// * if the backend cannot be opened
    pub fn open(config: &KnowledgeBaseConfig) -> Result<Self, StoreError> {
        match config.backend() {
            StoreBackend::Memory => {
                debug!("Opening in-memory knowledge base {:?}", config.namespace());
                Ok(Self::with_store(InMemoryStore::new()))
            },
            StoreBackend::Directory { path } => {
                debug!("Opening knowledge base {:?} in {path:?}", config.namespace());
                Ok(Self::with_store(DirectoryStore::open(path, config.namespace())?))
            }
        }
    }

    /// Wraps an already opened store
    pub fn with_store<S: KnowledgeBaseStore + 'static>(store: S) -> Self {
        Self {
            store: Box::new(store)
        }
    }

    /// Validates a call and stores it, replacing any call with the same key.
    /// # Errors
    /// * if the call fails validation, in which case the store is never touched
    /// * if the store rejects the write
    pub fn add_call(&self, record: &VariantRecord) -> Result<(), KnowledgeBaseError> {
        let stored = StoredCall::from_record(record)?;
        trace!("Adding {}", stored.call_key());
        self.store.insert(stored)?;
        Ok(())
    }

    /// Removes the call with the same key as `record`; genotype and truth status are ignored.
    /// Removing a call that was never added succeeds with nothing removed.
    /// # Errors
    /// * if the call fails validation
    /// * if the store cannot be reached; failures on individual documents are reported in the outcome instead
    pub fn remove_call(&self, record: &VariantRecord) -> Result<RemovalOutcome, KnowledgeBaseError> {
        let key: CallKey = StoredCall::from_record(record)?.call_key();
        trace!("Removing {key}");
        Ok(self.store.remove_by_key(&key)?)
    }

    /// Returns every call overlapping `[start, end)` on `chromosome`.
    /// An empty query span returns nothing.
    /// # Errors
    /// * if `chromosome` is empty
    /// * if the store fails or holds a call that can no longer be converted; no partial results are returned
    pub fn get_variants_in_interval(&self, chromosome: &str, start: u64, end: u64) -> Result<VariantIter, KnowledgeBaseError> {
        if chromosome.is_empty() {
            return Err(ValidationError::EmptyChromosome.into());
        }
        let Some(span) = query_span(start, end) else {
            debug!("Empty query span {chromosome}:{start}-{end}");
            return Ok(VariantIter::empty());
        };

        let records = self.store.scan_overlapping(chromosome, &span)?
            .map(|call| call.to_record())
            .collect::<Result<Vec<VariantRecord>, ValidationError>>()?;
        debug!("Found {} calls in {chromosome}:{start}-{end}", records.len());
        Ok(VariantIter { inner: records.into_iter() })
    }

    /// Groups the calls overlapping `[start, end)` by site and collapses the truth status across callsets.
    /// # Errors
    /// * same as `get_variants_in_interval(...)`
    pub fn consensus_in_interval(&self, chromosome: &str, start: u64, end: u64) -> Result<Vec<ConsensusCall>, KnowledgeBaseError> {
        let records = self.get_variants_in_interval(chromosome, start, end)?;
        Ok(build_consensus(records))
    }

    /// Removes every call belonging to `callset_name`; used by reset tooling.
    /// # Errors
    /// * if the store cannot be reached
    pub fn clear_callset(&self, callset_name: &str) -> Result<RemovalOutcome, KnowledgeBaseError> {
        let outcome = self.store.clear(&|call: &StoredCall| call.callset_name() == callset_name)?;
        debug!("Cleared {} documents from callset {callset_name:?}", outcome.removed_count());
        Ok(outcome)
    }

    /// Number of visible calls
    /// # Errors
    /// * if the store cannot be reached
    pub fn len(&self) -> Result<usize, KnowledgeBaseError> {
        Ok(self.store.len()?)
    }

    /// # Errors
    /// * if the store cannot be reached
    pub fn is_empty(&self) -> Result<bool, KnowledgeBaseError> {
        Ok(self.store.is_empty()?)
    }
}
