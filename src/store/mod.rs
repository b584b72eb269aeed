/*!
# Store module
Durable keyed storage for reviewed calls.

Every backend implements `KnowledgeBaseStore`: an atomic upsert by call key, a removal by call key that reports per-document failures instead of stopping at the first one,
and an overlap scan in internal (1-based, closed) coordinates.
*/
use std::sync::Arc;

use crate::data_types::coordinates::InternalSpan;
use crate::data_types::stored_call::{CallKey, StoredCall};

/// Backend that keeps one JSON document per call on disk
pub mod directory;
/// Backend that lives entirely in memory
pub mod memory;
/// Shared in-memory table and interval index used by both backends
pub mod record_table;
/// Aggregated result of a removal
pub mod removal_outcome;

pub use removal_outcome::RemovalOutcome;

/// Categories of store failures
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, strum_macros::Display)]
pub enum StoreErrorKind {
    /// File system or transport failure
    Io,
    /// A document could not be encoded or decoded
    Serialization,
    /// A thread panicked while holding the store lock
    Poisoned,
    /// Another handle already owns the store
    Locked,
    /// Two different call keys map onto the same document id
    Conflict,
    /// The backend gave up waiting
    Timeout
}

#[derive(thiserror::Error, Clone, Debug, Eq, PartialEq)]
#[error("{kind} error: {message}")]
pub struct StoreError {
    kind: StoreErrorKind,
    message: String
}

impl StoreError {
    pub fn new(kind: StoreErrorKind, message: String) -> Self {
        Self { kind, message }
    }

    /// Wraps an I/O error with a description of what we were doing; time-outs keep their own kind
    pub fn io(context: &str, error: std::io::Error) -> Self {
        let kind = match error.kind() {
            std::io::ErrorKind::TimedOut => StoreErrorKind::Timeout,
            _ => StoreErrorKind::Io
        };
        Self::new(kind, format!("{context}: {error}"))
    }

    pub fn serialization(context: &str, error: impl std::fmt::Display) -> Self {
        Self::new(StoreErrorKind::Serialization, format!("{context}: {error}"))
    }

    pub fn poisoned() -> Self {
        Self::new(StoreErrorKind::Poisoned, "store lock was poisoned by a panicking writer".to_string())
    }

    // getters
    pub fn kind(&self) -> StoreErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Snapshot of the calls matching a scan. Calls are immutable and shared, so a scan never sees a half-written call.
pub type RecordScan = std::vec::IntoIter<Arc<StoredCall>>;

/// Predicate used by `clear`
pub type CallPredicate<'a> = &'a dyn Fn(&StoredCall) -> bool;

/// The storage boundary of the knowledge base
pub trait KnowledgeBaseStore: Send + Sync {
    /// Inserts a call, atomically replacing any call with the same key.
    /// # Errors
    /// * if the backend fails to persist the call
    fn insert(&self, call: StoredCall) -> Result<(), StoreError>;

    /// Removes every document stored under `key`.
    /// Removing a missing key succeeds with nothing removed.
    /// # Errors
    /// * only for failures that stop the removal as a whole; per-document failures land in the outcome
    fn remove_by_key(&self, key: &CallKey) -> Result<RemovalOutcome, StoreError>;

    /// Returns the calls on `chromosome` whose span overlaps `span`, in insertion order.
    /// Every call re-runs the lookup against the current state.
    /// # Errors
    /// * if the backend cannot be read
    fn scan_overlapping(&self, chromosome: &str, span: &InternalSpan) -> Result<RecordScan, StoreError>;

    /// Removes every call matching `predicate`, mostly for maintenance and test resets.
    /// # Errors
    /// * only for failures that stop the removal as a whole
    fn clear(&self, predicate: CallPredicate<'_>) -> Result<RemovalOutcome, StoreError>;

    /// Number of visible calls
    /// # Errors
    /// * if the backend cannot be read
    fn len(&self) -> Result<usize, StoreError>;

    /// True if there are no visible calls
    /// # Errors
    /// * if the backend cannot be read
    fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}
