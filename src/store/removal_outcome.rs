use std::collections::BTreeMap;

use crate::store::StoreError;

/// Result of removing one or more calls.
/// Failures on individual documents are collected here rather than aborting the removal.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RemovalOutcome {
    /// Number of documents that were actually deleted
    removed_count: usize,
    /// Document id to the error hit while deleting it
    errors: BTreeMap<String, StoreError>
}

impl RemovalOutcome {
    /// Counts one deleted document
    pub fn add_removed(&mut self) {
        self.removed_count += 1;
    }

    /// Records a failed document deletion
    pub fn add_error(&mut self, document_id: String, error: StoreError) {
        self.errors.insert(document_id, error);
    }

    /// Folds another outcome into this one, used when several keys are removed in one pass
    pub fn merge(&mut self, other: RemovalOutcome) {
        self.removed_count += other.removed_count;
        self.errors.extend(other.errors);
    }

    /// True if no document failed
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    // getters
    pub fn removed_count(&self) -> usize {
        self.removed_count
    }

    pub fn errors(&self) -> &BTreeMap<String, StoreError> {
        &self.errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreErrorKind;

    #[test]
    fn test_merge() {
        let mut first = RemovalOutcome::default();
        assert!(first.is_clean());
        first.add_removed();

        let mut second = RemovalOutcome::default();
        second.add_removed();
        second.add_removed();
        second.add_error("00000000000000ab".to_string(), StoreError::new(StoreErrorKind::Io, "denied".to_string()));

        first.merge(second);
        assert_eq!(first.removed_count(), 3);
        assert_eq!(first.error_count(), 1);
        assert!(!first.is_clean());
        assert_eq!(first.errors()["00000000000000ab"].kind(), StoreErrorKind::Io);
    }
}
