use indexmap::IndexMap;
use rustc_hash::FxHashMap as HashMap;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::data_types::coordinates::InternalSpan;
use crate::data_types::stored_call::{CallKey, StoredCall};
use crate::interval_index::IntervalIndex;
use crate::store::CallPredicate;

/// One visible call and every document that currently backs it, oldest first.
/// More than one document only happens with legacy duplicates picked up from disk.
/// The visible call is always the one held by the newest document.
#[derive(Clone, Debug)]
pub struct TableEntry {
    call: Arc<StoredCall>,
    versions: Vec<(String, Arc<StoredCall>)>
}

impl TableEntry {
    fn single(call: Arc<StoredCall>, document_id: String) -> Self {
        Self {
            call: call.clone(),
            versions: vec![(document_id, call)]
        }
    }

    pub fn call(&self) -> &Arc<StoredCall> {
        &self.call
    }

    /// Document ids, oldest first
    pub fn documents(&self) -> impl Iterator<Item = &str> {
        self.versions.iter().map(|(doc, _c)| doc.as_str())
    }

    /// Appends a newer document, which becomes the visible call
    fn push(&mut self, call: Arc<StoredCall>, document_id: String) {
        self.call = call.clone();
        self.versions.push((document_id, call));
    }
}

/// The in-memory view shared by the store backends.
/// Calls are bucketed per chromosome in insertion order, and the interval index is rebuilt for a chromosome after every change to it.
#[derive(Debug, Default)]
pub struct RecordTable {
    /// Chromosome to the calls on it; the IndexMap position is the slot used by the index
    chromosomes: BTreeMap<String, IndexMap<CallKey, TableEntry>>,
    /// Reverse lookup from document id to the key it belongs to
    document_owners: HashMap<String, CallKey>,
    /// Derived overlap index
    index: IntervalIndex
}

impl RecordTable {
    /// Makes `call` the visible call for its key, stored under `document_id`.
    /// Documents of the previous entry listed in `retained` stay attached as older versions, everything else is dropped.
    /// A superseded call keeps its position, so scan order stays stable across updates.
    /// Returns the entry that was replaced, if any.
    pub fn upsert(&mut self, call: StoredCall, document_id: String, retained: &[String]) -> Option<TableEntry> {
        let key = call.call_key();
        let chrom = key.chromosome().to_string();
        let bucket = self.chromosomes.entry(chrom.clone()).or_default();

        let mut entry = TableEntry {
            call: Arc::new(call),
            versions: vec![]
        };
        if let Some(prev) = bucket.get(&key) {
            entry.versions = prev.versions.iter()
                .filter(|(doc, _c)| *doc != document_id && retained.contains(doc))
                .cloned()
                .collect();
        }
        entry.versions.push((document_id, entry.call.clone()));
        let current: Vec<String> = entry.documents().map(str::to_string).collect();
        let previous = bucket.insert(key.clone(), entry);

        if let Some(prev) = previous.as_ref() {
            for (doc, _c) in prev.versions.iter() {
                self.document_owners.remove(doc);
            }
        }
        for doc in current {
            self.document_owners.insert(doc, key.clone());
        }

        self.reindex(&chrom);
        previous
    }

    /// Adds a document while loading from disk, documents must arrive oldest first.
    /// A later document for an existing key replaces the visible call and is appended to its documents.
    /// Does not touch the index, call `reindex_all()` once loading is done.
    pub fn absorb(&mut self, call: StoredCall, document_id: String) {
        let key = call.call_key();
        self.document_owners.insert(document_id.clone(), key.clone());
        let call = Arc::new(call);
        let bucket = self.chromosomes.entry(key.chromosome().to_string()).or_default();
        match bucket.get_mut(&key) {
            Some(entry) => entry.push(call, document_id),
            None => {
                bucket.insert(key, TableEntry::single(call, document_id));
            }
        }
    }

    /// Forgets the listed documents of `key`. The newest surviving document becomes the visible call,
    /// and the entry disappears once no documents are left.
    /// Returns true if the key is still visible afterwards.
    pub fn detach_documents(&mut self, key: &CallKey, removed: &[String]) -> bool {
        let chrom = key.chromosome().to_string();
        let Some(bucket) = self.chromosomes.get_mut(&chrom) else {
            return false;
        };

        let still_visible = match bucket.get_mut(key) {
            Some(entry) => {
                entry.versions.retain(|(doc, _c)| !removed.contains(doc));
                match entry.versions.last().map(|(_doc, c)| c.clone()) {
                    Some(newest) => {
                        entry.call = newest;
                        true
                    },
                    None => {
                        bucket.shift_remove(key);
                        false
                    }
                }
            },
            None => false
        };

        if bucket.is_empty() {
            self.chromosomes.remove(&chrom);
        }
        for doc in removed.iter() {
            if self.document_owners.get(doc) == Some(key) {
                self.document_owners.remove(doc);
            }
        }

        self.reindex(&chrom);
        still_visible
    }

    /// Rebuilds the index for every chromosome
    pub fn reindex_all(&mut self) {
        self.index.clear();
        let chroms: Vec<String> = self.chromosomes.keys().cloned().collect();
        for chrom in chroms.iter() {
            self.reindex(chrom);
        }
    }

    /// Drops everything
    pub fn clear(&mut self) {
        self.chromosomes.clear();
        self.document_owners.clear();
        self.index.clear();
    }

    /// Calls overlapping `span`, in insertion order
    pub fn overlapping(&self, chrom: &str, span: &InternalSpan) -> Vec<Arc<StoredCall>> {
        let Some(bucket) = self.chromosomes.get(chrom) else {
            return vec![];
        };
        self.index.query(chrom, span).into_iter()
            .filter_map(|slot| bucket.get_index(slot).map(|(_k, e)| e.call.clone()))
            .collect()
    }

    /// Keys of every visible call matching `predicate`
    pub fn matching_keys(&self, predicate: CallPredicate<'_>) -> Vec<CallKey> {
        self.chromosomes.values()
            .flat_map(|bucket| bucket.iter())
            .filter(|(_k, e)| predicate(e.call.as_ref()))
            .map(|(k, _e)| k.clone())
            .collect()
    }

    pub fn get(&self, key: &CallKey) -> Option<&TableEntry> {
        self.chromosomes.get(key.chromosome())
            .and_then(|bucket| bucket.get(key))
    }

    /// The key a document currently backs, if any
    pub fn owner_of(&self, document_id: &str) -> Option<&CallKey> {
        self.document_owners.get(document_id)
    }

    /// Number of visible calls
    pub fn len(&self) -> usize {
        self.chromosomes.values().map(|b| b.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.chromosomes.is_empty()
    }

    fn reindex(&mut self, chrom: &str) {
        match self.chromosomes.get(chrom) {
            Some(bucket) => {
                self.index.rebuild_chromosome(
                    chrom,
                    bucket.values().enumerate().map(|(slot, e)| (e.call.span(), slot))
                );
            },
            None => self.index.rebuild_chromosome(chrom, std::iter::empty())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::coordinates::to_internal;
    use crate::data_types::truth_status::TruthStatus;
    use crate::data_types::variant_record::{Genotype, VariantRecord};

    fn call(chrom: &str, start: u64, alt: &str, truth_status: TruthStatus) -> StoredCall {
        let record = VariantRecord::new(
            chrom.to_string(), start, start + 1,
            "A", vec![alt.to_string()],
            Genotype::new(0, 1), "cs".to_string(), truth_status
        ).unwrap();
        StoredCall::from_record(&record).unwrap()
    }

    fn everything() -> InternalSpan {
        to_internal(0, 1_000_000).unwrap()
    }

    #[test]
    fn test_upsert_keeps_position() {
        let mut table = RecordTable::default();
        let first = call("chr1", 10, "G", TruthStatus::Unknown);
        let key = first.call_key();
        assert!(table.upsert(first, "a".to_string(), &[]).is_none());
        table.upsert(call("chr1", 20, "G", TruthStatus::Unknown), "b".to_string(), &[]);

        let previous = table.upsert(call("chr1", 10, "G", TruthStatus::TruePositive), "a".to_string(), &[]).unwrap();
        assert_eq!(previous.call().truth_status(), TruthStatus::Unknown);
        assert_eq!(table.len(), 2);

        let found = table.overlapping("chr1", &everything());
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].call_key(), key);
        assert_eq!(found[0].truth_status(), TruthStatus::TruePositive);
        assert_eq!(table.owner_of("a"), Some(&key));
    }

    #[test]
    fn test_absorb_duplicates_then_detach() {
        let mut table = RecordTable::default();
        table.absorb(call("chr2", 10, "G", TruthStatus::Suspect), "old".to_string());
        table.absorb(call("chr2", 10, "G", TruthStatus::FalsePositive), "new".to_string());
        table.absorb(call("chr2", 50, "T", TruthStatus::Unknown), "other".to_string());
        table.reindex_all();

        assert_eq!(table.len(), 2);
        let key = call("chr2", 10, "G", TruthStatus::Unknown).call_key();
        let entry = table.get(&key).unwrap();
        assert_eq!(entry.documents().collect::<Vec<_>>(), vec!["old", "new"]);
        assert_eq!(entry.call().truth_status(), TruthStatus::FalsePositive);

        // partial detach falls back to the surviving document's content
        assert!(table.detach_documents(&key, &["new".to_string()]));
        assert!(table.owner_of("new").is_none());
        let found = table.overlapping("chr2", &to_internal(10, 11).unwrap());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].truth_status(), TruthStatus::Suspect);
        assert_eq!(table.get(&key).unwrap().call().truth_status(), TruthStatus::Suspect);

        // removing the last one hides it and the index follows
        assert!(!table.detach_documents(&key, &["old".to_string()]));
        assert!(table.overlapping("chr2", &to_internal(10, 11).unwrap()).is_empty());
        assert_eq!(table.overlapping("chr2", &everything()).len(), 1);

        // detaching an unknown key is a no-op
        assert!(!table.detach_documents(&key, &["old".to_string()]));
    }

    #[test]
    fn test_upsert_retains_listed_documents() {
        let mut table = RecordTable::default();
        table.absorb(call("chr1", 10, "G", TruthStatus::FalsePositive), "legacy_a".to_string());
        table.absorb(call("chr1", 10, "G", TruthStatus::Suspect), "legacy_b".to_string());
        table.reindex_all();
        let key = call("chr1", 10, "G", TruthStatus::Unknown).call_key();

        // only legacy_a could not be cleaned up
        let previous = table.upsert(
            call("chr1", 10, "G", TruthStatus::TruePositive), "canonical".to_string(), &["legacy_a".to_string()]
        ).unwrap();
        assert_eq!(previous.documents().count(), 2);
        let entry = table.get(&key).unwrap();
        assert_eq!(entry.documents().collect::<Vec<_>>(), vec!["legacy_a", "canonical"]);
        assert_eq!(entry.call().truth_status(), TruthStatus::TruePositive);
        assert!(table.owner_of("legacy_b").is_none());
        assert_eq!(table.owner_of("legacy_a"), Some(&key));

        // losing the canonical document exposes the retained legacy content
        assert!(table.detach_documents(&key, &["canonical".to_string()]));
        let found = table.overlapping("chr1", &everything());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].truth_status(), TruthStatus::FalsePositive);
    }

    #[test]
    fn test_matching_keys_and_clear() {
        let mut table = RecordTable::default();
        table.upsert(call("chr1", 10, "G", TruthStatus::Suspect), "a".to_string(), &[]);
        table.upsert(call("chr3", 10, "G", TruthStatus::TruePositive), "b".to_string(), &[]);
        let suspects = table.matching_keys(&|c: &StoredCall| c.truth_status() == TruthStatus::Suspect);
        assert_eq!(suspects.len(), 1);
        assert_eq!(suspects[0].chromosome(), "chr1");

        table.clear();
        assert!(table.is_empty());
        assert!(table.overlapping("chr1", &everything()).is_empty());
    }
}
