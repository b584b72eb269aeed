use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::data_types::coordinates::{CoordinateError, InternalSpan};
use crate::data_types::stored_call::{CallKey, StoredCall};
use crate::data_types::truth_status::TruthStatus;
use crate::data_types::variant_record::Genotype;
use crate::store::record_table::RecordTable;
use crate::store::{CallPredicate, KnowledgeBaseStore, RecordScan, RemovalOutcome, StoreError, StoreErrorKind};

/// Extension for call documents
const DOCUMENT_EXTENSION: &str = "json";
/// Marker file owned by an open handle
const LOCK_FILENAME: &str = ".kbreview.lock";

/// On-disk form of a single call
#[derive(Debug, Deserialize, Serialize)]
struct CallDocument {
    chromosome: String,
    /// 1-based first included base
    start: u64,
    /// 1-based last included base
    end: u64,
    reference_allele: String,
    alternate_alleles: Vec<String>,
    genotype: Genotype,
    callset_name: String,
    truth_status: TruthStatus,
    /// When this document was written; the newest document wins when duplicates exist
    updated: DateTime<Utc>
}

impl CallDocument {
    fn from_call(call: &StoredCall) -> Self {
        Self {
            chromosome: call.chromosome().to_string(),
            start: call.span().start().get() as u64,
            end: call.span().end().get() as u64,
            reference_allele: call.reference_allele().to_string(),
            alternate_alleles: call.alternate_alleles().to_vec(),
            genotype: call.genotype(),
            callset_name: call.callset_name().to_string(),
            truth_status: call.truth_status(),
            updated: Utc::now()
        }
    }

    fn into_call(self) -> Result<StoredCall, CoordinateError> {
        let span = InternalSpan::from_one_based(self.start, self.end)?;
        Ok(StoredCall::from_parts(
            self.chromosome, span,
            self.reference_allele, self.alternate_alleles,
            self.genotype, self.callset_name, self.truth_status
        ))
    }
}

/// Lock file that marks a store folder as in use; removed when the handle is dropped.
/// The file holds the PID of the owning process, so a lock left behind by a process that died without cleaning up can be taken over.
#[derive(Debug)]
struct StoreLock {
    path: PathBuf
}

impl StoreLock {
    fn acquire(folder: &Path) -> Result<Self, StoreError> {
        let path = folder.join(LOCK_FILENAME);
        if let Some(lock) = Self::create(&path)? {
            return Ok(lock);
        }

        if holder_is_gone(&path) {
            warn!("Removing stale store lock {path:?}, the process that created it is no longer running");
            match fs::remove_file(&path) {
                Ok(()) => {},
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
                Err(e) => return Err(StoreError::io(&format!("Error while removing stale lock file {path:?}"), e))
            };
            if let Some(lock) = Self::create(&path)? {
                return Ok(lock);
            }
        }

        Err(StoreError::new(
            StoreErrorKind::Locked,
            format!("{folder:?} is already open by another handle (remove {path:?} if no other process is using it)")
        ))
    }

    /// Creates the lock file and records our PID in it, returns None if the file already exists
    fn create(path: &Path) -> Result<Option<Self>, StoreError> {
        let mut file = match fs::OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(None),
            Err(e) => return Err(StoreError::io(&format!("Error while creating lock file {path:?}"), e))
        };

        // if anything below fails, dropping the lock cleans the file back up
        let lock = Self { path: path.to_path_buf() };
        writeln!(file, "{}", std::process::id())
            .map_err(|e| StoreError::io(&format!("Error while writing lock file {:?}", lock.path), e))?;
        Ok(Some(lock))
    }
}

/// True if the lock file names a process that no longer exists.
/// Liveness is read from /proc, so anywhere else (or with an unreadable lock) the holder is assumed alive.
fn holder_is_gone(path: &Path) -> bool {
    if !cfg!(target_os = "linux") || !Path::new("/proc/self").exists() {
        return false;
    }
    let Ok(text) = fs::read_to_string(path) else {
        return false;
    };
    let Ok(pid) = text.trim().parse::<u32>() else {
        return false;
    };
    pid != std::process::id() && !Path::new("/proc").join(pid.to_string()).exists()
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("Released store lock {:?}", self.path),
            Err(e) => warn!("Error while releasing store lock {:?}: {e}", self.path)
        }
    }
}

/// A store that keeps one JSON document per call in `<root>/<namespace>/`.
/// Documents are written to a temporary file and renamed into place, so a reader either sees the old or the new document.
/// The folder is loaded into a `RecordTable` on open; `reload()` re-reads it.
#[derive(Debug)]
pub struct DirectoryStore {
    /// Folder holding the documents
    folder: PathBuf,
    /// Visible calls and their overlap index
    table: RwLock<RecordTable>,
    /// Held for the lifetime of the handle
    _lock: StoreLock
}

impl DirectoryStore {
    /// Opens (creating if needed) the collection folder and loads every document in it.
    /// # Arguments
    /// * `root` - the store root folder
    /// * `namespace` - collection name, used as a sub-folder
    /// # Errors
    /// * if the folder cannot be created or read
    /// * if another handle holds the lock
    /// * if any document fails to parse
    pub fn open(root: &Path, namespace: &str) -> Result<Self, StoreError> {
        let folder = root.join(namespace);
        fs::create_dir_all(&folder)
            .map_err(|e| StoreError::io(&format!("Error while creating {folder:?}"), e))?;

        let lock = StoreLock::acquire(&folder)?;
        let table = load_table(&folder)?;
        info!("Loaded {} calls from {folder:?}", table.len());

        Ok(Self {
            folder,
            table: RwLock::new(table),
            _lock: lock
        })
    }

    /// Rebuilds the table and index from the documents currently on disk
    /// # Errors
    /// * if the folder cannot be read or a document fails to parse; the previous state is kept
    pub fn reload(&self) -> Result<(), StoreError> {
        let fresh = load_table(&self.folder)?;
        let mut table = self.table.write().map_err(|_| StoreError::poisoned())?;
        *table = fresh;
        debug!("Reloaded {} calls from {:?}", table.len(), self.folder);
        Ok(())
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    fn document_path(&self, document_id: &str) -> PathBuf {
        self.folder.join(format!("{document_id}.{DOCUMENT_EXTENSION}"))
    }

    /// Writes a document through a temp file and an atomic rename
    fn write_document(&self, document_id: &str, call: &StoredCall) -> Result<(), StoreError> {
        let target = self.document_path(document_id);
        let temp = self.folder.join(format!(".{document_id}.{DOCUMENT_EXTENSION}.tmp"));
        let bytes = serde_json::to_vec_pretty(&CallDocument::from_call(call))
            .map_err(|e| StoreError::serialization(&format!("Error while serializing {target:?}"), e))?;

        let write_result = fs::File::create(&temp)
            .and_then(|mut file| {
                file.write_all(&bytes)?;
                file.sync_all()
            })
            .and_then(|()| fs::rename(&temp, &target));

        if let Err(e) = write_result {
            // best effort, the temp file is hidden from loading anyway
            let _ = fs::remove_file(&temp);
            return Err(StoreError::io(&format!("Error while writing {target:?}"), e));
        }
        Ok(())
    }

    /// Deletes a document, returns false if it was already gone
    fn delete_document(&self, document_id: &str) -> Result<bool, StoreError> {
        let path = self.document_path(document_id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io(&format!("Error while deleting {path:?}"), e))
        }
    }

    /// Removes every document of `key` while the caller holds the write lock
    fn remove_locked(&self, table: &mut RecordTable, key: &CallKey) -> RemovalOutcome {
        let mut outcome = RemovalOutcome::default();
        let documents = match table.get(key) {
            Some(entry) => entry.documents().map(str::to_string).collect::<Vec<_>>(),
            None => {
                debug!("No call found for {key}, nothing to remove");
                return outcome;
            }
        };

        let mut gone = vec![];
        for doc in documents {
            match self.delete_document(&doc) {
                Ok(true) => {
                    outcome.add_removed();
                    gone.push(doc);
                },
                Ok(false) => {
                    debug!("Document {doc} for {key} was already deleted");
                    gone.push(doc);
                },
                Err(e) => {
                    warn!("Failed to remove document {doc} for {key}: {e}");
                    outcome.add_error(doc, e);
                }
            }
        }

        if table.detach_documents(key, &gone) {
            warn!("Call {key} is still visible after a partial removal, serving its newest remaining document");
        } else {
            debug!("Removed call {key}");
        }
        outcome
    }
}

impl KnowledgeBaseStore for DirectoryStore {
    fn insert(&self, call: StoredCall) -> Result<(), StoreError> {
        let key = call.call_key();
        let document_id = key.document_id();
        let mut table = self.table.write().map_err(|_| StoreError::poisoned())?;

        if let Some(owner) = table.owner_of(&document_id) {
            if owner != &key {
                return Err(StoreError::new(
                    StoreErrorKind::Conflict,
                    format!("document {document_id} already holds {owner}, cannot store {key}")
                ));
            }
        }

        self.write_document(&document_id, &call)?;

        // fold any legacy duplicates into the canonical document
        let legacy: Vec<String> = table.get(&key)
            .map(|entry| {
                entry.documents()
                    .filter(|d| *d != document_id)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let mut retained = vec![];
        for doc in legacy {
            match self.delete_document(&doc) {
                Ok(_) => debug!("Deleted legacy document {doc} for {key}"),
                Err(e) => {
                    warn!("Failed to delete legacy document {doc} for {key}: {e}");
                    retained.push(doc);
                }
            }
        }

        if table.upsert(call, document_id, &retained).is_some() {
            debug!("Superseded existing call {key}");
        } else {
            debug!("Inserted call {key}");
        }
        Ok(())
    }

    fn remove_by_key(&self, key: &CallKey) -> Result<RemovalOutcome, StoreError> {
        let mut table = self.table.write().map_err(|_| StoreError::poisoned())?;
        Ok(self.remove_locked(&mut table, key))
    }

    fn scan_overlapping(&self, chromosome: &str, span: &InternalSpan) -> Result<RecordScan, StoreError> {
        let table = self.table.read().map_err(|_| StoreError::poisoned())?;
        Ok(table.overlapping(chromosome, span).into_iter())
    }

    fn clear(&self, predicate: CallPredicate<'_>) -> Result<RemovalOutcome, StoreError> {
        let mut table = self.table.write().map_err(|_| StoreError::poisoned())?;
        let mut outcome = RemovalOutcome::default();
        for key in table.matching_keys(predicate) {
            outcome.merge(self.remove_locked(&mut table, &key));
        }
        Ok(outcome)
    }

    fn len(&self) -> Result<usize, StoreError> {
        let table = self.table.read().map_err(|_| StoreError::poisoned())?;
        Ok(table.len())
    }
}

/// Only visible `*.json` files are documents; temp and lock files start with '.'
fn is_document(path: &Path) -> bool {
    let visible = path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| !n.starts_with('.'))
        .unwrap_or(false);
    visible && path.is_file() && path.extension().unwrap_or_default() == DOCUMENT_EXTENSION
}

/// Reads every document in `folder` into a fresh table, oldest first
fn load_table(folder: &Path) -> Result<RecordTable, StoreError> {
    let read_error = |e: std::io::Error| StoreError::io(&format!("Error while reading {folder:?}"), e);

    let mut documents: Vec<(DateTime<Utc>, String, StoredCall)> = vec![];
    for entry in fs::read_dir(folder).map_err(read_error)? {
        let path = entry.map_err(read_error)?.path();
        if !is_document(&path) {
            continue;
        }

        let document_id = match path.file_stem().and_then(|s| s.to_str()) {
            Some(stem) => stem.to_string(),
            None => {
                warn!("Skipping document with a non UTF-8 name: {path:?}");
                continue;
            }
        };

        let text = match fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // deleted between listing and reading
                continue;
            },
            Err(e) => return Err(StoreError::io(&format!("Error while reading {path:?}"), e))
        };
        let document: CallDocument = serde_json::from_str(&text)
            .map_err(|e| StoreError::serialization(&format!("Error while parsing {path:?}"), e))?;
        let updated = document.updated;
        let call = document.into_call()
            .map_err(|e| StoreError::serialization(&format!("Invalid coordinates in {path:?}"), e))?;
        documents.push((updated, document_id, call));
    }

    // oldest first so the newest document of a key ends up visible
    documents.sort_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)));
    let document_count = documents.len();

    let mut table = RecordTable::default();
    for (_updated, document_id, call) in documents {
        table.absorb(call, document_id);
    }
    table.reindex_all();

    let duplicates = document_count - table.len();
    if duplicates > 0 {
        warn!("Found {duplicates} duplicate documents in {folder:?}, the newest of each call is used");
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::coordinates::to_internal;
    use crate::data_types::variant_record::VariantRecord;

    fn call(start: u64, truth_status: TruthStatus) -> StoredCall {
        let record = VariantRecord::new(
            "chr10".to_string(), start, start + 1,
            "A", vec!["G".to_string()],
            Genotype::new(0, 1), "test_callset".to_string(), truth_status
        ).unwrap();
        StoredCall::from_record(&record).unwrap()
    }

    fn write_legacy(folder: &Path, name: &str, call: &StoredCall, updated: DateTime<Utc>) {
        let mut document = CallDocument::from_call(call);
        document.updated = updated;
        let text = serde_json::to_string(&document).unwrap();
        fs::write(folder.join(format!("{name}.json")), text).unwrap();
    }

    fn document_count(folder: &Path) -> usize {
        fs::read_dir(folder).unwrap()
            .filter(|e| is_document(&e.as_ref().unwrap().path()))
            .count()
    }

    fn visible(store: &DirectoryStore, start: u64) -> Vec<TruthStatus> {
        store.scan_overlapping("chr10", &to_internal(start, start + 1).unwrap()).unwrap()
            .map(|c| c.truth_status())
            .collect()
    }

    #[test]
    fn test_persist_and_reopen() {
        let root = tempfile::tempdir().unwrap();
        {
            let store = DirectoryStore::open(root.path(), "reviews").unwrap();
            store.insert(call(100, TruthStatus::Suspect)).unwrap();
            store.insert(call(100, TruthStatus::TruePositive)).unwrap();
            store.insert(call(200, TruthStatus::FalsePositive)).unwrap();
            assert_eq!(document_count(store.folder()), 2);
        }

        let store = DirectoryStore::open(root.path(), "reviews").unwrap();
        assert_eq!(store.len().unwrap(), 2);
        assert_eq!(visible(&store, 100), vec![TruthStatus::TruePositive]);
        assert_eq!(visible(&store, 200), vec![TruthStatus::FalsePositive]);

        // different namespace, different collection
        let other = DirectoryStore::open(root.path(), "other").unwrap();
        assert!(other.is_empty().unwrap());
    }

    #[test]
    fn test_lock_is_scoped() {
        let root = tempfile::tempdir().unwrap();
        let first = DirectoryStore::open(root.path(), "reviews").unwrap();
        let err = DirectoryStore::open(root.path(), "reviews").unwrap_err();
        assert_eq!(err.kind(), StoreErrorKind::Locked);
        drop(first);

        // repeated open/close cycles never leave the lock behind
        for _ in 0..3 {
            let store = DirectoryStore::open(root.path(), "reviews").unwrap();
            assert!(store.folder().join(LOCK_FILENAME).exists());
        }
        assert!(!root.path().join("reviews").join(LOCK_FILENAME).exists());
    }

    #[test]
    fn test_foreign_lock_refused() {
        let root = tempfile::tempdir().unwrap();
        let folder = root.path().join("reviews");
        fs::create_dir_all(&folder).unwrap();
        let lock_path = folder.join(LOCK_FILENAME);

        // held by this very process, or unreadable: both count as live
        for content in [format!("{}\n", std::process::id()), String::new(), "not a pid".to_string()] {
            fs::write(&lock_path, &content).unwrap();
            let err = DirectoryStore::open(root.path(), "reviews").unwrap_err();
            assert_eq!(err.kind(), StoreErrorKind::Locked);
            assert!(err.message().contains(LOCK_FILENAME), "{}", err.message());
            // a refused open leaves the other handle's lock alone
            assert_eq!(fs::read_to_string(&lock_path).unwrap(), content);
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_stale_lock_taken_over() {
        if !Path::new("/proc/self").exists() {
            return;
        }
        let root = tempfile::tempdir().unwrap();
        let folder = root.path().join("reviews");
        fs::create_dir_all(&folder).unwrap();
        let lock_path = folder.join(LOCK_FILENAME);
        // far above any pid_max, so no such process exists
        fs::write(&lock_path, "4294967294\n").unwrap();

        let store = DirectoryStore::open(root.path(), "reviews").unwrap();
        assert_eq!(fs::read_to_string(&lock_path).unwrap().trim(), std::process::id().to_string());
        drop(store);
        assert!(!lock_path.exists());
    }

    #[test]
    fn test_legacy_duplicates_folded() {
        let root = tempfile::tempdir().unwrap();
        let store = DirectoryStore::open(root.path(), "reviews").unwrap();
        store.insert(call(100, TruthStatus::Suspect)).unwrap();

        // an older duplicate under a different name
        let long_ago = Utc::now() - chrono::Duration::days(365);
        write_legacy(store.folder(), "legacy_0001", &call(100, TruthStatus::FalsePositive), long_ago);
        store.reload().unwrap();
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(visible(&store, 100), vec![TruthStatus::Suspect]);

        // removal takes out both documents
        let outcome = store.remove_by_key(&call(100, TruthStatus::Unknown).call_key()).unwrap();
        assert_eq!(outcome.removed_count(), 2);
        assert!(outcome.is_clean());
        assert_eq!(document_count(store.folder()), 0);
        assert!(visible(&store, 100).is_empty());
    }

    #[test]
    fn test_insert_cleans_newer_legacy_duplicate() {
        let root = tempfile::tempdir().unwrap();
        let store = DirectoryStore::open(root.path(), "reviews").unwrap();
        let in_future = Utc::now() + chrono::Duration::days(1);
        write_legacy(store.folder(), "legacy_0002", &call(300, TruthStatus::FalsePositive), in_future);
        store.reload().unwrap();
        assert_eq!(visible(&store, 300), vec![TruthStatus::FalsePositive]);

        store.insert(call(300, TruthStatus::TruePositive)).unwrap();
        assert_eq!(visible(&store, 300), vec![TruthStatus::TruePositive]);
        assert_eq!(document_count(store.folder()), 1);
        assert!(!store.folder().join("legacy_0002.json").exists());
    }

    #[test]
    fn test_partial_removal_reports_errors() {
        let root = tempfile::tempdir().unwrap();
        let store = DirectoryStore::open(root.path(), "reviews").unwrap();
        store.insert(call(100, TruthStatus::TruePositive)).unwrap();
        let long_ago = Utc::now() - chrono::Duration::days(1);
        write_legacy(store.folder(), "legacy_0003", &call(100, TruthStatus::FalsePositive), long_ago);
        store.reload().unwrap();
        assert_eq!(visible(&store, 100), vec![TruthStatus::TruePositive]);

        // swap the legacy document for a folder so deleting it fails
        let legacy_path = store.folder().join("legacy_0003.json");
        fs::remove_file(&legacy_path).unwrap();
        fs::create_dir(&legacy_path).unwrap();

        let key = call(100, TruthStatus::Unknown).call_key();
        let outcome = store.remove_by_key(&key).unwrap();
        assert_eq!(outcome.removed_count(), 1);
        assert_eq!(outcome.error_count(), 1);
        assert_eq!(outcome.errors()["legacy_0003"].kind(), StoreErrorKind::Io);
        // the deleted canonical content is gone, the surviving legacy document is what remains
        assert_eq!(visible(&store, 100), vec![TruthStatus::FalsePositive]);
        assert!(!store.folder().join(format!("{}.json", key.document_id())).exists());

        // once the obstacle is gone the retry finishes the job
        fs::remove_dir(&legacy_path).unwrap();
        let outcome = store.remove_by_key(&key).unwrap();
        assert_eq!(outcome.removed_count(), 0);
        assert!(outcome.is_clean());
        assert!(visible(&store, 100).is_empty());
    }

    #[test]
    fn test_failed_legacy_cleanup_keeps_older_content() {
        let root = tempfile::tempdir().unwrap();
        let store = DirectoryStore::open(root.path(), "reviews").unwrap();
        let long_ago = Utc::now() - chrono::Duration::days(1);
        write_legacy(store.folder(), "legacy_0004", &call(400, TruthStatus::Suspect), long_ago);
        store.reload().unwrap();
        let legacy_path = store.folder().join("legacy_0004.json");
        fs::remove_file(&legacy_path).unwrap();
        fs::create_dir(&legacy_path).unwrap();

        // the new canonical document wins even though the legacy one could not be deleted
        store.insert(call(400, TruthStatus::TruePositive)).unwrap();
        assert_eq!(visible(&store, 400), vec![TruthStatus::TruePositive]);

        let key = call(400, TruthStatus::Unknown).call_key();
        let outcome = store.remove_by_key(&key).unwrap();
        assert_eq!(outcome.removed_count(), 1);
        assert_eq!(outcome.error_count(), 1);
        assert_eq!(visible(&store, 400), vec![TruthStatus::Suspect]);
    }

    #[test]
    fn test_reload_sees_external_writes() {
        let root = tempfile::tempdir().unwrap();
        let store = DirectoryStore::open(root.path(), "reviews").unwrap();
        let external = call(700, TruthStatus::TruePositive);
        write_legacy(store.folder(), &external.call_key().document_id(), &external, Utc::now());
        assert!(visible(&store, 700).is_empty());

        store.reload().unwrap();
        assert_eq!(visible(&store, 700), vec![TruthStatus::TruePositive]);
    }

    #[test]
    fn test_corrupt_document() {
        let root = tempfile::tempdir().unwrap();
        let folder = root.path().join("reviews");
        fs::create_dir_all(&folder).unwrap();
        fs::write(folder.join("broken.json"), "{ not json").unwrap();

        let err = DirectoryStore::open(root.path(), "reviews").unwrap_err();
        assert_eq!(err.kind(), StoreErrorKind::Serialization);
        // a failed open must not leave the lock behind
        assert!(!folder.join(LOCK_FILENAME).exists());
    }
}
