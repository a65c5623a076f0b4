//! Snapshot store — the record set already pushed to the CRM.
//!
//! Persists a [`Snapshot`] as a JSON array under one key of a [`BlobStore`].
//! The filesystem backend lays buckets out as
//! `<data_dir>/<bucket>/<key>` and writes with the `.tmp` + rename pattern.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use leadsync_core::{RawRecord, Snapshot};

use crate::error::{io_err, StorageError};

// ---------------------------------------------------------------------------
// 1. Blob interface
// ---------------------------------------------------------------------------

/// A bucket of named byte blobs. Last writer wins.
pub trait BlobStore {
    /// Name of the bucket, for error messages and logs.
    fn bucket(&self) -> &str;

    /// Read a blob. `Ok(None)` when nothing is stored under `key`.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Overwrite the blob under `key`.
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// Remove the blob under `key`. Returns whether anything was removed.
    fn delete(&self, key: &str) -> Result<bool, StorageError>;
}

/// Directory-backed bucket: `<root>/<bucket>/<key>`.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
    bucket: String,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>, bucket: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            bucket: bucket.into(),
        }
    }

    /// `<root>/<bucket>/<key>` — pure, no I/O.
    pub fn blob_path(&self, key: &str) -> PathBuf {
        self.root.join(&self.bucket).join(key)
    }
}

impl BlobStore for FsBlobStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.blob_path(key);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_err(path, err)),
        }
    }

    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.blob_path(key);
        let Some(dir) = path.parent() else {
            return Err(io_err(
                path,
                std::io::Error::other("invalid blob path"),
            ));
        };
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

        let tmp = tmp_path(&path);
        std::fs::write(&tmp, bytes).map_err(|e| io_err(&tmp, e))?;
        if let Err(e) = std::fs::rename(&tmp, &path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(io_err(&path, e));
        }
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let path = self.blob_path(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(io_err(path, err)),
        }
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// In-process bucket, used by tests in place of the filesystem.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    bucket: String,
    blobs: RefCell<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            blobs: RefCell::default(),
        }
    }

    /// Seed or inspect raw contents directly.
    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.blobs.borrow().get(key).cloned()
    }

    pub fn insert_raw(&self, key: &str, bytes: impl Into<Vec<u8>>) {
        self.blobs.borrow_mut().insert(key.to_string(), bytes.into());
    }
}

impl BlobStore for MemoryBlobStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.raw(key))
    }

    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        self.insert_raw(key, bytes);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.blobs.borrow_mut().remove(key).is_some())
    }
}

// ---------------------------------------------------------------------------
// 2. Snapshot store
// ---------------------------------------------------------------------------

/// Load/save a [`Snapshot`] under a fixed key of a blob bucket.
#[derive(Debug)]
pub struct SnapshotStore<B> {
    blobs: B,
    key: String,
}

impl<B: BlobStore> SnapshotStore<B> {
    pub fn new(blobs: B, key: impl Into<String>) -> Self {
        Self {
            blobs,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn blobs(&self) -> &B {
        &self.blobs
    }

    /// Read and parse the stored snapshot.
    ///
    /// Returns [`StorageError::NotFound`] if nothing is stored yet and
    /// [`StorageError::Malformed`] if the blob is not a JSON array of objects.
    pub fn load(&self) -> Result<Snapshot, StorageError> {
        let Some(bytes) = self.blobs.get(&self.key)? else {
            return Err(StorageError::NotFound {
                bucket: self.blobs.bucket().to_string(),
                key: self.key.clone(),
            });
        };
        serde_json::from_slice::<Snapshot>(&bytes).map_err(|source| StorageError::Malformed {
            bucket: self.blobs.bucket().to_string(),
            key: self.key.clone(),
            source,
        })
    }

    /// Overwrite the stored snapshot with `records`.
    pub fn save(&self, records: &[RawRecord]) -> Result<(), StorageError> {
        let json = serde_json::to_vec(records)?;
        self.blobs.put(&self.key, &json)?;
        tracing::debug!(
            "saved snapshot {}/{} ({} records)",
            self.blobs.bucket(),
            self.key,
            records.len()
        );
        Ok(())
    }

    /// Remove the stored snapshot so the next run starts from scratch.
    pub fn clear(&self) -> Result<bool, StorageError> {
        self.blobs.delete(&self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn records() -> Vec<RawRecord> {
        vec![
            json!({"ID": "1", "Email": "a@x.com", "Monthly Income": "10k"}),
            json!({"ID": "2", "Email": "b@x.com", "Monthly Income": null}),
        ]
        .into_iter()
        .map(|v| v.as_object().cloned().unwrap())
        .collect()
    }

    fn fs_store(tmp: &TempDir) -> SnapshotStore<FsBlobStore> {
        SnapshotStore::new(FsBlobStore::new(tmp.path(), "leadscheckout"), "json_atual.json")
    }

    #[test]
    fn missing_blob_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = fs_store(&tmp).load().unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[test]
    fn roundtrip_save_load() {
        let tmp = TempDir::new().unwrap();
        let store = fs_store(&tmp);
        store.save(&records()).unwrap();
        assert_eq!(store.load().unwrap().records, records());
    }

    #[test]
    fn blob_is_a_bare_json_array_at_bucket_path() {
        let tmp = TempDir::new().unwrap();
        let store = fs_store(&tmp);
        store.save(&records()).unwrap();

        let path = tmp.path().join("leadscheckout").join("json_atual.json");
        let text = std::fs::read_to_string(path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn tmp_file_cleaned_up_after_save() {
        let tmp = TempDir::new().unwrap();
        let store = fs_store(&tmp);
        store.save(&records()).unwrap();
        let tmp_file = tmp.path().join("leadscheckout").join("json_atual.json.tmp");
        assert!(!tmp_file.exists(), "tmp file should be removed after atomic rename");
    }

    #[test]
    fn save_overwrites_previous_contents() {
        let tmp = TempDir::new().unwrap();
        let store = fs_store(&tmp);
        store.save(&records()).unwrap();
        store.save(&records()[..1]).unwrap();
        assert_eq!(store.load().unwrap().len(), 1);
    }

    #[test]
    fn malformed_blob_is_reported() {
        let blobs = MemoryBlobStore::new("leadscheckout");
        blobs.insert_raw("json_atual.json", "{\"not\": \"an array\"}");
        let store = SnapshotStore::new(blobs, "json_atual.json");
        let err = store.load().unwrap_err();
        assert!(matches!(err, StorageError::Malformed { .. }));
        assert!(err.to_string().contains("leadscheckout/json_atual.json"));
    }

    #[test]
    fn clear_removes_blob_once() {
        let tmp = TempDir::new().unwrap();
        let store = fs_store(&tmp);
        store.save(&records()).unwrap();
        assert!(store.clear().unwrap());
        assert!(!store.clear().unwrap());
        assert!(matches!(store.load().unwrap_err(), StorageError::NotFound { .. }));
    }

    #[test]
    fn empty_array_loads_as_empty_snapshot() {
        let blobs = MemoryBlobStore::new("b");
        blobs.insert_raw("k", "[]");
        let store = SnapshotStore::new(blobs, "k");
        assert!(store.load().unwrap().is_empty());
    }
}
