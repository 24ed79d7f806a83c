//! Dedup, search and download workflows.
//!
//! The vault owns the two in-memory indexes and consults them before the
//! metadata store. The store is always written first; indexes follow once
//! the record is committed, so a failed index update can only leave an
//! index behind the store, never ahead of it.

pub mod policy;

pub use policy::{is_allowed, Requester};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use bytes::Bytes;
use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, error, info, warn};

use crate::crypto::{self, CryptoError, DataKey};
use crate::index::{BloomFilter, IndexError, PrefixIndex};
use crate::object_store::{ObjectStore, ObjectStoreError};
use crate::storage::{AuditAction, AuditEvent, DatabaseError, FileRecord, MetadataStore};

/// Above this estimated false-positive rate the membership index is undersized.
const FALSE_POSITIVE_WARN_RATE: f64 = 0.01;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Access denied")]
    Forbidden,
    #[error("Content already uploaded for file {0}")]
    AlreadyUploaded(String),
    #[error("Stored content failed authentication")]
    AuthenticationFailure,
    #[error("Index allocation failed")]
    ResourceExhausted,
    #[error("Index invariant violated: {0}")]
    InvariantViolation(String),
    #[error("Vault has been shut down")]
    Closed,
    #[error("Crypto error: {0}")]
    Crypto(CryptoError),
    #[error("Metadata store error: {0}")]
    Database(#[from] DatabaseError),
    #[error("Blob store error: {0}")]
    ObjectStore(#[from] ObjectStoreError),
}

impl From<CryptoError> for VaultError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::AuthenticationFailure => VaultError::AuthenticationFailure,
            other => VaultError::Crypto(other),
        }
    }
}

impl From<IndexError> for VaultError {
    fn from(e: IndexError) -> Self {
        match e {
            IndexError::InvalidSize(msg) => VaultError::InvalidInput(msg.to_string()),
            IndexError::ResourceExhausted => VaultError::ResourceExhausted,
        }
    }
}

/// Sizing for the membership index. Fixed for the life of the vault.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexConfig {
    pub bloom_bits: u64,
    pub bloom_hashes: u32,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            bloom_bits: 8 * 1024 * 8,
            bloom_hashes: 6,
        }
    }
}

/// Registration request for a file.
#[derive(Debug, Clone)]
pub struct NewFile {
    pub filename: String,
    pub digest: String,
    pub sensitivity: u32,
    pub department: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Created { id: String },
    Exists { id: String },
}

impl CreateOutcome {
    pub fn id(&self) -> &str {
        match self {
            CreateOutcome::Created { id } | CreateOutcome::Exists { id } => id,
        }
    }
}

/// Decrypted content ready to hand back to the requester.
#[derive(Debug)]
pub struct Download {
    pub filename: String,
    pub data: Bytes,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub bloom_bits: u64,
    pub bloom_hashes: u32,
    pub digests_indexed: u64,
    pub estimated_false_positive_rate: f64,
    pub filenames_indexed: usize,
    pub prefix_nodes: usize,
    pub prefix_index_stale: bool,
}

pub struct Vault {
    store: Arc<dyn MetadataStore>,
    blobs: Arc<dyn ObjectStore>,
    digests: RwLock<Option<BloomFilter>>,
    filenames: RwLock<Option<PrefixIndex>>,
    /// Set when a filename could not be indexed; search then skips the negative shortcut.
    filenames_stale: AtomicBool,
    /// Serializes the check-then-insert sequence of file creation.
    create_lock: Mutex<()>,
    /// One lock per file id with an upload in flight.
    upload_locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

/// Holds a file id's upload lock; drops the map entry once nobody else waits on it.
struct UploadSlot<'a> {
    locks: &'a Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    id: String,
    lock: Arc<AsyncMutex<()>>,
}

impl<'a> UploadSlot<'a> {
    fn acquire(locks: &'a Mutex<HashMap<String, Arc<AsyncMutex<()>>>>, id: &str) -> Self {
        let lock = locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(id.to_string())
            .or_default()
            .clone();
        Self {
            locks,
            id: id.to_string(),
            lock,
        }
    }
}

impl Drop for UploadSlot<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // The map and this slot hold the only references
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.id);
        }
    }
}

impl Vault {
    /// Build both indexes from every record in the store.
    pub fn open(
        store: Arc<dyn MetadataStore>,
        blobs: Arc<dyn ObjectStore>,
        config: IndexConfig,
    ) -> Result<Self, VaultError> {
        let mut digests = BloomFilter::new(config.bloom_bits, config.bloom_hashes)?;
        let mut filenames = PrefixIndex::new();
        let mut stale = false;

        let records = store.all_files()?;
        for record in &records {
            digests.add(record.digest.as_bytes());
            if let Err(e) = filenames.insert(&record.filename) {
                warn!(file_id = %record.id, error = %e, "Failed to index filename during rebuild");
                stale = true;
            }
        }

        let fp_rate = digests.estimated_false_positive_rate();
        info!(
            files = records.len(),
            bloom_bits = config.bloom_bits,
            bloom_hashes = config.bloom_hashes,
            estimated_fp_rate = fp_rate,
            "Indexes rebuilt from metadata store"
        );
        if fp_rate > FALSE_POSITIVE_WARN_RATE {
            warn!(
                estimated_fp_rate = fp_rate,
                "Membership index is undersized for the current file count"
            );
        }

        Ok(Self {
            store,
            blobs,
            digests: RwLock::new(Some(digests)),
            filenames: RwLock::new(Some(filenames)),
            filenames_stale: AtomicBool::new(stale),
            create_lock: Mutex::new(()),
            upload_locks: Mutex::new(HashMap::new()),
        })
    }

    /// Register a file, or return the existing record with the same digest.
    pub fn create_file(&self, owner: &str, new: NewFile) -> Result<CreateOutcome, VaultError> {
        if new.filename.is_empty() {
            return Err(VaultError::InvalidInput("filename is required".to_string()));
        }
        if new.digest.is_empty() {
            return Err(VaultError::InvalidInput("digest is required".to_string()));
        }

        let _guard = self.create_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let maybe_present = self
            .read_digests()
            .as_ref()
            .ok_or(VaultError::Closed)?
            .check(new.digest.as_bytes());

        if maybe_present {
            if let Some(existing) = self.store.find_by_digest(&new.digest)? {
                debug!(file_id = %existing.id, "Digest already recorded");
                return Ok(CreateOutcome::Exists { id: existing.id });
            }
            debug!(digest = %new.digest, "Membership index false positive");
        }

        let key = DataKey::generate()?;
        let record = FileRecord {
            id: uuid::Uuid::new_v4().to_string(),
            owner: owner.to_string(),
            filename: new.filename,
            digest: new.digest,
            sensitivity: new.sensitivity,
            encrypted_key: key.encode(),
            department: new.department,
            created_at: Utc::now(),
        };

        match self.store.insert(&record) {
            Ok(()) => {}
            // Another writer outside this vault recorded it after our lookup
            Err(DatabaseError::DuplicateDigest { existing_id, .. }) if maybe_present => {
                return Ok(CreateOutcome::Exists { id: existing_id });
            }
            Err(DatabaseError::DuplicateDigest {
                digest,
                existing_id,
            }) => {
                error!(%digest, %existing_id, "Membership index reported a recorded digest as absent");
                return Err(VaultError::InvariantViolation(format!(
                    "digest {digest} is recorded for file {existing_id} but missing from the membership index"
                )));
            }
            Err(e) => return Err(e.into()),
        }

        self.write_digests()
            .as_mut()
            .ok_or(VaultError::Closed)?
            .add(record.digest.as_bytes());

        let indexed = self
            .write_filenames()
            .as_mut()
            .ok_or(VaultError::Closed)?
            .insert(&record.filename);
        if let Err(e) = indexed {
            warn!(file_id = %record.id, error = %e, "Prefix index update failed");
            self.mark_filenames_stale();
        }

        info!(file_id = %record.id, filename = %record.filename, "Created file record");
        Ok(CreateOutcome::Created { id: record.id })
    }

    /// Files whose name starts with `term`. An empty term matches nothing.
    pub fn search(&self, term: &str) -> Result<Vec<FileRecord>, VaultError> {
        if term.is_empty() {
            return Ok(Vec::new());
        }

        let has_prefix = self
            .read_filenames()
            .as_ref()
            .ok_or(VaultError::Closed)?
            .has_prefix(term);

        if !has_prefix && !self.filenames_stale.load(Ordering::Acquire) {
            return Ok(Vec::new());
        }

        Ok(self.store.find_by_filename_prefix(term)?)
    }

    pub fn get_file(&self, id: &str) -> Result<FileRecord, VaultError> {
        self.ensure_open()?;
        self.store
            .find_by_id(id)?
            .ok_or_else(|| VaultError::NotFound(format!("file {id}")))
    }

    /// Encrypt `plaintext` under the file's key and store it. One upload per file.
    ///
    /// Concurrent uploads for the same id are serialized, so exactly one succeeds.
    pub async fn upload(&self, id: &str, plaintext: Bytes) -> Result<(), VaultError> {
        let record = self.get_file(id)?;

        let slot = UploadSlot::acquire(&self.upload_locks, id);
        let _guard = slot.lock.lock().await;

        if self.blobs.exists(id).await? {
            return Err(VaultError::AlreadyUploaded(id.to_string()));
        }

        let key = DataKey::decode(&record.encrypted_key)?;
        let blob = crypto::encrypt(&key, &plaintext)?;
        self.blobs.put(id, Bytes::from(blob)).await?;

        debug!(file_id = %id, bytes = plaintext.len(), "Stored encrypted blob");
        Ok(())
    }

    /// Check access, audit the decision, then fetch and decrypt the blob.
    pub async fn download(
        &self,
        requester: &Requester,
        id: &str,
    ) -> Result<Download, VaultError> {
        let record = self.get_file(id)?;

        let allowed = is_allowed(requester, &record);
        self.store.append_audit(&AuditEvent::new(
            &requester.id,
            id,
            AuditAction::Download,
            allowed,
        ))?;
        info!(user = %requester.id, file_id = %id, allowed, "Download access decision");

        if !allowed {
            return Err(VaultError::Forbidden);
        }

        let blob = self.blobs.get(id).await.map_err(|e| match e {
            ObjectStoreError::NotFound(_) => VaultError::NotFound(format!("content for file {id}")),
            other => VaultError::ObjectStore(other),
        })?;

        let key = DataKey::decode(&record.encrypted_key)?;
        let plaintext = crypto::decrypt(&key, &blob).inspect_err(|_| {
            warn!(file_id = %id, "Stored blob failed authentication");
        })?;

        Ok(Download {
            filename: record.filename,
            data: Bytes::from(plaintext),
        })
    }

    /// Most recent first.
    pub fn list_audit(&self, limit: usize) -> Result<Vec<AuditEvent>, VaultError> {
        Ok(self.store.list_audit(limit)?)
    }

    pub fn index_stats(&self) -> Result<IndexStats, VaultError> {
        let digests = self.read_digests();
        let digests = digests.as_ref().ok_or(VaultError::Closed)?;
        let filenames = self.read_filenames();
        let filenames = filenames.as_ref().ok_or(VaultError::Closed)?;

        Ok(IndexStats {
            bloom_bits: digests.num_bits(),
            bloom_hashes: digests.num_hashes(),
            digests_indexed: digests.insertions(),
            estimated_false_positive_rate: digests.estimated_false_positive_rate(),
            filenames_indexed: filenames.len(),
            prefix_nodes: filenames.node_count(),
            prefix_index_stale: self.filenames_stale.load(Ordering::Acquire),
        })
    }

    /// Release both indexes. Safe to call more than once; later operations fail with `Closed`.
    pub fn shutdown(&self) {
        let _guard = self.create_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let released = self.write_digests().take().is_some();
        self.write_filenames().take();
        if released {
            info!("Indexes released");
        }
    }

    /// Search stops trusting negative prefix answers until the next rebuild.
    pub(crate) fn mark_filenames_stale(&self) {
        if !self.filenames_stale.swap(true, Ordering::AcqRel) {
            warn!("Prefix index marked stale, search will query the store directly");
        }
    }

    fn ensure_open(&self) -> Result<(), VaultError> {
        match self.read_digests().as_ref() {
            Some(_) => Ok(()),
            None => Err(VaultError::Closed),
        }
    }

    // Index contents are only ever grown, so a poisoned lock still guards usable state.

    fn read_digests(&self) -> RwLockReadGuard<'_, Option<BloomFilter>> {
        self.digests.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_digests(&self) -> RwLockWriteGuard<'_, Option<BloomFilter>> {
        self.digests.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_filenames(&self) -> RwLockReadGuard<'_, Option<PrefixIndex>> {
        self.filenames.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_filenames(&self) -> RwLockWriteGuard<'_, Option<PrefixIndex>> {
        self.filenames.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_store::LocalStore;
    use crate::storage::Database;

    fn open_vault(dir: &tempfile::TempDir) -> (Database, Vault) {
        let db = Database::open(dir.path().join("data")).unwrap();
        let blobs = LocalStore::new(dir.path().join("files")).unwrap();
        let vault = Vault::open(Arc::new(db.clone()), Arc::new(blobs), IndexConfig::default())
            .unwrap();
        (db, vault)
    }

    fn unindexed_record(filename: &str) -> FileRecord {
        FileRecord {
            id: "written-behind".to_string(),
            owner: "ops".to_string(),
            filename: filename.to_string(),
            digest: "D-behind".to_string(),
            sensitivity: 1,
            encrypted_key: "a2V5".to_string(),
            department: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn prefix_miss_short_circuits_while_index_is_current() {
        let dir = tempfile::tempdir().unwrap();
        let (db, vault) = open_vault(&dir);
        db.insert_file(&unindexed_record("orphaned.log")).unwrap();

        assert!(vault.search("orph").unwrap().is_empty());
        assert!(!vault.index_stats().unwrap().prefix_index_stale);
    }

    #[test]
    fn stale_prefix_index_falls_back_to_store() {
        let dir = tempfile::tempdir().unwrap();
        let (db, vault) = open_vault(&dir);
        vault
            .create_file(
                "alice",
                NewFile {
                    filename: "indexed.txt".to_string(),
                    digest: "D1".to_string(),
                    sensitivity: 1,
                    department: None,
                },
            )
            .unwrap();
        db.insert_file(&unindexed_record("orphaned.log")).unwrap();

        vault.mark_filenames_stale();
        vault.mark_filenames_stale();

        let found = vault.search("orph").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "written-behind");
        assert!(vault.search("nothing").unwrap().is_empty());
        assert_eq!(vault.search("indexed").unwrap().len(), 1);

        let stats = vault.index_stats().unwrap();
        assert!(stats.prefix_index_stale);
        assert_eq!(stats.filenames_indexed, 1);
    }

    #[test]
    fn reopen_clears_stale_flag_and_indexes_every_record() {
        let dir = tempfile::tempdir().unwrap();
        {
            let (db, vault) = open_vault(&dir);
            db.insert_file(&unindexed_record("orphaned.log")).unwrap();
            vault.mark_filenames_stale();
        }

        let (_db, vault) = open_vault(&dir);
        assert!(!vault.index_stats().unwrap().prefix_index_stale);
        assert_eq!(vault.search("orph").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn upload_locks_are_released() {
        let dir = tempfile::tempdir().unwrap();
        let (_db, vault) = open_vault(&dir);
        let id = vault
            .create_file(
                "alice",
                NewFile {
                    filename: "a.txt".to_string(),
                    digest: "D1".to_string(),
                    sensitivity: 1,
                    department: None,
                },
            )
            .unwrap()
            .id()
            .to_string();

        vault.upload(&id, Bytes::from("one")).await.unwrap();
        assert!(vault.upload(&id, Bytes::from("two")).await.is_err());
        assert!(vault
            .upload_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty());
    }
}
