mod audit;
pub mod db;
mod files;
pub mod models;
mod tables;

pub use db::{Database, DatabaseError};
pub use models::{AuditAction, AuditEvent, FileRecord};
pub use tables::*;

/// The authoritative record of files and access decisions.
///
/// Index answers are only hints; every positive is confirmed here.
pub trait MetadataStore: Send + Sync {
    /// Persist a new record. Rejects a digest that is already recorded.
    fn insert(&self, record: &FileRecord) -> Result<(), DatabaseError>;
    fn find_by_digest(&self, digest: &str) -> Result<Option<FileRecord>, DatabaseError>;
    fn find_by_id(&self, id: &str) -> Result<Option<FileRecord>, DatabaseError>;
    fn find_by_filename_prefix(&self, prefix: &str) -> Result<Vec<FileRecord>, DatabaseError>;
    fn all_files(&self) -> Result<Vec<FileRecord>, DatabaseError>;
    fn append_audit(&self, event: &AuditEvent) -> Result<u64, DatabaseError>;
    /// Most recent first.
    fn list_audit(&self, limit: usize) -> Result<Vec<AuditEvent>, DatabaseError>;
}

impl MetadataStore for Database {
    fn insert(&self, record: &FileRecord) -> Result<(), DatabaseError> {
        self.insert_file(record)
    }

    fn find_by_digest(&self, digest: &str) -> Result<Option<FileRecord>, DatabaseError> {
        self.get_file_by_digest(digest)
    }

    fn find_by_id(&self, id: &str) -> Result<Option<FileRecord>, DatabaseError> {
        self.get_file(id)
    }

    fn find_by_filename_prefix(&self, prefix: &str) -> Result<Vec<FileRecord>, DatabaseError> {
        self.get_files_by_filename_prefix(prefix)
    }

    fn all_files(&self) -> Result<Vec<FileRecord>, DatabaseError> {
        self.get_all_files()
    }

    fn append_audit(&self, event: &AuditEvent) -> Result<u64, DatabaseError> {
        Database::append_audit(self, event)
    }

    fn list_audit(&self, limit: usize) -> Result<Vec<AuditEvent>, DatabaseError> {
        Database::list_audit(self, limit)
    }
}
