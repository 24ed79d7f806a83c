//! secure-file-store - Encrypted file storage with fast dedup and prefix search
//!
//! This crate provides file registration, encrypted content storage and
//! audited downloads with:
//! - A Bloom filter over content digests for cheap duplicate checks
//! - A character trie over filenames for prefix search
//! - Per-file AES-256-GCM data keys
//! - Department/clearance access control with an audit trail
//! - Swappable object storage backends (local filesystem, S3/MinIO)
//! - redb embedded database for metadata (ACID, MVCC, crash-safe)

pub mod api;
pub mod config;
pub mod crypto;
pub mod index;
pub mod object_store;
pub mod storage;
pub mod vault;
#[cfg(test)]
pub mod testutil;

use config::Config;
use vault::Vault;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub vault: Vault,
}
