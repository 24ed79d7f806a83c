use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A file entry in the metadata store. Digest and key never change after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: String,
    pub owner: String,
    pub filename: String,
    /// Content hash as supplied by the client (hex SHA-256 in practice).
    pub digest: String,
    pub sensitivity: u32,
    /// Base64 data key. Stored unwrapped.
    pub encrypted_key: String,
    #[serde(default)]
    pub department: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Download,
}

/// An access decision. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Assigned by the store on append.
    #[serde(default)]
    pub seq: u64,
    pub user: String,
    pub file_id: String,
    pub action: AuditAction,
    pub allowed: bool,
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(user: &str, file_id: &str, action: AuditAction, allowed: bool) -> Self {
        Self {
            seq: 0,
            user: user.to_string(),
            file_id: file_id.to_string(),
            action,
            allowed,
            timestamp: Utc::now(),
        }
    }
}
