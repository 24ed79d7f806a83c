use redb::TableDefinition;

/// File records: uuid -> FileRecord (msgpack)
pub const FILES: TableDefinition<&str, &[u8]> = TableDefinition::new("files");

/// Dedup index: content digest -> uuid (unique)
pub const FILE_DIGESTS: TableDefinition<&str, &str> = TableDefinition::new("file_digests");

/// Filename index: filename -> msgpack Vec of file UUIDs. Key order serves prefix scans.
pub const FILENAME_FILES: TableDefinition<&str, &[u8]> = TableDefinition::new("filename_files");

/// Audit log: sequence number -> AuditEvent (msgpack)
pub const AUDIT_EVENTS: TableDefinition<u64, &[u8]> = TableDefinition::new("audit_events");
