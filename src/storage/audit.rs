use redb::ReadableTable;

use super::db::{Database, DatabaseError};
use super::models::AuditEvent;
use super::tables::*;

impl Database {
    // ========================================================================
    // Audit log
    // ========================================================================

    /// Append an event, returning its sequence number (starting at 1).
    pub fn append_audit(&self, event: &AuditEvent) -> Result<u64, DatabaseError> {
        let write_txn = self.begin_write()?;
        let seq = {
            let mut table = write_txn.open_table(AUDIT_EVENTS)?;
            let seq = table.last()?.map(|(k, _)| k.value() + 1).unwrap_or(1);

            let mut stored = event.clone();
            stored.seq = seq;
            let data = rmp_serde::to_vec_named(&stored)?;
            table.insert(seq, data.as_slice())?;
            seq
        };
        write_txn.commit()?;
        Ok(seq)
    }

    /// Up to `limit` events, most recent first.
    pub fn list_audit(&self, limit: usize) -> Result<Vec<AuditEvent>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(AUDIT_EVENTS)?;

        let mut events = Vec::new();
        for result in table.iter()?.rev().take(limit) {
            let (_, value) = result?;
            let event: AuditEvent = rmp_serde::from_slice(value.value())?;
            events.push(event);
        }

        Ok(events)
    }
}
