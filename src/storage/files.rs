use redb::ReadableTable;

use super::db::{Database, DatabaseError};
use super::models::FileRecord;
use super::tables::*;

impl Database {
    // ========================================================================
    // File operations
    // ========================================================================

    /// Store a new file record and update the digest and filename indexes.
    ///
    /// Fails with [`DatabaseError::DuplicateDigest`] if the digest is already
    /// recorded; nothing is written in that case.
    pub fn insert_file(&self, file: &FileRecord) -> Result<(), DatabaseError> {
        debug_assert!(!file.id.is_empty(), "file id must not be empty");

        let write_txn = self.begin_write()?;
        {
            let mut digest_table = write_txn.open_table(FILE_DIGESTS)?;
            let existing_id = digest_table
                .get(file.digest.as_str())?
                .map(|v| v.value().to_string());
            if let Some(existing_id) = existing_id {
                return Err(DatabaseError::DuplicateDigest {
                    digest: file.digest.clone(),
                    existing_id,
                });
            }
            digest_table.insert(file.digest.as_str(), file.id.as_str())?;

            let mut table = write_txn.open_table(FILES)?;
            let data = rmp_serde::to_vec_named(file)?;
            table.insert(file.id.as_str(), data.as_slice())?;

            // Several records may share a filename
            let mut filename_table = write_txn.open_table(FILENAME_FILES)?;
            let mut file_ids: Vec<String> = match filename_table.get(file.filename.as_str())? {
                Some(data) => rmp_serde::from_slice(data.value())?,
                None => Vec::new(),
            };
            if !file_ids.contains(&file.id) {
                file_ids.push(file.id.clone());
                let index_data = rmp_serde::to_vec_named(&file_ids)?;
                filename_table.insert(file.filename.as_str(), index_data.as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Get a file by its UUID
    pub fn get_file(&self, id: &str) -> Result<Option<FileRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(FILES)?;

        match table.get(id)? {
            Some(data) => {
                let file: FileRecord = rmp_serde::from_slice(data.value())?;
                Ok(Some(file))
            }
            None => Ok(None),
        }
    }

    /// Get a file by its content digest (resolves digest -> uuid -> file)
    pub fn get_file_by_digest(&self, digest: &str) -> Result<Option<FileRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let digest_table = read_txn.open_table(FILE_DIGESTS)?;

        let id = match digest_table.get(digest)? {
            Some(data) => data.value().to_string(),
            None => return Ok(None),
        };

        let files_table = read_txn.open_table(FILES)?;
        match files_table.get(id.as_str())? {
            Some(data) => {
                let file: FileRecord = rmp_serde::from_slice(data.value())?;
                Ok(Some(file))
            }
            None => Ok(None),
        }
    }

    /// All files whose filename starts with `prefix` (case-sensitive), in filename order.
    pub fn get_files_by_filename_prefix(
        &self,
        prefix: &str,
    ) -> Result<Vec<FileRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let filename_table = read_txn.open_table(FILENAME_FILES)?;
        let files_table = read_txn.open_table(FILES)?;

        let mut files = Vec::new();
        for result in filename_table.range(prefix..)? {
            let (filename, ids) = result?;
            if !filename.value().starts_with(prefix) {
                break;
            }
            let file_ids: Vec<String> = rmp_serde::from_slice(ids.value())?;
            for file_id in file_ids {
                if let Some(data) = files_table.get(file_id.as_str())? {
                    let file: FileRecord = rmp_serde::from_slice(data.value())?;
                    files.push(file);
                }
            }
        }

        Ok(files)
    }

    /// Get all files (for index rebuild)
    pub fn get_all_files(&self) -> Result<Vec<FileRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(FILES)?;

        let mut files = Vec::new();
        for result in table.iter()? {
            let (_, value) = result?;
            let file: FileRecord = rmp_serde::from_slice(value.value())?;
            files.push(file);
        }

        Ok(files)
    }
}
