use anyhow::Result;
use rusqlite::{OptionalExtension, params};

use crate::models::BlobRow;
use crate::{Database, now_rfc3339};

impl Database {
    /// Open a blob: the row exists before any chunks so chunk inserts have a
    /// parent to reference. Size, chunk count, and digest land at finalize.
    pub fn create_blob(
        &self,
        id: &str,
        file_name: &str,
        mime_type: &str,
        chunk_size: i64,
        source: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO blobs (id, file_name, mime_type, chunk_size, source, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![id, file_name, mime_type, chunk_size, source, now_rfc3339()],
            )?;
            Ok(())
        })
    }

    pub fn append_chunk(&self, blob_id: &str, chunk_index: i64, data: &[u8]) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO blob_chunks (blob_id, chunk_index, data) VALUES (?1, ?2, ?3)",
                params![blob_id, chunk_index, data],
            )?;
            Ok(())
        })
    }

    pub fn finalize_blob(
        &self,
        blob_id: &str,
        size: i64,
        chunk_count: i64,
        sha256: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE blobs SET size = ?1, chunk_count = ?2, sha256 = ?3 WHERE id = ?4",
                params![size, chunk_count, sha256, blob_id],
            )?;
            Ok(())
        })
    }

    pub fn get_blob(&self, id: &str) -> Result<Option<BlobRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, file_name, mime_type, size, chunk_size, chunk_count,
                        sha256, source, created_at
                 FROM blobs WHERE id = ?1",
                [id],
                |row| {
                    Ok(BlobRow {
                        id: row.get(0)?,
                        file_name: row.get(1)?,
                        mime_type: row.get(2)?,
                        size: row.get(3)?,
                        chunk_size: row.get(4)?,
                        chunk_count: row.get(5)?,
                        sha256: row.get(6)?,
                        source: row.get(7)?,
                        created_at: row.get(8)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
        })
    }

    pub fn read_chunk(&self, blob_id: &str, chunk_index: i64) -> Result<Option<Vec<u8>>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT data FROM blob_chunks WHERE blob_id = ?1 AND chunk_index = ?2",
                params![blob_id, chunk_index],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
        })
    }

    /// Chunks go with the row via ON DELETE CASCADE. Used to back out a
    /// partially ingested upload.
    pub fn delete_blob(&self, id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM blobs WHERE id = ?1", [id])?;
            Ok(())
        })
    }
}
