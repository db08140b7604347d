use anyhow::Result;
use rusqlite::{OptionalExtension, params};

use crate::models::AttachmentRow;
use crate::{Database, now_rfc3339};

pub struct NewAttachment<'a> {
    pub id: &'a str,
    pub blob_id: &'a str,
    pub conversation_id: &'a str,
    pub file_name: &'a str,
    pub mime_type: &'a str,
    pub size: i64,
    pub uploader_id: &'a str,
}

impl Database {
    /// Metadata row only; the bytes are already in the blob store.
    /// `message_id` stays null until a sent message references it.
    pub fn create_attachment(&self, att: NewAttachment<'_>) -> Result<AttachmentRow> {
        let created_at = now_rfc3339();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO attachments
                     (id, blob_id, conversation_id, file_name, mime_type, size, uploader_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    att.id,
                    att.blob_id,
                    att.conversation_id,
                    att.file_name,
                    att.mime_type,
                    att.size,
                    att.uploader_id,
                    &created_at,
                ],
            )?;
            Ok(())
        })?;

        Ok(AttachmentRow {
            id: att.id.into(),
            blob_id: att.blob_id.into(),
            conversation_id: att.conversation_id.into(),
            message_id: None,
            file_name: att.file_name.into(),
            mime_type: att.mime_type.into(),
            size: att.size,
            thumbnails: "[]".into(),
            uploader_id: att.uploader_id.into(),
            created_at,
        })
    }

    pub fn get_attachment(&self, id: &str) -> Result<Option<AttachmentRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, blob_id, conversation_id, message_id, file_name, mime_type,
                        size, thumbnails, uploader_id, created_at
                 FROM attachments WHERE id = ?1",
                [id],
                |row| {
                    Ok(AttachmentRow {
                        id: row.get(0)?,
                        blob_id: row.get(1)?,
                        conversation_id: row.get(2)?,
                        message_id: row.get(3)?,
                        file_name: row.get(4)?,
                        mime_type: row.get(5)?,
                        size: row.get(6)?,
                        thumbnails: row.get(7)?,
                        uploader_id: row.get(8)?,
                        created_at: row.get(9)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
        })
    }

    /// Stamp `message_id` onto uploaded-but-unreferenced attachments when
    /// the message referencing them is sent. Scoped to the conversation so
    /// a message can never claim another conversation's uploads.
    pub fn link_attachments(
        &self,
        conversation_id: &str,
        message_id: i64,
        attachment_ids: &[String],
    ) -> Result<usize> {
        if attachment_ids.is_empty() {
            return Ok(0);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> = (3..3 + attachment_ids.len())
                .map(|i| format!("?{i}"))
                .collect();
            let sql = format!(
                "UPDATE attachments SET message_id = ?1
                 WHERE conversation_id = ?2 AND message_id IS NULL AND id IN ({})",
                placeholders.join(", ")
            );

            let mut params: Vec<&dyn rusqlite::types::ToSql> = vec![&message_id, &conversation_id];
            for id in attachment_ids {
                params.push(id);
            }

            let n = conn.execute(&sql, params.as_slice())?;
            Ok(n)
        })
    }
}
