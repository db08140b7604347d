use anyhow::Result;
use rusqlite::params;

use crate::models::ParticipantRow;
use crate::{Database, now_rfc3339};

impl Database {
    /// Upsert: the insert arm sets `joined_at` once; the update arm only
    /// touches `role`, so re-adding a member applies role changes without
    /// duplicating the row or resetting their join time.
    pub fn add_member(&self, conversation_id: &str, user_id: &str, role: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO participants (conversation_id, user_id, role, joined_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (conversation_id, user_id) DO UPDATE SET role = excluded.role",
                params![conversation_id, user_id, role, now_rfc3339()],
            )?;
            Ok(())
        })
    }

    /// No cascading effect on prior messages.
    pub fn remove_member(&self, conversation_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "DELETE FROM participants WHERE conversation_id = ?1 AND user_id = ?2",
                params![conversation_id, user_id],
            )?;
            Ok(n > 0)
        })
    }

    /// The single authorization primitive for message and stream access.
    pub fn is_member(&self, conversation_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(
                     SELECT 1 FROM participants WHERE conversation_id = ?1 AND user_id = ?2
                 )",
                params![conversation_id, user_id],
                |r| r.get(0),
            )?;
            Ok(exists)
        })
    }

    pub fn list_members(&self, conversation_id: &str) -> Result<Vec<ParticipantRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT conversation_id, user_id, role, joined_at, last_read_message_id
                 FROM participants WHERE conversation_id = ?1 ORDER BY joined_at",
            )?;
            let rows = stmt
                .query_map([conversation_id], |row| {
                    Ok(ParticipantRow {
                        conversation_id: row.get(0)?,
                        user_id: row.get(1)?,
                        role: row.get(2)?,
                        joined_at: row.get(3)?,
                        last_read_message_id: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn set_last_read(
        &self,
        conversation_id: &str,
        user_id: &str,
        last_read_message_id: i64,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE participants SET last_read_message_id = ?1
                 WHERE conversation_id = ?2 AND user_id = ?3",
                params![last_read_message_id, conversation_id, user_id],
            )?;
            Ok(())
        })
    }
}
