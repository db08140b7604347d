use anyhow::{Result, anyhow};
use rusqlite::OptionalExtension;
use uuid::Uuid;

use crate::models::ConversationRow;
use crate::{Database, now_rfc3339};

const COLUMNS: &str =
    "id, type, subtype, hotel_id, name, admin_id, owner_id, created_by, created_at, last_message";

impl Database {
    /// Insert-if-absent keyed on the partial unique DM index, then fetch.
    /// Concurrent callers racing to create the same DM converge on one row.
    pub fn get_or_create_dm(
        &self,
        hotel_id: &str,
        admin_id: &str,
        owner_id: &str,
        created_by: &str,
    ) -> Result<ConversationRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO conversations
                     (id, type, subtype, hotel_id, admin_id, owner_id, created_by, created_at)
                 VALUES (?1, 'dm', 'admin_owner_dm', ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    Uuid::new_v4().to_string(),
                    hotel_id,
                    admin_id,
                    owner_id,
                    created_by,
                    now_rfc3339(),
                ],
            )?;

            let sql = format!(
                "SELECT {COLUMNS} FROM conversations
                 WHERE type = 'dm' AND hotel_id = ?1 AND admin_id = ?2 AND owner_id = ?3"
            );
            conn.query_row(&sql, rusqlite::params![hotel_id, admin_id, owner_id], row_map)
                .map_err(|e| anyhow!("DM lookup after upsert failed: {}", e))
        })
    }

    pub fn create_group(
        &self,
        hotel_id: &str,
        name: &str,
        subtype: &str,
        created_by: &str,
    ) -> Result<ConversationRow> {
        let id = Uuid::new_v4().to_string();
        let created_at = now_rfc3339();

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO conversations
                     (id, type, subtype, hotel_id, name, created_by, created_at)
                 VALUES (?1, 'group', ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![&id, subtype, hotel_id, name, created_by, &created_at],
            )?;
            Ok(())
        })?;

        Ok(ConversationRow {
            id,
            kind: "group".into(),
            subtype: subtype.into(),
            hotel_id: hotel_id.into(),
            name: Some(name.into()),
            admin_id: None,
            owner_id: None,
            created_by: created_by.into(),
            created_at,
            last_message: None,
        })
    }

    pub fn get_conversation(&self, id: &str) -> Result<Option<ConversationRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {COLUMNS} FROM conversations WHERE id = ?1");
            conn.query_row(&sql, [id], row_map).optional().map_err(Into::into)
        })
    }

    /// Best-effort denormalized preview; callers log and swallow failures so
    /// a broken preview never fails the message write.
    pub fn update_last_message(&self, id: &str, last_message_json: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE conversations SET last_message = ?1 WHERE id = ?2",
                rusqlite::params![last_message_json, id],
            )?;
            Ok(())
        })
    }

    pub fn list_conversations(
        &self,
        hotel_id: Option<&str>,
        kind: Option<&str>,
        limit: u32,
        skip: u32,
    ) -> Result<Vec<ConversationRow>> {
        self.with_conn(|conn| {
            let limit = limit as i64;
            let skip = skip as i64;

            let mut clauses: Vec<String> = Vec::new();
            let mut params: Vec<&dyn rusqlite::types::ToSql> = Vec::new();
            if let Some(ref h) = hotel_id {
                params.push(h);
                clauses.push(format!("hotel_id = ?{}", params.len()));
            }
            if let Some(ref k) = kind {
                params.push(k);
                clauses.push(format!("type = ?{}", params.len()));
            }

            let mut sql = format!("SELECT {COLUMNS} FROM conversations");
            if !clauses.is_empty() {
                sql.push_str(" WHERE ");
                sql.push_str(&clauses.join(" AND "));
            }
            params.push(&limit);
            let limit_idx = params.len();
            params.push(&skip);
            let skip_idx = params.len();
            sql.push_str(&format!(
                " ORDER BY created_at DESC, rowid DESC LIMIT ?{limit_idx} OFFSET ?{skip_idx}"
            ));

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params.as_slice(), row_map)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Conversations in a hotel where the user is a participant.
    pub fn list_conversations_for_user(
        &self,
        hotel_id: &str,
        user_id: &str,
    ) -> Result<Vec<ConversationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.type, c.subtype, c.hotel_id, c.name, c.admin_id, c.owner_id,
                        c.created_by, c.created_at, c.last_message
                 FROM conversations c
                 JOIN participants p ON p.conversation_id = c.id
                 WHERE c.hotel_id = ?1 AND p.user_id = ?2
                 ORDER BY c.created_at DESC, c.rowid DESC",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![hotel_id, user_id], row_map)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// The hotel's owner-and-all-staff group, so staff can discover it.
    pub fn find_group_b(&self, hotel_id: &str) -> Result<Option<ConversationRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {COLUMNS} FROM conversations
                 WHERE hotel_id = ?1 AND type = 'group' AND subtype = 'owner_all_staff'
                 ORDER BY created_at ASC LIMIT 1"
            );
            conn.query_row(&sql, [hotel_id], row_map).optional().map_err(Into::into)
        })
    }
}

fn row_map(row: &rusqlite::Row<'_>) -> std::result::Result<ConversationRow, rusqlite::Error> {
    Ok(ConversationRow {
        id: row.get(0)?,
        kind: row.get(1)?,
        subtype: row.get(2)?,
        hotel_id: row.get(3)?,
        name: row.get(4)?,
        admin_id: row.get(5)?,
        owner_id: row.get(6)?,
        created_by: row.get(7)?,
        created_at: row.get(8)?,
        last_message: row.get(9)?,
    })
}
