use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};

use crate::models::MessageRow;
use crate::{Database, now_rfc3339};

pub struct NewMessage<'a> {
    pub conversation_id: &'a str,
    pub sender_id: &'a str,
    pub kind: &'a str,
    pub text: &'a str,
    pub attachments_json: &'a str,
    pub links_json: &'a str,
}

/// Distinguishes a stored message from a throttled near-duplicate so
/// callers can answer 409 instead of a generic failure.
pub enum SendOutcome {
    Stored(MessageRow),
    Duplicate,
}

impl Database {
    /// Append a message. The duplicate gate and the insert run under a
    /// single lock acquisition, so the gate always sees the latest send.
    ///
    /// A text message matching the sender's immediately preceding message in
    /// the same conversation, sent inside `duplicate_window`, is rejected as
    /// a duplicate. File messages are never suppressed.
    pub fn insert_message(
        &self,
        msg: NewMessage<'_>,
        duplicate_window: Duration,
    ) -> Result<SendOutcome> {
        self.with_conn(|conn| {
            if msg.kind == "text" && !duplicate_window.is_zero() {
                let prev: Option<(String, String)> = conn
                    .query_row(
                        "SELECT text, created_at FROM messages
                         WHERE conversation_id = ?1 AND sender_id = ?2
                         ORDER BY id DESC LIMIT 1",
                        params![msg.conversation_id, msg.sender_id],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    )
                    .optional()?;

                if let Some((prev_text, prev_at)) = prev {
                    if prev_text == msg.text && within_window(&prev_at, duplicate_window) {
                        return Ok(SendOutcome::Duplicate);
                    }
                }
            }

            let created_at = now_rfc3339();
            conn.execute(
                "INSERT INTO messages
                     (conversation_id, sender_id, kind, text, attachments, links, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    msg.conversation_id,
                    msg.sender_id,
                    msg.kind,
                    msg.text,
                    msg.attachments_json,
                    msg.links_json,
                    &created_at,
                ],
            )?;

            Ok(SendOutcome::Stored(MessageRow {
                id: conn.last_insert_rowid(),
                conversation_id: msg.conversation_id.into(),
                sender_id: msg.sender_id.into(),
                kind: msg.kind.into(),
                text: msg.text.into(),
                attachments: msg.attachments_json.into(),
                links: msg.links_json.into(),
                created_at,
            }))
        })
    }

    /// Newest first; with a cursor, only messages with identity strictly
    /// below it. Identities are assigned monotonically per insert, so two
    /// consecutive pages with no intervening write never overlap or skip.
    pub fn list_messages(
        &self,
        conversation_id: &str,
        limit: u32,
        cursor: Option<i64>,
    ) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, conversation_id, sender_id, kind, text, attachments, links, created_at
                 FROM messages
                 WHERE conversation_id = ?1 AND (?2 IS NULL OR id < ?2)
                 ORDER BY id DESC LIMIT ?3",
            )?;
            let rows = stmt
                .query_map(params![conversation_id, cursor, limit as i64], |row| {
                    Ok(MessageRow {
                        id: row.get(0)?,
                        conversation_id: row.get(1)?,
                        sender_id: row.get(2)?,
                        kind: row.get(3)?,
                        text: row.get(4)?,
                        attachments: row.get(5)?,
                        links: row.get(6)?,
                        created_at: row.get(7)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn within_window(created_at: &str, window: Duration) -> bool {
    let Ok(at) = DateTime::parse_from_rfc3339(created_at) else {
        // Unparseable timestamp: let the send through rather than throttle it.
        return false;
    };
    let age = Utc::now().signed_duration_since(at.with_timezone(&Utc));
    match chrono::Duration::from_std(window) {
        Ok(window) => age < window,
        Err(_) => false,
    }
}
