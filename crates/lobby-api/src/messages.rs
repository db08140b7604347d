use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use lobby_db::messages::{NewMessage, SendOutcome};
use lobby_db::models::MessageRow;
use lobby_types::api::{MarkReadRequest, MessageHistory};
use lobby_types::events::StreamEvent;
use lobby_types::models::{LastMessage, Message, MessageBody};

use crate::blocking;
use crate::convert::message_from_row;
use crate::error::{ApiError, ApiResult};
use crate::middleware::Claims;
use crate::state::AppState;
use crate::ensure_member;

pub async fn send_message(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(body): Json<MessageBody>,
) -> ApiResult<(StatusCode, Json<Message>)> {
    if let MessageBody::File { attachments, .. } = &body {
        if attachments.is_empty() {
            return Err(ApiError::Validation(
                "a file message needs at least one attachment".into(),
            ));
        }
    }

    let publisher = state.clone();
    let message = blocking(move || {
        ensure_member(&state.db, conversation_id, claims.sub)?;

        let cid = conversation_id.to_string();
        let sender = claims.sub.to_string();

        let (attachments_json, links_json) = match &body {
            MessageBody::Text { links, .. } => (
                "[]".to_string(),
                serde_json::to_string(links).map_err(|e| ApiError::Internal(e.into()))?,
            ),
            MessageBody::File { attachments, .. } => (
                serde_json::to_string(attachments).map_err(|e| ApiError::Internal(e.into()))?,
                "[]".to_string(),
            ),
        };

        let outcome = state
            .db
            .insert_message(
                NewMessage {
                    conversation_id: &cid,
                    sender_id: &sender,
                    kind: body.kind(),
                    text: body.text(),
                    attachments_json: &attachments_json,
                    links_json: &links_json,
                },
                state.duplicate_window,
            )
            .map_err(ApiError::Internal)?;

        let row = match outcome {
            SendOutcome::Stored(row) => row,
            SendOutcome::Duplicate => return Err(ApiError::DuplicateMessage),
        };

        if let MessageBody::File { attachments, .. } = &body {
            let ids: Vec<String> = attachments.iter().map(|a| a.id.to_string()).collect();
            state
                .db
                .link_attachments(&cid, row.id, &ids)
                .map_err(ApiError::Internal)?;
        }

        refresh_last_message(&state, &cid, &row, &body);

        message_from_row(row).map_err(ApiError::Internal)
    })
    .await?;

    publisher
        .dispatcher
        .publish(StreamEvent::MessageNew(message.clone()));

    Ok((StatusCode::CREATED, Json(message)))
}

/// The list preview is eventually consistent: a failed refresh is logged
/// and the message write stands.
fn refresh_last_message(
    state: &crate::state::AppStateInner,
    conversation_id: &str,
    row: &MessageRow,
    body: &MessageBody,
) {
    let excerpt = match body {
        MessageBody::Text { text, .. } => text.clone(),
        MessageBody::File { text, attachments } if text.is_empty() => attachments
            .first()
            .map(|a| a.file_name.clone())
            .unwrap_or_else(|| "file".to_string()),
        MessageBody::File { text, .. } => text.clone(),
    };

    let summary = LastMessage {
        message_id: row.id,
        sender_id: match row.sender_id.parse() {
            Ok(id) => id,
            Err(e) => {
                warn!("Skipping last-message refresh, bad sender id: {}", e);
                return;
            }
        },
        text: excerpt,
        at: chrono::Utc::now(),
    };

    let json = match serde_json::to_string(&summary) {
        Ok(json) => json,
        Err(e) => {
            warn!("Skipping last-message refresh, unserializable summary: {}", e);
            return;
        }
    };

    if let Err(e) = state.db.update_last_message(conversation_id, &json) {
        warn!(
            "Last-message refresh failed for conversation {}: {}",
            conversation_id, e
        );
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_history_limit")]
    pub limit: u32,
    /// Identity of the oldest message already seen; only strictly older
    /// messages come back.
    pub cursor: Option<i64>,
}

fn default_history_limit() -> u32 {
    20
}

pub async fn history(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<MessageHistory>> {
    let limit = query.limit.clamp(1, 100);

    let (messages, next_cursor) = blocking(move || {
        ensure_member(&state.db, conversation_id, claims.sub)?;

        let rows = state
            .db
            .list_messages(&conversation_id.to_string(), limit, query.cursor)
            .map_err(ApiError::Internal)?;

        let next_cursor = next_cursor(&rows, limit);
        let messages = rows
            .into_iter()
            .map(|row| message_from_row(row).map_err(ApiError::Internal))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((messages, next_cursor))
    })
    .await?;

    Ok(Json(MessageHistory {
        messages,
        next_cursor,
    }))
}

/// A full page continues at its oldest id; a short page is the end of
/// history.
fn next_cursor(rows: &[MessageRow], limit: u32) -> Option<i64> {
    if rows.len() == limit as usize {
        rows.last().map(|row| row.id)
    } else {
        None
    }
}

pub async fn mark_read(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<MarkReadRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    blocking(move || {
        ensure_member(&state.db, conversation_id, claims.sub)?;
        state
            .db
            .set_last_read(
                &conversation_id.to_string(),
                &claims.sub.to_string(),
                req.last_read_message_id,
            )
            .map_err(ApiError::Internal)
    })
    .await?;

    Ok(Json(serde_json::json!({ "ok": true })))
}

#[cfg(test)]
mod tests {
    use lobby_db::models::MessageRow;

    use super::next_cursor;

    fn row(id: i64) -> MessageRow {
        MessageRow {
            id,
            conversation_id: "c".into(),
            sender_id: "s".into(),
            kind: "text".into(),
            text: String::new(),
            attachments: "[]".into(),
            links: "[]".into(),
            created_at: "2026-01-01T00:00:00.000Z".into(),
        }
    }

    #[test]
    fn full_page_points_at_its_oldest_row() {
        let rows = vec![row(9), row(8), row(7)];
        assert_eq!(next_cursor(&rows, 3), Some(7));
    }

    #[test]
    fn short_page_ends_the_walk() {
        let rows = vec![row(2), row(1)];
        assert_eq!(next_cursor(&rows, 3), None);
        assert_eq!(next_cursor(&[], 3), None);
    }
}
