//! Row-to-model conversion. Rows carry strings straight out of SQLite;
//! everything typed happens here, once, instead of in every handler.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDateTime, Utc};

use lobby_db::models::{AttachmentRow, ConversationRow, MessageRow, ParticipantRow};
use lobby_types::models::{
    Attachment, Conversation, ConversationSubtype, ConversationType, Message, MessageBody,
    Participant, Role,
};

pub fn conversation_from_row(row: ConversationRow) -> Result<Conversation> {
    let kind = match row.kind.as_str() {
        "dm" => ConversationType::Dm,
        "group" => ConversationType::Group,
        other => bail!("unknown conversation type {other:?}"),
    };
    let subtype = match row.subtype.as_str() {
        "admin_owner_dm" => ConversationSubtype::AdminOwnerDm,
        "admin_owner_staff" => ConversationSubtype::AdminOwnerStaff,
        "owner_all_staff" => ConversationSubtype::OwnerAllStaff,
        other => bail!("unknown conversation subtype {other:?}"),
    };

    Ok(Conversation {
        id: row.id.parse().context("conversation id")?,
        kind,
        subtype,
        hotel_id: row.hotel_id,
        name: row.name,
        admin_id: row.admin_id.map(|s| s.parse()).transpose().context("admin id")?,
        owner_id: row.owner_id.map(|s| s.parse()).transpose().context("owner id")?,
        created_by: row.created_by.parse().context("created_by")?,
        created_at: parse_timestamp(&row.created_at)?,
        last_message: row
            .last_message
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .context("last_message")?,
    })
}

pub fn participant_from_row(row: ParticipantRow) -> Result<Participant> {
    Ok(Participant {
        conversation_id: row.conversation_id.parse().context("conversation id")?,
        user_id: row.user_id.parse().context("user id")?,
        role: role_from_str(&row.role)?,
        joined_at: parse_timestamp(&row.joined_at)?,
        last_read_message_id: row.last_read_message_id,
    })
}

pub fn message_from_row(row: MessageRow) -> Result<Message> {
    let body = match row.kind.as_str() {
        "text" => MessageBody::Text {
            text: row.text,
            links: serde_json::from_str(&row.links).context("links")?,
        },
        "file" => MessageBody::File {
            text: row.text,
            attachments: serde_json::from_str(&row.attachments).context("attachments")?,
        },
        other => bail!("unknown message kind {other:?}"),
    };

    Ok(Message {
        id: row.id,
        conversation_id: row.conversation_id.parse().context("conversation id")?,
        sender_id: row.sender_id.parse().context("sender id")?,
        body,
        created_at: parse_timestamp(&row.created_at)?,
    })
}

pub fn attachment_from_row(row: AttachmentRow) -> Result<Attachment> {
    Ok(Attachment {
        id: row.id.parse().context("attachment id")?,
        blob_id: row.blob_id.parse().context("blob id")?,
        conversation_id: row.conversation_id.parse().context("conversation id")?,
        message_id: row.message_id,
        file_name: row.file_name,
        mime_type: row.mime_type,
        size: row.size as u64,
        thumbnails: serde_json::from_str(&row.thumbnails).context("thumbnails")?,
        uploader_id: row.uploader_id.parse().context("uploader id")?,
        created_at: parse_timestamp(&row.created_at)?,
    })
}

pub fn role_from_str(s: &str) -> Result<Role> {
    Ok(match s {
        "admin" => Role::Admin,
        "hotel_owner" => Role::HotelOwner,
        "hotel_staff" => Role::HotelStaff,
        other => bail!("unknown role {other:?}"),
    })
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    // Rows touched by ad-hoc SQL may carry SQLite's "YYYY-MM-DD HH:MM:SS".
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|ndt| ndt.and_utc())
        .with_context(|| format!("unparseable timestamp {s:?}"))
}
