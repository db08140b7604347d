use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationType {
    Dm,
    Group,
}

impl ConversationType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dm => "dm",
            Self::Group => "group",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationSubtype {
    AdminOwnerDm,
    AdminOwnerStaff,
    OwnerAllStaff,
}

impl ConversationSubtype {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AdminOwnerDm => "admin_owner_dm",
            Self::AdminOwnerStaff => "admin_owner_staff",
            Self::OwnerAllStaff => "owner_all_staff",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    HotelOwner,
    HotelStaff,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::HotelOwner => "hotel_owner",
            Self::HotelStaff => "hotel_staff",
        }
    }
}

/// Denormalized preview of the newest message, stored on the conversation
/// so list screens don't have to query the message store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastMessage {
    pub message_id: i64,
    pub sender_id: Uuid,
    pub text: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: ConversationType,
    pub subtype: ConversationSubtype,
    pub hotel_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<Uuid>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_message: Option<LastMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub conversation_id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
    pub joined_at: DateTime<Utc>,
    pub last_read_message_id: Option<i64>,
}

/// Client-supplied preview card for a URL mentioned in a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkPreview {
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

/// Summary of an uploaded attachment, embedded in the message that
/// references it. The full metadata row lives in the attachment store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentRef {
    pub id: Uuid,
    pub blob_id: Uuid,
    pub file_name: String,
    pub mime_type: String,
    pub size: u64,
}

/// A text message and a file message share identity, sender, and timestamp
/// but carry different payloads; `kind` is the discriminant on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageBody {
    Text {
        text: String,
        #[serde(default)]
        links: Vec<LinkPreview>,
    },
    File {
        #[serde(default)]
        text: String,
        attachments: Vec<AttachmentRef>,
    },
}

impl MessageBody {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::File { .. } => "file",
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Text { text, .. } | Self::File { text, .. } => text,
        }
    }
}

/// Message identities are assigned by the store and strictly increase in
/// insertion order, so they double as the pagination cursor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    #[serde(flatten)]
    pub body: MessageBody,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thumbnail {
    pub blob_id: Uuid,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub id: Uuid,
    pub blob_id: Uuid,
    pub conversation_id: Uuid,
    /// Null until the attachment is referenced by a sent message.
    pub message_id: Option<i64>,
    pub file_name: String,
    pub mime_type: String,
    pub size: u64,
    pub thumbnails: Vec<Thumbnail>,
    pub uploader_id: Uuid,
    pub created_at: DateTime<Utc>,
}
