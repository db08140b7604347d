/// Database row types — these map directly to SQLite rows.
/// Distinct from the lobby-types API models to keep the DB layer independent.

pub struct ConversationRow {
    pub id: String,
    pub kind: String,
    pub subtype: String,
    pub hotel_id: String,
    pub name: Option<String>,
    pub admin_id: Option<String>,
    pub owner_id: Option<String>,
    pub created_by: String,
    pub created_at: String,
    pub last_message: Option<String>,
}

pub struct ParticipantRow {
    pub conversation_id: String,
    pub user_id: String,
    pub role: String,
    pub joined_at: String,
    pub last_read_message_id: Option<i64>,
}

pub struct MessageRow {
    pub id: i64,
    pub conversation_id: String,
    pub sender_id: String,
    pub kind: String,
    pub text: String,
    pub attachments: String,
    pub links: String,
    pub created_at: String,
}

pub struct AttachmentRow {
    pub id: String,
    pub blob_id: String,
    pub conversation_id: String,
    pub message_id: Option<i64>,
    pub file_name: String,
    pub mime_type: String,
    pub size: i64,
    pub thumbnails: String,
    pub uploader_id: String,
    pub created_at: String,
}

pub struct BlobRow {
    pub id: String,
    pub file_name: String,
    pub mime_type: String,
    pub size: i64,
    pub chunk_size: i64,
    pub chunk_count: i64,
    pub sha256: String,
    pub source: String,
    pub created_at: String,
}
