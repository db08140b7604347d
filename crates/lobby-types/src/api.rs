use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Message, Role};

// -- Conversations --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateDmRequest {
    pub hotel_id: String,
    pub admin_id: Uuid,
    pub owner_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateGroupARequest {
    pub hotel_id: String,
    pub name: String,
    pub owner_id: Uuid,
    #[serde(default)]
    pub admin_ids: Vec<Uuid>,
    #[serde(default)]
    pub staff_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateGroupBRequest {
    pub hotel_id: String,
    pub name: Option<String>,
    pub owner_id: Uuid,
    #[serde(default)]
    pub staff_ids: Vec<Uuid>,
}

// -- Membership --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddMemberRequest {
    pub user_id: Uuid,
    pub role: Role,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MarkReadRequest {
    pub last_read_message_id: i64,
}

/// One page of history, newest first. `next_cursor` is the oldest id on the
/// page, or null when the page came up short of the requested limit.
#[derive(Debug, Serialize)]
pub struct MessageHistory {
    pub messages: Vec<Message>,
    pub next_cursor: Option<i64>,
}
