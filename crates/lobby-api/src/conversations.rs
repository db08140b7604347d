use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

use lobby_db::Database;
use lobby_types::api::{CreateDmRequest, CreateGroupARequest, CreateGroupBRequest};
use lobby_types::models::{Conversation, ConversationType, Role};

use crate::convert::conversation_from_row;
use crate::error::{ApiError, ApiResult};
use crate::middleware::Claims;
use crate::state::AppState;
use crate::blocking;

const GROUP_B_DEFAULT_NAME: &str = "Owner & All Staff";

/// Get-or-create the unique admin/owner DM for a hotel, then make sure both
/// sides are members. The membership upserts are idempotent, so re-running
/// this call is also the recovery path after a partial fan-out.
pub async fn create_dm(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateDmRequest>,
) -> ApiResult<Json<Conversation>> {
    if req.hotel_id.trim().is_empty() {
        return Err(ApiError::Validation("hotel_id must not be empty".into()));
    }

    let conversation = blocking(move || {
        let row = state
            .db
            .get_or_create_dm(
                &req.hotel_id,
                &req.admin_id.to_string(),
                &req.owner_id.to_string(),
                &claims.sub.to_string(),
            )
            .map_err(ApiError::Internal)?;

        ensure_membership(&state.db, &row.id, req.admin_id, Role::Admin)?;
        ensure_membership(&state.db, &row.id, req.owner_id, Role::HotelOwner)?;

        conversation_from_row(row).map_err(ApiError::Internal)
    })
    .await?;

    Ok(Json(conversation))
}

/// Group A: owner plus explicitly chosen admins and staff.
pub async fn create_group_a(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateGroupARequest>,
) -> ApiResult<(StatusCode, Json<Conversation>)> {
    if req.name.trim().is_empty() {
        return Err(ApiError::Validation("name must not be empty".into()));
    }

    let conversation = blocking(move || {
        let row = state
            .db
            .create_group(
                &req.hotel_id,
                &req.name,
                "admin_owner_staff",
                &claims.sub.to_string(),
            )
            .map_err(ApiError::Internal)?;

        ensure_membership(&state.db, &row.id, req.owner_id, Role::HotelOwner)?;
        for admin_id in &req.admin_ids {
            ensure_membership(&state.db, &row.id, *admin_id, Role::Admin)?;
        }
        for staff_id in &req.staff_ids {
            ensure_membership(&state.db, &row.id, *staff_id, Role::HotelStaff)?;
        }

        conversation_from_row(row).map_err(ApiError::Internal)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(conversation)))
}

/// Group B: owner plus the hotel's whole staff roster.
pub async fn create_group_b(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateGroupBRequest>,
) -> ApiResult<(StatusCode, Json<Conversation>)> {
    let conversation = blocking(move || {
        let name = req.name.as_deref().unwrap_or(GROUP_B_DEFAULT_NAME);
        let row = state
            .db
            .create_group(
                &req.hotel_id,
                name,
                "owner_all_staff",
                &claims.sub.to_string(),
            )
            .map_err(ApiError::Internal)?;

        ensure_membership(&state.db, &row.id, req.owner_id, Role::HotelOwner)?;
        for staff_id in &req.staff_ids {
            ensure_membership(&state.db, &row.id, *staff_id, Role::HotelStaff)?;
        }

        conversation_from_row(row).map_err(ApiError::Internal)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(conversation)))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub hotel_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<ConversationType>,
    #[serde(default = "default_list_limit")]
    pub limit: u32,
    #[serde(default)]
    pub skip: u32,
}

fn default_list_limit() -> u32 {
    50
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Conversation>>> {
    let limit = query.limit.clamp(1, 100);

    let conversations = blocking(move || {
        let rows = state
            .db
            .list_conversations(
                query.hotel_id.as_deref(),
                query.kind.map(ConversationType::as_str),
                limit,
                query.skip,
            )
            .map_err(ApiError::Internal)?;
        rows.into_iter()
            .map(|row| conversation_from_row(row).map_err(ApiError::Internal))
            .collect::<Result<Vec<_>, _>>()
    })
    .await?;

    Ok(Json(conversations))
}

#[derive(Debug, Deserialize)]
pub struct HotelQuery {
    pub hotel_id: String,
}

/// Conversations in a hotel the caller belongs to.
pub async fn list_mine(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<HotelQuery>,
) -> ApiResult<Json<Vec<Conversation>>> {
    let conversations = blocking(move || {
        let rows = state
            .db
            .list_conversations_for_user(&query.hotel_id, &claims.sub.to_string())
            .map_err(ApiError::Internal)?;
        rows.into_iter()
            .map(|row| conversation_from_row(row).map_err(ApiError::Internal))
            .collect::<Result<Vec<_>, _>>()
    })
    .await?;

    Ok(Json(conversations))
}

/// Staff-facing lookup of the hotel's owner-and-all-staff group.
pub async fn find_group_b(
    State(state): State<AppState>,
    Query(query): Query<HotelQuery>,
) -> ApiResult<Json<Conversation>> {
    let conversation = blocking(move || {
        let row = state
            .db
            .find_group_b(&query.hotel_id)
            .map_err(ApiError::Internal)?
            .ok_or(ApiError::NotFound("group"))?;
        conversation_from_row(row).map_err(ApiError::Internal)
    })
    .await?;

    Ok(Json(conversation))
}

pub async fn get(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
) -> ApiResult<Json<Conversation>> {
    let conversation = blocking(move || {
        let row = state
            .db
            .get_conversation(&conversation_id.to_string())
            .map_err(ApiError::Internal)?
            .ok_or(ApiError::NotFound("conversation"))?;
        conversation_from_row(row).map_err(ApiError::Internal)
    })
    .await?;

    Ok(Json(conversation))
}

fn ensure_membership(
    db: &Database,
    conversation_id: &str,
    user_id: Uuid,
    role: Role,
) -> Result<(), ApiError> {
    db.add_member(conversation_id, &user_id.to_string(), role.as_str())
        .map_err(ApiError::Internal)
}
