use axum::{
    Json,
    extract::{Path, State},
};
use uuid::Uuid;

use lobby_types::api::AddMemberRequest;
use lobby_types::models::Participant;

use crate::blocking;
use crate::convert::participant_from_row;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub async fn add_member(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Json(req): Json<AddMemberRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    blocking(move || {
        let cid = conversation_id.to_string();
        state
            .db
            .get_conversation(&cid)
            .map_err(ApiError::Internal)?
            .ok_or(ApiError::NotFound("conversation"))?;

        state
            .db
            .add_member(&cid, &req.user_id.to_string(), req.role.as_str())
            .map_err(ApiError::Internal)
    })
    .await?;

    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn remove_member(
    State(state): State<AppState>,
    Path((conversation_id, user_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<serde_json::Value>> {
    let removed = blocking(move || {
        state
            .db
            .remove_member(&conversation_id.to_string(), &user_id.to_string())
            .map_err(ApiError::Internal)
    })
    .await?;

    if !removed {
        return Err(ApiError::NotFound("participant"));
    }
    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn list_members(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Participant>>> {
    let members = blocking(move || {
        let rows = state
            .db
            .list_members(&conversation_id.to_string())
            .map_err(ApiError::Internal)?;
        rows.into_iter()
            .map(|row| participant_from_row(row).map_err(ApiError::Internal))
            .collect::<Result<Vec<_>, _>>()
    })
    .await?;

    Ok(Json(members))
}
