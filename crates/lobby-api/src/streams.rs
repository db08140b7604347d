use std::convert::Infallible;

use axum::{
    Extension,
    extract::{Path, State},
    response::sse::{Event, Sse},
};
use futures_util::Stream;
use tracing::{info, warn};
use uuid::Uuid;

use lobby_gateway::stream::event_stream;

use crate::blocking;
use crate::ensure_member;
use crate::error::ApiError;
use crate::middleware::Claims;
use crate::state::AppState;

/// Open the per-conversation push channel. The membership check runs before
/// anything is allocated; a rejected caller costs no subscription and no
/// timer. After that the connection's whole lifecycle lives inside the
/// returned stream.
pub async fn open_stream(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let acl_state = state.clone();
    blocking(move || ensure_member(&acl_state.db, conversation_id, claims.sub)).await?;

    if state.dispatcher.is_live() {
        info!(
            "User {} streaming conversation {}",
            claims.sub, conversation_id
        );
    } else {
        warn!(
            "Change feed unavailable; conversation {} stream for {} is heartbeat-only",
            conversation_id, claims.sub
        );
    }

    let feed = state.dispatcher.subscribe(conversation_id);
    Ok(Sse::new(event_stream(feed, state.heartbeat)))
}
