pub mod attachments;
pub mod conversations;
pub mod convert;
pub mod error;
pub mod members;
pub mod messages;
pub mod middleware;
pub mod state;
pub mod streams;

use error::ApiError;
use lobby_db::Database;
use uuid::Uuid;

/// Run blocking DB work off the async runtime.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("blocking task failed: {}", e)))?
}

/// The ACL gate: reject before any side effect when the caller is not a
/// participant of the target conversation.
pub(crate) fn ensure_member(
    db: &Database,
    conversation_id: Uuid,
    user_id: Uuid,
) -> Result<(), ApiError> {
    let ok = db
        .is_member(&conversation_id.to_string(), &user_id.to_string())
        .map_err(ApiError::Internal)?;
    if ok { Ok(()) } else { Err(ApiError::Forbidden) }
}
