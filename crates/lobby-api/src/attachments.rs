use axum::{
    Extension, Json,
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures_util::StreamExt;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use lobby_db::attachments::NewAttachment;
use lobby_types::models::Attachment;

use crate::blocking;
use crate::convert::attachment_from_row;
use crate::ensure_member;
use crate::error::{ApiError, ApiResult};
use crate::middleware::Claims;
use crate::state::AppState;

/// Chunk granularity of the blob store. Uploads hold at most one chunk of
/// payload in memory at a time.
pub const BLOB_CHUNK_SIZE: usize = 256 * 1024;

const BLOB_SOURCE: &str = "im";

/// Upload policy: an empty allow-list accepts every MIME type.
fn validate_upload(
    allowed: &[String],
    mime_type: &str,
    size: u64,
    max_bytes: u64,
) -> Result<(), ApiError> {
    if !allowed.is_empty() && !allowed.iter().any(|m| m == mime_type) {
        return Err(ApiError::UnsupportedMedia);
    }
    if size > max_bytes {
        return Err(ApiError::PayloadTooLarge);
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub file_name: String,
}

/// POST /conversations/{id}/attachments — streaming ingest.
///
/// Policy checks and the ACL gate run before a single byte is stored. The
/// body is then chunked into the blob store as it arrives, hashed en route;
/// the metadata row is created last, with `message_id` left null for the
/// send that will reference it.
pub async fn upload(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Body,
) -> ApiResult<(StatusCode, Json<Attachment>)> {
    // ACL gate first: a non-participant learns nothing about the upload
    // policy, only that the conversation is off limits.
    let acl_state = state.clone();
    blocking(move || ensure_member(&acl_state.db, conversation_id, claims.sub)).await?;

    if query.file_name.trim().is_empty() {
        return Err(ApiError::Validation("file_name must not be empty".into()));
    }

    let mime_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    let declared_size: u64 = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| ApiError::Validation("content-length is required".into()))?;

    validate_upload(
        &state.allowed_mime,
        &mime_type,
        declared_size,
        state.max_upload_bytes,
    )?;

    let blob_id = Uuid::new_v4();
    {
        let state = state.clone();
        let file_name = query.file_name.clone();
        let mime_type = mime_type.clone();
        blocking(move || {
            state
                .db
                .create_blob(
                    &blob_id.to_string(),
                    &file_name,
                    &mime_type,
                    BLOB_CHUNK_SIZE as i64,
                    BLOB_SOURCE,
                )
                .map_err(ApiError::Internal)
        })
        .await?;
    }

    let (size, chunk_count, sha256) = match ingest(&state, blob_id, declared_size, body).await {
        Ok(result) => result,
        Err(e) => {
            // Back out the partial blob; chunks cascade with the row.
            let cleanup = state.clone();
            let backout =
                blocking(move || cleanup.db.delete_blob(&blob_id.to_string()).map_err(ApiError::Internal))
                    .await;
            if let Err(del) = backout {
                warn!("Failed to back out partial blob {}: {}", blob_id, del);
            }
            return Err(e);
        }
    };

    let attachment = {
        let state = state.clone();
        let file_name = query.file_name.clone();
        let mime_type = mime_type.clone();
        blocking(move || {
            state
                .db
                .finalize_blob(&blob_id.to_string(), size as i64, chunk_count, &sha256)
                .map_err(ApiError::Internal)?;

            let row = state
                .db
                .create_attachment(NewAttachment {
                    id: &Uuid::new_v4().to_string(),
                    blob_id: &blob_id.to_string(),
                    conversation_id: &conversation_id.to_string(),
                    file_name: &file_name,
                    mime_type: &mime_type,
                    size: size as i64,
                    uploader_id: &claims.sub.to_string(),
                })
                .map_err(ApiError::Internal)?;
            attachment_from_row(row).map_err(ApiError::Internal)
        })
        .await?
    };

    info!(
        "Attachment {} uploaded by {}: {} bytes, {} chunks",
        attachment.id, claims.sub, size, chunk_count
    );

    Ok((StatusCode::CREATED, Json(attachment)))
}

/// Chunk the body into the blob store without buffering the whole payload.
/// Each chunk write goes through `blocking` so the store I/O never stalls
/// the async worker driving the transfer.
async fn ingest(
    state: &AppState,
    blob_id: Uuid,
    declared_size: u64,
    body: Body,
) -> Result<(u64, i64, String), ApiError> {
    let mut stream = http_body_util::BodyStream::new(body);
    let bid = blob_id.to_string();

    let mut hasher = Sha256::new();
    let mut buf: Vec<u8> = Vec::with_capacity(BLOB_CHUNK_SIZE);
    let mut total: u64 = 0;
    let mut chunk_index: i64 = 0;

    while let Some(frame) = stream.next().await {
        let frame = frame.map_err(|_| ApiError::Validation("malformed request body".into()))?;
        if let Ok(data) = frame.into_data() {
            total += data.len() as u64;
            if total > declared_size {
                return Err(ApiError::Validation(
                    "body is larger than the declared content-length".into(),
                ));
            }
            hasher.update(&data);
            buf.extend_from_slice(&data);

            while buf.len() >= BLOB_CHUNK_SIZE {
                let chunk: Vec<u8> = buf.drain(..BLOB_CHUNK_SIZE).collect();
                write_chunk(state, &bid, chunk_index, chunk).await?;
                chunk_index += 1;
            }
        }
    }

    if !buf.is_empty() {
        write_chunk(state, &bid, chunk_index, std::mem::take(&mut buf)).await?;
        chunk_index += 1;
    }

    if total != declared_size {
        return Err(ApiError::Validation(
            "body is shorter than the declared content-length".into(),
        ));
    }

    Ok((total, chunk_index, hex::encode(hasher.finalize())))
}

async fn write_chunk(
    state: &AppState,
    blob_id: &str,
    chunk_index: i64,
    data: Vec<u8>,
) -> Result<(), ApiError> {
    let state = state.clone();
    let blob_id = blob_id.to_string();
    blocking(move || {
        state
            .db
            .append_chunk(&blob_id, chunk_index, &data)
            .map_err(ApiError::Internal)
    })
    .await
}

/// GET /attachments/{id} — streaming download, gated by membership of the
/// attachment's conversation.
pub async fn download(
    State(state): State<AppState>,
    Path(attachment_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Response> {
    let (attachment, blob) = {
        let state = state.clone();
        blocking(move || {
            let attachment = state
                .db
                .get_attachment(&attachment_id.to_string())
                .map_err(ApiError::Internal)?
                .ok_or(ApiError::NotFound("attachment"))?;

            let conversation_id: Uuid = attachment
                .conversation_id
                .parse()
                .map_err(|e| ApiError::Internal(anyhow::anyhow!("bad conversation id: {}", e)))?;
            ensure_member(&state.db, conversation_id, claims.sub)?;

            let blob = state
                .db
                .get_blob(&attachment.blob_id)
                .map_err(ApiError::Internal)?
                .ok_or_else(|| {
                    ApiError::Internal(anyhow::anyhow!(
                        "blob {} missing for attachment {}",
                        attachment.blob_id,
                        attachment.id
                    ))
                })?;
            Ok((attachment, blob))
        })
        .await?
    };

    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        header::CONTENT_TYPE,
        attachment
            .mime_type
            .parse()
            .unwrap_or(HeaderValue::from_static("application/octet-stream")),
    );
    if let Ok(len) = HeaderValue::from_str(&blob.size.to_string()) {
        response_headers.insert(header::CONTENT_LENGTH, len);
    }
    if let Ok(disposition) =
        HeaderValue::from_str(&format!("attachment; filename=\"{}\"", attachment.file_name))
    {
        response_headers.insert(header::CONTENT_DISPOSITION, disposition);
    }

    let chunk_count = blob.chunk_count;
    let blob_id = blob.id;
    let stream = async_stream::stream! {
        for index in 0..chunk_count {
            let db_state = state.clone();
            let bid = blob_id.clone();
            let chunk = blocking(move || {
                db_state.db.read_chunk(&bid, index).map_err(ApiError::Internal)
            })
            .await;

            match chunk {
                Ok(Some(data)) => yield Ok(Bytes::from(data)),
                Ok(None) => {
                    yield Err(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        format!("blob {} chunk {} missing", blob_id, index),
                    ));
                    return;
                }
                Err(e) => {
                    yield Err(std::io::Error::other(e.to_string()));
                    return;
                }
            }
        }
    };

    Ok((response_headers, Body::from_stream(stream)).into_response())
}

#[cfg(test)]
mod tests {
    use super::validate_upload;
    use crate::error::ApiError;

    const MAX: u64 = 1024;

    fn allow(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn size_at_the_limit_passes_one_over_fails() {
        let allowed = allow(&["image/png"]);
        assert!(validate_upload(&allowed, "image/png", MAX, MAX).is_ok());
        assert!(matches!(
            validate_upload(&allowed, "image/png", MAX + 1, MAX),
            Err(ApiError::PayloadTooLarge)
        ));
    }

    #[test]
    fn mime_outside_the_allow_list_is_rejected() {
        let allowed = allow(&["image/png", "application/pdf"]);
        assert!(matches!(
            validate_upload(&allowed, "application/zip", 10, MAX),
            Err(ApiError::UnsupportedMedia)
        ));
        assert!(validate_upload(&allowed, "application/pdf", 10, MAX).is_ok());
    }

    #[test]
    fn empty_allow_list_accepts_any_mime() {
        assert!(validate_upload(&[], "application/x-whatever", 10, MAX).is_ok());
    }
}
