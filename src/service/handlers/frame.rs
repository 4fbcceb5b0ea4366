use crate::common::Result;
use crate::core::FrameEntry;
use crate::service::protocol::{MessageResponse, SignedQuery};
use crate::service::{AppState, Session};
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;

pub async fn list(State(state): State<AppState>, Session(ctx): Session) -> Result<Json<Vec<FrameEntry>>> {
    Ok(Json(state.gallery.list_frames(&ctx).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    Session(ctx): Session,
    Path((camera_id, name)): Path<(String, String)>,
) -> Result<Json<MessageResponse>> {
    state.gallery.delete_frame(&ctx, &camera_id, &name).await?;
    Ok(Json(MessageResponse::new("Frame deleted")))
}

/// Target of signed frame links; needs no session.
pub async fn blob(
    State(state): State<AppState>,
    Path((camera_id, name)): Path<(String, String)>,
    Query(query): Query<SignedQuery>,
) -> Result<Response> {
    let data = state
        .gallery
        .read_frame(&camera_id, &name, query.expires, &query.signature)
        .await?;
    // Stored bytes are whatever the camera sent, so sniff the type.
    let content_type = image::guess_format(&data)
        .map(|format| format.to_mime_type())
        .unwrap_or("application/octet-stream");
    let max_age = format!("private, max-age={}", state.gallery.signer().ttl().as_secs());
    Ok(([(header::CONTENT_TYPE, content_type.to_string()), (header::CACHE_CONTROL, max_age)], data).into_response())
}
