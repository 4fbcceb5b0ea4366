use crate::common::Result;
use crate::service::protocol::{EnrollCameraRequest, MessageResponse, RenameCameraRequest};
use crate::service::{AppState, Session};
use crate::storage::Camera;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

pub async fn list(State(state): State<AppState>, Session(ctx): Session) -> Result<Json<Vec<Camera>>> {
    Ok(Json(state.accounts.cameras(&ctx)?))
}

pub async fn enroll(
    State(state): State<AppState>,
    Session(ctx): Session,
    Json(request): Json<EnrollCameraRequest>,
) -> Result<(StatusCode, Json<Camera>)> {
    let camera = state
        .accounts
        .enroll_camera(&ctx, request.camera_id.trim(), request.name.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(camera)))
}

pub async fn rename(
    State(state): State<AppState>,
    Session(ctx): Session,
    Path(camera_id): Path<String>,
    Json(request): Json<RenameCameraRequest>,
) -> Result<Json<Camera>> {
    Ok(Json(state.accounts.rename_camera(&ctx, &camera_id, &request.name).await?))
}

pub async fn exclude(
    State(state): State<AppState>,
    Session(ctx): Session,
    Path(camera_id): Path<String>,
) -> Result<Json<MessageResponse>> {
    let camera = state.accounts.exclude_camera(&ctx, &camera_id).await?;
    Ok(Json(MessageResponse::new(format!("Camera {} excluded", camera.name))))
}
