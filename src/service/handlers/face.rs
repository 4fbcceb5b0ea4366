use crate::common::Result;
use crate::service::handlers::ImageForm;
use crate::service::protocol::MessageResponse;
use crate::service::{AppState, Session};
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;

pub async fn list(State(state): State<AppState>, Session(ctx): Session) -> Result<Json<Vec<String>>> {
    Ok(Json(state.accounts.faces(&ctx)?))
}

/// Multipart `name` + `image`.
pub async fn save(
    State(state): State<AppState>,
    Session(ctx): Session,
    multipart: Multipart,
) -> Result<(StatusCode, Json<MessageResponse>)> {
    let mut form = ImageForm::read(multipart).await?;
    let image = form.take_image()?;
    let name = form.field("name")?;

    state.accounts.save_face(&ctx, name, image).await?;
    Ok((StatusCode::CREATED, Json(MessageResponse::new(format!("Face {} saved", name)))))
}

pub async fn delete(
    State(state): State<AppState>,
    Session(ctx): Session,
    Path(name): Path<String>,
) -> Result<Json<MessageResponse>> {
    state.accounts.delete_face(&ctx, &name).await?;
    Ok(Json(MessageResponse::new(format!("Face {} deleted", name))))
}
