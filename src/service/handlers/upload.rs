use crate::common::Result;
use crate::core::IngestOutcome;
use crate::service::handlers::ImageForm;
use crate::service::protocol::UploadResponse;
use crate::service::AppState;
use axum::extract::{Multipart, State};
use axum::Json;

/// Camera upload: multipart `camera_id` + `image`. The camera binding is the
/// only credential.
pub async fn upload(State(state): State<AppState>, multipart: Multipart) -> Result<Json<UploadResponse>> {
    let mut form = ImageForm::read(multipart).await?;
    let image = form.take_image()?;
    let camera_id = form.field("camera_id")?;

    let response = match state.pipeline.ingest(camera_id, image).await? {
        IngestOutcome::Recognized { face } => UploadResponse::Recognized {
            message: format!("{} recognized, no upload", face),
            recognized: face,
        },
        IngestOutcome::Stored { frame, .. } => UploadResponse::Stored {
            message: "Image uploaded successfully".into(),
            filename: frame,
        },
    };
    Ok(Json(response))
}
