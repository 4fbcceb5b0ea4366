use crate::common::WatcherError;
use crate::service::protocol::ErrorResponse;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

impl WatcherError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            WatcherError::Validation(_) => StatusCode::BAD_REQUEST,
            WatcherError::Unauthenticated | WatcherError::InvalidSession | WatcherError::IncorrectPassword => {
                StatusCode::UNAUTHORIZED
            }
            WatcherError::InvalidSignature | WatcherError::ExpiredUrl => StatusCode::FORBIDDEN,
            WatcherError::UnknownCamera(_) | WatcherError::NotFound(_) => StatusCode::NOT_FOUND,
            WatcherError::Conflict(_) | WatcherError::DuplicateFace { .. } => StatusCode::CONFLICT,
            WatcherError::Decode(_)
            | WatcherError::Extraction(_)
            | WatcherError::NoFaceDetected => StatusCode::UNPROCESSABLE_ENTITY,
            WatcherError::Storage(_)
            | WatcherError::Model(_)
            | WatcherError::Notify(_)
            | WatcherError::Io(_)
            | WatcherError::Ort(_)
            | WatcherError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for WatcherError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!(%status, "Request rejected: {}", self);
        }

        let body = Json(ErrorResponse { error: self.to_string() });
        match self {
            // Points the client at the face it collided with.
            WatcherError::DuplicateFace { .. } => (status, [(header::LOCATION, "/faces")], body).into_response(),
            _ => (status, body).into_response(),
        }
    }
}
