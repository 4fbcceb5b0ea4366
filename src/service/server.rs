use crate::common::config::ServerConfig;
use crate::service::handlers::{account, camera, face, frame, upload};
use crate::service::{ws, AppState};
use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, patch, post, put};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub fn router(state: AppState, config: &ServerConfig) -> Router {
    let mut app = Router::new()
        .route("/register", post(account::register))
        .route("/login", post(account::login))
        .route("/logout", post(account::logout))
        .route("/notifications", get(account::get_notifications).put(account::set_notifications))
        .route("/upload", post(upload::upload))
        .route("/frames", get(frame::list))
        .route("/frames/{camera_id}/{name}", delete(frame::delete))
        .route("/blob/{camera_id}/{name}", get(frame::blob))
        .route("/cameras", get(camera::list).post(camera::enroll))
        .route("/cameras/{camera_id}", patch(camera::rename).delete(camera::exclude))
        .route("/faces", get(face::list).post(face::save))
        .route("/faces/{name}", delete(face::delete))
        .route("/ws", get(ws::upgrade))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    if let Some(path) = &config.ui_dir {
        if path.exists() {
            tracing::info!("Serving UI from {:?}", path);
            app = app.fallback_service(ServeDir::new(path).append_index_html_on_directories(true));
        } else {
            tracing::warn!("UI path {:?} does not exist, skipping static file serving", path);
        }
    }

    app
}

/// Serve until `cancel` fires, then finish in-flight requests.
pub async fn serve(listener: TcpListener, app: Router, cancel: CancellationToken) -> anyhow::Result<()> {
    let addr = listener.local_addr().context("Listener has no local address")?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .context("HTTP server error")?;

    tracing::info!("HTTP server stopped");
    Ok(())
}
