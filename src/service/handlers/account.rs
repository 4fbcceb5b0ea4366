use crate::common::Result;
use crate::service::protocol::{
    CredentialsRequest, MessageResponse, NotificationRequest, NotificationResponse, SessionResponse,
};
use crate::service::{AppState, Session};
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<CredentialsRequest>,
) -> Result<(StatusCode, Json<SessionResponse>)> {
    let (username, password) = request.into_parts()?;
    let ctx = state.accounts.register(&username, &password).await?;
    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            message: "User registered successfully".into(),
            session_token: ctx.token().to_string(),
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<CredentialsRequest>,
) -> Result<Json<SessionResponse>> {
    let (username, password) = request.into_parts()?;
    let ctx = state.accounts.login(&username, &password).await?;
    Ok(Json(SessionResponse {
        message: "Login successful".into(),
        session_token: ctx.token().to_string(),
    }))
}

pub async fn logout(State(state): State<AppState>, Session(ctx): Session) -> Result<Json<MessageResponse>> {
    state.accounts.logout(ctx).await?;
    Ok(Json(MessageResponse::new("Logout successful")))
}

pub async fn get_notifications(
    State(state): State<AppState>,
    Session(ctx): Session,
) -> Result<Json<NotificationResponse>> {
    Ok(Json(NotificationResponse { chat_id: state.accounts.destination(&ctx)? }))
}

pub async fn set_notifications(
    State(state): State<AppState>,
    Session(ctx): Session,
    Json(request): Json<NotificationRequest>,
) -> Result<Json<NotificationResponse>> {
    state.accounts.set_destination(&ctx, request.chat_id.as_deref()).await?;
    Ok(Json(NotificationResponse { chat_id: state.accounts.destination(&ctx)? }))
}
