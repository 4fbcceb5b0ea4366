//! Live event socket. Each client receives the events of its own account as
//! JSON text messages.

use crate::core::AuthContext;
use crate::notify::LiveEvent;
use crate::service::{AppState, Session};
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

pub async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>, Session(ctx): Session) -> Response {
    let rx = state.live.subscribe();
    ws.on_upgrade(move |socket| handle_ws(socket, ctx, rx))
}

async fn handle_ws(socket: WebSocket, ctx: AuthContext, mut rx: broadcast::Receiver<LiveEvent>) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    tracing::debug!(username = ctx.username(), "Live client connected");

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(event) if event.username == ctx.username() => {
                        let Ok(text) = serde_json::to_string(&event) else { continue };
                        if ws_tx.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(username = ctx.username(), "Live client lagged, missed {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Ping(data))) => {
                        let _ = ws_tx.send(Message::Pong(data)).await;
                    }
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }

    tracing::debug!(username = ctx.username(), "Live client disconnected");
}
