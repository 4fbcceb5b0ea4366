//! HTTP and WebSocket surface.

pub mod error;
pub mod handlers;
pub mod protocol;
pub mod server;
pub mod session;
pub mod ws;

use crate::core::{AccountService, Gallery, IngestionPipeline, SessionAuthenticator};
use crate::notify::LiveBroadcaster;
use std::sync::Arc;

pub use server::{router, serve};
pub use session::Session;

/// Collaborators shared by every request. Built once by the server binary.
#[derive(Clone)]
pub struct AppState {
    pub auth: SessionAuthenticator,
    pub accounts: Arc<AccountService>,
    pub gallery: Arc<Gallery>,
    pub pipeline: Arc<IngestionPipeline>,
    pub live: LiveBroadcaster,
}
