pub mod common;
pub mod core;
pub mod notify;
pub mod service;
pub mod storage;

pub use common::{Config, DevMode, Result, WatcherError};
pub use core::{
    AccountService, AuthContext, FaceExtractor, FaceMatcher, Gallery, IngestOutcome, IngestionPipeline,
    SessionAuthenticator, MATCH_DISTANCE_THRESHOLD,
};
pub use notify::{LiveBroadcaster, NotificationDispatcher, PushChannel};
pub use service::AppState;
pub use storage::{AccountStore, FrameStore, LocalFrameStore, MemoryFrameStore, UrlSigner};
