use watcher::common::{Config, DevMode};
use watcher::core::{
    AccountService, FaceExtractor, FaceMatcher, Gallery, IngestionPipeline, OnnxFaceExtractor, SessionAuthenticator,
};
use watcher::notify::{LiveBroadcaster, NotificationDispatcher, PushChannel, TelegramClient};
use watcher::service::{self, AppState};
use watcher::storage::{AccountStore, FrameStore, LocalFrameStore, UrlSigner};

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Time allowed for in-flight pushes after the server stops.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(name = "watcher-server")]
#[command(about = "The Watcher frame ingestion and alerting server")]
struct Args {
    /// Run in development mode (data under ./dev_data, verbose logs)
    #[arg(long)]
    dev: bool,

    /// Config file to use instead of the mode default
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override `server.bind`
    #[arg(long)]
    bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(args.dev);

    let dev_mode = DevMode::new(args.dev)?;
    let mut config = dev_mode.load_config(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }

    let (state, notifier) = build_state(&config, &dev_mode)?;
    let app = service::router(state, &config.server);

    let listener = tokio::net::TcpListener::bind(config.server.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.server.bind))?;

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received shutdown signal"),
            Err(e) => warn!("Failed to listen for shutdown signal: {}", e),
        }
        signal_cancel.cancel();
    });

    service::serve(listener, app, cancel).await?;

    if tokio::time::timeout(SHUTDOWN_GRACE, notifier.close()).await.is_err() {
        warn!("Shutdown timed out after {:?} with pushes still in flight", SHUTDOWN_GRACE);
    }
    Ok(())
}

fn build_state(config: &Config, dev_mode: &DevMode) -> Result<(AppState, Arc<NotificationDispatcher>)> {
    let accounts_dir = dev_mode.accounts_dir(config);
    let frames_dir = dev_mode.frames_dir(config);
    info!("Accounts: {}", accounts_dir.display());
    info!("Frames:   {}", frames_dir.display());

    let store = Arc::new(AccountStore::open(accounts_dir)?);
    let frames: Arc<dyn FrameStore> = Arc::new(LocalFrameStore::new(frames_dir)?);
    let extractor: Arc<dyn FaceExtractor> = Arc::new(
        OnnxFaceExtractor::new(config, &dev_mode.models_dir()).context("Failed to load face models")?,
    );
    let matcher = FaceMatcher::new(config.matcher.distance_threshold);
    info!("Match distance threshold: {}", matcher.threshold());

    let ttl = Duration::from_secs(config.signing.url_ttl_seconds);
    let signer = match &config.signing.secret {
        Some(secret) => UrlSigner::new(secret.as_bytes().to_vec(), &config.server.public_url, ttl),
        None => {
            warn!("signing.secret not set, frame links will not survive a restart");
            UrlSigner::random(&config.server.public_url, ttl)
        }
    };

    let push: Option<Arc<dyn PushChannel>> = match config.notify.resolved_telegram_token() {
        Some(token) => {
            info!("Telegram notifications enabled");
            Some(Arc::new(TelegramClient::new(
                &config.notify.telegram_api_url,
                &token,
                Duration::from_millis(config.notify.timeout_ms),
            )?))
        }
        None => {
            info!("No Telegram token, push notifications disabled");
            None
        }
    };

    let live = LiveBroadcaster::new(config.notify.broadcast_capacity);
    let notifier = Arc::new(NotificationDispatcher::new(
        push,
        live.clone(),
        Duration::from_millis(config.notify.timeout_ms),
    ));

    let state = AppState {
        auth: SessionAuthenticator::new(store.clone()),
        accounts: Arc::new(AccountService::new(store.clone(), frames.clone(), extractor.clone(), matcher)),
        gallery: Arc::new(Gallery::new(store.clone(), frames.clone(), signer)),
        pipeline: Arc::new(IngestionPipeline::new(store, frames, extractor, matcher, notifier.clone())),
        live,
    };
    Ok((state, notifier))
}

fn setup_logging(dev_mode: bool) {
    if dev_mode {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new("debug,tower_http=debug"))
            .with_file(true)
            .with_line_number(true)
            .with_thread_ids(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("watcher=info,tower_http=info")),
            )
            .init();
    }
}
