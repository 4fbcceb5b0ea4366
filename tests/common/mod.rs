//! Shared harness: the full router over in-memory stores, a pixel-driven
//! face extractor and a recording push channel.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use bytes::Bytes;
use http_body_util::BodyExt;
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use parking_lot::Mutex;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use watcher::common::config::ServerConfig;
use watcher::core::{Encoding, FaceExtractor};
use watcher::{
    AccountService, AccountStore, AppState, FaceMatcher, Gallery, IngestionPipeline, LiveBroadcaster,
    MemoryFrameStore, NotificationDispatcher, PushChannel, SessionAuthenticator, UrlSigner,
};

pub const SIGNING_KEY: &[u8] = b"integration-secret";
pub const PUBLIC_URL: &str = "http://watcher.test";
const BOUNDARY: &str = "watcher-test-boundary";

/// Maps the top-left pixel to `[r, g, b] / 100`. A black pixel means no face.
pub struct PixelExtractor;

impl FaceExtractor for PixelExtractor {
    fn extract(&self, image: &DynamicImage) -> watcher::Result<Vec<Encoding>> {
        let [r, g, b] = image.to_rgb8().get_pixel(0, 0).0;
        if r == 0 && g == 0 && b == 0 {
            return Ok(Vec::new());
        }
        Ok(vec![vec![r as f32 / 100.0, g as f32 / 100.0, b as f32 / 100.0]])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Push {
    pub destination: String,
    pub text: String,
    pub image: Option<Bytes>,
}

#[derive(Default)]
pub struct RecordingPush {
    pub sent: Mutex<Vec<Push>>,
}

#[async_trait]
impl PushChannel for RecordingPush {
    async fn push(&self, destination: &str, text: &str, image: Option<Bytes>) -> watcher::Result<()> {
        self.sent.lock().push(Push {
            destination: destination.to_string(),
            text: text.to_string(),
            image,
        });
        Ok(())
    }
}

pub struct Harness {
    pub app: Router,
    pub frames: Arc<MemoryFrameStore>,
    pub accounts: Arc<AccountStore>,
    pub pushes: Arc<RecordingPush>,
    pub notifier: Arc<NotificationDispatcher>,
    pub live: LiveBroadcaster,
}

impl Harness {
    pub fn new() -> Self {
        let accounts = Arc::new(AccountStore::in_memory());
        let frames = Arc::new(MemoryFrameStore::new());
        let pushes = Arc::new(RecordingPush::default());
        let live = LiveBroadcaster::new(16);
        let notifier = Arc::new(NotificationDispatcher::new(
            Some(pushes.clone()),
            live.clone(),
            Duration::from_secs(1),
        ));
        let extractor: Arc<dyn FaceExtractor> = Arc::new(PixelExtractor);
        let matcher = FaceMatcher::default();
        let signer = UrlSigner::new(SIGNING_KEY.to_vec(), PUBLIC_URL, Duration::from_secs(3600));

        let state = AppState {
            auth: SessionAuthenticator::new(accounts.clone()),
            accounts: Arc::new(AccountService::new(accounts.clone(), frames.clone(), extractor.clone(), matcher)),
            gallery: Arc::new(Gallery::new(accounts.clone(), frames.clone(), signer)),
            pipeline: Arc::new(IngestionPipeline::new(
                accounts.clone(),
                frames.clone(),
                extractor,
                matcher,
                notifier.clone(),
            )),
            live: live.clone(),
        };
        let app = watcher::service::router(state, &ServerConfig::default());

        Self { app, frames, accounts, pushes, notifier, live }
    }

    pub async fn send(&self, request: Request<Body>) -> Reply {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        Reply { status, headers, body }
    }

    /// Wait until queued pushes have been handed to the recorder.
    pub async fn settle(&self) -> Vec<Push> {
        self.notifier.flush().await;
        self.pushes.sent.lock().clone()
    }

    pub async fn register(&self, username: &str, password: &str) -> String {
        let reply = self
            .send(json("POST", "/register", None, serde_json::json!({"username": username, "password": password})))
            .await;
        assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.text());
        reply.json()["session_token"].as_str().unwrap().to_string()
    }
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Reply {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

pub type Credentials<'a> = Option<(&'a str, &'a str)>;

fn builder(method: &str, uri: &str, auth: Credentials<'_>) -> axum::http::request::Builder {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some((username, token)) = auth {
        builder = builder.header("x-username", username).header("x-session-token", token);
    }
    builder
}

pub fn json(method: &str, uri: &str, auth: Credentials<'_>, body: serde_json::Value) -> Request<Body> {
    builder(method, uri, auth)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn empty(method: &str, uri: &str, auth: Credentials<'_>) -> Request<Body> {
    builder(method, uri, auth).body(Body::empty()).unwrap()
}

pub fn multipart(uri: &str, auth: Credentials<'_>, fields: &[(&str, &str)], image: Option<&Bytes>) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes(),
        );
    }
    if let Some(image) = image {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"frame.png\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(image);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    builder("POST", uri, auth)
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap()
}

/// A small PNG whose first pixel drives [`PixelExtractor`].
pub fn png(rgb: [u8; 3]) -> Bytes {
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb(rgb)))
        .write_to(&mut out, ImageOutputFormat::Png)
        .unwrap();
    Bytes::from(out.into_inner())
}

/// Path and query of a signed link, as the router sees it.
pub fn local_path(url: &str) -> &str {
    url.strip_prefix(PUBLIC_URL).unwrap()
}
