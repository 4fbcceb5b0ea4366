use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use crate::common::error::{WatcherError, Result};
use crate::core::matcher::MATCH_DISTANCE_THRESHOLD;

/// Environment variable consulted when `notify.telegram_token` is unset.
pub const TELEGRAM_TOKEN_ENV: &str = "THE_WATCHER_TOKEN";

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub models: ModelConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub recognizer: RecognizerConfig,
    #[serde(default)]
    pub matcher: MatcherConfig,
    #[serde(default)]
    pub signing: SigningConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub performance: PerformanceConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
    /// Base URL used when building signed frame links.
    #[serde(default = "default_public_url")]
    pub public_url: String,
    /// Directory with the built web UI; nothing is served when unset.
    #[serde(default)]
    pub ui_dir: Option<PathBuf>,
    #[serde(default = "default_max_upload")]
    pub max_upload_bytes: usize,
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 5000))
}
fn default_public_url() -> String { "http://127.0.0.1:5000".to_string() }
fn default_max_upload() -> usize { 8 * 1024 * 1024 }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            public_url: default_public_url(),
            ui_dir: None,
            max_upload_bytes: default_max_upload(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct StorageConfig {
    /// Account documents. Falls back to the system or dev directory.
    #[serde(default)]
    pub accounts_dir: Option<PathBuf>,
    /// Root of the per-camera frame namespaces.
    #[serde(default)]
    pub frames_dir: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ModelConfig {
    pub detector_path: PathBuf,
    pub recognizer_path: PathBuf,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            detector_path: PathBuf::from("face_detector.onnx"),
            recognizer_path: PathBuf::from("face_recognizer.onnx"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DetectorConfig {
    pub input_width: u32,
    pub input_height: u32,
    #[serde(default = "default_detection_confidence")]
    pub confidence: f32,
}

fn default_detection_confidence() -> f32 { 0.5 }

impl Default for DetectorConfig {
    fn default() -> Self {
        Self { input_width: 640, input_height: 640, confidence: default_detection_confidence() }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RecognizerConfig {
    pub input_size: u32,
    pub normalization_value: f32,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self { input_size: 112, normalization_value: 127.5 }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MatcherConfig {
    #[serde(default = "default_distance_threshold")]
    pub distance_threshold: f32,
}

fn default_distance_threshold() -> f32 { MATCH_DISTANCE_THRESHOLD }

impl Default for MatcherConfig {
    fn default() -> Self {
        Self { distance_threshold: default_distance_threshold() }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SigningConfig {
    /// HMAC key for frame links. A random key is generated at start when unset,
    /// which invalidates outstanding links on restart.
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default = "default_url_ttl")]
    pub url_ttl_seconds: u64,
}

fn default_url_ttl() -> u64 { 3600 }

impl Default for SigningConfig {
    fn default() -> Self {
        Self { secret: None, url_ttl_seconds: default_url_ttl() }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NotifyConfig {
    #[serde(default)]
    pub telegram_token: Option<String>,
    #[serde(default = "default_telegram_api")]
    pub telegram_api_url: String,
    #[serde(default = "default_notify_timeout")]
    pub timeout_ms: u64,
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
}

fn default_telegram_api() -> String { "https://api.telegram.org".to_string() }
fn default_notify_timeout() -> u64 { 5000 }
fn default_broadcast_capacity() -> usize { 256 }

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            telegram_token: None,
            telegram_api_url: default_telegram_api(),
            timeout_ms: default_notify_timeout(),
            broadcast_capacity: default_broadcast_capacity(),
        }
    }
}

impl NotifyConfig {
    /// Token from the config file, else from the environment.
    pub fn resolved_telegram_token(&self) -> Option<String> {
        self.telegram_token
            .clone()
            .or_else(|| std::env::var(TELEGRAM_TOKEN_ENV).ok())
            .filter(|token| !token.trim().is_empty())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PerformanceConfig {
    #[serde(default = "default_optimization_level")]
    pub optimization_level: u32,
}

fn default_optimization_level() -> u32 { 3 }

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self { optimization_level: default_optimization_level() }
    }
}

impl Config {
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(WatcherError::Other(anyhow::anyhow!(
                "Config file not found: {}. Please create it from the example.", path.display()
            )));
        }

        tracing::info!("Loading config from: {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)
            .map_err(|e| WatcherError::Other(anyhow::anyhow!("Config parse error: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let threshold = self.matcher.distance_threshold;
        if !(threshold > 0.0 && threshold <= 2.0) {
            return Err(WatcherError::Other(anyhow::anyhow!(
                "Match distance threshold must be in (0.0, 2.0], got {}", threshold
            )));
        }

        if self.detector.confidence < 0.0 || self.detector.confidence > 1.0 {
            return Err(WatcherError::Other(anyhow::anyhow!(
                "Detection confidence must be between 0.0 and 1.0, got {}",
                self.detector.confidence
            )));
        }

        if self.detector.input_width == 0 || self.detector.input_width > 4096 {
            return Err(WatcherError::Other(anyhow::anyhow!(
                "Detector input width must be between 1 and 4096, got {}",
                self.detector.input_width
            )));
        }
        if self.detector.input_height == 0 || self.detector.input_height > 4096 {
            return Err(WatcherError::Other(anyhow::anyhow!(
                "Detector input height must be between 1 and 4096, got {}",
                self.detector.input_height
            )));
        }

        if self.recognizer.input_size == 0 || self.recognizer.input_size > 1024 {
            return Err(WatcherError::Other(anyhow::anyhow!(
                "Recognizer input size must be between 1 and 1024, got {}",
                self.recognizer.input_size
            )));
        }

        if self.signing.url_ttl_seconds == 0 {
            return Err(WatcherError::Other(anyhow::anyhow!(
                "Signed URL lifetime must be at least one second"
            )));
        }

        if self.notify.timeout_ms == 0 || self.notify.broadcast_capacity == 0 {
            return Err(WatcherError::Other(anyhow::anyhow!(
                "Notification timeout and broadcast capacity must be non-zero"
            )));
        }

        Ok(())
    }
}
