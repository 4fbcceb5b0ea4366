use crate::common::{Result, WatcherError};
use serde::{Deserialize, Serialize};

// Request types

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct CredentialsRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl CredentialsRequest {
    pub fn into_parts(self) -> Result<(String, String)> {
        match (self.username, self.password) {
            (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
                Ok((username, password))
            }
            _ => Err(WatcherError::Validation("Username or password missing".into())),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EnrollCameraRequest {
    pub camera_id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RenameCameraRequest {
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct NotificationRequest {
    /// Telegram chat id; empty or absent clears it.
    #[serde(default)]
    pub chat_id: Option<String>,
}

/// Query string of a signed frame link.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SignedQuery {
    pub expires: i64,
    pub signature: String,
}

/// Session credentials passed in the query string, for clients that cannot
/// set headers (WebSocket upgrades from browsers).
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct SessionQuery {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub session_token: Option<String>,
}

// Response types

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SessionResponse {
    pub message: String,
    pub session_token: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum UploadResponse {
    Recognized { message: String, recognized: String },
    Stored { message: String, filename: String },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NotificationResponse {
    pub chat_id: Option<String>,
}
