use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatcherError {
    #[error("{0}")]
    Validation(String),

    #[error("Username or session token missing")]
    Unauthenticated,

    #[error("Invalid session token")]
    InvalidSession,

    #[error("Incorrect password")]
    IncorrectPassword,

    #[error("Invalid URL signature")]
    InvalidSignature,

    #[error("Signed URL expired")]
    ExpiredUrl,

    #[error("Unknown camera: {0}")]
    UnknownCamera(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// The encoding is already enrolled under another face name.
    #[error("Face already saved as {existing}")]
    DuplicateFace { existing: String },

    #[error("Image decode error: {0}")]
    Decode(String),

    #[error("Face extraction failed: {0}")]
    Extraction(String),

    #[error("No face detected")]
    NoFaceDetected,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Notification error: {0}")]
    Notify(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ORT error: {0}")]
    Ort(#[from] ort::OrtError),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, WatcherError>;
