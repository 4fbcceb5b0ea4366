pub mod accounts;
pub mod auth;
pub mod detector;
pub mod extractor;
pub mod gallery;
pub mod matcher;
pub mod pipeline;
pub mod recognizer;

pub use accounts::AccountService;
pub use auth::{AuthContext, SessionAuthenticator};
pub use detector::{FaceBox, FaceDetector};
pub use extractor::{FaceExtractor, OnnxFaceExtractor};
pub use gallery::{FrameEntry, Gallery};
pub use matcher::{face_distance, FaceMatcher, MATCH_DISTANCE_THRESHOLD};
pub use pipeline::{IngestOutcome, IngestionPipeline};
pub use recognizer::{cosine_similarity, Encoding, FaceRecognizer};
