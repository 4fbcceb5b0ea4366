//! Frame ingestion: resolve the camera, recognize, then either suppress the
//! frame or store it, and alert the owner.

use crate::common::{Result, WatcherError};
use crate::core::extractor::{extract_from_bytes, FaceExtractor};
use crate::core::matcher::FaceMatcher;
use crate::notify::{NotificationDispatcher, NEW_FRAME_EVENT};
use crate::storage::frame_store::{frame_name, MAX_FRAMES_PER_SECOND};
use crate::storage::{AccountStore, FrameStore};
use bytes::Bytes;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// A known face was seen; nothing was stored.
    Recognized { face: String },
    /// Unknown visitor; the frame was stored under `frame`.
    Stored { camera_id: String, frame: String },
}

pub struct IngestionPipeline {
    accounts: Arc<AccountStore>,
    frames: Arc<dyn FrameStore>,
    extractor: Arc<dyn FaceExtractor>,
    matcher: FaceMatcher,
    notifier: Arc<NotificationDispatcher>,
}

impl IngestionPipeline {
    pub fn new(
        accounts: Arc<AccountStore>,
        frames: Arc<dyn FrameStore>,
        extractor: Arc<dyn FaceExtractor>,
        matcher: FaceMatcher,
        notifier: Arc<NotificationDispatcher>,
    ) -> Self {
        Self { accounts, frames, extractor, matcher, notifier }
    }

    #[tracing::instrument(skip(self, image), fields(bytes = image.len()))]
    pub async fn ingest(&self, camera_id: &str, image: Bytes) -> Result<IngestOutcome> {
        // Owner, faces and destination come from one snapshot.
        let binding = self
            .accounts
            .resolve_camera(camera_id)
            .ok_or_else(|| WatcherError::UnknownCamera(camera_id.to_string()))?;

        let encodings = extract_from_bytes(self.extractor.clone(), image.clone()).await?;
        tracing::debug!(faces = encodings.len(), owner = %binding.owner, "Frame analysed");

        let matched = encodings.first().and_then(|candidate| {
            self.matcher
                .compare(&binding.faces.iter().map(|f| f.encoding.as_slice()).collect::<Vec<_>>(), candidate)
                .map(|index| binding.faces[index].name.clone())
        });

        if let Some(face) = matched {
            tracing::info!(%face, camera = %binding.camera.id, "Known face, frame discarded");
            self.notifier.notify(
                binding.chat_id.as_deref(),
                &format!("{} recognized by {}", face, binding.camera.name),
                None,
            );
            return Ok(IngestOutcome::Recognized { face });
        }

        self.frames.ensure_namespace(camera_id).await?;
        let frame = self.store_frame(camera_id, image.clone()).await?;
        tracing::info!(%frame, camera = camera_id, "Unknown visitor stored");

        self.notifier.notify(
            binding.chat_id.as_deref(),
            &format!("Unknown visitor at {}", binding.camera.name),
            Some(image),
        );
        self.notifier.broadcast(&binding.owner, NEW_FRAME_EVENT);

        Ok(IngestOutcome::Stored { camera_id: camera_id.to_string(), frame })
    }

    async fn store_frame(&self, camera_id: &str, image: Bytes) -> Result<String> {
        // UTC so names keep sorting by time across DST changes.
        let now = chrono::Utc::now();
        for seq in 0..MAX_FRAMES_PER_SECOND {
            let name = frame_name(&now, seq);
            if self.frames.create(camera_id, &name, image.clone()).await? {
                return Ok(name);
            }
        }
        Err(WatcherError::Storage(format!(
            "More than {} frames from {} within one second",
            MAX_FRAMES_PER_SECOND, camera_id
        )))
    }
}
