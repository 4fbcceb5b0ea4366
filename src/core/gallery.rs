use crate::common::{Result, WatcherError};
use crate::core::auth::AuthContext;
use crate::storage::frame_store::parse_frame_name;
use crate::storage::{AccountStore, FrameStore, UrlSigner};
use bytes::Bytes;
use serde::Serialize;
use std::sync::Arc;

/// One stored frame as shown to its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameEntry {
    pub url: String,
    pub camera: String,
    pub camera_name: String,
    pub name: String,
    pub date: String,
    pub time: String,
}

/// Browsing and retrieval of stored frames.
pub struct Gallery {
    accounts: Arc<AccountStore>,
    frames: Arc<dyn FrameStore>,
    signer: UrlSigner,
}

impl Gallery {
    pub fn new(accounts: Arc<AccountStore>, frames: Arc<dyn FrameStore>, signer: UrlSigner) -> Self {
        Self { accounts, frames, signer }
    }

    pub fn signer(&self) -> &UrlSigner {
        &self.signer
    }

    /// Frames of every camera the account holds, newest first.
    pub async fn list_frames(&self, ctx: &AuthContext) -> Result<Vec<FrameEntry>> {
        let account = self.accounts.get(ctx.username())?;
        let now = chrono::Utc::now().timestamp();

        let mut entries = Vec::new();
        for camera in &account.cameras {
            for link in self.frames.list(&camera.id, &self.signer, now).await? {
                let stamp = parse_frame_name(&link.name);
                entries.push(FrameEntry {
                    url: link.url,
                    camera: camera.id.clone(),
                    camera_name: camera.name.clone(),
                    date: stamp.as_ref().map(|s| s.date.clone()).unwrap_or_default(),
                    time: stamp.map(|s| s.time).unwrap_or_default(),
                    name: link.name,
                });
            }
        }

        // Names sort by capture time; ties broken by camera for a stable order.
        entries.sort_by(|a, b| b.name.cmp(&a.name).then_with(|| a.camera.cmp(&b.camera)));
        Ok(entries)
    }

    /// Delete one frame of a camera the account currently holds.
    pub async fn delete_frame(&self, ctx: &AuthContext, camera_id: &str, name: &str) -> Result<()> {
        let account = self.accounts.get(ctx.username())?;
        if account.camera(camera_id).is_none() {
            return Err(WatcherError::NotFound(format!("Camera {}", camera_id)));
        }

        self.frames.remove(camera_id, name).await?;
        tracing::info!(username = ctx.username(), camera = camera_id, frame = name, "Frame deleted");
        Ok(())
    }

    /// Raw bytes behind a signed link.
    pub async fn read_frame(&self, camera_id: &str, name: &str, expires: i64, signature: &str) -> Result<Bytes> {
        let now = chrono::Utc::now().timestamp();
        self.signer.verify(camera_id, name, expires, signature, now)?;
        self.frames.get(camera_id, name).await
    }
}
