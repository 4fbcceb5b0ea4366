use crate::common::{Result, WatcherError};
use crate::core::auth::{generate_session_token, hash_password, verify_password, AuthContext};
use crate::core::extractor::{extract_from_bytes, FaceExtractor};
use crate::core::matcher::FaceMatcher;
use crate::storage::frame_store::validate_key;
use crate::storage::{Account, AccountStore, Camera, Face, FrameStore};
use bytes::Bytes;
use std::sync::Arc;

const MAX_NAME_LEN: usize = 64;

/// Usernames end up as file names of the account documents.
pub fn validate_username(username: &str) -> Result<()> {
    let valid = username.len() <= MAX_NAME_LEN
        && !username.starts_with('.')
        && username.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(WatcherError::Validation(
            "Username may only contain letters, digits, '.', '_' and '-'".into(),
        ))
    }
}

fn display_name(kind: &str, name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        return Err(WatcherError::Validation(format!(
            "{} name must be 1 to {} characters",
            kind, MAX_NAME_LEN
        )));
    }
    Ok(name.to_string())
}

async fn blocking<T: Send + 'static>(work: impl FnOnce() -> Result<T> + Send + 'static) -> Result<T> {
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| WatcherError::Other(anyhow::anyhow!("Blocking task failed: {}", e)))?
}

/// Account, camera and face management on top of the account store.
pub struct AccountService {
    store: Arc<AccountStore>,
    frames: Arc<dyn FrameStore>,
    extractor: Arc<dyn FaceExtractor>,
    matcher: FaceMatcher,
}

impl AccountService {
    pub fn new(
        store: Arc<AccountStore>,
        frames: Arc<dyn FrameStore>,
        extractor: Arc<dyn FaceExtractor>,
        matcher: FaceMatcher,
    ) -> Self {
        Self { store, frames, extractor, matcher }
    }

    /// Account writes persist to disk under the store lock, so they run on
    /// the blocking pool.
    async fn write<T: Send + 'static>(
        &self,
        change: impl FnOnce(&AccountStore) -> Result<T> + Send + 'static,
    ) -> Result<T> {
        let store = self.store.clone();
        blocking(move || change(&store)).await
    }

    /// Create an account and open its first session.
    pub async fn register(&self, username: &str, password: &str) -> Result<AuthContext> {
        if username.is_empty() || password.is_empty() {
            return Err(WatcherError::Validation("Username or password missing".into()));
        }
        validate_username(username)?;

        let password = password.to_string();
        let password_hash = blocking(move || hash_password(&password)).await?;
        let token = generate_session_token();

        let account = Account::new(username, password_hash, token.clone());
        self.write(move |store| store.create(account)).await?;
        tracing::info!(username, "Account registered");
        Ok(AuthContext::new(username.to_string(), token))
    }

    /// Check the password and open an additional session.
    pub async fn login(&self, username: &str, password: &str) -> Result<AuthContext> {
        if username.is_empty() || password.is_empty() {
            return Err(WatcherError::Validation("Username or password missing".into()));
        }

        let account = self.store.get(username)?;
        let password = password.to_string();
        let stored_hash = account.password_hash;
        if !blocking(move || verify_password(&password, &stored_hash)).await? {
            tracing::info!(username, "Login with incorrect password");
            return Err(WatcherError::IncorrectPassword);
        }

        let token = generate_session_token();
        let (owner, session) = (username.to_string(), token.clone());
        self.write(move |store| {
            store.modify(&owner, |account| {
                account.session_tokens.push(session);
                Ok(())
            })
        })
        .await?;
        tracing::info!(username, "Logged in");
        Ok(AuthContext::new(username.to_string(), token))
    }

    /// Revoke the session the context was authenticated with.
    pub async fn logout(&self, ctx: AuthContext) -> Result<()> {
        let username = ctx.username().to_string();
        self.write(move |store| {
            store.modify(ctx.username(), |account| {
                account.session_tokens.retain(|token| token != ctx.token());
                Ok(())
            })
        })
        .await?;
        tracing::info!(username = %username, "Logged out");
        Ok(())
    }

    pub fn cameras(&self, ctx: &AuthContext) -> Result<Vec<Camera>> {
        Ok(self.store.get(ctx.username())?.cameras)
    }

    /// Bind a camera whose frame namespace already exists to this account.
    pub async fn enroll_camera(&self, ctx: &AuthContext, camera_id: &str, name: Option<&str>) -> Result<Camera> {
        validate_key("camera id", camera_id)?;
        let name = match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => display_name("Camera", name)?,
            None => camera_id.to_string(),
        };

        if !self.frames.namespace_exists(camera_id).await? {
            return Err(WatcherError::NotFound(format!("Camera {}", camera_id)));
        }

        let camera = Camera { id: camera_id.to_string(), name };
        let (owner, claimed) = (ctx.username().to_string(), camera.clone());
        self.write(move |store| store.claim_camera(&owner, claimed)).await?;
        tracing::info!(username = ctx.username(), camera = camera_id, "Camera enrolled");
        Ok(camera)
    }

    pub async fn rename_camera(&self, ctx: &AuthContext, camera_id: &str, name: &str) -> Result<Camera> {
        let name = display_name("Camera", name)?;
        let (owner, camera_id) = (ctx.username().to_string(), camera_id.to_string());
        self.write(move |store| {
            store.modify(&owner, |account| {
                let camera = account
                    .cameras
                    .iter_mut()
                    .find(|camera| camera.id == camera_id)
                    .ok_or_else(|| WatcherError::NotFound(format!("Camera {}", camera_id)))?;
                camera.name = name;
                Ok(camera.clone())
            })
        })
        .await
    }

    /// Detach the camera. Its stored frames stay where they are.
    pub async fn exclude_camera(&self, ctx: &AuthContext, camera_id: &str) -> Result<Camera> {
        let (owner, id) = (ctx.username().to_string(), camera_id.to_string());
        let camera = self.write(move |store| store.release_camera(&owner, &id)).await?;
        tracing::info!(username = ctx.username(), camera = camera_id, "Camera excluded");
        Ok(camera)
    }

    pub fn faces(&self, ctx: &AuthContext) -> Result<Vec<String>> {
        Ok(self
            .store
            .get(ctx.username())?
            .faces
            .into_iter()
            .map(|face| face.name)
            .collect())
    }

    /// Enroll the most confident face in `image` under `name`.
    pub async fn save_face(&self, ctx: &AuthContext, name: &str, image: Bytes) -> Result<()> {
        let name = display_name("Face", name)?;
        let encoding = extract_from_bytes(self.extractor.clone(), image)
            .await?
            .into_iter()
            .next()
            .ok_or(WatcherError::NoFaceDetected)?;

        let matcher = self.matcher;
        let (owner, face_name) = (ctx.username().to_string(), name.clone());
        self.write(move |store| {
            store.modify(&owner, |account| {
                if account.faces.iter().any(|face| face.name == face_name) {
                    return Err(WatcherError::Conflict(format!("Face {} already exists", face_name)));
                }
                let encodings: Vec<&[f32]> = account.faces.iter().map(|face| face.encoding.as_slice()).collect();
                if let Some(index) = matcher.compare(&encodings, &encoding) {
                    return Err(WatcherError::DuplicateFace { existing: account.faces[index].name.clone() });
                }
                account.faces.push(Face { name: face_name, encoding });
                Ok(())
            })
        })
        .await?;

        tracing::info!(username = ctx.username(), face = %name, "Face saved");
        Ok(())
    }

    pub async fn delete_face(&self, ctx: &AuthContext, name: &str) -> Result<()> {
        let (owner, name) = (ctx.username().to_string(), name.to_string());
        self.write(move |store| {
            store.modify(&owner, |account| {
                let before = account.faces.len();
                account.faces.retain(|face| face.name != name);
                if account.faces.len() == before {
                    return Err(WatcherError::NotFound(format!("Face {}", name)));
                }
                Ok(())
            })
        })
        .await
    }

    /// Set or clear (`None` or blank) the push destination.
    pub async fn set_destination(&self, ctx: &AuthContext, chat_id: Option<&str>) -> Result<()> {
        let chat_id = chat_id.map(str::trim).filter(|id| !id.is_empty()).map(str::to_string);
        let owner = ctx.username().to_string();
        self.write(move |store| {
            store.modify(&owner, |account| {
                account.chat_id = chat_id;
                Ok(())
            })
        })
        .await
    }

    pub fn destination(&self, ctx: &AuthContext) -> Result<Option<String>> {
        Ok(self.store.get(ctx.username())?.chat_id)
    }
}
