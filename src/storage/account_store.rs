use crate::common::{Result, WatcherError};
use crate::core::recognizer::Encoding;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

const STORAGE_VERSION: u32 = 1;
const ACCOUNT_EXTENSION: &str = "bincode";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Camera {
    pub id: String,
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Face {
    pub name: String,
    pub encoding: Encoding,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Account {
    pub version: u32,
    pub username: String,
    /// Argon2 PHC string.
    pub password_hash: String,
    pub session_tokens: Vec<String>,
    pub cameras: Vec<Camera>,
    pub faces: Vec<Face>,
    /// Push channel destination (Telegram chat id).
    #[serde(default)]
    pub chat_id: Option<String>,
}

impl Account {
    pub fn new(username: &str, password_hash: String, first_token: String) -> Self {
        Self {
            version: STORAGE_VERSION,
            username: username.to_string(),
            password_hash,
            session_tokens: vec![first_token],
            cameras: Vec::new(),
            faces: Vec::new(),
            chat_id: None,
        }
    }

    pub fn camera(&self, camera_id: &str) -> Option<&Camera> {
        self.cameras.iter().find(|camera| camera.id == camera_id)
    }
}

/// Everything the ingestion path needs about a camera, read in one step.
#[derive(Debug, Clone)]
pub struct CameraBinding {
    pub camera: Camera,
    pub owner: String,
    pub faces: Vec<Face>,
    pub chat_id: Option<String>,
}

#[derive(Default)]
struct StoreState {
    accounts: HashMap<String, Account>,
    /// camera id -> owning username
    camera_owners: HashMap<String, String>,
}

/// Account documents, cached in memory and optionally persisted as one
/// bincode file per account.
///
/// Every mutation runs under a single lock together with its write, so
/// conditional updates (unique username, unique camera claim) cannot race.
pub struct AccountStore {
    data_dir: Option<PathBuf>,
    state: Mutex<StoreState>,
}

impl AccountStore {
    pub fn in_memory() -> Self {
        Self {
            data_dir: None,
            state: Mutex::new(StoreState::default()),
        }
    }

    pub fn open(data_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&data_dir)?;

        let mut state = StoreState::default();
        for entry in fs::read_dir(&data_dir)? {
            let path = entry?.path();
            if path.extension().map_or(true, |ext| ext != ACCOUNT_EXTENSION) {
                continue;
            }

            let account = read_account(&path)?;
            for camera in &account.cameras {
                if let Some(previous) = state.camera_owners.insert(camera.id.clone(), account.username.clone()) {
                    tracing::warn!(
                        camera = %camera.id,
                        "Camera claimed by both {} and {}", previous, account.username
                    );
                }
            }
            state.accounts.insert(account.username.clone(), account);
        }

        tracing::info!("Loaded {} accounts from {:?}", state.accounts.len(), data_dir);

        Ok(Self {
            data_dir: Some(data_dir),
            state: Mutex::new(state),
        })
    }

    pub fn len(&self) -> usize {
        self.state.lock().accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, username: &str) -> Result<Account> {
        self.state
            .lock()
            .accounts
            .get(username)
            .cloned()
            .ok_or_else(|| WatcherError::NotFound(format!("Account {}", username)))
    }

    /// Insert a new account; fails if the username is taken.
    pub fn create(&self, account: Account) -> Result<()> {
        let mut state = self.state.lock();
        if state.accounts.contains_key(&account.username) {
            return Err(WatcherError::Conflict("Username already exists".into()));
        }

        self.persist(&account)?;
        state.accounts.insert(account.username.clone(), account);
        Ok(())
    }

    pub fn has_session(&self, username: &str, token: &str) -> bool {
        self.state
            .lock()
            .accounts
            .get(username)
            .is_some_and(|account| account.session_tokens.iter().any(|t| t == token))
    }

    /// Apply `change` to a copy of the account and commit it only if both the
    /// change and the write succeed. Camera membership must go through
    /// [`claim_camera`](Self::claim_camera) and [`release_camera`](Self::release_camera).
    pub fn modify<T>(&self, username: &str, change: impl FnOnce(&mut Account) -> Result<T>) -> Result<T> {
        let mut state = self.state.lock();
        let current = state
            .accounts
            .get(username)
            .ok_or_else(|| WatcherError::NotFound(format!("Account {}", username)))?;

        let mut updated = current.clone();
        let result = change(&mut updated)?;
        debug_assert_eq!(updated.cameras.len(), current.cameras.len());

        self.persist(&updated)?;
        state.accounts.insert(username.to_string(), updated);
        Ok(result)
    }

    /// Bind `camera` to `username` unless any account already holds it.
    pub fn claim_camera(&self, username: &str, camera: Camera) -> Result<()> {
        let mut state = self.state.lock();

        if let Some(owner) = state.camera_owners.get(&camera.id) {
            let message = if owner == username {
                "Camera already enrolled"
            } else {
                "Camera already claimed by another account"
            };
            return Err(WatcherError::Conflict(message.into()));
        }

        let mut updated = state
            .accounts
            .get(username)
            .cloned()
            .ok_or_else(|| WatcherError::NotFound(format!("Account {}", username)))?;
        updated.cameras.push(camera.clone());

        self.persist(&updated)?;
        state.camera_owners.insert(camera.id, username.to_string());
        state.accounts.insert(username.to_string(), updated);
        Ok(())
    }

    pub fn release_camera(&self, username: &str, camera_id: &str) -> Result<Camera> {
        let mut state = self.state.lock();

        let mut updated = state
            .accounts
            .get(username)
            .cloned()
            .ok_or_else(|| WatcherError::NotFound(format!("Account {}", username)))?;
        let index = updated
            .cameras
            .iter()
            .position(|camera| camera.id == camera_id)
            .ok_or_else(|| WatcherError::NotFound(format!("Camera {}", camera_id)))?;
        let removed = updated.cameras.remove(index);

        self.persist(&updated)?;
        state.camera_owners.remove(camera_id);
        state.accounts.insert(username.to_string(), updated);
        Ok(removed)
    }

    /// Owner, faces and destination of the account holding `camera_id`.
    pub fn resolve_camera(&self, camera_id: &str) -> Option<CameraBinding> {
        let state = self.state.lock();
        let owner = state.camera_owners.get(camera_id)?;
        let account = state.accounts.get(owner)?;
        let camera = account.camera(camera_id)?.clone();

        Some(CameraBinding {
            camera,
            owner: owner.clone(),
            faces: account.faces.clone(),
            chat_id: account.chat_id.clone(),
        })
    }

    fn persist(&self, account: &Account) -> Result<()> {
        let Some(data_dir) = &self.data_dir else {
            return Ok(());
        };

        let account_file = data_dir.join(format!("{}.{}", account.username, ACCOUNT_EXTENSION));
        let temp_file = data_dir.join(format!(".{}.tmp", account.username));
        let encoded = bincode::serialize(account)
            .map_err(|e| WatcherError::Storage(format!("Failed to serialize: {}", e)))?;

        fs::write(&temp_file, encoded)?;
        fs::rename(&temp_file, &account_file)?;
        Ok(())
    }
}

fn read_account(path: &Path) -> Result<Account> {
    let data = fs::read(path)?;
    let mut account: Account = bincode::deserialize(&data)
        .map_err(|e| WatcherError::Storage(format!("Failed to deserialize {:?}: {}", path, e)))?;

    if account.version < STORAGE_VERSION {
        account.version = STORAGE_VERSION;
    }

    Ok(account)
}
