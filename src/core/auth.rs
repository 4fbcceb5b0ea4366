use crate::common::{Result, WatcherError};
use crate::storage::AccountStore;
use argon2::password_hash::rand_core::OsRng as HashRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::Arc;

pub const SESSION_TOKEN_LEN: usize = 32;

/// 32 alphanumeric characters from the OS random source.
pub fn generate_session_token() -> String {
    rand::rngs::OsRng
        .sample_iter(&Alphanumeric)
        .take(SESSION_TOKEN_LEN)
        .map(char::from)
        .collect()
}

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut HashRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| WatcherError::Other(anyhow::anyhow!("Password hashing failed: {}", e)))
}

pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| WatcherError::Storage(format!("Corrupt password hash: {}", e)))?;
    Ok(Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
}

/// Proof that a request carried a live session. Only
/// [`SessionAuthenticator`] and the account service hand these out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    username: String,
    token: String,
}

impl AuthContext {
    pub(crate) fn new(username: String, token: String) -> Self {
        Self { username, token }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

#[derive(Clone)]
pub struct SessionAuthenticator {
    accounts: Arc<AccountStore>,
}

impl SessionAuthenticator {
    pub fn new(accounts: Arc<AccountStore>) -> Self {
        Self { accounts }
    }

    pub fn authenticate(&self, username: Option<&str>, token: Option<&str>) -> Result<AuthContext> {
        let username = username.filter(|u| !u.is_empty()).ok_or(WatcherError::Unauthenticated)?;
        let token = token.filter(|t| !t.is_empty()).ok_or(WatcherError::Unauthenticated)?;

        if !self.accounts.has_session(username, token) {
            tracing::debug!(username, "Rejected session token");
            return Err(WatcherError::InvalidSession);
        }

        Ok(AuthContext::new(username.to_string(), token.to_string()))
    }
}
