//! Accounts, password hashing and bearer-token sessions.

use std::sync::Arc;

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use euprava_storage::{NewUser, PortalStorage, Role, StorageError, UserId, UserRecord};
use rand::RngCore;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::PortalError;
use crate::input::{LoginInput, RegisterInput};

/// The authenticated caller of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(id: UserId, role: Role) -> Self {
        Self { id, role }
    }
}

impl From<&UserRecord> for Actor {
    fn from(user: &UserRecord) -> Self {
        Self::new(user.id, user.role)
    }
}

/// A freshly issued session. `token` is shown to the client once.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub user: UserRecord,
    pub token: String,
}

/// Hash a password as `base64(salt)$base64(sha256(salt || password))`.
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    format!("{}${}", STANDARD.encode(salt), salted_digest(&salt, password))
}

/// Check a password against a hash from [`hash_password`].
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt, expected)) = stored.split_once('$') else {
        return false;
    };
    let Ok(salt) = STANDARD.decode(salt) else {
        return false;
    };
    constant_time_eq(salted_digest(&salt, password).as_bytes(), expected.as_bytes())
}

fn salted_digest(salt: &[u8], password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    STANDARD.encode(hasher.finalize())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// 32 random bytes, base64url without padding.
pub fn new_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hex SHA-256 of a token; the only form in which tokens are stored.
pub fn token_digest(token: &str) -> String {
    Sha256::digest(token.as_bytes())
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Registration, login and token resolution.
pub struct Identity<S> {
    storage: Arc<S>,
}

impl<S> Clone for Identity<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
        }
    }
}

impl<S: PortalStorage> Identity<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    /// Resolve a bearer token to the caller.
    pub async fn authenticate(&self, token: &str) -> Result<Actor, PortalError> {
        let user = self.current_user(token).await?;
        Ok(Actor::from(&user))
    }

    /// Resolve a bearer token to the full user record.
    pub async fn current_user(&self, token: &str) -> Result<UserRecord, PortalError> {
        let unauthenticated = || PortalError::Unauthenticated("unauthenticated".to_string());
        if token.is_empty() {
            return Err(unauthenticated());
        }
        let user_id = self
            .storage
            .find_session(&token_digest(token))
            .await?
            .ok_or_else(unauthenticated)?;
        match self.storage.get_user(user_id).await {
            Ok(user) => Ok(user),
            Err(StorageError::UserNotFound { .. }) => Err(unauthenticated()),
            Err(e) => Err(e.into()),
        }
    }

    /// Self-registration always creates a `CITIZEN`.
    pub async fn register(&self, input: RegisterInput) -> Result<Session, PortalError> {
        let user = self
            .storage
            .insert_user(NewUser {
                name: input.name,
                email: input.email,
                date_of_birth: input.date_of_birth,
                jmbg: input.jmbg,
                role: Role::Citizen,
                password_hash: hash_password(&input.password),
            })
            .await?;
        tracing::info!(user_id = user.id, "citizen registered");
        self.issue(user).await
    }

    /// Exchange credentials for a new session token.
    pub async fn login(&self, input: LoginInput) -> Result<Session, PortalError> {
        let user = self.storage.find_user_by_email(&input.email).await?;
        match user {
            Some(user) if verify_password(&input.password, &user.password_hash) => {
                tracing::info!(user_id = user.id, "login");
                self.issue(user).await
            }
            _ => {
                tracing::warn!("rejected login attempt");
                Err(PortalError::Unauthenticated(
                    "the provided credentials are incorrect".to_string(),
                ))
            }
        }
    }

    /// Revoke the presented token.
    pub async fn logout(&self, token: &str) -> Result<(), PortalError> {
        self.storage.delete_session(&token_digest(token)).await?;
        Ok(())
    }

    /// Register a caller-chosen token for a user (used when seeding fixtures).
    pub async fn install_token(&self, user_id: UserId, token: &str) -> Result<(), PortalError> {
        self.storage
            .insert_session(&token_digest(token), user_id)
            .await?;
        Ok(())
    }

    async fn issue(&self, user: UserRecord) -> Result<Session, PortalError> {
        let token = new_token();
        self.storage
            .insert_session(&token_digest(&token), user.id)
            .await?;
        Ok(Session { user, token })
    }
}
