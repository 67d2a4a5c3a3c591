//! Password login and opaque bearer sessions.
//!
//! Accounts live in the [`UserRepository`]; the [`SessionManager`] only keeps
//! the token table, so restarting the process signs everybody out.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::model::{NewUser, Role, User, UserId, ValidationError};
use crate::repository::{RepoError, UserRepository};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Token is required")]
    MissingToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("failed to hash password: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error(transparent)]
    Repository(#[from] RepoError),
}

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Clone)]
struct Session {
    user_id: UserId,
    expires_at: DateTime<Utc>,
}

/// Drops sessions past their expiry. Runs on every login.
fn sweep_expired(sessions: &mut HashMap<String, Session>, now: DateTime<Utc>) -> usize {
    let before = sessions.len();
    sessions.retain(|_, session| session.expires_at > now);
    before - sessions.len()
}

/// Issues, resolves and revokes session tokens.
pub struct SessionManager {
    users: Arc<dyn UserRepository>,
    sessions: RwLock<HashMap<String, Session>>,
    ttl: Duration,
    cost: u32,
}

impl SessionManager {
    pub fn new(users: Arc<dyn UserRepository>, ttl: Duration) -> Self {
        Self {
            users,
            sessions: RwLock::new(HashMap::new()),
            ttl,
            cost: bcrypt::DEFAULT_COST,
        }
    }

    /// Overrides the bcrypt cost factor.
    pub fn with_cost(mut self, cost: u32) -> Self {
        self.cost = cost;
        self
    }

    pub fn hash_password(&self, password: &str) -> AuthResult<String> {
        Ok(bcrypt::hash(password, self.cost)?)
    }

    fn verify_password(password: &str, hash: &str) -> bool {
        bcrypt::verify(password, hash).unwrap_or(false)
    }

    /// Checks the credentials and opens a session. Returns the token and the account.
    pub async fn login(&self, username: &str, password: &str) -> AuthResult<(String, User)> {
        let user = self
            .users
            .find_by_username(username.trim())
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        if !Self::verify_password(password, &user.password_hash) {
            debug!(username = %user.username, "rejected login");
            return Err(AuthError::InvalidCredentials);
        }

        let now = Utc::now();
        let token = Uuid::new_v4().to_string();
        let session = Session {
            user_id: user.id.clone(),
            expires_at: now + self.ttl,
        };

        let mut sessions = self.sessions.write().await;
        let swept = sweep_expired(&mut sessions, now);
        if swept > 0 {
            debug!(swept, "dropped expired sessions");
        }
        sessions.insert(token.clone(), session);
        drop(sessions);

        info!(user_id = %user.id, role = user.role.as_str(), "session opened");
        Ok((token, user))
    }

    /// Resolves a token to its account. Expired tokens are dropped on sight.
    pub async fn authenticate(&self, token: &str) -> AuthResult<User> {
        let session = self
            .sessions
            .read()
            .await
            .get(token)
            .cloned()
            .ok_or(AuthError::InvalidToken)?;

        if session.expires_at <= Utc::now() {
            self.sessions.write().await.remove(token);
            debug!(user_id = %session.user_id, "session expired");
            return Err(AuthError::InvalidToken);
        }

        self.users
            .get(&session.user_id)
            .await?
            .ok_or(AuthError::InvalidToken)
    }

    /// Returns whether the token was live.
    pub async fn logout(&self, token: &str) -> bool {
        self.sessions.write().await.remove(token).is_some()
    }

    /// Validates, hashes and stores a new account.
    pub async fn register(&self, new_user: NewUser) -> AuthResult<User> {
        new_user.validate()?;
        let hash = self.hash_password(&new_user.password)?;
        let user = self.users.create(new_user.into_user(hash, Utc::now())).await?;
        info!(user_id = %user.id, role = user.role.as_str(), "user created");
        Ok(user)
    }

    /// Creates the bootstrap super admin unless that username already exists.
    /// Returns whether an account was created.
    pub async fn ensure_admin(&self, username: &str, password: &str) -> AuthResult<bool> {
        if self.users.find_by_username(username).await?.is_some() {
            return Ok(false);
        }
        self.register(NewUser {
            username: username.to_string(),
            password: password.to_string(),
            role: Role::SuperAdmin,
            first_name: None,
            last_name: None,
            phone: None,
        })
        .await?;
        Ok(true)
    }
}
