use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{UserId, ValidationError, trimmed};

/// Access level of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Employee,
    Manager,
    SuperAdmin,
}

impl Role {
    fn rank(self) -> u8 {
        match self {
            Role::Employee => 0,
            Role::Manager => 1,
            Role::SuperAdmin => 2,
        }
    }

    /// True when this role carries at least the privileges of `required`.
    pub fn satisfies(self, required: Role) -> bool {
        self.rank() >= required.rank()
    }

    pub fn is_manager(self) -> bool {
        self.satisfies(Role::Manager)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Employee => "employee",
            Role::Manager => "manager",
            Role::SuperAdmin => "super_admin",
        }
    }
}

/// Stored account, including the bcrypt hash. Never serialized to clients;
/// see [`UserProfile`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Public view of a [`User`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            phone: user.phone.clone(),
            role: user.role,
        }
    }
}

/// Payload for `POST /users`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub role: Role,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
}

impl NewUser {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let username = self.username.trim();
        if username.len() < 3 || username.len() > 64 {
            return Err(ValidationError::new(
                "username must be between 3 and 64 characters",
            ));
        }
        if !username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        {
            return Err(ValidationError::new(
                "username may only contain letters, digits, '_', '-' and '.'",
            ));
        }
        if self.password.len() < 8 {
            return Err(ValidationError::new(
                "password must be at least 8 characters",
            ));
        }
        Ok(())
    }

    pub fn into_user(self, password_hash: String, now: DateTime<Utc>) -> User {
        User {
            id: UserId::generate(),
            username: self.username.trim().to_string(),
            first_name: trimmed(self.first_name),
            last_name: trimmed(self.last_name),
            phone: trimmed(self.phone),
            role: self.role,
            password_hash,
            created_at: now,
        }
    }
}
