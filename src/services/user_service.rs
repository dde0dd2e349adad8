//! Domain service for policy-gated user creation.

use serde::Deserialize;
use thiserror::Error;

use crate::models::{Role, User};

#[derive(Debug, Error)]
pub enum UserError {
    #[error("Another user with the same username already exists")]
    AlreadyExists,

    #[error("A user with password can not be created when authentication method is OAuth or LDAP")]
    ExternalAuthPassword,

    #[error("Password does not meet the requirements")]
    WeakPassword,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unable to hash user password")]
    HashFailure,

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserInput {
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// 1 for administrator, 2 for regular.
    pub role: i32,
}

impl CreateUserInput {
    pub fn validated_role(&self) -> Result<Role, UserError> {
        Role::from_code(self.role).ok_or_else(|| {
            UserError::Validation(
                "Invalid role value. Value must be one of: 1 (administrator) or 2 (regular user)"
                    .to_string(),
            )
        })
    }
}

/// Creates identity records under the instance's authentication policy.
#[async_trait::async_trait]
pub trait UserService: Send + Sync {
    /// Create a user.
    ///
    /// # Errors
    ///
    /// [`UserError::AlreadyExists`] for duplicate usernames,
    /// [`UserError::ExternalAuthPassword`] when a password is supplied while
    /// ldap/oauth owns credentials, [`UserError::WeakPassword`] when the
    /// strength check fails.
    async fn create_user(&self, input: CreateUserInput) -> Result<User, UserError>;
}
