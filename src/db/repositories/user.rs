use anyhow::{Context, Result};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use tokio::task;

use crate::entities::users;
use crate::models::{Role, User};

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            role: Role::from_code(model.role).unwrap_or(Role::Regular),
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Absent username maps to `None`; any other database failure is an
    /// error. Callers on the create path treat `None` as the success case.
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user by username")?;

        Ok(user.map(User::from))
    }

    /// Persist a user. `password_hash` is empty for externally-authenticated
    /// accounts.
    pub async fn create(&self, username: &str, password_hash: &str, role: Role) -> Result<User> {
        let now = chrono::Utc::now().to_rfc3339();

        let active = users::ActiveModel {
            username: Set(username.to_string()),
            password_hash: Set(password_hash.to_string()),
            role: Set(role.code()),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        let inserted = active
            .insert(&self.conn)
            .await
            .context("Failed to insert user")?;

        Ok(User::from(inserted))
    }

    /// Verify a login attempt. Argon2 runs in `spawn_blocking` because it is
    /// CPU-intensive and would stall the async runtime.
    pub async fn verify_password(&self, username: &str, password: &str) -> Result<bool> {
        let user = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user for password verification")?;

        let Some(user) = user else {
            return Ok(false);
        };

        if user.password_hash.is_empty() {
            // Externally-authenticated account; no local credential.
            return Ok(false);
        }

        let password_hash = user.password_hash;
        let password = password.to_string();

        let is_valid = task::spawn_blocking(move || {
            let parsed_hash = PasswordHash::new(&password_hash)
                .map_err(|e| anyhow::anyhow!("Invalid password hash format: {e}"))?;

            let argon2 = Argon2::default();
            Ok::<bool, anyhow::Error>(
                argon2
                    .verify_password(password.as_bytes(), &parsed_hash)
                    .is_ok(),
            )
        })
        .await
        .context("Password verification task panicked")??;

        Ok(is_valid)
    }
}

/// One-way hash with a random per-password salt.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;

    Ok(hash.to_string())
}
