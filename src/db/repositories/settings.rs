use anyhow::{Context, Result};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};

use crate::entities::settings;
use crate::models::{AuthenticationMethod, Settings};

pub struct SettingsRepository {
    conn: DatabaseConnection,
}

impl SettingsRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// The settings row is seeded by the initial migration; a missing row is
    /// a corrupted database, not a normal condition.
    pub async fn get(&self) -> Result<Settings> {
        let row = settings::Entity::find()
            .one(&self.conn)
            .await
            .context("Failed to query settings")?
            .ok_or_else(|| anyhow::anyhow!("Settings row missing"))?;

        let method = AuthenticationMethod::parse(&row.authentication_method).ok_or_else(|| {
            anyhow::anyhow!("Unknown authentication method: {}", row.authentication_method)
        })?;

        Ok(Settings {
            authentication_method: method,
            required_password_length: u32::try_from(row.required_password_length.max(0))
                .unwrap_or(12),
        })
    }

    pub async fn update(&self, updated: &Settings) -> Result<()> {
        let row = settings::Entity::find()
            .one(&self.conn)
            .await
            .context("Failed to query settings for update")?
            .ok_or_else(|| anyhow::anyhow!("Settings row missing"))?;

        let mut active: settings::ActiveModel = row.into();
        active.authentication_method = Set(updated.authentication_method.as_str().to_string());
        active.required_password_length =
            Set(i32::try_from(updated.required_password_length).unwrap_or(i32::MAX));
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());
        active.update(&self.conn).await?;

        Ok(())
    }
}
