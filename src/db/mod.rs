use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod migrator;
pub mod repositories;

pub use repositories::registry::Registry;

use crate::models::{Role, Settings, Stack, User};

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn stack_repo(&self) -> repositories::stack::StackRepository {
        repositories::stack::StackRepository::new(self.conn.clone())
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    fn settings_repo(&self) -> repositories::settings::SettingsRepository {
        repositories::settings::SettingsRepository::new(self.conn.clone())
    }

    fn registry_repo(&self) -> repositories::registry::RegistryRepository {
        repositories::registry::RegistryRepository::new(self.conn.clone())
    }

    // Stacks

    pub async fn stack_by_id(&self, id: i32) -> Result<Option<Stack>> {
        self.stack_repo().get_by_id(id).await
    }

    pub async fn list_stacks(&self) -> Result<Vec<Stack>> {
        self.stack_repo().list().await
    }

    pub async fn update_stack(&self, stack: &Stack) -> Result<()> {
        self.stack_repo().update(stack).await
    }

    pub async fn create_stack(&self, stack: &Stack) -> Result<Stack> {
        self.stack_repo().create(stack).await
    }

    // Users

    pub async fn user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.user_repo().get_by_username(username).await
    }

    pub async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<User> {
        self.user_repo().create(username, password_hash, role).await
    }

    pub async fn verify_user_password(&self, username: &str, password: &str) -> Result<bool> {
        self.user_repo().verify_password(username, password).await
    }

    // Settings

    pub async fn settings(&self) -> Result<Settings> {
        self.settings_repo().get().await
    }

    pub async fn update_settings(&self, settings: &Settings) -> Result<()> {
        self.settings_repo().update(settings).await
    }

    // Registries

    pub async fn registries_for_namespace(&self, namespace: &str) -> Result<Vec<Registry>> {
        self.registry_repo().list_for_namespace(namespace).await
    }
}
