use anyhow::{Context, Result};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use uuid::Uuid;

use crate::entities::stacks;
use crate::models::{AutoUpdateSettings, GitAuthentication, GitConfig, Stack, StackSource};

pub struct StackRepository {
    conn: DatabaseConnection,
}

impl StackRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Absent id maps to `None`; any other database failure is an error.
    pub async fn get_by_id(&self, id: i32) -> Result<Option<Stack>> {
        let row = stacks::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query stack by id")?;

        Ok(row.map(from_model))
    }

    pub async fn list(&self) -> Result<Vec<Stack>> {
        let rows = stacks::Entity::find()
            .all(&self.conn)
            .await
            .context("Failed to list stacks")?;

        Ok(rows.into_iter().map(from_model).collect())
    }

    /// Full-record overwrite; the store's last-writer-wins semantics are
    /// accepted for concurrent updates to the same stack.
    pub async fn update(&self, stack: &Stack) -> Result<()> {
        let existing = stacks::Entity::find_by_id(stack.id)
            .one(&self.conn)
            .await
            .context("Failed to query stack for update")?
            .ok_or_else(|| anyhow::anyhow!("Stack {} not found", stack.id))?;

        let mut active: stacks::ActiveModel = existing.into();
        apply_domain(&mut active, stack);
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());
        active.update(&self.conn).await?;

        Ok(())
    }

    pub async fn create(&self, stack: &Stack) -> Result<Stack> {
        let now = chrono::Utc::now().to_rfc3339();

        let mut active = stacks::ActiveModel {
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };
        apply_domain(&mut active, stack);

        let inserted = active
            .insert(&self.conn)
            .await
            .context("Failed to insert stack")?;

        Ok(from_model(inserted))
    }
}

fn apply_domain(active: &mut stacks::ActiveModel, stack: &Stack) {
    active.name = Set(stack.name.clone());
    active.entry_point = Set(stack.entry_point.clone());
    active.namespace = Set(stack.namespace.clone());
    active.endpoint_id = Set(stack.endpoint_id);
    active.project_path = Set(stack.project_path.clone());
    active.created_by = Set(stack.created_by.clone());

    match &stack.source {
        StackSource::File => {
            active.git_url = Set(None);
            active.git_reference = Set(None);
            active.git_tls_skip_verify = Set(false);
            active.git_username = Set(None);
            active.git_password = Set(None);
            active.git_config_hash = Set(None);
        }
        StackSource::Git(config) => {
            active.git_url = Set(Some(config.url.clone()));
            active.git_reference = Set(Some(config.reference_name.clone()));
            active.git_tls_skip_verify = Set(config.tls_skip_verify);
            active.git_username = Set(config
                .authentication
                .as_ref()
                .map(|auth| auth.username.clone()));
            active.git_password = Set(config
                .authentication
                .as_ref()
                .map(|auth| auth.password.clone()));
            active.git_config_hash = Set(config.config_hash.clone());
        }
    }

    active.auto_update_interval = Set(stack
        .auto_update
        .as_ref()
        .map(|settings| settings.interval.clone()));
    active.auto_update_job_id = Set(stack
        .auto_update
        .as_ref()
        .and_then(|settings| settings.job_id)
        .map(|id| id.to_string()));
}

fn from_model(model: stacks::Model) -> Stack {
    let source = match model.git_url {
        Some(url) => StackSource::Git(GitConfig {
            url,
            reference_name: model.git_reference.unwrap_or_default(),
            tls_skip_verify: model.git_tls_skip_verify,
            authentication: match (model.git_username, model.git_password) {
                (Some(username), Some(password)) => {
                    Some(GitAuthentication { username, password })
                }
                _ => None,
            },
            config_hash: model.git_config_hash,
        }),
        None => StackSource::File,
    };

    let auto_update = model
        .auto_update_interval
        .map(|interval| AutoUpdateSettings {
            interval,
            job_id: model
                .auto_update_job_id
                .as_deref()
                .and_then(|raw| Uuid::parse_str(raw).ok()),
        });

    Stack {
        id: model.id,
        name: model.name,
        entry_point: model.entry_point,
        namespace: model.namespace,
        endpoint_id: model.endpoint_id,
        project_path: model.project_path,
        created_by: model.created_by,
        source,
        auto_update,
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}
