use anyhow::{Context, Result};
use sea_orm::{DatabaseConnection, EntityTrait};

use crate::entities::registries;

/// Registry credentials used when refreshing image-pull secrets.
#[derive(Debug, Clone)]
pub struct Registry {
    pub id: i32,
    pub name: String,
    pub server_url: String,
    pub username: String,
    pub password: String,
    pub kind: String,
    namespaces: Vec<String>,
}

impl Registry {
    /// An empty namespace list attaches the registry everywhere.
    #[must_use]
    pub fn applies_to(&self, namespace: &str) -> bool {
        self.namespaces.is_empty() || self.namespaces.iter().any(|ns| ns == namespace)
    }

    /// Secret name derived from the registry name, normalized for Kubernetes.
    #[must_use]
    pub fn secret_name(&self) -> String {
        let slug: String = self
            .name
            .to_lowercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect();
        format!("stackarr-registry-{}", slug.trim_matches('-'))
    }
}

impl From<registries::Model> for Registry {
    fn from(model: registries::Model) -> Self {
        let namespaces = model
            .namespaces
            .split(',')
            .map(str::trim)
            .filter(|ns| !ns.is_empty())
            .map(str::to_string)
            .collect();

        Self {
            id: model.id,
            name: model.name,
            server_url: model.server_url,
            username: model.username,
            password: model.password,
            kind: model.kind,
            namespaces,
        }
    }
}

pub struct RegistryRepository {
    conn: DatabaseConnection,
}

impl RegistryRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn list_for_namespace(&self, namespace: &str) -> Result<Vec<Registry>> {
        let rows = registries::Entity::find()
            .all(&self.conn)
            .await
            .context("Failed to list registries")?;

        Ok(rows
            .into_iter()
            .map(Registry::from)
            .filter(|registry| registry.applies_to(namespace))
            .collect())
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(namespaces: &str) -> Registry {
        Registry::from(registries::Model {
            id: 1,
            name: "Team ECR".to_string(),
            server_url: "123456789.dkr.ecr.eu-west-1.amazonaws.com".to_string(),
            username: "AWS".to_string(),
            password: "token".to_string(),
            kind: "ecr".to_string(),
            namespaces: namespaces.to_string(),
            created_at: String::new(),
        })
    }

    #[test]
    fn namespace_attachment() {
        assert!(registry("").applies_to("default"));
        assert!(registry("default, staging").applies_to("staging"));
        assert!(!registry("default").applies_to("prod"));
    }

    #[test]
    fn secret_name_is_normalized() {
        assert_eq!(registry("").secret_name(), "stackarr-registry-team-ecr");
    }
}
