use serde::Serialize;

use crate::models::{Stack, StackSource, User};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Stack representation with secret fields elided: the git password never
/// leaves the server.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StackDto {
    pub id: i32,
    pub name: String,
    pub entry_point: String,
    pub namespace: String,
    pub endpoint_id: i32,
    pub project_path: String,
    pub created_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_config: Option<GitConfigDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_update: Option<AutoUpdateDto>,
    pub updated_at: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GitConfigDto {
    pub url: String,
    pub reference_name: String,
    pub tls_skip_verify: bool,
    pub authentication_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_hash: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoUpdateDto {
    pub interval: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
}

impl From<&Stack> for StackDto {
    fn from(stack: &Stack) -> Self {
        let git_config = match &stack.source {
            StackSource::File => None,
            StackSource::Git(config) => Some(GitConfigDto {
                url: config.url.clone(),
                reference_name: config.reference_name.clone(),
                tls_skip_verify: config.tls_skip_verify,
                authentication_enabled: config.authentication.is_some(),
                username: config
                    .authentication
                    .as_ref()
                    .map(|auth| auth.username.clone()),
                config_hash: config.config_hash.clone(),
            }),
        };

        Self {
            id: stack.id,
            name: stack.name.clone(),
            entry_point: stack.entry_point.clone(),
            namespace: stack.namespace.clone(),
            endpoint_id: stack.endpoint_id,
            project_path: stack.project_path.clone(),
            created_by: stack.created_by.clone(),
            git_config,
            auto_update: stack.auto_update.as_ref().map(|settings| AutoUpdateDto {
                interval: settings.interval.clone(),
                job_id: settings.job_id.map(|id| id.to_string()),
            }),
            updated_at: stack.updated_at.clone(),
        }
    }
}

/// User representation with secret fields elided.
#[derive(Debug, Serialize)]
pub struct UserDto {
    pub id: i32,
    pub username: String,
    pub role: i32,
    pub created_at: String,
}

impl From<&User> for UserDto {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            role: user.role.code(),
            created_at: user.created_at.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub database_ok: bool,
    pub stacks: usize,
}
