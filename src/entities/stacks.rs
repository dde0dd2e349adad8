use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "stacks")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub name: String,

    /// Relative path of the manifest within the project directory.
    pub entry_point: String,

    pub namespace: String,

    pub endpoint_id: i32,

    pub project_path: String,

    pub created_by: String,

    /// NULL for file-managed stacks; the remaining git_* columns are only
    /// meaningful when this is set.
    pub git_url: Option<String>,

    pub git_reference: Option<String>,

    pub git_tls_skip_verify: bool,

    pub git_username: Option<String>,

    pub git_password: Option<String>,

    /// Commit SHA of the last successful git deploy.
    pub git_config_hash: Option<String>,

    pub auto_update_interval: Option<String>,

    /// Scheduler job id while an autoupdate entry is live.
    pub auto_update_job_id: Option<String>,

    pub created_at: String,

    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
