use sea_orm::entity::prelude::*;

/// Private image registries whose pull secrets are refreshed before deploys.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "registries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub name: String,

    pub server_url: String,

    pub username: String,

    pub password: String,

    /// "ecr" or "custom".
    pub kind: String,

    /// Namespaces this registry is attached to, comma-separated. Empty means
    /// every namespace.
    pub namespaces: String,

    pub created_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
