use sea_orm::entity::prelude::*;

/// Single-row table; seeded by the initial migration.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "settings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// "internal", "ldap" or "oauth".
    pub authentication_method: String,

    pub required_password_length: i32,

    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
