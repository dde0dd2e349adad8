use crate::entities::prelude::*;
use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::Schema;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Hash the bootstrap admin password with Argon2id.
fn hash_default_password() -> String {
    use argon2::{
        Argon2,
        password_hash::{PasswordHasher, SaltString, rand_core::OsRng},
    };

    let password = b"password";
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password, &salt)
        .expect("Failed to hash default password")
        .to_string()
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        let schema = Schema::new(backend);

        manager
            .create_table(
                schema
                    .create_table_from_entity(Stacks)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(Users)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(Settings)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(Registries)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        let now = chrono::Utc::now().to_rfc3339();

        // Seed the bootstrap administrator.
        let insert_admin = sea_orm_migration::sea_query::Query::insert()
            .into_table(Users)
            .columns([
                crate::entities::users::Column::Username,
                crate::entities::users::Column::PasswordHash,
                crate::entities::users::Column::Role,
                crate::entities::users::Column::CreatedAt,
                crate::entities::users::Column::UpdatedAt,
            ])
            .values_panic([
                "admin".into(),
                hash_default_password().into(),
                crate::constants::roles::ADMINISTRATOR.into(),
                now.clone().into(),
                now.clone().into(),
            ])
            .to_owned();

        manager.exec_stmt(insert_admin).await?;

        // Seed the settings row consulted by the user-creation policy.
        let insert_settings = sea_orm_migration::sea_query::Query::insert()
            .into_table(Settings)
            .columns([
                crate::entities::settings::Column::AuthenticationMethod,
                crate::entities::settings::Column::RequiredPasswordLength,
                crate::entities::settings::Column::UpdatedAt,
            ])
            .values_panic(["internal".into(), 12.into(), now.into()])
            .to_owned();

        manager.exec_stmt(insert_settings).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Registries).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Settings).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Stacks).to_owned())
            .await?;

        Ok(())
    }
}
