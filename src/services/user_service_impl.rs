//! Store-backed implementation of the `UserService` trait.

use async_trait::async_trait;
use tokio::task;
use tracing::info;

use crate::db::Store;
use crate::db::repositories::user::hash_password;
use crate::models::{AuthenticationMethod, User};
use crate::services::password::PasswordStrengthChecker;
use crate::services::user_service::{CreateUserInput, UserError, UserService};

pub struct StoreUserService {
    store: Store,
}

impl StoreUserService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }
}

#[async_trait]
impl UserService for StoreUserService {
    async fn create_user(&self, input: CreateUserInput) -> Result<User, UserError> {
        let role = input.validated_role()?;

        // An absent user is the success path for this lookup; only real
        // database failures propagate.
        if self.store.user_by_username(&input.username).await?.is_some() {
            return Err(UserError::AlreadyExists);
        }

        let settings = self.store.settings().await?;

        // External providers own credentials; a password here is a policy
        // violation, not something to silently drop.
        if settings.authentication_method.is_external() && !input.password.is_empty() {
            return Err(UserError::ExternalAuthPassword);
        }

        let password_hash = if settings.authentication_method == AuthenticationMethod::Internal {
            if !PasswordStrengthChecker::check(&input.password, &settings) {
                return Err(UserError::WeakPassword);
            }

            let password = input.password.clone();
            task::spawn_blocking(move || hash_password(&password))
                .await
                .map_err(|_| UserError::HashFailure)?
                .map_err(|_| UserError::HashFailure)?
        } else {
            String::new()
        };

        let user = self
            .store
            .create_user(&input.username, &password_hash, role)
            .await?;

        info!(username = %user.username, role = ?user.role, "User created");

        Ok(user)
    }
}
