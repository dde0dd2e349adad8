pub mod autoupdate;
pub use autoupdate::{AutoupdateContext, resume_autoupdates, start_autoupdate, stop_autoupdate};

pub mod deploy;
pub use deploy::{DeployError, KubeAppLabels, KubeDeployer, KubectlDeployer};

pub mod password;
pub use password::PasswordStrengthChecker;

pub mod registry;
pub use registry::RegistrySecretRefresher;

pub mod stack_update;
pub use stack_update::{
    FileStackUpdate, GitStackUpdate, StackUpdateError, StackUpdatePayload, StackUpdateService,
};

pub mod user_service;
pub use user_service::{CreateUserInput, UserError, UserService};

pub mod user_service_impl;
pub use user_service_impl::StoreUserService;
