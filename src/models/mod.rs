pub mod stack;
pub mod user;

pub use stack::{AutoUpdateSettings, GitAuthentication, GitConfig, Stack, StackSource};
pub use user::{AuthenticationMethod, Role, Settings, User};
