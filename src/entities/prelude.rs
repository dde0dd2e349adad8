pub use super::registries::Entity as Registries;
pub use super::settings::Entity as Settings;
pub use super::stacks::Entity as Stacks;
pub use super::users::Entity as Users;
