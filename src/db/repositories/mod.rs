pub mod registry;
pub mod settings;
pub mod stack;
pub mod user;
