pub mod prelude;

pub mod registries;
pub mod settings;
pub mod stacks;
pub mod users;
