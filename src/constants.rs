pub const MANIFEST_EXTENSIONS: &[&str] = &["yaml", "yml"];

/// Suffix appended to the durable manifest while an update window is open.
pub const BACKUP_SUFFIX: &str = ".bak";

pub mod labels {

    pub const STACK_ID: &str = "io.stackarr.stack.id";

    pub const STACK_NAME: &str = "io.stackarr.stack.name";

    pub const OWNER: &str = "io.stackarr.stack.owner";

    pub const KIND: &str = "io.stackarr.stack.kind";
}

pub mod roles {

    pub const ADMINISTRATOR: i32 = 1;

    pub const REGULAR: i32 = 2;
}

pub mod limits {

    /// Hard cap on a posted manifest body, in bytes.
    pub const MAX_MANIFEST_BYTES: usize = 1024 * 1024;
}
