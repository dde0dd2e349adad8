//! Command-line surface. The daemon is the main mode; the rest are small
//! one-shot maintenance commands.

use clap::{Parser, Subcommand};

/// Stackarr - Kubernetes stack manager
#[derive(Parser)]
#[command(name = "stackarr")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the API server and autoupdate scheduler
    #[command(alias = "-d", alias = "--daemon")]
    Serve,

    /// Create a default config file
    Init,

    /// Validate the configuration file and exit
    CheckConfig,

    /// Create a user without going through the API
    UserAdd {
        username: String,

        password: String,

        /// Grant the administrator role instead of the regular one
        #[arg(long)]
        admin: bool,
    },
}
