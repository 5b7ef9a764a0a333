use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Main CLI interface for `dbkeeper`
#[derive(Parser)]
#[command(name = "dbkeeper")]
#[command(version = crate::VERSION)]
#[command(about = "dbkeeper - database connection lifecycle manager")]
#[command(
    long_about = "Connects to the configured database, runs on-connect checks and disconnects cleanly"
)]
pub struct Cli {
    /// Configuration file
    #[arg(long, short, value_name = "FILE", default_value = "dbkeeper.toml")]
    pub config: PathBuf,

    /// The command to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Connect, query the server version, then disconnect
    Check {
        /// Connect to this URI instead of the configured one
        #[arg(long, value_name = "URI")]
        uri: Option<String>,
    },
    /// Print the resolved configuration with credentials masked
    ShowConfig,
}

impl Cli {
    /// Parse command line arguments
    #[must_use]
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}
