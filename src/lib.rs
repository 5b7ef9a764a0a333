//! `dbkeeper` - lifecycle management for a single database connection
//!
//! Connects asynchronously, replays on-connect actions once the connection is
//! live, hands out the connection handle, and fails fast with a classified
//! fatal log when startup goes wrong.

#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    missing_docs,
    rust_2018_idioms
)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

/// On-connect action queue
pub mod actions;
/// Failure classification
pub mod classifier;
/// Command line interface for the `dbkeeper` binary
pub mod cli;
/// Configuration management
pub mod config;
pub mod driver;
/// Error types
pub mod error;
pub mod logging;
/// Connection lifecycle management
pub mod manager;
pub mod postgres;

pub use actions::{ActionQueue, DependencyBundle};
pub use classifier::{ErrorClassifier, ErrorOrigin};
pub use config::{Config, ConnectOptions, ConnectionConfig};
pub use driver::{ConnectionHandle, Driver, DriverError};
pub use error::{FailurePhase, LifecycleError};
pub use logging::{Logger, TracingLogger};
pub use manager::{ConnectTask, ConnectionManager, Dependencies, LifecycleState};
pub use postgres::{PostgresConnection, PostgresDriver};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, env!("CARGO_PKG_VERSION"));
    }
}
