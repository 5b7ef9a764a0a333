//! `PostgreSQL` driver built on `tokio-postgres`
//!
//! Every error this driver raises carries a kind starting with
//! [`ERROR_PREFIX`], so the default classifier recognises it as
//! database-origin.
//!
//! Recognised connection options:
//!
//! | key                    | type    | effect                              |
//! |------------------------|---------|-------------------------------------|
//! | `application_name`     | string  | reported in `pg_stat_activity`      |
//! | `connect_timeout_secs` | integer | TCP connect timeout                 |
//! | `keepalives`           | bool    | TCP keepalives on the socket        |
//!
//! Other keys are ignored with a warning.
//!
//! Queries made from on-connect actions fail with a plain
//! `tokio_postgres::Error`, which carries no kind. Pass it through
//! [`tag_error`] so a failing statement is reported as database-origin:
//!
//! ```rust,no_run
//! use dbkeeper::postgres::tag_error;
//! use dbkeeper::{ConnectionConfig, Dependencies, PostgresDriver};
//!
//! let config = ConnectionConfig::new("postgresql://app@localhost/app");
//! let deps = Dependencies::new(config, PostgresDriver::new()).on_connect(|deps| async move {
//!     deps.handle
//!         .client()
//!         .batch_execute("CREATE INDEX IF NOT EXISTS jobs_state ON jobs (state)")
//!         .await
//!         .map_err(tag_error)?;
//!     anyhow::Ok(())
//! });
//! ```
//!
//! Disconnecting aborts the background connection task instead of waiting
//! for the server to acknowledge, so any query still in flight is cut off
//! and fails with a closed-connection error.

use crate::config::ConnectOptions;
use crate::driver::{ConnectionHandle, Driver, DriverError};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_postgres::{Client, Config, NoTls};
use tracing::{debug, error, info, warn};

/// Prefix shared by every error kind this driver raises
pub const ERROR_PREFIX: &str = "Pgsql";

/// The server answered with an error (SQLSTATE in the message)
pub const KIND_DB: &str = "PgsqlDbError";
/// The connection was already closed
pub const KIND_CLOSED: &str = "PgsqlClosedError";
/// The URI or an option could not be understood
pub const KIND_CONFIG: &str = "PgsqlConfigError";
/// Any other driver failure (I/O, TLS, protocol)
pub const KIND_OTHER: &str = "PgsqlError";

/// Connects to `PostgreSQL` without TLS
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDriver;

impl PostgresDriver {
    /// Create the driver
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

/// A live `PostgreSQL` session
pub struct PostgresConnection {
    client: Client,
    connection_task: Mutex<Option<JoinHandle<()>>>,
}

impl PostgresConnection {
    /// Client for issuing queries
    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }
}

impl std::fmt::Debug for PostgresConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresConnection")
            .field("closed", &self.client.is_closed())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Driver for PostgresDriver {
    type Handle = PostgresConnection;

    async fn connect(
        &self,
        uri: &str,
        options: &ConnectOptions,
    ) -> Result<Self::Handle, DriverError> {
        let mut config: Config = uri.parse().map_err(|e: tokio_postgres::Error| {
            DriverError::new(KIND_CONFIG, format!("invalid connection string: {e}"))
                .with_source(e)
        })?;
        apply_options(&mut config, options)?;

        debug!("Opening PostgreSQL connection");
        let (client, connection) = config.connect(NoTls).await.map_err(tag_error)?;

        let connection_task = tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("PostgreSQL connection terminated: {}", e);
            }
        });

        info!("PostgreSQL connection opened");
        Ok(PostgresConnection {
            client,
            connection_task: Mutex::new(Some(connection_task)),
        })
    }

    fn error_prefix(&self) -> &str {
        ERROR_PREFIX
    }
}

#[async_trait]
impl ConnectionHandle for PostgresConnection {
    async fn disconnect(&self) -> Result<(), DriverError> {
        let task = self
            .connection_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let Some(task) = task else {
            return Err(DriverError::new(KIND_CLOSED, "connection already closed"));
        };

        task.abort();
        match task.await {
            Ok(()) => Ok(()),
            Err(e) if e.is_cancelled() => Ok(()),
            Err(e) => Err(DriverError::new(
                KIND_OTHER,
                format!("connection task failed: {e}"),
            )),
        }
    }
}

/// Tag a `tokio-postgres` error with this driver's kind convention
#[must_use]
pub fn tag_error(err: tokio_postgres::Error) -> DriverError {
    let (kind, message) = if let Some(db) = err.as_db_error() {
        (
            KIND_DB,
            format!("{} (SQLSTATE {})", db.message(), db.code().code()),
        )
    } else if err.is_closed() {
        (KIND_CLOSED, err.to_string())
    } else {
        (KIND_OTHER, err.to_string())
    };
    DriverError::new(kind, message).with_source(err)
}

fn apply_options(config: &mut Config, options: &ConnectOptions) -> Result<(), DriverError> {
    for (key, value) in options.iter() {
        match key.as_str() {
            "application_name" => {
                let name = value
                    .as_str()
                    .ok_or_else(|| invalid_option(key, "a string", value))?;
                config.application_name(name);
            }
            "connect_timeout_secs" => {
                let secs = value
                    .as_u64()
                    .ok_or_else(|| invalid_option(key, "a non-negative integer", value))?;
                config.connect_timeout(Duration::from_secs(secs));
            }
            "keepalives" => {
                let enabled = value
                    .as_bool()
                    .ok_or_else(|| invalid_option(key, "a boolean", value))?;
                config.keepalives(enabled);
            }
            _ => warn!("Ignoring unknown PostgreSQL option: {}", key),
        }
    }
    Ok(())
}

fn invalid_option(key: &str, expected: &str, value: &Value) -> DriverError {
    DriverError::new(
        KIND_CONFIG,
        format!("option {key} must be {expected}, got {value}"),
    )
}
