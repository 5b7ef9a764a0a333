//! Driver boundary
//!
//! The lifecycle manager never talks to a database directly. It is handed a
//! [`Driver`] capability at construction and only ever sees the driver's
//! opaque [`ConnectionHandle`] and its kind-tagged [`DriverError`].

use crate::config::ConnectOptions;
use async_trait::async_trait;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// An error raised by a driver, tagged with the driver's own kind name.
///
/// Drivers follow a naming convention for their error kinds (for instance
/// every kind starting with `"Mongo"` or `"Pgsql"`), which is what
/// [`ErrorClassifier`](crate::classifier::ErrorClassifier) keys on.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct DriverError {
    kind: String,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl DriverError {
    /// Create an error with the given kind and message
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Attach the underlying cause
    #[must_use]
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// The declared kind, e.g. `"MongoNetworkError"`
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Human-readable detail
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A live connection owned by the driver
#[async_trait]
pub trait ConnectionHandle: Send + Sync + 'static {
    /// Close the connection. Completion is entirely up to the driver.
    async fn disconnect(&self) -> Result<(), DriverError>;
}

/// Capability to open connections
#[async_trait]
pub trait Driver: Send + Sync + 'static {
    /// Handle type produced by a successful connect
    type Handle: ConnectionHandle;

    /// Open a connection. `options` are forwarded from the configuration
    /// unmodified.
    async fn connect(&self, uri: &str, options: &ConnectOptions)
        -> Result<Self::Handle, DriverError>;

    /// Prefix this driver puts on every error kind it raises
    fn error_prefix(&self) -> &str;
}
