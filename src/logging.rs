//! Injected logging capability
//!
//! The lifecycle manager reports through a [`Logger`] handed to it rather than
//! calling `tracing` directly, so hosts can route lifecycle events wherever
//! they like. [`TracingLogger`] is the default and forwards to `tracing`.

use std::error::Error;
use std::fmt::Debug;
use tracing::{debug, error, info};

/// Severity-based logging sink used by the lifecycle manager
pub trait Logger: Send + Sync + 'static {
    /// Diagnostic detail with attached data
    fn debug(&self, message: &str, data: &dyn Debug);

    /// Lifecycle milestone
    fn info(&self, message: &str);

    /// Unrecoverable failure. The caller propagates `error` afterwards.
    fn fatal(&self, message: &str, error: &(dyn Error + 'static));
}

/// [`Logger`] backed by `tracing` events under the `dbkeeper` target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn debug(&self, message: &str, data: &dyn Debug) {
        debug!(data = ?data, "{}", message);
    }

    fn info(&self, message: &str) {
        info!("{}", message);
    }

    fn fatal(&self, message: &str, error: &(dyn Error + 'static)) {
        error!(fatal = true, error = %error, "{}", message);
    }
}
