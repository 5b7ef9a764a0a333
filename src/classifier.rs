//! Failure classification for fatal logging
//!
//! Startup failures are split into two buckets so the fatal log can say
//! whether the database itself refused us or something else broke:
//!
//! - [`ErrorOrigin::Database`] when the failure's declared kind follows the
//!   driver's naming convention (its kind starts with the driver prefix)
//! - [`ErrorOrigin::Unknown`] for everything else, which in practice means an
//!   on-connect action failed with an error of its own
//!
//! This is a naming-convention heuristic, not a type check. It is only as
//! accurate as the driver is consistent, and an action that bubbles up a
//! driver error (say a failing index build) is reported as database-origin
//! even though the connection itself was fine.

use crate::driver::DriverError;
use crate::error::LifecycleError;
use std::error::Error;
use std::fmt;

/// Fatal log message for database-origin failures
pub const DATABASE_FATAL_MESSAGE: &str = "DB ERROR: cannot connect to database";

/// Fatal log message for failures of unknown origin
pub const UNKNOWN_FATAL_MESSAGE: &str =
    "ERROR: unknown error trying to connect to the database; an on-connect action probably failed";

/// Where a startup failure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorOrigin {
    /// Raised by the database driver
    Database,
    /// Raised somewhere else
    Unknown,
}

impl ErrorOrigin {
    /// Fixed fatal log message for this origin
    #[must_use]
    pub const fn fatal_message(self) -> &'static str {
        match self {
            Self::Database => DATABASE_FATAL_MESSAGE,
            Self::Unknown => UNKNOWN_FATAL_MESSAGE,
        }
    }
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Database => write!(f, "database origin"),
            Self::Unknown => write!(f, "unknown origin"),
        }
    }
}

/// Prefix predicate over declared error kinds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorClassifier {
    prefix: String,
}

impl ErrorClassifier {
    /// Classify kinds starting with `prefix` as database-origin
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// The configured driver prefix
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Classify a declared error kind.
    ///
    /// An empty prefix would match every kind, so it classifies nothing as
    /// database-origin instead.
    #[must_use]
    pub fn classify_kind(&self, kind: &str) -> ErrorOrigin {
        if !self.prefix.is_empty() && kind.starts_with(&self.prefix) {
            ErrorOrigin::Database
        } else {
            ErrorOrigin::Unknown
        }
    }

    /// Classify an arbitrary error by the first [`DriverError`] in its source
    /// chain. Only a driver error declares a kind; anything else is of
    /// unknown origin.
    #[must_use]
    pub fn classify_error(&self, err: &(dyn Error + 'static)) -> ErrorOrigin {
        std::iter::successors(Some(err), |&cause| cause.source())
            .find_map(|cause| cause.downcast_ref::<DriverError>())
            .map_or(ErrorOrigin::Unknown, |driver_err| {
                self.classify_kind(driver_err.kind())
            })
    }

    /// Classify a lifecycle failure by the kind of the driver error behind it.
    /// Failures with no driver error are of unknown origin.
    #[must_use]
    pub fn classify(&self, err: &LifecycleError) -> ErrorOrigin {
        err.driver_error()
            .map_or(ErrorOrigin::Unknown, |driver_err| {
                self.classify_kind(driver_err.kind())
            })
    }
}
