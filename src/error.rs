use crate::classifier::ErrorOrigin;
use crate::driver::DriverError;
use crate::manager::LifecycleState;
use std::fmt;
use thiserror::Error;

/// Error produced by an on-connect action.
///
/// Kept as an `anyhow::Error` so the error the action returned, and any
/// [`DriverError`] in its chain, can still be downcast.
pub type ActionError = anyhow::Error;

/// Stage of the startup sequence a failure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePhase {
    /// The driver's connect call
    Connect,
    /// An on-connect action run after the connection became ready
    OnConnectAction,
}

impl fmt::Display for FailurePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => write!(f, "connect"),
            Self::OnConnectAction => write!(f, "on-connect action"),
        }
    }
}

/// Errors raised by the connection lifecycle
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The driver could not establish the connection
    #[error("failed to connect to database ({origin}): {source}")]
    Connect {
        /// Classification of the failure
        origin: ErrorOrigin,
        /// Driver error
        source: DriverError,
    },

    /// An on-connect action failed after the connection was established
    #[error("on-connect action #{index} failed ({origin}): {source}")]
    Action {
        /// Zero-based position of the action in the queue
        index: usize,
        /// Classification of the failure
        origin: ErrorOrigin,
        /// Whatever the action returned or panicked with
        source: ActionError,
    },

    /// The driver failed to close the connection
    #[error("failed to disconnect from database: {0}")]
    Disconnect(#[source] DriverError),

    /// Operation not permitted in the current state
    #[error("cannot {operation} while connection is {state}")]
    InvalidState {
        /// Rejected operation
        operation: &'static str,
        /// State at the time of the call
        state: LifecycleState,
    },

    /// A disconnect is already running
    #[error("disconnect already in progress")]
    DisconnectInProgress,

    /// The connect task ended without reporting an outcome
    #[error("connect task aborted: {0}")]
    TaskAborted(String),
}

impl LifecycleError {
    /// Startup phase for connect and action failures
    #[must_use]
    pub const fn phase(&self) -> Option<FailurePhase> {
        match self {
            Self::Connect { .. } => Some(FailurePhase::Connect),
            Self::Action { .. } => Some(FailurePhase::OnConnectAction),
            _ => None,
        }
    }

    /// Classification recorded when the failure was logged
    #[must_use]
    pub const fn origin(&self) -> Option<ErrorOrigin> {
        match self {
            Self::Connect { origin, .. } | Self::Action { origin, .. } => Some(*origin),
            _ => None,
        }
    }

    /// The driver error behind this failure, if there is one.
    ///
    /// Action failures count when the action itself surfaced a
    /// [`DriverError`], for instance from a query it ran.
    #[must_use]
    pub fn driver_error(&self) -> Option<&DriverError> {
        match self {
            Self::Connect { source, .. } | Self::Disconnect(source) => Some(source),
            Self::Action { source, .. } => source
                .chain()
                .find_map(|cause| cause.downcast_ref::<DriverError>()),
            _ => None,
        }
    }
}

/// Result type alias for lifecycle operations
pub type Result<T> = std::result::Result<T, LifecycleError>;
