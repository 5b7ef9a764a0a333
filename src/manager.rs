//! # Connection Lifecycle Manager
//!
//! Turns a [`ConnectionConfig`] into a managed, shareable connection handle.
//! Construction returns immediately; the connect runs on a spawned tokio task
//! and its outcome is reported through the returned [`ConnectTask`].
//!
//! ```text
//! Connecting ──ok──▶ Ready ──disconnect──▶ Closed
//!     │
//!     └──err──▶ Failed
//! ```
//!
//! Once the connection is ready, every registered on-connect action runs
//! exactly once, in order. Any startup failure is classified, logged once at
//! fatal level and then propagated. Nothing is retried.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use dbkeeper::postgres::tag_error;
//! use dbkeeper::{ConnectionConfig, ConnectionManager, Dependencies, PostgresDriver};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConnectionConfig::new("postgresql://app@localhost:5432/app");
//! let deps = Dependencies::new(config, PostgresDriver::new()).on_connect(|deps| async move {
//!     deps.handle
//!         .client()
//!         .batch_execute("CREATE TABLE IF NOT EXISTS jobs (id INT)")
//!         .await
//!         .map_err(tag_error)?;
//!     anyhow::Ok(())
//! });
//!
//! let (manager, connected) = ConnectionManager::start(deps);
//! connected.await?;
//! assert!(manager.get_handle().is_some());
//! manager.disconnect().await?;
//! # Ok(())
//! # }
//! ```

use crate::actions::{ActionQueue, DependencyBundle};
use crate::classifier::ErrorClassifier;
use crate::config::ConnectionConfig;
use crate::driver::{ConnectionHandle, Driver};
use crate::error::{LifecycleError, Result};
use crate::logging::{Logger, TracingLogger};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::task::{Context, Poll};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Lifecycle state of a managed connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// Connect issued, outcome pending
    Connecting,
    /// Connected; the handle is available
    Ready,
    /// Connect failed. Terminal.
    Failed,
    /// Disconnected. Terminal.
    Closed,
}

impl LifecycleState {
    /// Whether no further transition can happen
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Closed)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Ready => write!(f, "ready"),
            Self::Failed => write!(f, "failed"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Everything a [`ConnectionManager`] is built from
pub struct Dependencies<D: Driver> {
    config: ConnectionConfig,
    log: Arc<dyn Logger>,
    driver: D,
    actions: ActionQueue<D::Handle>,
    classifier: Option<ErrorClassifier>,
}

impl<D: Driver> Dependencies<D> {
    /// Dependencies with the default `tracing` logger, no on-connect actions
    /// and the driver's own error prefix
    pub fn new(config: ConnectionConfig, driver: D) -> Self {
        Self {
            config,
            log: Arc::new(TracingLogger),
            driver,
            actions: ActionQueue::new(),
            classifier: None,
        }
    }

    /// Report lifecycle events through `log`
    #[must_use]
    pub fn with_logger(mut self, log: Arc<dyn Logger>) -> Self {
        self.log = log;
        self
    }

    /// Override the classifier derived from the driver's error prefix
    #[must_use]
    pub fn with_classifier(mut self, classifier: ErrorClassifier) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Register an action to run once the connection is ready.
    /// Actions run in registration order.
    #[must_use]
    pub fn on_connect<F, Fut>(mut self, action: F) -> Self
    where
        F: FnOnce(DependencyBundle<D::Handle>) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.actions.enqueue(action);
        self
    }

    /// Configuration the manager will connect with
    #[must_use]
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Number of registered on-connect actions
    #[must_use]
    pub fn pending_actions(&self) -> usize {
        self.actions.len()
    }
}

struct Slot<H> {
    state: LifecycleState,
    handle: Option<Arc<H>>,
    disconnecting: bool,
}

struct Shared<H> {
    slot: RwLock<Slot<H>>,
}

impl<H> Shared<H> {
    fn new() -> Self {
        Self {
            slot: RwLock::new(Slot {
                state: LifecycleState::Connecting,
                handle: None,
                disconnecting: false,
            }),
        }
    }

    // Transitions never run concurrently, so a poisoned lock still holds a
    // consistent slot.
    fn read(&self) -> RwLockReadGuard<'_, Slot<H>> {
        self.slot.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Slot<H>> {
        self.slot.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Marks a disconnect as in progress until it completes or its future is
/// dropped.
struct PendingDisconnect<'a, H> {
    shared: &'a Shared<H>,
}

impl<'a, H> PendingDisconnect<'a, H> {
    /// Clear the mark and keep the slot locked for the final transition
    fn finish(self) -> RwLockWriteGuard<'a, Slot<H>> {
        let shared = self.shared;
        std::mem::forget(self);
        let mut slot = shared.write();
        slot.disconnecting = false;
        slot
    }
}

impl<H> Drop for PendingDisconnect<'_, H> {
    fn drop(&mut self) {
        self.shared.write().disconnecting = false;
    }
}

/// Owner of a single database connection.
///
/// Cheap to clone; clones share the same connection and state.
pub struct ConnectionManager<D: Driver> {
    shared: Arc<Shared<D::Handle>>,
    config: Arc<ConnectionConfig>,
    log: Arc<dyn Logger>,
}

impl<D: Driver> Clone for ConnectionManager<D> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            config: Arc::clone(&self.config),
            log: Arc::clone(&self.log),
        }
    }
}

impl<D: Driver> fmt::Debug for ConnectionManager<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("uri", &self.config.redacted_uri())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl<D: Driver> ConnectionManager<D> {
    /// Log the configuration and issue the connect without waiting for it.
    ///
    /// The returned [`ConnectTask`] resolves once the connect and all
    /// on-connect actions have finished, carrying the startup failure if
    /// there was one. Must be called from within a tokio runtime.
    pub fn start(deps: Dependencies<D>) -> (Self, ConnectTask) {
        let Dependencies {
            config,
            log,
            driver,
            actions,
            classifier,
        } = deps;

        log.debug("Connecting to database, config is:", &config.redacted());

        let classifier =
            classifier.unwrap_or_else(|| ErrorClassifier::new(driver.error_prefix()));
        let manager = Self {
            shared: Arc::new(Shared::new()),
            config: Arc::new(config),
            log,
        };

        let task = tokio::spawn(establish(
            driver,
            Arc::clone(&manager.shared),
            Arc::clone(&manager.config),
            Arc::clone(&manager.log),
            actions,
            classifier,
        ));

        (manager, ConnectTask { inner: task })
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.shared.read().state
    }

    /// The live connection, or `None` unless the state is
    /// [`LifecycleState::Ready`]. Never waits.
    #[must_use]
    pub fn get_handle(&self) -> Option<Arc<D::Handle>> {
        let slot = self.shared.read();
        match slot.state {
            LifecycleState::Ready => slot.handle.clone(),
            _ => None,
        }
    }

    /// Configuration this manager connected with
    #[must_use]
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Close the connection.
    ///
    /// Only valid while [`LifecycleState::Ready`]; any other state, including
    /// an already closed connection, is rejected, as is a second call while
    /// one is still waiting on the driver. If the driver fails to close, the
    /// error is returned and the connection stays ready. Dropping the returned
    /// future before it finishes leaves the connection ready, and a later call
    /// may try again.
    pub async fn disconnect(&self) -> Result<()> {
        let handle = {
            let mut slot = self.shared.write();
            if slot.state != LifecycleState::Ready {
                return Err(LifecycleError::InvalidState {
                    operation: "disconnect",
                    state: slot.state,
                });
            }
            if slot.disconnecting {
                return Err(LifecycleError::DisconnectInProgress);
            }
            let Some(handle) = slot.handle.clone() else {
                return Err(LifecycleError::InvalidState {
                    operation: "disconnect",
                    state: slot.state,
                });
            };
            slot.disconnecting = true;
            handle
        };
        let pending = PendingDisconnect {
            shared: &self.shared,
        };

        debug!("Disconnecting from database");
        let result = handle.disconnect().await;

        let mut slot = pending.finish();
        match result {
            Ok(()) => {
                slot.state = LifecycleState::Closed;
                slot.handle = None;
                drop(slot);
                self.log.info("database connection closed");
                Ok(())
            }
            Err(err) => {
                warn!("Failed to disconnect from database: {}", err);
                Err(LifecycleError::Disconnect(err))
            }
        }
    }
}

async fn establish<D: Driver>(
    driver: D,
    shared: Arc<Shared<D::Handle>>,
    config: Arc<ConnectionConfig>,
    log: Arc<dyn Logger>,
    actions: ActionQueue<D::Handle>,
    classifier: ErrorClassifier,
) -> Result<()> {
    let connected = driver.connect(&config.uri, &config.options).await;
    let outcome = match connected {
        Ok(handle) => {
            let handle = Arc::new(handle);
            {
                let mut slot = shared.write();
                slot.state = LifecycleState::Ready;
                slot.handle = Some(Arc::clone(&handle));
            }
            log.info("database connection established");

            let bundle = DependencyBundle {
                config,
                log: Arc::clone(&log),
                handle,
            };
            match actions.drain_once(&bundle).await {
                Ok(ran) => {
                    debug!("Ran {} on-connect action(s)", ran);
                    Ok(())
                }
                Err(failure) => Err(LifecycleError::Action {
                    index: failure.index,
                    origin: classifier.classify_error(failure.source.as_ref()),
                    source: failure.source,
                }),
            }
        }
        Err(source) => {
            shared.write().state = LifecycleState::Failed;
            Err(LifecycleError::Connect {
                origin: classifier.classify_kind(source.kind()),
                source,
            })
        }
    };

    outcome.map_err(|err| {
        let origin = err.origin().unwrap_or_else(|| classifier.classify(&err));
        log.fatal(origin.fatal_message(), &err);
        err
    })
}

/// Outcome of the startup sequence: the connect plus every on-connect action.
///
/// Resolves to the same error that was logged at fatal level. Dropping it
/// detaches the task; the connect still runs to completion.
#[must_use = "startup failures are only reported through the connect task"]
pub struct ConnectTask {
    inner: JoinHandle<Result<()>>,
}

impl ConnectTask {
    /// Whether the startup sequence has finished
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }
}

impl fmt::Debug for ConnectTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectTask")
            .field("finished", &self.is_finished())
            .finish()
    }
}

impl Future for ConnectTask {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.inner).poll(cx).map(|joined| {
            joined.unwrap_or_else(|err| Err(LifecycleError::TaskAborted(err.to_string())))
        })
    }
}
