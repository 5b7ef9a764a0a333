//! On-connect action queue
//!
//! Actions are registered before the connection exists and replayed once it
//! is live, in registration order, one at a time. Draining consumes the
//! queue, so an action can never run twice.

use crate::config::ConnectionConfig;
use crate::error::ActionError;
use crate::logging::Logger;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::debug;

/// Everything an on-connect action can reach: the collaborators the manager
/// was built with, plus the live connection.
///
/// Each action receives a clone pointing at the same shared values.
pub struct DependencyBundle<H> {
    /// Configuration the manager connected with
    pub config: Arc<ConnectionConfig>,
    /// Logger the manager reports through
    pub log: Arc<dyn Logger>,
    /// The live connection
    pub handle: Arc<H>,
}

impl<H> Clone for DependencyBundle<H> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            log: Arc::clone(&self.log),
            handle: Arc::clone(&self.handle),
        }
    }
}

impl<H> fmt::Debug for DependencyBundle<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyBundle")
            .field("uri", &self.config.redacted_uri())
            .finish_non_exhaustive()
    }
}

/// A callback deferred until the connection is ready
pub type DeferredAction<H> =
    Box<dyn FnOnce(DependencyBundle<H>) -> BoxFuture<'static, anyhow::Result<()>> + Send>;

/// Failure of a single action during drain
#[derive(Debug)]
pub struct ActionFailure {
    /// Zero-based position of the failing action
    pub index: usize,
    /// Returned error, or the panic message
    pub source: ActionError,
}

/// Ordered actions awaiting a ready connection
pub struct ActionQueue<H> {
    actions: Vec<DeferredAction<H>>,
}

impl<H> Default for ActionQueue<H> {
    fn default() -> Self {
        Self {
            actions: Vec::new(),
        }
    }
}

impl<H> fmt::Debug for ActionQueue<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionQueue")
            .field("pending", &self.actions.len())
            .finish()
    }
}

impl<H: Send + Sync + 'static> ActionQueue<H> {
    /// Create an empty queue
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an action
    pub fn enqueue<F, Fut>(&mut self, action: F)
    where
        F: FnOnce(DependencyBundle<H>) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.actions.push(Box::new(move |bundle| action(bundle).boxed()));
    }

    /// Number of pending actions
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether no actions are pending
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Run every action in order, stopping at the first failure.
    ///
    /// Returns how many actions ran. A panicking action is reported as a
    /// failure of that action.
    pub async fn drain_once(self, bundle: &DependencyBundle<H>) -> Result<usize, ActionFailure> {
        let total = self.actions.len();
        for (index, action) in self.actions.into_iter().enumerate() {
            debug!("Running on-connect action {}/{}", index + 1, total);
            let deps = bundle.clone();
            let outcome = AssertUnwindSafe(async move { action(deps).await })
                .catch_unwind()
                .await;

            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(source)) => {
                    return Err(ActionFailure { index, source });
                }
                Err(panic) => {
                    return Err(ActionFailure {
                        index,
                        source: anyhow::anyhow!(panic_message(&*panic)),
                    });
                }
            }
        }
        Ok(total)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    format!("action panicked: {detail}")
}
