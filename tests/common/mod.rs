//! Shared test utilities: a scripted in-memory driver and a recording logger
#![allow(dead_code)]

use async_trait::async_trait;
use dbkeeper::{ConnectOptions, ConnectionHandle, Driver, DriverError, Logger};
use std::error::Error;
use std::fmt::Debug;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Severity of a recorded log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Debug,
    Info,
    Fatal,
}

/// One recorded log call
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: Level,
    pub message: String,
    pub detail: String,
}

/// Logger that keeps every call for later assertions
#[derive(Debug, Default)]
pub struct RecordingLogger {
    entries: Mutex<Vec<LogEntry>>,
}

impl RecordingLogger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().unwrap().clone()
    }

    pub fn count(&self, level: Level) -> usize {
        self.entries().iter().filter(|e| e.level == level).count()
    }

    pub fn fatal_entries(&self) -> Vec<LogEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.level == Level::Fatal)
            .collect()
    }

    fn record(&self, level: Level, message: &str, detail: String) {
        self.entries.lock().unwrap().push(LogEntry {
            level,
            message: message.to_string(),
            detail,
        });
    }
}

impl Logger for RecordingLogger {
    fn debug(&self, message: &str, data: &dyn Debug) {
        self.record(Level::Debug, message, format!("{data:?}"));
    }

    fn info(&self, message: &str) {
        self.record(Level::Info, message, String::new());
    }

    fn fatal(&self, message: &str, error: &(dyn Error + 'static)) {
        self.record(Level::Fatal, message, error.to_string());
    }
}

/// What a [`MockDriver`] connect resolves to
#[derive(Debug, Clone)]
pub enum Script {
    Succeed,
    Fail { kind: String, message: String },
}

/// Counters shared between the test and the mock driver
#[derive(Debug, Default)]
pub struct DriverProbe {
    pub connects: Mutex<Vec<(String, ConnectOptions)>>,
    pub disconnects: AtomicUsize,
}

impl DriverProbe {
    pub fn connect_calls(&self) -> usize {
        self.connects.lock().unwrap().len()
    }

    pub fn disconnect_calls(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

/// In-memory driver following the `"Mongo"` error naming convention
pub struct MockDriver {
    script: Script,
    gate: Option<Arc<Notify>>,
    disconnect_gate: Option<Arc<Notify>>,
    fail_disconnect: bool,
    pub probe: Arc<DriverProbe>,
}

impl MockDriver {
    pub fn succeeding() -> Self {
        Self {
            script: Script::Succeed,
            gate: None,
            disconnect_gate: None,
            fail_disconnect: false,
            probe: Arc::new(DriverProbe::default()),
        }
    }

    pub fn failing(kind: &str, message: &str) -> Self {
        Self {
            script: Script::Fail {
                kind: kind.to_string(),
                message: message.to_string(),
            },
            ..Self::succeeding()
        }
    }

    /// Hold the connect until the returned `Notify` is signalled
    pub fn gated(mut self) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        self.gate = Some(Arc::clone(&gate));
        (self, gate)
    }

    /// Hold every disconnect until the returned `Notify` is signalled
    pub fn with_gated_disconnect(mut self) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        self.disconnect_gate = Some(Arc::clone(&gate));
        (self, gate)
    }

    pub fn with_failing_disconnect(mut self) -> Self {
        self.fail_disconnect = true;
        self
    }
}

/// Handle produced by [`MockDriver`]
#[derive(Debug)]
pub struct MockHandle {
    pub uri: String,
    disconnect_gate: Option<Arc<Notify>>,
    fail_disconnect: bool,
    probe: Arc<DriverProbe>,
}

#[async_trait]
impl ConnectionHandle for MockHandle {
    async fn disconnect(&self) -> Result<(), DriverError> {
        self.probe.disconnects.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.disconnect_gate {
            gate.notified().await;
        }
        if self.fail_disconnect {
            return Err(DriverError::new("MongoNetworkError", "socket hang up"));
        }
        Ok(())
    }
}

#[async_trait]
impl Driver for MockDriver {
    type Handle = MockHandle;

    async fn connect(
        &self,
        uri: &str,
        options: &ConnectOptions,
    ) -> Result<Self::Handle, DriverError> {
        self.probe
            .connects
            .lock()
            .unwrap()
            .push((uri.to_string(), options.clone()));

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        match &self.script {
            Script::Succeed => Ok(MockHandle {
                uri: uri.to_string(),
                disconnect_gate: self.disconnect_gate.clone(),
                fail_disconnect: self.fail_disconnect,
                probe: Arc::clone(&self.probe),
            }),
            Script::Fail { kind, message } => Err(DriverError::new(kind.clone(), message.clone())),
        }
    }

    fn error_prefix(&self) -> &str {
        "Mongo"
    }
}
