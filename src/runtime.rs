//! Runtime initializer
//!
//! Runs the client runtime's one-time setup exactly once per initializer.
//! Concurrent callers are coalesced onto a single in-flight attempt: the
//! first caller spawns the attempt and registers a broadcast channel, later
//! callers subscribe to it and receive the same outcome.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

use crate::backend::RuntimeLoader;
use crate::error::{AdapterError, ErrorKind, Result};

/// Lifecycle of the client runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeStatus {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
}

struct InitState {
    status: RuntimeStatus,
    /// Result channel of the in-flight attempt
    pending: Option<broadcast::Sender<Result<()>>>,
    attempts: u32,
}

/// Coalescing, idempotent runtime initializer.
pub struct RuntimeInitializer {
    loader: Arc<dyn RuntimeLoader>,
    state: Arc<Mutex<InitState>>,
}

impl RuntimeInitializer {
    pub fn new(loader: Arc<dyn RuntimeLoader>) -> Self {
        Self {
            loader,
            state: Arc::new(Mutex::new(InitState {
                status: RuntimeStatus::Uninitialized,
                pending: None,
                attempts: 0,
            })),
        }
    }

    pub fn status(&self) -> RuntimeStatus {
        self.state.lock().status
    }

    /// Number of initialization attempts started so far
    pub fn attempts(&self) -> u32 {
        self.state.lock().attempts
    }

    /// Make sure the runtime is initialized.
    ///
    /// Returns immediately once Ready. A failed attempt is reported to every
    /// caller that waited on it; the next call starts a fresh attempt.
    pub async fn ensure_ready(&self) -> Result<()> {
        let mut rx = {
            let mut state = self.state.lock();
            if state.status == RuntimeStatus::Ready {
                return Ok(());
            }

            match state.pending {
                Some(ref tx) => {
                    debug!("Runtime initialization in flight, waiting");
                    tx.subscribe()
                }
                None => {
                    let (tx, rx) = broadcast::channel(1);
                    state.status = RuntimeStatus::Initializing;
                    state.pending = Some(tx);
                    state.attempts += 1;
                    info!(attempt = state.attempts, "Runtime initialization started");

                    self.spawn_attempt();
                    rx
                }
            }
        };

        match rx.recv().await {
            Ok(outcome) => outcome,
            Err(_) => Err(AdapterError::Initialization(
                "initialization attempt ended without a result".into(),
            )),
        }
    }

    fn spawn_attempt(&self) {
        let loader = Arc::clone(&self.loader);
        let mut guard = AttemptGuard {
            state: Arc::clone(&self.state),
            finished: false,
        };

        tokio::spawn(async move {
            let outcome = match loader.initialize().await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::AlreadyInitialized => {
                    debug!(reason = %e, "Runtime was already initialized, treating as ready");
                    Ok(())
                }
                Err(e) => Err(e),
            };
            guard.finish(outcome);
        });
    }
}

/// Publishes the attempt's outcome. If the attempt task dies before
/// finishing, the drop marks the runtime Failed and closes the channel so
/// waiters are released.
struct AttemptGuard {
    state: Arc<Mutex<InitState>>,
    finished: bool,
}

impl AttemptGuard {
    fn finish(&mut self, outcome: Result<()>) {
        let mut state = self.state.lock();
        match outcome {
            Ok(()) => {
                state.status = RuntimeStatus::Ready;
                info!("Runtime ready");
            }
            Err(ref e) => {
                state.status = RuntimeStatus::Failed;
                error!(error = %e, "Runtime initialization failed");
            }
        }
        if let Some(tx) = state.pending.take() {
            let _ = tx.send(outcome);
        }
        self.finished = true;
    }
}

impl Drop for AttemptGuard {
    fn drop(&mut self) {
        if !self.finished {
            let mut state = self.state.lock();
            state.status = RuntimeStatus::Failed;
            state.pending = None;
            error!("Runtime initialization task aborted");
        }
    }
}
