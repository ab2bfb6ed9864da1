//! Session façade
//!
//! Mirrors adapter state into a `watch` channel so UI-side consumers can
//! await changes instead of polling the getters. The snapshot is rebuilt on
//! every adapter notification (connect, bind, disconnect, new block).

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::adapter::{ApplicationBinding, ConnectionAdapter, ListenerHandle, Session};
use crate::config::RetryPolicy;
use crate::error::Result;

/// Point-in-time view of the adapter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub connected: bool,
    pub application_connected: bool,
    pub address: Option<String>,
    pub chain_id: Option<String>,
    pub application_id: Option<String>,
    /// Message of the most recent failed operation made through the façade
    pub last_error: Option<String>,
    /// Number of adapter notifications observed so far
    pub revision: u64,
}

pub struct SessionFacade {
    adapter: ConnectionAdapter,
    state: Arc<watch::Sender<SessionSnapshot>>,
    listener: Option<ListenerHandle>,
}

impl SessionFacade {
    pub fn new(adapter: ConnectionAdapter) -> Self {
        let (tx, _) = watch::channel(snapshot_of(&adapter, None, 0));
        let state = Arc::new(tx);

        let sync_adapter = adapter.clone();
        let sync_state = Arc::clone(&state);
        let listener = adapter.subscribe(move || {
            sync_state.send_modify(|snapshot| {
                let revision = snapshot.revision + 1;
                *snapshot = snapshot_of(&sync_adapter, snapshot.last_error.take(), revision);
            });
        });

        Self {
            adapter,
            state,
            listener: Some(listener),
        }
    }

    /// Watch the snapshot
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    pub fn adapter(&self) -> &ConnectionAdapter {
        &self.adapter
    }

    pub async fn connect(&self, address: &str) -> Result<Session> {
        let outcome = self.adapter.connect(address).await;
        self.record(&outcome);
        outcome
    }

    pub async fn connect_application(&self, application_id: &str) -> Result<ApplicationBinding> {
        let outcome = self.adapter.connect_application(application_id).await;
        self.record(&outcome);
        outcome
    }

    pub fn disconnect(&self) {
        self.state.send_modify(|snapshot| snapshot.last_error = None);
        self.adapter.disconnect();
    }

    pub async fn query<T: DeserializeOwned>(
        &self,
        request: &str,
        variables: Option<Value>,
        timeout: Option<Duration>,
    ) -> Result<T> {
        let outcome = self.adapter.query(request, variables, timeout).await;
        self.record(&outcome);
        outcome
    }

    pub async fn mutate<T: DeserializeOwned>(
        &self,
        request: &str,
        variables: Option<Value>,
        policy: Option<RetryPolicy>,
    ) -> Result<T> {
        let outcome = self.adapter.mutate(request, variables, policy).await;
        self.record(&outcome);
        outcome
    }

    fn record<T>(&self, outcome: &Result<T>) {
        let message = outcome.as_ref().err().map(|e| e.to_string());
        self.state.send_if_modified(|snapshot| {
            if snapshot.last_error == message {
                return false;
            }
            snapshot.last_error = message;
            true
        });
    }
}

impl Drop for SessionFacade {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.unsubscribe();
        }
    }
}

fn snapshot_of(
    adapter: &ConnectionAdapter,
    last_error: Option<String>,
    revision: u64,
) -> SessionSnapshot {
    let session = adapter.session();
    let binding = adapter.binding();

    SessionSnapshot {
        connected: session.is_some(),
        application_connected: binding.is_some(),
        address: session.as_ref().map(|s| s.identity().to_string()),
        chain_id: session.as_ref().map(|s| s.chain_id().to_string()),
        application_id: binding.as_ref().map(|b| b.application_id().to_string()),
        last_error,
        revision,
    }
}
