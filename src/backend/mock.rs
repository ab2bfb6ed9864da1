//! Mock ledger backend for testing.
//!
//! Scriptable stand-ins for the runtime loader and the client factory, with
//! call counters so tests can assert how many remote round-trips happened.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::traits::*;
use crate::error::{AdapterError, Result};

/// Mock runtime loader.
///
/// Outcomes are consumed in order; once the script is empty every call
/// succeeds.
#[derive(Default)]
pub struct MockRuntimeLoader {
    outcomes: Mutex<VecDeque<Result<()>>>,
    delay: Mutex<Duration>,
    call_count: AtomicU32,
}

impl MockRuntimeLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the outcome of the next unscripted call
    pub fn push_outcome(&self, outcome: Result<()>) {
        self.outcomes.lock().push_back(outcome);
    }

    /// Make every call take `delay` before resolving
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    /// Get the number of times initialize was called.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RuntimeLoader for MockRuntimeLoader {
    async fn initialize(&self) -> Result<()> {
        self.call_count.fetch_add(1, Ordering::SeqCst);

        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.outcomes.lock().pop_front().unwrap_or(Ok(()))
    }
}

/// Scripted reply for a mock application query
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Respond with this raw body
    Body(String),
    /// Fail with this error
    Fail(AdapterError),
    /// Never respond
    Hang,
}

impl MockReply {
    /// Respond with `{"data": data}`
    pub fn data(data: serde_json::Value) -> Self {
        MockReply::Body(serde_json::json!({ "data": data }).to_string())
    }

    /// Respond with a GraphQL error list
    pub fn errors(messages: &[&str]) -> Self {
        let errors: Vec<_> = messages
            .iter()
            .map(|m| serde_json::json!({ "message": m }))
            .collect();
        MockReply::Body(serde_json::json!({ "data": null, "errors": errors }).to_string())
    }
}

/// Shared state behind every handle produced by one [`MockClientFactory`]
#[derive(Default)]
struct MockLedger {
    open_calls: AtomicU32,
    wallet_calls: AtomicU32,
    claim_calls: AtomicU32,
    client_calls: AtomicU32,
    chain_calls: AtomicU32,
    bind_calls: AtomicU32,
    query_calls: AtomicU32,

    claim_delay: Mutex<Duration>,
    open_error: Mutex<Option<AdapterError>>,
    claim_error: Mutex<Option<AdapterError>>,
    bind_error: Mutex<Option<AdapterError>>,

    replies: Mutex<VecDeque<MockReply>>,
    payloads: Mutex<Vec<String>>,

    callbacks: Mutex<HashMap<u64, NotificationCallback>>,
    next_callback: AtomicU64,
}

/// Mock client factory.
///
/// Claims return `chain-<identity>`; every application bound through it
/// answers from the same reply script.
#[derive(Default, Clone)]
pub struct MockClientFactory {
    ledger: Arc<MockLedger>,
}

impl MockClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for the next application query
    pub fn push_reply(&self, reply: MockReply) {
        self.ledger.replies.lock().push_back(reply);
    }

    pub fn set_claim_delay(&self, delay: Duration) {
        *self.ledger.claim_delay.lock() = delay;
    }

    pub fn set_open_error(&self, error: Option<AdapterError>) {
        *self.ledger.open_error.lock() = error;
    }

    pub fn set_claim_error(&self, error: Option<AdapterError>) {
        *self.ledger.claim_error.lock() = error;
    }

    pub fn set_bind_error(&self, error: Option<AdapterError>) {
        *self.ledger.bind_error.lock() = error;
    }

    /// Push a notification to every live chain subscription
    pub fn push_notification(&self, notification: Notification) {
        let callbacks: Vec<NotificationCallback> =
            self.ledger.callbacks.lock().values().cloned().collect();
        for callback in callbacks {
            callback(notification.clone());
        }
    }

    /// Number of live notification subscriptions
    pub fn active_subscriptions(&self) -> usize {
        self.ledger.callbacks.lock().len()
    }

    pub fn open_calls(&self) -> u32 {
        self.ledger.open_calls.load(Ordering::SeqCst)
    }

    pub fn wallet_calls(&self) -> u32 {
        self.ledger.wallet_calls.load(Ordering::SeqCst)
    }

    pub fn claim_calls(&self) -> u32 {
        self.ledger.claim_calls.load(Ordering::SeqCst)
    }

    pub fn client_calls(&self) -> u32 {
        self.ledger.client_calls.load(Ordering::SeqCst)
    }

    pub fn chain_calls(&self) -> u32 {
        self.ledger.chain_calls.load(Ordering::SeqCst)
    }

    pub fn bind_calls(&self) -> u32 {
        self.ledger.bind_calls.load(Ordering::SeqCst)
    }

    pub fn query_calls(&self) -> u32 {
        self.ledger.query_calls.load(Ordering::SeqCst)
    }

    /// Payloads received by application queries, in arrival order
    pub fn payloads(&self) -> Vec<String> {
        self.ledger.payloads.lock().clone()
    }
}

#[async_trait]
impl ClientFactory for MockClientFactory {
    async fn open_session_service(&self, _endpoint: &str) -> Result<Arc<dyn SessionService>> {
        self.ledger.open_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.ledger.open_error.lock().clone() {
            return Err(err);
        }
        Ok(Arc::new(MockSessionService { ledger: Arc::clone(&self.ledger) }))
    }

    async fn create_client(&self, _wallet: Wallet) -> Result<Arc<dyn SessionHandle>> {
        self.ledger.client_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockSession { ledger: Arc::clone(&self.ledger) }))
    }
}

struct MockSessionService {
    ledger: Arc<MockLedger>,
}

#[async_trait]
impl SessionService for MockSessionService {
    async fn create_wallet(&self) -> Result<Wallet> {
        self.ledger.wallet_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Wallet(serde_json::json!({ "mock": true })))
    }

    async fn claim_chain(&self, _wallet: &Wallet, identity: &str) -> Result<ChainId> {
        self.ledger.claim_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.ledger.claim_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let Some(err) = self.ledger.claim_error.lock().clone() {
            return Err(err);
        }
        Ok(ChainId(format!("chain-{}", identity)))
    }
}

struct MockSession {
    ledger: Arc<MockLedger>,
}

#[async_trait]
impl SessionHandle for MockSession {
    async fn chain(&self, chain_id: &ChainId) -> Result<Arc<dyn ChainHandle>> {
        self.ledger.chain_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockChain {
            chain_id: chain_id.clone(),
            ledger: Arc::clone(&self.ledger),
        }))
    }
}

struct MockChain {
    chain_id: ChainId,
    ledger: Arc<MockLedger>,
}

#[async_trait]
impl ChainHandle for MockChain {
    fn chain_id(&self) -> &ChainId {
        &self.chain_id
    }

    async fn application(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Arc<dyn ApplicationHandle>> {
        self.ledger.bind_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.ledger.bind_error.lock().clone() {
            return Err(err);
        }
        Ok(Arc::new(MockApplication {
            application_id: application_id.clone(),
            ledger: Arc::clone(&self.ledger),
        }))
    }

    async fn on_notification(
        &self,
        callback: NotificationCallback,
    ) -> Result<NotificationSubscription> {
        let id = self.ledger.next_callback.fetch_add(1, Ordering::SeqCst);
        self.ledger.callbacks.lock().insert(id, callback);

        let ledger = Arc::clone(&self.ledger);
        Ok(NotificationSubscription::new(move || {
            ledger.callbacks.lock().remove(&id);
        }))
    }
}

struct MockApplication {
    application_id: ApplicationId,
    ledger: Arc<MockLedger>,
}

#[async_trait]
impl ApplicationHandle for MockApplication {
    fn application_id(&self) -> &ApplicationId {
        &self.application_id
    }

    async fn query(&self, payload: &str) -> Result<String> {
        self.ledger.query_calls.fetch_add(1, Ordering::SeqCst);
        self.ledger.payloads.lock().push(payload.to_string());

        let reply = self.ledger.replies.lock().pop_front();
        match reply {
            Some(MockReply::Body(body)) => Ok(body),
            Some(MockReply::Fail(err)) => Err(err),
            Some(MockReply::Hang) => std::future::pending().await,
            None => Ok(r#"{"data":{}}"#.to_string()),
        }
    }
}
