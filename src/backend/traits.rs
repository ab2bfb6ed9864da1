//! Capability traits over the remote ledger client.
//!
//! The adapter only talks to the ledger through these traits, so the real
//! faucet/node-service client and the test fakes are interchangeable.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::Result;

/// Identifier of a microchain
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(pub String);

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChainId {
    fn from(s: &str) -> Self {
        ChainId(s.to_string())
    }
}

/// Identifier of a deployed application
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(pub String);

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ApplicationId {
    fn from(s: &str) -> Self {
        ApplicationId(s.to_string())
    }
}

/// Wallet material issued by the session service.
///
/// Opaque to the adapter; only the client factory interprets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Wallet(pub serde_json::Value);

/// A notification pushed by a chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A new block was added to the chain
    NewBlock { height: Option<u64>, hash: Option<String> },
    /// Any other reason reported by the node
    Other(String),
}

impl Notification {
    pub fn is_new_block(&self) -> bool {
        matches!(self, Notification::NewBlock { .. })
    }
}

/// Callback invoked for every chain notification
pub type NotificationCallback = Arc<dyn Fn(Notification) + Send + Sync>;

/// Live registration of a [`NotificationCallback`].
///
/// Dropping the subscription cancels it.
pub struct NotificationSubscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl NotificationSubscription {
    pub fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self { cancel: Some(Box::new(cancel)) }
    }

    /// Subscription with nothing to cancel
    pub fn detached() -> Self {
        Self { cancel: None }
    }
}

impl Drop for NotificationSubscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for NotificationSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationSubscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// One-time initialization of the client runtime.
#[async_trait]
pub trait RuntimeLoader: Send + Sync {
    /// Initialize the runtime.
    ///
    /// Implementations report a runtime that was set up by someone else as
    /// [`AdapterError::AlreadyInitialized`](crate::AdapterError::AlreadyInitialized).
    async fn initialize(&self) -> Result<()>;
}

/// Entry point into the remote client SDK.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    /// Open the session-issuing service (faucet) at `endpoint`
    async fn open_session_service(&self, endpoint: &str) -> Result<Arc<dyn SessionService>>;

    /// Build a client bound to `wallet`
    async fn create_client(&self, wallet: Wallet) -> Result<Arc<dyn SessionHandle>>;
}

/// Session-issuing service: wallets and chain claims.
#[async_trait]
pub trait SessionService: Send + Sync {
    async fn create_wallet(&self) -> Result<Wallet>;

    /// Claim a chain owned by `identity`
    async fn claim_chain(&self, wallet: &Wallet, identity: &str) -> Result<ChainId>;
}

/// Client bound to a wallet.
#[async_trait]
pub trait SessionHandle: Send + Sync {
    async fn chain(&self, chain_id: &ChainId) -> Result<Arc<dyn ChainHandle>>;
}

/// A resolved chain.
#[async_trait]
pub trait ChainHandle: Send + Sync {
    fn chain_id(&self) -> &ChainId;

    async fn application(&self, application_id: &ApplicationId)
        -> Result<Arc<dyn ApplicationHandle>>;

    /// Register for push notifications from this chain
    async fn on_notification(&self, callback: NotificationCallback)
        -> Result<NotificationSubscription>;
}

/// An application bound on a chain.
#[async_trait]
pub trait ApplicationHandle: Send + Sync {
    fn application_id(&self) -> &ApplicationId;

    /// Send a serialized GraphQL request and return the raw response body
    async fn query(&self, payload: &str) -> Result<String>;
}
