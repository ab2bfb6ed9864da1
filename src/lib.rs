//! Job Market Adapter - ledger connection layer for the job marketplace
//!
//! Manages the client's single relationship with a Linera-style ledger:
//! one-time runtime initialization, chain claiming, application binding,
//! GraphQL query/mutation execution with timeouts and retries, and
//! state-change notifications for reactive consumers.
//!
//! # Architecture
//!
//! - **Runtime**: coalesced, idempotent initialization of the client runtime
//! - **Adapter**: session + application binding + query/mutate + listeners
//! - **Backend**: capability traits over the remote SDK, with an HTTP/WebSocket
//!   implementation and scriptable mocks
//! - **Marketplace**: typed queries and mutations for the marketplace contract
//! - **Facade**: `watch`-based snapshot of adapter state
//!
//! # Example
//!
//! ```rust,ignore
//! use job_market_adapter::{AdapterConfig, ConnectionAdapter, MarketplaceClient};
//! use job_market_adapter::backend::http::{HttpClientFactory, HttpRuntimeLoader};
//!
//! let config = AdapterConfig::from_env();
//! let adapter = ConnectionAdapter::new(
//!     config.clone(),
//!     Arc::new(HttpClientFactory::new(&config)),
//!     Arc::new(HttpRuntimeLoader::new(&config)),
//! );
//!
//! adapter.connect("0xd23e...").await?;
//! adapter.connect_configured_application().await?;
//!
//! let market = MarketplaceClient::new(adapter.clone());
//! let open_jobs = market.jobs(None, None, Default::default()).await?;
//! ```

// Connection adapter (session, binding, query/mutate, listeners)
pub mod adapter;

// Remote client capability traits and implementations
pub mod backend;

pub mod config;
pub mod error;
pub mod facade;
pub mod logging;
pub mod marketplace;
pub mod models;
pub mod queries;

// Runtime initialization
pub mod runtime;

pub use adapter::{ApplicationBinding, ConnectionAdapter, ListenerHandle, Session};
pub use backend::{ApplicationId, ChainId, Notification};
pub use config::{AdapterConfig, RetryPolicy};
pub use error::{AdapterError, ErrorKind, Result};
pub use facade::{SessionFacade, SessionSnapshot};
pub use marketplace::MarketplaceClient;
pub use runtime::{RuntimeInitializer, RuntimeStatus};
