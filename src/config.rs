//! Adapter configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

use crate::error::{AdapterError, Result};

/// Default faucet (session-issuing endpoint) URL
pub const DEFAULT_FAUCET_URL: &str = "http://localhost:8079";

/// Default node service URL
pub const DEFAULT_NODE_SERVICE_URL: &str = "http://localhost:8080";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Faucet used to create wallets and claim chains
    #[serde(default = "default_faucet_url")]
    pub faucet_url: String,

    /// Node service hosting the application GraphQL endpoints
    #[serde(default = "default_node_service_url")]
    pub node_service_url: String,

    /// Marketplace application id
    #[serde(default)]
    pub application_id: Option<String>,

    /// Default timeout for read queries in milliseconds
    #[serde(default = "default_query_timeout")]
    pub query_timeout_ms: u64,

    #[serde(default)]
    pub retry: RetryPolicyConfig,
}

/// Mutation retry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicyConfig {
    /// Total attempts, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Timeout for each attempt in milliseconds
    #[serde(default = "default_attempt_timeout")]
    pub attempt_timeout_ms: u64,

    /// Backoff unit; attempt n waits n * base_delay before attempt n+1
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,
}

impl Default for RetryPolicyConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            attempt_timeout_ms: default_attempt_timeout(),
            base_delay_ms: default_base_delay(),
        }
    }
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            faucet_url: default_faucet_url(),
            node_service_url: default_node_service_url(),
            application_id: None,
            query_timeout_ms: default_query_timeout(),
            retry: RetryPolicyConfig::default(),
        }
    }
}

fn default_faucet_url() -> String { DEFAULT_FAUCET_URL.to_string() }
fn default_node_service_url() -> String { DEFAULT_NODE_SERVICE_URL.to_string() }
fn default_query_timeout() -> u64 { 30_000 }
fn default_max_attempts() -> u32 { 4 }
fn default_attempt_timeout() -> u64 { 30_000 }
fn default_base_delay() -> u64 { 5_000 }

impl AdapterConfig {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AdapterConfig =
            toml::from_str(content).map_err(|e| AdapterError::Config(e.to_string()))?;
        config.warn_if_unbound();
        Ok(config)
    }

    /// Load from the process environment (and a `.env` file if present)
    ///
    /// Recognizes `LINERA_FAUCET_URL`, `LINERA_NODE_SERVICE_URL` and
    /// `LINERA_APPLICATION_ID`.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let config = Self {
            faucet_url: non_empty("LINERA_FAUCET_URL").unwrap_or_else(default_faucet_url),
            node_service_url: non_empty("LINERA_NODE_SERVICE_URL")
                .unwrap_or_else(default_node_service_url),
            application_id: non_empty("LINERA_APPLICATION_ID"),
            ..Default::default()
        };
        config.warn_if_unbound();
        config
    }

    pub fn with_application_id(mut self, application_id: impl Into<String>) -> Self {
        self.application_id = Some(application_id.into());
        self
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    /// Retry policy for mutations
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            attempt_timeout: Duration::from_millis(self.retry.attempt_timeout_ms),
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
        }
    }

    fn warn_if_unbound(&self) {
        if self.application_id.is_none() {
            warn!("No application id configured; connect_application will need an explicit id");
        }
    }
}

/// Runtime form of [`RetryPolicyConfig`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub attempt_timeout: Duration,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        AdapterConfig::default().retry_policy()
    }
}

impl RetryPolicy {
    /// Delay before the attempt following `attempt` (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}
