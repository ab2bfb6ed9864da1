//! Error types for the connection adapter
//!
//! Every error carries its [`ErrorKind`] from the point where it is raised,
//! so retry and initialization logic classify failures by kind instead of
//! by message text.

use thiserror::Error;

/// Result type for adapter operations
pub type Result<T> = std::result::Result<T, AdapterError>;

/// Classification of an [`AdapterError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Initialization,
    AlreadyInitialized,
    Config,
    NotConnected,
    NotBound,
    SessionActive,
    Network,
    Application,
    Query,
    Timeout,
    RetriesExhausted,
    Serialization,
}

/// Adapter error types
///
/// `Clone` so a single coalesced attempt can hand the same failure to
/// every caller waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    /// The client runtime failed to initialize
    #[error("Runtime initialization failed: {0}")]
    Initialization(String),

    /// The runtime reports it was already initialized elsewhere
    #[error("Runtime already initialized: {0}")]
    AlreadyInitialized(String),

    /// Missing or invalid configuration / caller input
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operation requires a connected session
    #[error("Not connected: call connect() first")]
    NotConnected,

    /// Operation requires a bound application
    #[error("Application not bound: call connect_application() first")]
    NotBound,

    /// A session for another identity is still live
    #[error("Session already active for {current}; disconnect before connecting as {requested}")]
    SessionActive { current: String, requested: String },

    /// Faucet, node service or transport failure
    #[error("Network error: {0}")]
    Network(String),

    /// The remote application or chain rejected the request
    #[error("Application error: {0}")]
    Application(String),

    /// GraphQL-level error reported in the response body
    #[error("Query error: {0}")]
    Query(String),

    /// No response within the allotted time
    #[error("Request timed out after {timeout_ms}ms; the chain may still be synchronizing")]
    Timeout { timeout_ms: u64 },

    /// Every mutation attempt timed out
    #[error(
        "Mutation failed after {attempts} attempts; the chain may still be syncing, \
         wait a moment and try again later"
    )]
    RetriesExhausted { attempts: u32 },

    /// Payload encoding or decoding failed
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AdapterError {
    /// Kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AdapterError::Initialization(_) => ErrorKind::Initialization,
            AdapterError::AlreadyInitialized(_) => ErrorKind::AlreadyInitialized,
            AdapterError::Config(_) => ErrorKind::Config,
            AdapterError::NotConnected => ErrorKind::NotConnected,
            AdapterError::NotBound => ErrorKind::NotBound,
            AdapterError::SessionActive { .. } => ErrorKind::SessionActive,
            AdapterError::Network(_) => ErrorKind::Network,
            AdapterError::Application(_) => ErrorKind::Application,
            AdapterError::Query(_) => ErrorKind::Query,
            AdapterError::Timeout { .. } => ErrorKind::Timeout,
            AdapterError::RetriesExhausted { .. } => ErrorKind::RetriesExhausted,
            AdapterError::Serialization(_) => ErrorKind::Serialization,
        }
    }

    /// Whether a mutation may be retried after this error
    pub fn is_timeout(&self) -> bool {
        self.kind() == ErrorKind::Timeout
    }
}

impl From<serde_json::Error> for AdapterError {
    fn from(err: serde_json::Error) -> Self {
        AdapterError::Serialization(err.to_string())
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for AdapterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AdapterError::Network(format!("request timed out: {}", err))
        } else {
            AdapterError::Network(err.to_string())
        }
    }
}
