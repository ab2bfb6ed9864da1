//! Ledger client backends
//!
//! - [`traits`]: capability interfaces the adapter is written against
//! - [`http`]: faucet + node service over HTTP, notifications over WebSocket
//! - [`mock`]: scriptable fakes for tests

pub mod mock;
pub mod traits;

#[cfg(feature = "http")]
pub mod http;

pub use traits::*;
