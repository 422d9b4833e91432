//! Transport layer for the design relay.
//!
//! Provides:
//! - Wire helpers shared by server and client (error body, paths)
//! - HTTP endpoint (feature: http)
//! - Client adapter with local history (feature: client)

pub mod protocol;

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "client")]
pub mod client;

pub use protocol::{AGENT_PATH, ErrorBody, HEALTH_PATH};
