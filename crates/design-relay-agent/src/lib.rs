//! Downstream agent clients.
//!
//! Provides:
//! - `HttpAgent` - JSON-over-HTTP client for the design agent service

pub mod http;

pub use http::HttpAgent;
