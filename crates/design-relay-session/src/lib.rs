//! Context storage and turn orchestration for the design relay.
//!
//! Provides:
//! - `Relay` - Validate, thread context, call the agent, persist
//! - `SessionLocks` - Per-session turn serialization
//! - Storage implementations (memory)

pub mod locks;
pub mod relay;
pub mod storage;

pub use locks::SessionLocks;
pub use relay::{ContextPrecedence, Relay, RelayError, RelaySettings};
