//! Domain layer for rtlog-server.
//!
//! The domain layer contains plain types that have no dependencies on I/O,
//! networking, or the async runtime.
//!
//! # What belongs in the domain layer?
//!
//! - Configuration structures
//! - Connection identity, role and state machine states
//!
//! # What does NOT belong here?
//!
//! - Any `tokio`, `TcpStream`, or file system types
//! - Anything that could block or fail due to external state

pub mod config;
pub mod connection;

// Re-export the most commonly needed types at the domain module boundary
// so callers can write `domain::ServerConfig` instead of the longer path.
pub use config::{ConfigError, ServerConfig};
pub use connection::{CloseReason, ConnectionId, ConnectionState, Role};
