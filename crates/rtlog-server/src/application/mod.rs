//! Application layer for rtlog-server.
//!
//! The application layer decides *what* answer a request gets; the
//! infrastructure layer decides *how* bytes move.
//!
//! # Responsibilities
//!
//! - Classifying request heads (malformed / upgrade / static file)
//! - Enforcing the per-connection request limit
//! - Building static file responses from an [`AssetSource`]
//!
//! # What does NOT belong here?
//!
//! - Opening sockets or listening for connections (that is infrastructure)
//! - Tokio task spawning, timeouts, or buffering of partial reads

pub mod router;
pub mod static_responder;

pub use router::{route, AdmissionControl, Route, WEBSOCKET_PATH};
pub use static_responder::{AssetSource, MemoryAssets, StaticResponder};
