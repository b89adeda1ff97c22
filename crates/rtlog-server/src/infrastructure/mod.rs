//! Infrastructure layer for rtlog-server.
//!
//! Everything that touches a socket, a file or a task lives here:
//!
//! - [`server`]: start/stop facade used by hosts and the binary.
//! - [`listener`]: TCP accept loop.
//! - [`connection`]: per-connection state machine over any async transport.
//! - [`registry`]: the authoritative set of live connections.
//! - [`outbound`]: per-connection frame queue with a backlog limit.
//! - [`broadcast`]: the emit → frame → fan-out pipeline.
//! - [`tracing_layer`]: bridges `tracing` events into the pipeline.
//! - [`fs_assets`]: serves the viewer bundle from disk.

pub mod broadcast;
pub mod connection;
pub mod fs_assets;
pub mod listener;
pub mod outbound;
pub mod registry;
pub mod server;
pub mod tracing_layer;

pub use broadcast::LogEmitter;
pub use fs_assets::FsAssets;
pub use registry::ConnectionRegistry;
pub use server::{Server, ServerError};
pub use tracing_layer::BroadcastLayer;
