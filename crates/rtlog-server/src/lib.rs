//! rtlog-server library crate.
//!
//! An embeddable HTTP + WebSocket server that pushes log events from a host
//! application to any browser on the LAN.  The same port serves the static
//! viewer bundle and the `/ws` endpoint the viewer connects to.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Browser (HTTP GET /, WebSocket /ws)
//!         ↕
//! [rtlog-server]
//!   ├── domain/           Pure types: ServerConfig, connection id/role/state
//!   ├── application/      Request routing, admission control, static files
//!   └── infrastructure/
//!         ├── listener/       TCP accept loop
//!         ├── connection/     Per-connection state machine
//!         ├── registry/       The set of live connections
//!         ├── broadcast/      emit() → JSON text frame → every viewer
//!         ├── tracing_layer/  tracing events → emit()
//!         └── server/         Start/stop facade for hosts
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async code.
//! - `application` depends on `domain` and `rtlog-core` only; it decides what
//!   to answer but never touches a socket.
//! - `infrastructure` depends on all other layers plus `tokio`.
//!
//! # For beginners: why this structure?
//!
//! The interesting decisions (is this a valid upgrade? which file does `/`
//! map to? has this client made too many requests?) live in small pure
//! functions that can be tested without opening a port.  The socket code
//! only moves bytes between those functions and the network.

/// Domain layer: pure types (no I/O).
pub mod domain;

/// Application layer: routing and static responses.
pub mod application;

/// Infrastructure layer: sockets, tasks and the host-facing server.
pub mod infrastructure;

pub use domain::{ConfigError, ServerConfig};
pub use infrastructure::{BroadcastLayer, LogEmitter, Server, ServerError};
pub use rtlog_core::{LogEvent, LogLevel};
