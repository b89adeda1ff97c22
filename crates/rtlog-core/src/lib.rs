//! # rtlog-core
//!
//! Protocol primitives and domain types for the realtime log server.
//!
//! This crate has no sockets, no async runtime and no file system access.
//! Everything in it is a pure function or a plain data type, so the wire
//! format can be tested byte-for-byte without starting a server.
//!
//! # Architecture overview (for beginners)
//!
//! A browser talks to the log server in two phases over one TCP connection:
//!
//! 1. **Plain HTTP** – it fetches the viewer page (`/index.html`, scripts,
//!   styles).  [`protocol::http`] parses the request head and serializes the
//!   response.
//! 2. **WebSocket** – the page asks for `GET /ws` with upgrade headers.
//!   [`protocol::handshake`] validates them and computes the accept token;
//!   after that the server pushes log events as text frames built by
//!   [`protocol::frame`].
//!
//! - **`domain`** – the [`LogEvent`] that ends up as JSON in each frame.
//! - **`protocol`** – HTTP subset, WebSocket handshake and frame codec.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `rtlog_core::LogEvent` instead of `rtlog_core::domain::log_event::LogEvent`.
pub use domain::log_event::{LogEvent, LogLevel, UnknownLevel};
pub use protocol::frame::{decode_header, encode_text_frame, FrameError, FrameHeader, Opcode};
pub use protocol::handshake::{compute_accept_key, validate_upgrade, HandshakeError};
pub use protocol::http::{HttpResponse, RequestError, RequestHead, StatusCode};
