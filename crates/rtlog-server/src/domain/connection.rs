//! Connection identity, role and lifecycle state.
//!
//! # Connection lifecycle
//!
//! ```text
//!                ┌────────────────────────────────────────┐
//!                ▼                                        │ (plain, keep-alive)
//!   ReadingHeader ──► Dispatching ──► WritingResponse ────┤
//!                                                         │ (101 sent)
//!                                                         ▼
//!                                                    ReadingFrame ──┐
//!                                                         ▲         │ ping → pong
//!                                                         └─────────┘
//!
//!   any state ──(error, timeout, EOF, close frame, limit)──► Closed
//! ```
//!
//! A connection starts with [`Role::Plain`] and switches to
//! [`Role::WebSocket`] exactly once, after a successful upgrade handshake.

use std::fmt;

use uuid::Uuid;

/// Unique identity of one accepted transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generates a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    /// Prints the first 8 hex digits, which is enough to tell connections
    /// apart in log lines.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let simple = self.0.simple().to_string();
        f.write_str(&simple[..8])
    }
}

/// What protocol a connection currently speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// HTTP request/response; subject to admission control.
    Plain,
    /// Upgraded; receives broadcast log frames.
    WebSocket,
}

/// States of the per-connection state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Accumulating bytes until a complete request head is buffered.
    ReadingHeader,
    /// A request head of the given length sits at the front of the buffer.
    Dispatching { head_len: usize },
    /// A response is ready; `upgrade` is set when it is a `101`.
    WritingResponse { response: Vec<u8>, upgrade: bool },
    /// Upgraded: waiting for inbound frames or outbound log frames.
    ReadingFrame,
    /// Terminal.
    Closed(CloseReason),
}

impl ConnectionState {
    /// Short name for log lines (the full state can hold a whole response).
    pub fn name(&self) -> &'static str {
        match self {
            ConnectionState::ReadingHeader => "ReadingHeader",
            ConnectionState::Dispatching { .. } => "Dispatching",
            ConnectionState::WritingResponse { .. } => "WritingResponse",
            ConnectionState::ReadingFrame => "ReadingFrame",
            ConnectionState::Closed(_) => "Closed",
        }
    }
}

/// Why a connection reached [`ConnectionState::Closed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer closed the stream (EOF), possibly mid-request.
    PeerClosed,
    /// The peer sent a WebSocket Close frame.
    CloseFrame,
    /// The per-connection request limit was exceeded.
    RequestLimit,
    /// The request head outgrew the configured maximum.
    HeaderTooLarge,
    /// A read or write did not finish within the I/O timeout.
    Timeout,
    /// The peer sent a frame header that violates RFC 6455.
    ProtocolViolation(String),
    /// The peer fell too far behind on broadcast frames.
    SlowConsumer,
    /// The server is shutting down or the registry dropped the connection.
    Shutdown,
    /// A socket-level error.
    Transport(String),
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::PeerClosed => f.write_str("peer closed the connection"),
            CloseReason::CloseFrame => f.write_str("peer sent a close frame"),
            CloseReason::RequestLimit => f.write_str("request limit exceeded"),
            CloseReason::HeaderTooLarge => f.write_str("request head too large"),
            CloseReason::Timeout => f.write_str("I/O timeout"),
            CloseReason::ProtocolViolation(e) => write!(f, "protocol violation: {e}"),
            CloseReason::SlowConsumer => f.write_str("slow consumer"),
            CloseReason::Shutdown => f.write_str("shutdown"),
            CloseReason::Transport(e) => write!(f, "transport error: {e}"),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_ids_are_unique() {
        assert_ne!(ConnectionId::new(), ConnectionId::new());
    }

    #[test]
    fn test_connection_id_display_is_short() {
        let id = ConnectionId::new();
        assert_eq!(id.to_string().len(), 8);
    }

    #[test]
    fn test_state_names() {
        assert_eq!(ConnectionState::ReadingHeader.name(), "ReadingHeader");
        assert_eq!(
            ConnectionState::Closed(CloseReason::Timeout).name(),
            "Closed"
        );
    }

    #[test]
    fn test_close_reason_display() {
        assert_eq!(CloseReason::RequestLimit.to_string(), "request limit exceeded");
        assert_eq!(
            CloseReason::Transport("broken pipe".into()).to_string(),
            "transport error: broken pipe"
        );
    }
}
