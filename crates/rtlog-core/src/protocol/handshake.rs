//! WebSocket opening handshake, server side (RFC 6455 §4.2).
//!
//! A browser opens the log stream with:
//!
//! ```http
//! GET /ws HTTP/1.1
//! Host: 192.168.1.20:8080
//! Upgrade: websocket
//! Connection: Upgrade
//! Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==
//! Sec-WebSocket-Version: 13
//! ```
//!
//! and the server answers:
//!
//! ```http
//! HTTP/1.1 101 Switching Protocols
//! Upgrade: websocket
//! Connection: Upgrade
//! Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=
//! ```
//!
//! The accept token proves the server understood the WebSocket request: it is
//! `base64(SHA1(key + GUID))` with the fixed GUID below.

use base64::Engine;
use sha1::{Digest, Sha1};
use thiserror::Error;

use crate::protocol::http::{HttpResponse, RequestHead, StatusCode};

/// RFC 6455 GUID appended to the client key before hashing.
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Reasons an upgrade request is refused.  All are answered with `400`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HandshakeError {
    #[error("missing Sec-WebSocket-Key header")]
    MissingKey,

    #[error("Upgrade header is {0:?}, expected \"websocket\"")]
    BadUpgrade(Option<String>),

    #[error("Connection header {0:?} does not contain \"upgrade\"")]
    BadConnection(Option<String>),
}

/// Computes the `Sec-WebSocket-Accept` value for a client key.
///
/// # Examples
///
/// ```rust
/// use rtlog_core::protocol::handshake::compute_accept_key;
///
/// assert_eq!(
///     compute_accept_key("dGhlIHNhbXBsZSBub25jZQ=="),
///     "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
/// );
/// ```
pub fn compute_accept_key(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(hasher.finalize())
}

/// Checks the upgrade preconditions and returns the accept token.
///
/// All three must hold:
///
/// 1. `Sec-WebSocket-Key` is present.
/// 2. `Upgrade` equals `websocket`, ignoring case.
/// 3. `Connection` contains `upgrade`, ignoring case (browsers may send
///    `keep-alive, Upgrade`).
///
/// # Errors
///
/// Returns the first failed precondition as a [`HandshakeError`].
pub fn validate_upgrade(request: &RequestHead) -> Result<String, HandshakeError> {
    let key = request.header("Sec-WebSocket-Key").ok_or(HandshakeError::MissingKey)?;

    let upgrade = request.header("Upgrade");
    if !upgrade.is_some_and(|v| v.eq_ignore_ascii_case("websocket")) {
        return Err(HandshakeError::BadUpgrade(upgrade.map(str::to_string)));
    }

    let connection = request.header("Connection");
    if !connection.is_some_and(|v| v.to_ascii_lowercase().contains("upgrade")) {
        return Err(HandshakeError::BadConnection(connection.map(str::to_string)));
    }

    Ok(compute_accept_key(key))
}

/// Builds the `101 Switching Protocols` response for an accepted upgrade.
pub fn switching_protocols(accept_key: &str) -> HttpResponse {
    HttpResponse::new(StatusCode::SwitchingProtocols)
        .with_header("Upgrade", "websocket")
        .with_header("Connection", "Upgrade")
        .with_header("Sec-WebSocket-Accept", accept_key)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn head(text: &str) -> RequestHead {
        RequestHead::parse(text.as_bytes()).unwrap()
    }

    const VALID: &str = "GET /ws HTTP/1.1\r\n\
        Host: localhost:8080\r\n\
        Upgrade: websocket\r\n\
        Connection: Upgrade\r\n\
        Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
        Sec-WebSocket-Version: 13\r\n\r\n";

    #[test]
    fn test_rfc_6455_accept_vector() {
        assert_eq!(
            compute_accept_key("dGhlIHNhbXBsZSBub25jZQ=="),
            "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
        );
    }

    #[test]
    fn test_accept_key_is_28_chars_of_base64() {
        // SHA-1 is 20 bytes → 28 base64 characters including one '=' pad.
        let accept = compute_accept_key("x3JJHMbDL1EzLkh9GBhXDw==");
        assert_eq!(accept.len(), 28);
        assert!(accept.ends_with('='));
    }

    #[test]
    fn test_valid_upgrade_returns_accept() {
        // Act
        let accept = validate_upgrade(&head(VALID)).unwrap();

        // Assert
        assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }

    #[test]
    fn test_upgrade_value_is_case_insensitive() {
        let text = VALID.replace("Upgrade: websocket", "Upgrade: WebSocket");
        assert!(validate_upgrade(&head(&text)).is_ok());
    }

    #[test]
    fn test_connection_may_list_several_tokens() {
        let text = VALID.replace("Connection: Upgrade", "Connection: keep-alive, Upgrade");
        assert!(validate_upgrade(&head(&text)).is_ok());
    }

    #[test]
    fn test_missing_key_is_rejected() {
        let text = VALID.replace("Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n", "");
        assert_eq!(
            validate_upgrade(&head(&text)),
            Err(HandshakeError::MissingKey)
        );
    }

    #[test]
    fn test_wrong_upgrade_is_rejected() {
        let text = VALID.replace("Upgrade: websocket", "Upgrade: h2c");
        assert_eq!(
            validate_upgrade(&head(&text)),
            Err(HandshakeError::BadUpgrade(Some("h2c".to_string())))
        );
    }

    #[test]
    fn test_connection_without_upgrade_is_rejected() {
        let text = VALID.replace("Connection: Upgrade", "Connection: keep-alive");
        assert!(matches!(
            validate_upgrade(&head(&text)),
            Err(HandshakeError::BadConnection(_))
        ));
    }

    #[test]
    fn test_plain_get_is_rejected() {
        let result = validate_upgrade(&head("GET /ws HTTP/1.1\r\nHost: x\r\n\r\n"));
        assert!(result.is_err());
    }

    #[test]
    fn test_switching_protocols_bytes() {
        let bytes = switching_protocols("s3pPLMBiTxaQ9kYGzzhZRbK+xOo=").to_bytes();
        assert_eq!(
            bytes,
            b"HTTP/1.1 101 Switching Protocols\r\n\
              Upgrade: websocket\r\n\
              Connection: Upgrade\r\n\
              Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n\r\n"
        );
    }
}
