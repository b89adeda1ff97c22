//! The HTTP/1.1 subset spoken by the log server.
//!
//! Only request heads are understood (request line + header lines, ending in
//! a blank line).  Request bodies, chunked transfer and multi-line headers are
//! not supported: the browser only ever issues `GET`/`OPTIONS` for the static
//! bundle and one `GET /ws` upgrade.
//!
//! # Request head layout
//!
//! ```text
//! GET /index.html HTTP/1.1\r\n      ← request line: method SP path SP version
//! Host: 192.168.1.20:8080\r\n        ← header lines: name ":" value
//! \r\n                               ← terminator
//! ```

use std::fmt::Write as _;

use thiserror::Error;

/// The blank line that ends every request head.
pub const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Errors produced while parsing a request head.
///
/// Every variant is answered with `400 Bad Request`; none of them closes the
/// connection on its own.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    /// The head contained bytes that are not valid UTF-8.
    #[error("request head is not valid UTF-8")]
    NotUtf8,

    /// The first line of the head was empty.
    #[error("missing request line")]
    MissingRequestLine,

    /// The request line had fewer than two space-separated tokens.
    #[error("malformed request line: {0:?}")]
    MalformedRequestLine(String),
}

// ── Header terminator search ──────────────────────────────────────────────────

/// Returns the length of the request head (terminator included) if `buf`
/// contains a complete one.
///
/// Bytes after the returned offset belong to whatever the peer sent next: a
/// pipelined request, or the first WebSocket frame after an upgrade.
///
/// # Examples
///
/// ```rust
/// use rtlog_core::protocol::http::find_header_end;
///
/// assert_eq!(find_header_end(b"GET / HTTP/1.1\r\n\r\nextra"), Some(18));
/// assert_eq!(find_header_end(b"GET / HTTP/1.1\r\n"), None);
/// ```
pub fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(HEADER_TERMINATOR.len())
        .position(|w| w == HEADER_TERMINATOR)
        .map(|pos| pos + HEADER_TERMINATOR.len())
}

// ── Request head ──────────────────────────────────────────────────────────────

/// A parsed request head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    /// Request method exactly as sent (`GET`, `OPTIONS`, ...).
    pub method: String,
    /// Request target exactly as sent, before any normalisation.
    pub path: String,
    /// The full head as text, kept for header inspection by the handshake
    /// validator.
    pub raw: String,
}

impl RequestHead {
    /// Parses the request line of `head`.
    ///
    /// Header lines are not validated here; they are only looked at when a
    /// request turns out to be a WebSocket upgrade (see
    /// [`crate::protocol::handshake`]).
    ///
    /// # Errors
    ///
    /// Returns [`RequestError`] for non-UTF-8 input or a missing/malformed
    /// request line.
    pub fn parse(head: &[u8]) -> Result<Self, RequestError> {
        let raw = std::str::from_utf8(head).map_err(|_| RequestError::NotUtf8)?;

        let first_line = raw.split("\r\n").next().unwrap_or_default();
        if first_line.trim().is_empty() {
            return Err(RequestError::MissingRequestLine);
        }

        let mut tokens = first_line.split_whitespace();
        match (tokens.next(), tokens.next()) {
            (Some(method), Some(path)) => Ok(Self {
                method: method.to_string(),
                path: path.to_string(),
                raw: raw.to_string(),
            }),
            _ => Err(RequestError::MalformedRequestLine(first_line.to_string())),
        }
    }

    /// Iterates over the header lines as `(name, value)` pairs.
    ///
    /// Each line is split on its *first* colon and both halves are trimmed.
    /// Lines without a colon (including the request line) are skipped.
    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.raw
            .split("\r\n")
            .skip(1)
            .filter_map(|line| line.split_once(':'))
            .map(|(name, value)| (name.trim(), value.trim()))
    }

    /// Returns the value of the last header named `name` (ASCII
    /// case-insensitive), matching "later lines win" map semantics.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
            .last()
    }
}

// ── Status codes ──────────────────────────────────────────────────────────────

/// Every status code the server can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    SwitchingProtocols,
    Ok,
    NoContent,
    BadRequest,
    NotFound,
    InternalServerError,
}

impl StatusCode {
    /// Numeric code.
    pub fn code(self) -> u16 {
        match self {
            StatusCode::SwitchingProtocols => 101,
            StatusCode::Ok => 200,
            StatusCode::NoContent => 204,
            StatusCode::BadRequest => 400,
            StatusCode::NotFound => 404,
            StatusCode::InternalServerError => 500,
        }
    }

    /// Canonical reason phrase.
    pub fn reason(self) -> &'static str {
        match self {
            StatusCode::SwitchingProtocols => "Switching Protocols",
            StatusCode::Ok => "OK",
            StatusCode::NoContent => "No Content",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::NotFound => "Not Found",
            StatusCode::InternalServerError => "Internal Server Error",
        }
    }
}

// ── Response ──────────────────────────────────────────────────────────────────

/// A response ready to be serialized onto the wire.
///
/// Headers are kept in insertion order so the serialized bytes are
/// reproducible, which lets tests compare whole responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl HttpResponse {
    /// A response with no headers and no body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: None,
        }
    }

    /// Appends a header (builder-style).
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the body (builder-style).  Does not add `Content-Length`.
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    /// A `text/plain` response whose body is the status reason phrase.
    ///
    /// `Content-Length` is always present so keep-alive clients know where
    /// the body ends.
    pub fn plain(status: StatusCode) -> Self {
        let body = status.reason().as_bytes().to_vec();
        Self::new(status)
            .with_header("Content-Type", "text/plain")
            .with_header("Content-Length", body.len().to_string())
            .with_body(body)
    }

    /// `400 Bad Request`.
    pub fn bad_request() -> Self {
        Self::plain(StatusCode::BadRequest)
    }

    /// `404 Not Found`.
    pub fn not_found() -> Self {
        Self::plain(StatusCode::NotFound)
    }

    /// `500 Internal Server Error`.
    pub fn internal_error() -> Self {
        Self::plain(StatusCode::InternalServerError)
    }

    /// Returns the first header named `name` (ASCII case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Serializes the status line, headers, blank line and body.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use rtlog_core::protocol::http::{HttpResponse, StatusCode};
    ///
    /// let bytes = HttpResponse::new(StatusCode::NoContent)
    ///     .with_header("Connection", "keep-alive")
    ///     .to_bytes();
    /// assert_eq!(bytes, b"HTTP/1.1 204 No Content\r\nConnection: keep-alive\r\n\r\n");
    /// ```
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut head = String::with_capacity(128);
        // Writing into a String cannot fail.
        let _ = write!(
            head,
            "HTTP/1.1 {} {}\r\n",
            self.status.code(),
            self.status.reason()
        );
        for (name, value) in &self.headers {
            let _ = write!(head, "{name}: {value}\r\n");
        }
        head.push_str("\r\n");

        let mut out = head.into_bytes();
        if let Some(body) = &self.body {
            out.extend_from_slice(body);
        }
        out
    }
}

// ── Content types ─────────────────────────────────────────────────────────────

/// Maps a request path to its `Content-Type` purely by file extension.
///
/// | Extension       | Content-Type                              |
/// |-----------------|-------------------------------------------|
/// | `.html`         | `text/html; charset=utf-8`                |
/// | `.css`          | `text/css; charset=utf-8`                 |
/// | `.js`           | `application/javascript; charset=utf-8`   |
/// | `.jpg`, `.jpeg` | `image/jpeg`                              |
/// | `.png`          | `image/png`                               |
/// | anything else   | `application/octet-stream`                |
pub fn content_type_for(path: &str) -> &'static str {
    if path.ends_with(".html") {
        "text/html; charset=utf-8"
    } else if path.ends_with(".css") {
        "text/css; charset=utf-8"
    } else if path.ends_with(".js") {
        "application/javascript; charset=utf-8"
    } else if path.ends_with(".jpg") || path.ends_with(".jpeg") {
        "image/jpeg"
    } else if path.ends_with(".png") {
        "image/png"
    } else {
        "application/octet-stream"
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
