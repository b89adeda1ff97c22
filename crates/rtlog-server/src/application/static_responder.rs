//! Static file responses for the viewer bundle.
//!
//! The responder knows nothing about where the bytes come from: it asks an
//! [`AssetSource`] for a path and turns the answer into a response.
//!
//! | Asset lookup            | Response                                   |
//! |-------------------------|--------------------------------------------|
//! | found, method `OPTIONS` | `204 No Content`, full headers, no body    |
//! | found, other method     | `200 OK`, full headers, file bytes         |
//! | not found               | `404 Not Found`                            |
//! | read error              | `500 Internal Server Error`                |

use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use rtlog_core::protocol::http::{content_type_for, HttpResponse, StatusCode};
use tracing::warn;

/// Byte-addressable lookup of bundle files by request path.
///
/// Paths passed to [`AssetSource::load`] are already normalised: they start
/// with `/`, carry no query string and contain no `..` segment.
#[cfg_attr(test, mockall::automock)]
pub trait AssetSource: Send + Sync {
    /// Returns `Ok(None)` when there is no file at `path`.
    ///
    /// # Errors
    ///
    /// Any other failure to read an existing entry.
    fn load(&self, path: &str) -> io::Result<Option<Vec<u8>>>;
}

/// An in-memory bundle, for hosts that embed their viewer with
/// `include_bytes!` and for tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryAssets {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file (builder-style).  `path` must start with `/`.
    pub fn with_file(mut self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.files.insert(path.into(), bytes.into());
        self
    }
}

impl AssetSource for MemoryAssets {
    fn load(&self, path: &str) -> io::Result<Option<Vec<u8>>> {
        Ok(self.files.get(path).cloned())
    }
}

/// Normalises a request target into an asset path.
///
/// - Drops any `?query` or `#fragment` suffix.
/// - Rewrites `/` to `/index.html`.
/// - Rejects targets that do not start with `/` or contain a `..` segment,
///   so a request can never escape the asset root.
///
/// # Examples
///
/// ```rust
/// use rtlog_server::application::static_responder::normalize_path;
///
/// assert_eq!(normalize_path("/").as_deref(), Some("/index.html"));
/// assert_eq!(normalize_path("/app.js?v=3").as_deref(), Some("/app.js"));
/// assert_eq!(normalize_path("/../etc/passwd"), None);
/// ```
pub fn normalize_path(target: &str) -> Option<String> {
    let path = target
        .split(['?', '#'])
        .next()
        .unwrap_or_default();

    if !path.starts_with('/') || path.split('/').any(|segment| segment == "..") {
        return None;
    }

    if path == "/" {
        Some("/index.html".to_string())
    } else {
        Some(path.to_string())
    }
}

/// Turns asset lookups into HTTP responses.
#[derive(Clone)]
pub struct StaticResponder {
    assets: Arc<dyn AssetSource>,
}

impl StaticResponder {
    pub fn new(assets: Arc<dyn AssetSource>) -> Self {
        Self { assets }
    }

    /// Builds the response for `method` on request target `target`.
    ///
    /// This may read from disk, so async callers should run it on a blocking
    /// thread.
    pub fn respond(&self, method: &str, target: &str) -> HttpResponse {
        let Some(path) = normalize_path(target) else {
            return HttpResponse::not_found();
        };

        let body = match self.assets.load(&path) {
            Ok(Some(body)) => body,
            Ok(None) => return HttpResponse::not_found(),
            Err(e) => {
                warn!("failed to read asset {path}: {e}");
                return HttpResponse::internal_error();
            }
        };

        let status = if method == "OPTIONS" {
            StatusCode::NoContent
        } else {
            StatusCode::Ok
        };

        let response = HttpResponse::new(status)
            .with_header("Content-Type", content_type_for(&path))
            .with_header("Access-Control-Allow-Origin", "*")
            .with_header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
            .with_header("Access-Control-Allow-Headers", "Content-Type")
            .with_header("Access-Control-Max-Age", "86400")
            .with_header("Connection", "keep-alive")
            .with_header("Keep-Alive", "timeout=5, max=1000")
            .with_header("Content-Length", body.len().to_string());

        match status {
            StatusCode::NoContent => response,
            _ => response.with_body(body),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
