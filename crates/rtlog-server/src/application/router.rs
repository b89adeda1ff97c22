//! Request classification and admission control.
//!
//! Given a complete request head, [`route`] decides what kind of answer it
//! gets.  The decision is pure; producing a static response (which may touch
//! the disk) is left to the caller.
//!
//! ```text
//! head ──parse──► malformed ──────────────► Respond(400)
//!          │
//!          ├─ GET /ws ──validate──► ok ───► Upgrade(101)
//!          │                └────► fail ─► Respond(400)
//!          │
//!          └─ anything else ──────────────► Static { method, path }
//! ```

use rtlog_core::protocol::handshake::{switching_protocols, validate_upgrade};
use rtlog_core::protocol::http::{HttpResponse, RequestHead};
use tracing::debug;

/// Path that carries the WebSocket upgrade.
pub const WEBSOCKET_PATH: &str = "/ws";

/// The outcome of routing one request head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Answer immediately; the connection stays plain.
    Respond(HttpResponse),
    /// Send this `101` and switch the connection to WebSocket.
    Upgrade(HttpResponse),
    /// Serve a file from the asset bundle.
    Static { method: String, path: String },
}

/// Classifies a raw request head.
pub fn route(head: &[u8]) -> Route {
    let request = match RequestHead::parse(head) {
        Ok(r) => r,
        Err(e) => {
            debug!("rejecting request: {e}");
            return Route::Respond(HttpResponse::bad_request());
        }
    };

    if request.method == "GET" && request.path == WEBSOCKET_PATH {
        return match validate_upgrade(&request) {
            Ok(accept) => Route::Upgrade(switching_protocols(&accept)),
            Err(e) => {
                debug!("rejecting upgrade: {e}");
                Route::Respond(HttpResponse::bad_request())
            }
        };
    }

    Route::Static {
        method: request.method,
        path: request.path,
    }
}

/// Per-connection request limit.
///
/// Each request on a plain connection is counted *before* it is dispatched;
/// once the count exceeds the limit the connection is closed unanswered.
/// This is the only backpressure against a client that keeps one connection
/// busy forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionControl {
    limit: u32,
}

impl AdmissionControl {
    pub fn new(limit: u32) -> Self {
        Self { limit }
    }

    /// Increments `counter` and reports whether the request may be served.
    pub fn admit(&self, counter: &mut u32) -> bool {
        *counter = counter.saturating_add(1);
        *counter <= self.limit
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
