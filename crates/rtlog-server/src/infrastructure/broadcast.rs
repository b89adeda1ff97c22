//! The log pipeline: from `emit` to every connected browser.
//!
//! ```text
//!  host threads              pipeline task                 connection tasks
//!  ────────────              ─────────────                 ────────────────
//!  LogEmitter::emit ──mpsc──► serialize + frame once ──┬──► OutboundQueue ─► socket
//!                                                      ├──► OutboundQueue ─► socket
//!                                                      └──► ...
//! ```
//!
//! `emit` never blocks: it stamps the event and hands it to an unbounded
//! channel.  The pipeline task serializes each event to JSON and wraps it in a
//! text frame exactly once, then shares the bytes with every upgraded
//! connection.  Event order is preserved per producer and, because there is a
//! single pipeline task, across all connections.
//!
//! A connection whose queue is over its backlog limit is evicted rather than
//! allowed to hold up memory for everyone else; it then closes itself with
//! [`CloseReason::SlowConsumer`](crate::domain::connection::CloseReason).

use std::sync::{Arc, PoisonError, RwLock};

use rtlog_core::{LogEvent, LogLevel};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, warn};

use crate::infrastructure::outbound::{PushError, SharedFrame};
use crate::infrastructure::registry::ConnectionRegistry;

/// A cheap, cloneable handle for emitting log events.
///
/// The handle outlives server restarts: while the server is stopped, events
/// are silently dropped, and once it starts again they flow to the new
/// instance.
#[derive(Debug, Clone, Default)]
pub struct LogEmitter {
    slot: Arc<RwLock<Option<mpsc::UnboundedSender<LogEvent>>>>,
}

impl LogEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamps `message` with the current time and queues it for broadcast.
    ///
    /// Callable from any thread, including synchronous code.
    pub fn emit(&self, level: LogLevel, message: impl Into<String>) {
        let slot = self.slot.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(tx) = slot.as_ref() {
            // A closed channel means the server is stopping; dropping is fine.
            let _ = tx.send(LogEvent::now(level, message));
        }
    }

    /// Whether a running server is attached.
    pub fn is_connected(&self) -> bool {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }

    pub(crate) fn connect(&self, tx: mpsc::UnboundedSender<LogEvent>) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = Some(tx);
    }

    pub(crate) fn disconnect(&self) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Spawns the pipeline task.  It ends when every sender is gone.
pub fn spawn_pipeline(
    rx: mpsc::UnboundedReceiver<LogEvent>,
    registry: Arc<ConnectionRegistry>,
) -> JoinHandle<()> {
    tokio::spawn(run_pipeline(rx, registry))
}

async fn run_pipeline(mut rx: mpsc::UnboundedReceiver<LogEvent>, registry: Arc<ConnectionRegistry>) {
    while let Some(event) = rx.recv().await {
        broadcast_event(&event, &registry);
    }
}

/// Frames `event` once and queues it on every upgraded connection.
///
/// Returns how many connections accepted the frame.
pub fn broadcast_event(event: &LogEvent, registry: &ConnectionRegistry) -> usize {
    let frame: SharedFrame = match event.to_frame() {
        Ok(frame) => frame.into(),
        Err(e) => {
            error!("failed to serialize log event: {e}");
            return 0;
        }
    };

    let mut delivered = 0;
    for (id, queue) in registry.websocket_queues() {
        match queue.push(Arc::clone(&frame)) {
            Ok(()) => delivered += 1,
            Err(PushError::Full) => {
                warn!(
                    "websocket {id}: {} bytes unsent, evicting slow consumer",
                    queue.pending_bytes()
                );
                registry.evict(id);
            }
            Err(PushError::Closed) => {
                registry.remove(id);
            }
        }
    }
    delivered
}

// ── Tests ─────────────────────────────────────────────────────────────────────
