//! Per-connection queue of outbound log frames with byte accounting.
//!
//! The broadcast pipeline never writes to sockets itself.  It pushes each
//! encoded frame onto the queue of every upgraded connection, and the
//! connection's own task writes it out between reads.
//!
//! A browser that stops reading (backgrounded tab, dead Wi-Fi) would make the
//! queue grow forever, so the sender tracks how many bytes are queued but not
//! yet written.  A push that would take the backlog past the limit fails with
//! [`PushError::Full`] and the pipeline evicts that peer instead: the sender
//! is marked with [`OutboundSender::evict`] and dropped, and the connection
//! closes itself the next time it looks at its queue.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;

/// An encoded frame shared by every connection it is broadcast to.
pub type SharedFrame = Arc<[u8]>;

/// Why a frame could not be queued.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PushError {
    /// The backlog limit would be exceeded.
    #[error("outbound backlog limit reached")]
    Full,
    /// The connection's task has ended.
    #[error("connection closed")]
    Closed,
}

/// Creates a connected sender/receiver pair with a backlog limit in bytes.
pub fn outbound_queue(limit: usize) -> (OutboundSender, OutboundReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let pending = Arc::new(AtomicUsize::new(0));
    let evicted = Arc::new(AtomicBool::new(false));
    (
        OutboundSender {
            tx,
            pending: Arc::clone(&pending),
            evicted: Arc::clone(&evicted),
            limit,
        },
        OutboundReceiver { rx, pending, evicted },
    )
}

/// Producer half, held by the registry on behalf of the pipeline.
#[derive(Debug, Clone)]
pub struct OutboundSender {
    tx: mpsc::UnboundedSender<SharedFrame>,
    pending: Arc<AtomicUsize>,
    evicted: Arc<AtomicBool>,
    limit: usize,
}

impl OutboundSender {
    /// Queues `frame` unless that would push the backlog past the limit.
    ///
    /// An empty queue always accepts one frame, so a single event larger than
    /// the limit is still delivered to a reader that keeps up.
    pub fn push(&self, frame: SharedFrame) -> Result<(), PushError> {
        let len = frame.len();
        let before = self.pending.fetch_add(len, Ordering::AcqRel);
        if before > 0 && before + len > self.limit {
            self.pending.fetch_sub(len, Ordering::AcqRel);
            return Err(PushError::Full);
        }
        self.tx.send(frame).map_err(|_| {
            self.pending.fetch_sub(len, Ordering::AcqRel);
            PushError::Closed
        })
    }

    /// Bytes queued but not yet written.
    pub fn pending_bytes(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Tells the receiving connection it fell too far behind.  Queued frames
    /// are not written after this.
    pub fn evict(&self) {
        self.evicted.store(true, Ordering::Release);
    }
}

/// Consumer half, owned by the connection task.
#[derive(Debug)]
pub struct OutboundReceiver {
    rx: mpsc::UnboundedReceiver<SharedFrame>,
    pending: Arc<AtomicUsize>,
    evicted: Arc<AtomicBool>,
}

impl OutboundReceiver {
    /// Waits for the next frame.  `None` once every sender is gone, which
    /// means the registry has dropped this connection.
    ///
    /// Cancel-safe: dropping the future never loses a frame.
    pub async fn recv(&mut self) -> Option<SharedFrame> {
        self.rx.recv().await
    }

    /// Marks `len` bytes as written.
    pub fn complete(&self, len: usize) {
        self.pending.fetch_sub(len, Ordering::AcqRel);
    }

    /// Whether the pipeline gave up on this connection.
    pub fn is_evicted(&self) -> bool {
        self.evicted.load(Ordering::Acquire)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(len: usize) -> SharedFrame {
        vec![0u8; len].into()
    }

    #[tokio::test]
    async fn test_push_and_receive_tracks_pending_bytes() {
        // Arrange
        let (tx, mut rx) = outbound_queue(1000);

        // Act
        tx.push(frame(100)).unwrap();
        tx.push(frame(50)).unwrap();

        // Assert
        assert_eq!(tx.pending_bytes(), 150);
        let first = rx.recv().await.unwrap();
        rx.complete(first.len());
        assert_eq!(tx.pending_bytes(), 50);
    }

    #[test]
    fn test_push_beyond_limit_is_full() {
        let (tx, _rx) = outbound_queue(100);
        tx.push(frame(60)).unwrap();
        assert_eq!(tx.push(frame(60)), Err(PushError::Full));
        // The rejected frame is not counted.
        assert_eq!(tx.pending_bytes(), 60);
    }

    #[test]
    fn test_empty_queue_accepts_oversized_frame() {
        let (tx, _rx) = outbound_queue(10);
        assert_eq!(tx.push(frame(500)), Ok(()));
        assert_eq!(tx.push(frame(1)), Err(PushError::Full));
    }

    #[test]
    fn test_push_after_receiver_dropped_is_closed() {
        let (tx, rx) = outbound_queue(100);
        drop(rx);
        assert_eq!(tx.push(frame(1)), Err(PushError::Closed));
        assert_eq!(tx.pending_bytes(), 0);
    }

    #[tokio::test]
    async fn test_recv_returns_none_when_senders_dropped() {
        let (tx, mut rx) = outbound_queue(100);
        drop(tx);
        assert!(rx.recv().await.is_none());
        assert!(!rx.is_evicted());
    }

    #[tokio::test]
    async fn test_evict_is_visible_to_receiver() {
        // Arrange
        let (tx, mut rx) = outbound_queue(100);
        tx.push(frame(10)).unwrap();

        // Act
        tx.evict();
        drop(tx);

        // Assert: the backlog is still there, but flagged
        assert!(rx.is_evicted());
        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_none());
    }
}
