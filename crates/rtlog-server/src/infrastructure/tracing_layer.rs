//! Forwards `tracing` events to connected browsers.
//!
//! [`BroadcastLayer`] plugs into a `tracing_subscriber` registry next to the
//! usual fmt layer, so an application that already logs with `info!` /
//! `warn!` / `error!` gets a live web view without changing its call sites:
//!
//! ```rust,no_run
//! use rtlog_server::{BroadcastLayer, Server, ServerConfig};
//! use tracing_subscriber::prelude::*;
//!
//! let server = Server::new(ServerConfig::default());
//! tracing_subscriber::registry()
//!     .with(tracing_subscriber::fmt::layer())
//!     .with(BroadcastLayer::new(server.emitter()))
//!     .init();
//! ```
//!
//! | tracing level          | log level  |
//! |------------------------|------------|
//! | `ERROR`                | `error`    |
//! | `WARN`                 | `warning`  |
//! | `INFO` (and below)     | `info`     |
//!
//! Events from this crate and from `rtlog_core` are skipped: forwarding the
//! server's own "websocket connected" lines would feed back into itself.

use std::fmt::{self, Write as _};

use rtlog_core::LogLevel;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::infrastructure::broadcast::LogEmitter;

const INTERNAL_TARGETS: [&str; 2] = ["rtlog_server", "rtlog_core"];

/// A `tracing` layer that emits every event through a [`LogEmitter`].
#[derive(Debug, Clone)]
pub struct BroadcastLayer {
    emitter: LogEmitter,
    max_level: Level,
}

impl BroadcastLayer {
    /// Forwards `INFO` and more severe events.
    pub fn new(emitter: LogEmitter) -> Self {
        Self {
            emitter,
            max_level: Level::INFO,
        }
    }

    /// Changes the most verbose level forwarded (e.g. `Level::DEBUG`).
    pub fn with_max_level(mut self, level: Level) -> Self {
        self.max_level = level;
        self
    }
}

impl<S: Subscriber> Layer<S> for BroadcastLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        // In `tracing`, more verbose levels compare greater.
        if *meta.level() > self.max_level || is_internal(meta.target()) {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        self.emitter.emit(level_for(meta.level()), visitor.finish());
    }
}

fn is_internal(target: &str) -> bool {
    INTERNAL_TARGETS.iter().any(|prefix| {
        target == *prefix || target.strip_prefix(prefix).is_some_and(|rest| rest.starts_with("::"))
    })
}

fn level_for(level: &Level) -> LogLevel {
    match *level {
        Level::ERROR => LogLevel::Error,
        Level::WARN => LogLevel::Warning,
        _ => LogLevel::Info,
    }
}

/// Collects the `message` field plus any other fields as `key=value`.
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl MessageVisitor {
    fn finish(self) -> String {
        match (self.message.is_empty(), self.fields.is_empty()) {
            (_, true) => self.message,
            (true, false) => self.fields,
            (false, false) => format!("{} {}", self.message, self.fields),
        }
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            self.record_debug(field, &value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
            return;
        }
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
        let _ = write!(self.fields, "{}={value:?}", field.name());
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use tracing_subscriber::prelude::*;

    fn capture(layer: BroadcastLayer, f: impl FnOnce()) {
        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, f);
    }

    #[test]
    fn test_levels_are_mapped() {
        // Arrange
        let emitter = LogEmitter::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        emitter.connect(tx);

        // Act
        capture(BroadcastLayer::new(emitter), || {
            tracing::error!(target: "app", "disk full");
            tracing::warn!(target: "app", "slow request");
            tracing::info!(target: "app", "started");
            tracing::debug!(target: "app", "not forwarded");
        });

        // Assert
        let got: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| (e.level, e.message))
            .collect();
        assert_eq!(
            got,
            vec![
                (LogLevel::Error, "disk full".to_string()),
                (LogLevel::Warning, "slow request".to_string()),
                (LogLevel::Info, "started".to_string()),
            ]
        );
    }

    #[test]
    fn test_fields_are_appended() {
        let emitter = LogEmitter::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        emitter.connect(tx);

        capture(BroadcastLayer::new(emitter), || {
            tracing::info!(target: "app", user = "ana", attempts = 3, "login");
        });

        let event = rx.try_recv().unwrap();
        assert_eq!(event.message, "login user=\"ana\" attempts=3");
    }

    #[test]
    fn test_internal_targets_are_skipped() {
        let emitter = LogEmitter::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        emitter.connect(tx);

        capture(BroadcastLayer::new(emitter), || {
            tracing::info!(target: "rtlog_server::infrastructure::connection", "internal");
            tracing::info!(target: "rtlog_core", "internal");
            tracing::info!(target: "rtlog_serverless", "external");
        });

        let event = rx.try_recv().unwrap();
        assert_eq!(event.message, "external");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_max_level_can_include_debug() {
        let emitter = LogEmitter::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        emitter.connect(tx);

        capture(
            BroadcastLayer::new(emitter).with_max_level(Level::DEBUG),
            || tracing::debug!(target: "app", "verbose"),
        );

        assert_eq!(rx.try_recv().unwrap().level, LogLevel::Info);
    }
}
