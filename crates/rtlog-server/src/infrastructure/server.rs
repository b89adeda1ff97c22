//! The host-facing server handle.
//!
//! [`Server`] ties the pieces together: it binds the listener, starts the
//! accept loop and the broadcast pipeline, and owns the connection registry
//! for as long as it runs.
//!
//! ```rust,no_run
//! use rtlog_core::LogLevel;
//! use rtlog_server::{Server, ServerConfig};
//!
//! # async fn demo() -> Result<(), rtlog_server::ServerError> {
//! let mut server = Server::new(ServerConfig::default());
//! let addr = server.start(8080).await?;
//! println!("open http://{addr}/ in a browser");
//!
//! server.emit(LogLevel::Info, "hello from the host");
//! server.stop();
//! # Ok(())
//! # }
//! ```
//!
//! # Lifecycle
//!
//! - `start` while running replaces the running instance: the old one is
//!   stopped first, then the new port is bound.
//! - `stop` is synchronous and idempotent.  It unhooks the emitter, stops
//!   accepting and force-closes every connection.
//! - Dropping the server stops it.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use rtlog_core::LogLevel;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::application::static_responder::{AssetSource, StaticResponder};
use crate::domain::config::ServerConfig;
use crate::infrastructure::broadcast::{spawn_pipeline, LogEmitter};
use crate::infrastructure::connection::ConnectionContext;
use crate::infrastructure::fs_assets::FsAssets;
use crate::infrastructure::listener::spawn_accept_loop;
use crate::infrastructure::registry::ConnectionRegistry;

/// Errors returned by [`Server::start`].
#[derive(Debug, Error)]
pub enum ServerError {
    /// Port 0 would bind an ephemeral port the viewer could not guess.
    #[error("invalid port {0}: must be between 1 and 65535")]
    InvalidPort(u16),

    /// The listener could not be bound (port in use, permission denied...).
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
}

/// Handles of one started instance.
struct Running {
    local_addr: SocketAddr,
    registry: Arc<ConnectionRegistry>,
    accept_task: JoinHandle<()>,
    pipeline_task: JoinHandle<()>,
}

/// An embeddable realtime log server.
pub struct Server {
    config: ServerConfig,
    assets: Arc<dyn AssetSource>,
    emitter: LogEmitter,
    running: Option<Running>,
    /// Accept task of the previous instance; awaited before rebinding so its
    /// listening socket is closed.
    stopping: Option<JoinHandle<()>>,
}

impl Server {
    /// Creates a stopped server that serves assets from `config.asset_root`.
    pub fn new(config: ServerConfig) -> Self {
        let assets = Arc::new(FsAssets::new(config.asset_root.clone()));
        Self::with_assets(config, assets)
    }

    /// Creates a stopped server with a custom asset source.
    pub fn with_assets(config: ServerConfig, assets: Arc<dyn AssetSource>) -> Self {
        Self {
            config,
            assets,
            emitter: LogEmitter::new(),
            running: None,
            stopping: None,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Starts listening on `port` of the configured interface.
    ///
    /// Returns the bound address.  If the server is already running it is
    /// stopped first, whatever the outcome of the new bind.
    ///
    /// # Errors
    ///
    /// - [`ServerError::InvalidPort`] for port 0.
    /// - [`ServerError::Bind`] when the listener cannot be bound.
    pub async fn start(&mut self, port: u16) -> Result<SocketAddr, ServerError> {
        if self.running.is_some() {
            info!("server already running; restarting on port {port}");
            self.stop();
        }
        if let Some(previous) = self.stopping.take() {
            // Resolves once the aborted accept task has dropped its listener.
            let _ = previous.await;
        }

        if port == 0 {
            error!("refusing to start: port 0 is not a valid listening port");
            return Err(ServerError::InvalidPort(port));
        }

        let addr = self.config.socket_addr(port);
        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(source) => {
                error!("failed to bind {addr}: {source}");
                return Err(ServerError::Bind { addr, source });
            }
        };
        let local_addr = listener.local_addr().unwrap_or(addr);

        let registry = Arc::new(ConnectionRegistry::new());
        let ctx = Arc::new(ConnectionContext::new(
            &self.config,
            Arc::clone(&registry),
            StaticResponder::new(Arc::clone(&self.assets)),
        ));
        let accept_task = spawn_accept_loop(listener, ctx);

        let (tx, rx) = mpsc::unbounded_channel();
        let pipeline_task = spawn_pipeline(rx, Arc::clone(&registry));
        self.emitter.connect(tx);

        info!("log server listening on http://{local_addr}/");
        self.running = Some(Running {
            local_addr,
            registry,
            accept_task,
            pipeline_task,
        });
        Ok(local_addr)
    }

    /// Starts on the configured port.
    pub async fn start_default(&mut self) -> Result<SocketAddr, ServerError> {
        self.start(self.config.port).await
    }

    /// Stops accepting, drops pending events and closes every connection.
    /// Does nothing when not running.
    pub fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        self.emitter.disconnect();
        running.accept_task.abort();
        running.pipeline_task.abort();
        let closed = running.registry.shutdown_all();
        self.stopping = Some(running.accept_task);
        info!(
            "log server on {} stopped; closed {closed} connection(s)",
            running.local_addr
        );
    }

    /// Broadcasts a log event to every connected viewer.  A no-op while
    /// stopped.
    pub fn emit(&self, level: LogLevel, message: impl Into<String>) {
        self.emitter.emit(level, message);
    }

    /// A handle for emitting from elsewhere; stays valid across restarts.
    pub fn emitter(&self) -> LogEmitter {
        self.emitter.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Address bound by the running instance.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|r| r.local_addr)
    }

    /// Open connections, plain and upgraded.
    pub fn connection_count(&self) -> usize {
        self.running.as_ref().map_or(0, |r| r.registry.len())
    }

    /// Upgraded (viewer) connections.
    pub fn websocket_count(&self) -> usize {
        self.running.as_ref().map_or(0, |r| r.registry.websocket_count())
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.stop();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::static_responder::MemoryAssets;
    use std::net::{IpAddr, Ipv4Addr};

    fn server() -> Server {
        let config = ServerConfig {
            bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            ..ServerConfig::default()
        };
        Server::with_assets(config, Arc::new(MemoryAssets::new()))
    }

    fn free_port() -> u16 {
        let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        probe.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn test_port_zero_is_rejected() {
        let mut s = server();
        let err = s.start(0).await.unwrap_err();
        assert!(matches!(err, ServerError::InvalidPort(0)));
        assert!(!s.is_running());
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        // Arrange
        let mut s = server();
        let port = free_port();

        // Act
        let addr = s.start(port).await.unwrap();

        // Assert
        assert_eq!(addr.port(), port);
        assert!(s.is_running());
        assert_eq!(s.local_addr(), Some(addr));
        assert!(s.emitter().is_connected());

        s.stop();
        assert!(!s.is_running());
        assert_eq!(s.connection_count(), 0);
        assert!(!s.emitter().is_connected());
    }

    #[tokio::test]
    async fn test_stop_twice_is_noop() {
        let mut s = server();
        s.start(free_port()).await.unwrap();
        s.stop();
        s.stop();
        assert!(!s.is_running());
    }

    #[tokio::test]
    async fn test_restart_on_same_port() {
        let mut s = server();
        let port = free_port();
        s.start(port).await.unwrap();

        let addr = s.start(port).await.unwrap();

        assert_eq!(addr.port(), port);
        assert!(s.is_running());
    }

    #[tokio::test]
    async fn test_bind_conflict_is_reported() {
        // Arrange: another socket holds the port
        let holder = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = holder.local_addr().unwrap().port();
        let mut s = server();

        // Act
        let err = s.start(port).await.unwrap_err();

        // Assert
        assert!(matches!(err, ServerError::Bind { .. }));
        assert!(!s.is_running());
    }

    #[test]
    fn test_emit_while_stopped_is_noop() {
        let s = server();
        s.emit(LogLevel::Info, "dropped");
        assert_eq!(s.websocket_count(), 0);
    }
}
