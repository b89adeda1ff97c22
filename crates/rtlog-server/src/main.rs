//! Realtime log server: demo host binary.
//!
//! Starts the embeddable server on its own so the viewer can be tried without
//! writing a host application.  Every line typed on stdin becomes an `info`
//! event, `--demo-interval` adds a stream of sample events, and anything the
//! process logs through `tracing` is forwarded too.
//!
//! # Usage
//!
//! ```text
//! rtlog-server [OPTIONS]
//!
//! Options:
//!   --port          <PORT>  Listening port [default: 8080]
//!   --bind          <IP>    Interface to bind [default: 0.0.0.0]
//!   --assets        <DIR>   Viewer bundle directory [default: web]
//!   --config        <FILE>  TOML config file (CLI flags win)
//!   --demo-interval <SECS>  Emit a sample event every SECS seconds
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable        | Flag         |
//! |-----------------|--------------|
//! | `RTLOG_PORT`    | `--port`     |
//! | `RTLOG_BIND`    | `--bind`     |
//! | `RTLOG_ASSETS`  | `--assets`   |
//! | `RTLOG_CONFIG`  | `--config`   |
//!
//! CLI args take precedence when both are present.  Log verbosity is set
//! with `RUST_LOG` (default `info`).

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use rtlog_server::{BroadcastLayer, LogEmitter, LogLevel, Server, ServerConfig};

/// Sample events cycled through by `--demo-interval`.
const DEMO_EVENTS: [(LogLevel, &str); 6] = [
    (LogLevel::Info, "user signed in"),
    (LogLevel::Info, "cache refreshed"),
    (LogLevel::Warning, "request took longer than 500 ms"),
    (LogLevel::Info, "background sync finished"),
    (LogLevel::Error, "failed to reach update server"),
    (LogLevel::Warning, "disk usage above 80%"),
];

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Streams log events to browsers on the local network.
#[derive(Debug, Parser)]
#[command(
    name = "rtlog-server",
    about = "Embeddable HTTP + WebSocket server that streams log events to a browser",
    version
)]
struct Cli {
    /// TCP port for both the viewer page and the WebSocket endpoint.
    #[arg(long, env = "RTLOG_PORT")]
    port: Option<u16>,

    /// IP address to bind.
    ///
    /// `0.0.0.0` makes the viewer reachable from other machines on the LAN;
    /// `127.0.0.1` keeps it local.
    #[arg(long, env = "RTLOG_BIND")]
    bind: Option<IpAddr>,

    /// Directory holding `index.html` and the rest of the viewer bundle.
    #[arg(long, env = "RTLOG_ASSETS")]
    assets: Option<PathBuf>,

    /// TOML file with a `ServerConfig`; flags above override its values.
    #[arg(long, env = "RTLOG_CONFIG")]
    config: Option<PathBuf>,

    /// Emit a sample event every this many seconds.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    demo_interval: Option<u64>,
}

impl Cli {
    /// Builds the server configuration: file (if any), then flag overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if `--config` names a file that cannot be read or
    /// parsed.
    fn server_config(&self) -> anyhow::Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => ServerConfig::default(),
        };
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(bind) = self.bind {
            config.bind_addr = bind;
        }
        if let Some(assets) = &self.assets {
            config.asset_root = assets.clone();
        }
        Ok(config)
    }

    fn demo_interval(&self) -> Option<Duration> {
        self.demo_interval.map(Duration::from_secs)
    }
}

// ── Event sources ─────────────────────────────────────────────────────────────

/// Forwards each stdin line as an `info` event until stdin closes.
async fn forward_stdin(emitter: LogEmitter) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => {}
            Ok(Some(line)) => emitter.emit(LogLevel::Info, line),
            Ok(None) => break,
            Err(e) => {
                warn!("stopped reading stdin: {e}");
                break;
            }
        }
    }
}

/// Emits the sample events in a loop.
async fn run_demo(emitter: LogEmitter, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    for (level, message) in DEMO_EVENTS.iter().cycle() {
        ticker.tick().await;
        emitter.emit(*level, *message);
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// # What happens at startup
///
/// 1. CLI arguments are parsed and merged with the optional config file.
/// 2. `tracing_subscriber` is initialised with an `EnvFilter` (`RUST_LOG`)
///    and the [`BroadcastLayer`], so this process's own log lines also reach
///    the browser.
/// 3. The server binds and starts accepting.
/// 4. stdin forwarding and the optional demo stream start.
/// 5. Ctrl+C stops the server and exits.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.server_config()?;

    let mut server = Server::new(config);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .with(BroadcastLayer::new(server.emitter()))
        .init();

    let addr = server
        .start_default()
        .await
        .context("starting log server")?;
    info!(
        "serving {} on {addr}; type lines to send them to the viewer",
        server.config().asset_root.display()
    );

    tokio::spawn(forward_stdin(server.emitter()));
    if let Some(every) = cli.demo_interval() {
        tokio::spawn(run_demo(server.emitter(), every));
    }

    tokio::signal::ctrl_c()
        .await
        .context("listening for Ctrl+C")?;
    info!("received Ctrl+C, shutting down");
    server.stop();
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
