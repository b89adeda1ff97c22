//! Server configuration types.
//!
//! [`ServerConfig`] is the single source of truth for all runtime settings.
//! It can be built from defaults (what an embedding host usually wants), from
//! a TOML file, or from CLI arguments in the bundled binary.
//!
//! # Design rationale
//!
//! Keeping configuration as a plain struct (no global state, no environment
//! variable reads inside the domain) makes the server easy to embed in a host
//! application and easy to start several instances of in tests.
//!
//! # TOML example
//!
//! ```toml
//! port = 8080
//! bind_addr = "0.0.0.0"
//! asset_root = "web"
//! max_requests_per_connection = 10
//! io_timeout_secs = 5
//! ```
//!
//! Every field is optional; missing fields take the defaults listed on
//! [`ServerConfig::default`].

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Default listening port.
pub const DEFAULT_PORT: u16 = 8080;

/// Requests a single plain-HTTP connection may make before it is closed.
pub const DEFAULT_MAX_REQUESTS_PER_CONNECTION: u32 = 10;

/// Upper bound for every individual read and write.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(5);

/// Largest request head accepted before the connection is dropped.
pub const DEFAULT_MAX_HEADER_BYTES: usize = 16 * 1024;

/// Largest amount of queued, not yet written log frames per browser.
pub const DEFAULT_MAX_PENDING_WRITE_BYTES: usize = 1024 * 1024;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// All runtime configuration for the log server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind.  `0.0.0.0` makes the viewer reachable from other
    /// machines on the LAN, which is the whole point of the server.
    pub bind_addr: IpAddr,

    /// TCP port for both HTTP and WebSocket traffic.
    pub port: u16,

    /// Directory holding the static viewer bundle (`index.html` etc.).
    pub asset_root: PathBuf,

    /// Admission control: a plain connection is closed when it sends more
    /// than this many requests.
    pub max_requests_per_connection: u32,

    /// Upper bound for each read and write, in seconds in TOML.
    #[serde(rename = "io_timeout_secs", deserialize_with = "de_secs")]
    pub io_timeout: Duration,

    /// Largest accepted request head, terminator included.
    pub max_header_bytes: usize,

    /// Largest backlog of broadcast frames a single browser may have before
    /// it is evicted as a slow consumer.
    pub max_pending_write_bytes: usize,
}

impl Default for ServerConfig {
    /// | Field                         | Default        |
    /// |-------------------------------|----------------|
    /// | bind_addr                     | `0.0.0.0`      |
    /// | port                          | `8080`         |
    /// | asset_root                    | `web`          |
    /// | max_requests_per_connection   | `10`           |
    /// | io_timeout                    | 5 seconds      |
    /// | max_header_bytes              | 16 KiB         |
    /// | max_pending_write_bytes       | 1 MiB          |
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            asset_root: PathBuf::from("web"),
            max_requests_per_connection: DEFAULT_MAX_REQUESTS_PER_CONNECTION,
            io_timeout: DEFAULT_IO_TIMEOUT,
            max_header_bytes: DEFAULT_MAX_HEADER_BYTES,
            max_pending_write_bytes: DEFAULT_MAX_PENDING_WRITE_BYTES,
        }
    }
}

impl ServerConfig {
    /// Parses a TOML document; absent fields keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for invalid TOML or mistyped fields.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Reads and parses a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read and
    /// [`ConfigError::Parse`] if its content is invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// The address the listener binds for `port`.
    pub fn socket_addr(&self, port: u16) -> SocketAddr {
        SocketAddr::new(self.bind_addr, port)
    }
}

fn de_secs<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_secs)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_port_is_8080() {
        // Arrange / Act
        let cfg = ServerConfig::default();
        // Assert
        assert_eq!(cfg.port, 8080);
    }

    #[test]
    fn test_default_limits() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.max_requests_per_connection, 10);
        assert_eq!(cfg.io_timeout, Duration::from_secs(5));
        assert_eq!(cfg.max_header_bytes, 16 * 1024);
    }

    #[test]
    fn test_default_binds_all_interfaces() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.bind_addr.to_string(), "0.0.0.0");
    }

    #[test]
    fn test_empty_toml_yields_defaults() {
        let cfg = ServerConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, ServerConfig::default());
    }

    #[test]
    fn test_toml_overrides_selected_fields() {
        // Arrange
        let text = r#"
            port = 9090
            bind_addr = "127.0.0.1"
            asset_root = "/srv/viewer"
            io_timeout_secs = 2
        "#;

        // Act
        let cfg = ServerConfig::from_toml_str(text).unwrap();

        // Assert
        assert_eq!(cfg.port, 9090);
        assert_eq!(cfg.bind_addr.to_string(), "127.0.0.1");
        assert_eq!(cfg.asset_root, PathBuf::from("/srv/viewer"));
        assert_eq!(cfg.io_timeout, Duration::from_secs(2));
        assert_eq!(cfg.max_requests_per_connection, 10);
    }

    #[test]
    fn test_toml_with_wrong_type_is_parse_error() {
        let err = ServerConfig::from_toml_str("port = \"eighty\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = ServerConfig::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_socket_addr_uses_bind_addr() {
        let cfg = ServerConfig {
            bind_addr: "127.0.0.1".parse().unwrap(),
            ..ServerConfig::default()
        };
        assert_eq!(cfg.socket_addr(9000).to_string(), "127.0.0.1:9000");
    }
}
