//! Log events pushed to the browser viewer.
//!
//! Each event becomes one WebSocket text frame carrying a JSON object:
//!
//! ```json
//! {"timestamp":"2025-04-25T08:30:00Z","level":"warning","message":"cache miss"}
//! ```
//!
//! Events are created, serialized and sent immediately.  Nothing is stored,
//! so a browser that connects late only sees events emitted after it joined.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::frame::encode_text_frame;

/// Severity of a log event.
///
/// Serialized in lowercase: `"info"`, `"warning"`, `"error"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl LogLevel {
    /// Lowercase wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a host passes a level name that is not recognised.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown log level {0:?} (expected info, warning or error)")]
pub struct UnknownLevel(pub String);

impl FromStr for LogLevel {
    type Err = UnknownLevel;

    /// Parses a level name, ignoring case.  `warn` is accepted as an alias
    /// for `warning` because that is how `tracing` spells it.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" => Ok(LogLevel::Info),
            "warning" | "warn" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            _ => Err(UnknownLevel(s.to_string())),
        }
    }
}

/// One log line as seen by the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    /// UTC wall-clock time in ISO-8601 form, second precision, `Z` suffix.
    pub timestamp: String,
    pub level: LogLevel,
    pub message: String,
}

impl LogEvent {
    /// Creates an event stamped with the current time.
    pub fn now(level: LogLevel, message: impl Into<String>) -> Self {
        Self::at(Utc::now(), level, message)
    }

    /// Creates an event stamped with `time`.  Used by tests to get
    /// deterministic output.
    pub fn at(time: DateTime<Utc>, level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: time.to_rfc3339_opts(SecondsFormat::Secs, true),
            level,
            message: message.into(),
        }
    }

    /// Serializes the event to its JSON text.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if serialization fails.  With the field
    /// types used here that does not happen in practice, but the pipeline
    /// still handles it by dropping the event.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serializes the event and wraps it in a WebSocket text frame, ready to
    /// be written to every subscribed connection.
    ///
    /// # Errors
    ///
    /// See [`LogEvent::to_json`].
    pub fn to_frame(&self) -> Result<Vec<u8>, serde_json::Error> {
        Ok(encode_text_frame(self.to_json()?.as_bytes()))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 25, 8, 30, 0).unwrap()
    }

    #[test]
    fn test_timestamp_is_iso_8601_utc() {
        let event = LogEvent::at(fixed_time(), LogLevel::Info, "boot");
        assert_eq!(event.timestamp, "2025-04-25T08:30:00Z");
    }

    #[test]
    fn test_json_has_exactly_three_keys() {
        // Arrange
        let event = LogEvent::at(fixed_time(), LogLevel::Warning, "disk almost full");

        // Act
        let value: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();

        // Assert
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 3);
        assert_eq!(obj["timestamp"], "2025-04-25T08:30:00Z");
        assert_eq!(obj["level"], "warning");
        assert_eq!(obj["message"], "disk almost full");
    }

    #[test]
    fn test_message_is_json_escaped() {
        let event = LogEvent::at(fixed_time(), LogLevel::Error, "quote \" and\nnewline");
        let json = event.to_json().unwrap();
        assert!(json.contains(r#"quote \" and\nnewline"#));
    }

    #[test]
    fn test_frame_wraps_json_payload() {
        let event = LogEvent::at(fixed_time(), LogLevel::Error, "X");
        let json = event.to_json().unwrap();
        let frame = event.to_frame().unwrap();

        assert_eq!(frame[0], 0x81);
        assert_eq!(frame[1] as usize, json.len());
        assert_eq!(&frame[2..], json.as_bytes());
    }

    #[test]
    fn test_now_produces_parseable_timestamp() {
        let event = LogEvent::now(LogLevel::Info, "tick");
        assert!(DateTime::parse_from_rfc3339(&event.timestamp).is_ok());
    }

    #[test]
    fn test_level_parsing() {
        assert_eq!("info".parse::<LogLevel>(), Ok(LogLevel::Info));
        assert_eq!("WARNING".parse::<LogLevel>(), Ok(LogLevel::Warning));
        assert_eq!("warn".parse::<LogLevel>(), Ok(LogLevel::Warning));
        assert_eq!(" error ".parse::<LogLevel>(), Ok(LogLevel::Error));
        assert!("debug".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_level_display_matches_wire_name() {
        assert_eq!(LogLevel::Warning.to_string(), "warning");
    }
}
