//! Domain types shared by every layer of the server.

pub mod log_event;

pub use log_event::{LogEvent, LogLevel, UnknownLevel};
