//! NTP offset check
//!
//! Measures how far the local clock is from a remote NTP server and reports
//! the result as a monitoring plugin: every address the server name
//! resolves to is polled for a few samples, the most trustworthy server is
//! selected, and its mean offset is compared against warning and critical
//! ranges.

pub mod check;
pub mod core;
pub mod network;
pub mod protocol;
pub mod sync;
pub mod time;

// Re-export commonly used items
pub use crate::core::{Error, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
