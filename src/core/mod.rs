//! Core types shared by the NTP offset check
//!
//! Error handling, plugin status, configuration and the constants the
//! polling engine and the plugin front end agree on.

pub mod error;
pub mod serde;
pub mod types;

pub use self::error::{Error, Result};
pub use self::types::{AddressFamily, CheckConfig, Status, UnknownOffsetPolicy};

/// NTP version sent in requests
pub const NTP_VERSION: u8 = 4;

/// Default NTP service port
pub const DEFAULT_PORT: u16 = 123;

/// Number of offset samples collected from each server
pub const SAMPLE_TARGET: usize = 4;

/// Default overall timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Default warning range (seconds of offset)
pub const DEFAULT_WARNING: &str = "60";

/// Default critical range (seconds of offset)
pub const DEFAULT_CRITICAL: &str = "120";
