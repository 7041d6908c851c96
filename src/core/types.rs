use std::fmt;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::{Error, Result};

/// Monitoring plugin status, ordered by severity of the exit code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    /// Offset within the warning range
    Ok,
    /// Offset outside the warning range
    Warning,
    /// Offset outside the critical range, or no server reachable
    Critical,
    /// The check could not determine an offset
    Unknown,
}

impl Status {
    /// Returns the process exit code for this status
    pub fn exit_code(&self) -> i32 {
        match self {
            Status::Ok => 0,
            Status::Warning => 1,
            Status::Critical => 2,
            Status::Unknown => 3,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Status::Ok => "OK",
            Status::Warning => "WARNING",
            Status::Critical => "CRITICAL",
            Status::Unknown => "UNKNOWN",
        };
        f.write_str(label)
    }
}

/// Restricts which resolved addresses are polled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AddressFamily {
    /// Poll every resolved address
    #[default]
    Any,
    /// Only IPv4 addresses
    Ipv4,
    /// Only IPv6 addresses
    Ipv6,
}

impl AddressFamily {
    /// Returns whether the address belongs to this family
    pub fn admits(&self, addr: &SocketAddr) -> bool {
        match self {
            AddressFamily::Any => true,
            AddressFamily::Ipv4 => addr.is_ipv4(),
            AddressFamily::Ipv6 => addr.is_ipv6(),
        }
    }
}

/// What to report when servers answered but none qualified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UnknownOffsetPolicy {
    /// Report UNKNOWN
    #[default]
    Unknown,
    /// Report CRITICAL
    Critical,
}

impl UnknownOffsetPolicy {
    /// Returns the status an unknown offset maps to
    pub fn status(&self) -> Status {
        match self {
            UnknownOffsetPolicy::Unknown => Status::Unknown,
            UnknownOffsetPolicy::Critical => Status::Critical,
        }
    }
}

/// Configuration for one offset check invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckConfig {
    /// Hostname or address of the NTP server
    pub server_address: String,
    /// NTP service port
    pub port: u16,
    /// Address family restriction
    pub address_family: AddressFamily,
    /// Overall invocation timeout; polling stops at half of it
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub timeout: Duration,
    /// Known offset of the server, added to every sample (seconds)
    pub time_offset: f64,
    /// Warning range
    pub warning: String,
    /// Critical range
    pub critical: String,
    /// Mapping for "no qualifying server"
    pub unknown_offset: UnknownOffsetPolicy,
    /// Samples collected per server
    pub sample_target: usize,
    /// Upper bound of a single readiness wait
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub poll_slice: Duration,
    /// Time after which an unanswered request is sent again
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub retransmit_interval: Duration,
}

impl Default for CheckConfig {
    fn default() -> Self {
        CheckConfig {
            server_address: String::new(),
            port: super::DEFAULT_PORT,
            address_family: AddressFamily::Any,
            timeout: Duration::from_secs(super::DEFAULT_TIMEOUT_SECS),
            time_offset: 0.0,
            warning: super::DEFAULT_WARNING.to_string(),
            critical: super::DEFAULT_CRITICAL.to_string(),
            unknown_offset: UnknownOffsetPolicy::Unknown,
            sample_target: super::SAMPLE_TARGET,
            poll_slice: Duration::from_millis(100),
            retransmit_interval: Duration::from_secs(1),
        }
    }
}

impl CheckConfig {
    /// Creates a configuration for the given server with default settings
    pub fn for_server(server_address: impl Into<String>) -> Self {
        CheckConfig {
            server_address: server_address.into(),
            ..Default::default()
        }
    }

    /// Checks that the configuration can drive a polling run
    pub fn validate(&self) -> Result<()> {
        if self.server_address.is_empty() {
            return Err(Error::config("Hostname was not supplied"));
        }
        if self.timeout.is_zero() {
            return Err(Error::config("timeout must be positive"));
        }
        if self.sample_target == 0 {
            return Err(Error::config("sample target must be positive"));
        }
        if self.poll_slice.is_zero() {
            return Err(Error::config("poll slice must be positive"));
        }
        if !self.time_offset.is_finite() {
            return Err(Error::config("time offset must be finite"));
        }
        Ok(())
    }

    /// Soft deadline for the polling engine: half the overall timeout
    pub fn poll_deadline(&self, start: Instant) -> Instant {
        start + self.timeout / 2
    }
}
