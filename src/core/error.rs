use std::io;
use thiserror::Error;

use super::types::Status;

/// Custom error types for the NTP offset check
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("error getting address for {host}: {reason}")]
    Resolution { host: String, reason: String },

    #[error("can not create new socket: {0}")]
    Socket(io::Error),

    #[error("No response from NTP server")]
    NoResponse,

    #[error("Socket timeout after {0} seconds")]
    Cancelled(u64),

    #[error("Invalid threshold: {0}")]
    Threshold(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates a new resolution error
    pub fn resolution(host: impl Into<String>, reason: impl ToString) -> Self {
        Error::Resolution {
            host: host.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates a new threshold error
    pub fn threshold(msg: impl Into<String>) -> Self {
        Error::Threshold(msg.into())
    }

    /// Creates a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Plugin status the invocation ends with when this error is fatal.
    ///
    /// Total unreachability is critical; everything else means the check
    /// itself could not run and is unknown.
    pub fn status(&self) -> Status {
        match self {
            Error::NoResponse => Status::Critical,
            _ => Status::Unknown,
        }
    }
}
