use std::fmt;
use std::net::SocketAddr;

use super::thresholds::Thresholds;
use crate::core::{Error, Status, UnknownOffsetPolicy};

/// What the polling and selection stages produced
#[derive(Debug, Clone, PartialEq)]
pub enum OffsetOutcome {
    /// A server qualified and its samples were averaged
    Measured {
        /// Mean offset in seconds, positive when the local clock is behind
        offset: f64,
        /// Address of the selected server
        peer: SocketAddr,
        /// Number of samples averaged
        samples: usize,
    },
    /// Servers answered but none qualified
    Unknown,
}

impl OffsetOutcome {
    /// The measured offset, if any
    pub fn offset(&self) -> Option<f64> {
        match self {
            OffsetOutcome::Measured { offset, .. } => Some(*offset),
            OffsetOutcome::Unknown => None,
        }
    }
}

/// Final verdict of one check, rendered as the plugin output line
#[derive(Debug, Clone, PartialEq)]
pub struct CheckReport {
    pub status: Status,
    pub outcome: OffsetOutcome,
    warning_end: Option<f64>,
    critical_end: Option<f64>,
}

impl CheckReport {
    /// Classifies an outcome.
    ///
    /// A measured offset is judged by its magnitude; an unknown one maps
    /// through `policy`.
    pub fn evaluate(
        outcome: OffsetOutcome,
        thresholds: &Thresholds,
        policy: UnknownOffsetPolicy,
    ) -> Self {
        let status = match outcome.offset() {
            Some(offset) => thresholds.classify(offset.abs()),
            None => policy.status(),
        };

        CheckReport {
            status,
            outcome,
            warning_end: thresholds.warning.map(|range| range.end),
            critical_end: thresholds.critical.map(|range| range.end),
        }
    }

    /// Performance data for a measured offset
    pub fn perfdata(&self) -> Option<String> {
        let offset = self.outcome.offset()?;
        let warn = self.warning_end.map(|end| format!("{:.6}", end)).unwrap_or_default();
        let crit = self.critical_end.map(|end| format!("{:.6}", end)).unwrap_or_default();
        Some(format!("offset={:.6}s;{};{};", offset, warn, crit))
    }
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.outcome.offset(), self.perfdata()) {
            (Some(offset), Some(perfdata)) => write!(
                f,
                "NTP {}: Offset {} secs|{}",
                self.status,
                format_significant(offset, 10),
                perfdata
            ),
            _ => write!(f, "NTP {}: Offset unknown", self.status),
        }
    }
}

/// Output line for an invocation that ended in a fatal error
pub fn error_line(err: &Error) -> String {
    format!("NTP {}: {}", err.status(), err)
}

/// Formats with at most `digits` significant digits and no trailing zeros,
/// switching to exponent notation for very small or large magnitudes.
pub fn format_significant(value: f64, digits: usize) -> String {
    if value == 0.0 || !value.is_finite() {
        return value.to_string();
    }
    let digits = digits.max(1);

    // The exponent is the one left after rounding to `digits` digits
    let scientific = format!("{:.*e}", digits - 1, value);
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((scientific.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if exponent < -4 || exponent >= digits as i32 {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_fraction(mantissa), sign, exponent.abs())
    } else {
        let decimals = (digits as i32 - 1 - exponent).max(0) as usize;
        trim_fraction(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn trim_fraction(number: &str) -> &str {
    if number.contains('.') {
        number.trim_end_matches('0').trim_end_matches('.')
    } else {
        number
    }
}
