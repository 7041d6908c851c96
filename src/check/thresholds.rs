use std::str::FromStr;

use crate::core::{Error, Result, Status};

/// A monitoring-plugin threshold range.
///
/// `10` is `0..=10`, `10:` is `10..`, `~:10` is `..=10`, `5:10` is
/// `5..=10`. A value alerts when it falls outside the range, or inside it
/// when the range is written with a leading `@`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    /// Lower bound, `-inf` when open
    pub start: f64,
    /// Upper bound, `+inf` when open
    pub end: f64,
    /// Alert inside instead of outside
    pub alert_on_inside: bool,
}

impl Range {
    /// Whether `value` raises this threshold
    pub fn alerts(&self, value: f64) -> bool {
        let inside = value >= self.start && value <= self.end;
        inside == self.alert_on_inside
    }
}

impl FromStr for Range {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let spec = s.trim();
        let (alert_on_inside, body) = match spec.strip_prefix('@') {
            Some(rest) => (true, rest),
            None => (false, spec),
        };

        let (start, end) = match body.split_once(':') {
            Some((start, end)) => {
                let start = match start {
                    "~" => f64::NEG_INFINITY,
                    "" => 0.0,
                    bound => parse_bound(s, bound)?,
                };
                let end = match end {
                    "" => f64::INFINITY,
                    bound => parse_bound(s, bound)?,
                };
                (start, end)
            }
            None => (0.0, parse_bound(s, body)?),
        };

        if start > end {
            return Err(Error::threshold(format!("{}: start of range is above its end", s)));
        }

        Ok(Range {
            start,
            end,
            alert_on_inside,
        })
    }
}

fn parse_bound(spec: &str, bound: &str) -> Result<f64> {
    bound
        .parse::<f64>()
        .ok()
        .filter(|value| !value.is_nan())
        .ok_or_else(|| Error::threshold(format!("{}: '{}' is not a number", spec, bound)))
}

/// Warning and critical ranges applied to the offset magnitude
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Thresholds {
    pub warning: Option<Range>,
    pub critical: Option<Range>,
}

impl Thresholds {
    /// Parses both range strings; an empty string leaves that level unset
    pub fn parse(warning: &str, critical: &str) -> Result<Self> {
        Ok(Thresholds {
            warning: parse_optional(warning)?,
            critical: parse_optional(critical)?,
        })
    }

    /// Classifies a value, critical taking precedence over warning
    pub fn classify(&self, value: f64) -> Status {
        if self.critical.map_or(false, |range| range.alerts(value)) {
            Status::Critical
        } else if self.warning.map_or(false, |range| range.alerts(value)) {
            Status::Warning
        } else {
            Status::Ok
        }
    }
}

fn parse_optional(spec: &str) -> Result<Option<Range>> {
    if spec.trim().is_empty() {
        Ok(None)
    } else {
        spec.parse().map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(s: &str) -> Range {
        s.parse().unwrap()
    }

    #[test]
    fn test_plain_upper_bound() {
        let r = range("10");
        assert_eq!((r.start, r.end, r.alert_on_inside), (0.0, 10.0, false));
        assert!(!r.alerts(0.0));
        assert!(!r.alerts(10.0));
        assert!(r.alerts(10.5));
        assert!(r.alerts(-1.0));
    }

    #[test]
    fn test_open_ranges() {
        let r = range("10:");
        assert_eq!(r.end, f64::INFINITY);
        assert!(r.alerts(9.9));
        assert!(!r.alerts(1e9));

        let r = range("~:10");
        assert_eq!(r.start, f64::NEG_INFINITY);
        assert!(!r.alerts(-1e9));
        assert!(r.alerts(10.1));
    }

    #[test]
    fn test_bounded_and_inverted() {
        let r = range("0.5:1.5");
        assert!(r.alerts(0.4));
        assert!(!r.alerts(1.0));

        let r = range("@0.5:1.5");
        assert!(!r.alerts(0.4));
        assert!(r.alerts(1.0));
    }

    #[test]
    fn test_invalid_ranges() {
        assert!("abc".parse::<Range>().is_err());
        assert!("5:1".parse::<Range>().is_err());
        assert!("1:x".parse::<Range>().is_err());
        assert!(matches!("".parse::<Range>(), Err(Error::Threshold(_))));
    }

    #[test]
    fn test_classify_defaults() {
        let thresholds = Thresholds::parse("60", "120").unwrap();
        assert_eq!(thresholds.classify(0.0105), Status::Ok);
        assert_eq!(thresholds.classify(60.0), Status::Ok);
        assert_eq!(thresholds.classify(61.0), Status::Warning);
        assert_eq!(thresholds.classify(120.5), Status::Critical);
    }

    #[test]
    fn test_classify_sub_second() {
        let thresholds = Thresholds::parse("0.5", "1").unwrap();
        assert_eq!(thresholds.classify(0.2), Status::Ok);
        assert_eq!(thresholds.classify(0.7), Status::Warning);
        assert_eq!(thresholds.classify(1.2), Status::Critical);
    }

    #[test]
    fn test_unset_levels() {
        let thresholds = Thresholds::parse("", "1").unwrap();
        assert!(thresholds.warning.is_none());
        assert_eq!(thresholds.classify(0.9), Status::Ok);
        assert_eq!(thresholds.classify(2.0), Status::Critical);

        assert_eq!(Thresholds::default().classify(1e6), Status::Ok);
    }
}
