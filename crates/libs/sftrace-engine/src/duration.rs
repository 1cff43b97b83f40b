//! Duration expressions for trace windows.
//!
//! Grammar: `<number>hr` or `<number>m`. The number is a decimal (optionally
//! fractional or in exponent form), `Infinity`, or a `0x`/`0o`/`0b` integer;
//! it is truncated to whole milliseconds. Amounts too large to represent
//! clamp like any other long duration. The resulting window is capped at
//! [`MAX_TRACE_WINDOW`] and never runs backwards from the start instant.

use std::fmt;
use std::str::FromStr;

use time::{Duration, OffsetDateTime};

use crate::error::TraceError;

pub const DEFAULT_TRACE_DURATION: &str = "1hr";
pub const MAX_TRACE_WINDOW: Duration = Duration::hours(24);

const MILLIS_PER_MINUTE: f64 = 60_000.0;
const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// A parsed duration expression, before clamping.
#[derive(Clone, Debug, PartialEq)]
pub struct TraceDuration {
    expression: String,
    requested_millis: f64,
}

impl TraceDuration {
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Requested offset in milliseconds, as written.
    pub fn requested_millis(&self) -> f64 {
        self.requested_millis
    }

    /// The effective window: `[0, 24h]`.
    pub fn window(&self) -> Duration {
        let max_millis = MAX_TRACE_WINDOW.whole_milliseconds() as f64;
        if self.requested_millis > max_millis {
            MAX_TRACE_WINDOW
        } else if self.requested_millis <= 0.0 {
            Duration::ZERO
        } else {
            Duration::milliseconds(self.requested_millis.trunc() as i64)
        }
    }

    pub fn expiration_from(&self, start: OffsetDateTime) -> OffsetDateTime {
        start.saturating_add(self.window())
    }
}

impl FromStr for TraceDuration {
    type Err = TraceError;

    fn from_str(expression: &str) -> Result<Self, Self::Err> {
        let invalid = || TraceError::InvalidDuration {
            expression: expression.to_string(),
        };

        let (number, unit_millis) = if let Some(hours) = expression.strip_suffix("hr") {
            (hours, MILLIS_PER_HOUR)
        } else if let Some(minutes) = expression.strip_suffix('m') {
            (minutes, MILLIS_PER_MINUTE)
        } else {
            return Err(invalid());
        };

        let amount = parse_amount(number).ok_or_else(invalid)?;
        if amount < 0.0 {
            log::warn!("negative trace duration {expression:?}; the trace will expire immediately");
        }

        Ok(Self {
            expression: expression.to_string(),
            requested_millis: amount * unit_millis,
        })
    }
}

/// Parse the numeric prefix. Surrounding whitespace is ignored and an empty
/// prefix is zero. Returns `None` for anything that is not a number.
fn parse_amount(number: &str) -> Option<f64> {
    let number = number.trim();
    if number.is_empty() {
        return Some(0.0);
    }

    for (prefix, radix) in [("0x", 16), ("0o", 8), ("0b", 2)] {
        let digits = number
            .strip_prefix(prefix)
            .or_else(|| number.strip_prefix(&prefix.to_ascii_uppercase()));
        if let Some(digits) = digits {
            if digits.is_empty() {
                return None;
            }
            return digits.chars().try_fold(0.0_f64, |acc, c| {
                c.to_digit(radix).map(|d| acc * f64::from(radix) + f64::from(d))
            });
        }
    }

    match number {
        "Infinity" | "+Infinity" => return Some(f64::INFINITY),
        "-Infinity" => return Some(f64::NEG_INFINITY),
        _ => {}
    }

    // f64's own parser also takes "inf" and "nan" spellings; only plain
    // decimal notation is a number here.
    if !number
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
    {
        return None;
    }
    number.parse::<f64>().ok()
}

impl fmt::Display for TraceDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

/// Expiration instant for a trace starting at `start` and lasting `expression`.
pub fn compute_expiration(
    start: OffsetDateTime,
    expression: &str,
) -> Result<OffsetDateTime, TraceError> {
    Ok(expression.parse::<TraceDuration>()?.expiration_from(start))
}
