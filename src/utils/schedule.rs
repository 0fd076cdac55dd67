//! Schedule expression helpers
//!
//! This module provides utilities for working with cron expressions and
//! fixed-interval duration strings to calculate next fire times.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use std::str::FromStr;
use std::time::Duration;

/// Normalize a cron expression to the seconds-bearing form the parser expects
///
/// Classic 5-field expressions (`min hour dom month dow`) gain a leading `0`
/// seconds column. 6- and 7-field expressions pass through untouched.
pub fn normalize_cron_expression(expression: &str) -> String {
    let trimmed = expression.trim();
    if trimmed.split_whitespace().count() == 5 {
        format!("0 {trimmed}")
    } else {
        trimmed.to_string()
    }
}

/// Parse a 5-, 6- or 7-field cron expression
///
/// # Returns
/// * `Ok(Schedule)` - The compiled schedule
/// * `Err(String)` - Invalid cron expression with error message
pub fn parse_cron(expression: &str) -> Result<Schedule, String> {
    Schedule::from_str(&normalize_cron_expression(expression))
        .map_err(|e| format!("Invalid cron expression '{expression}': {e}"))
}

/// Parse a fixed-interval duration string like "10s", "5m" or "1h 30m"
///
/// Zero-length intervals are rejected; a periodic job with no spacing
/// between fires would spin.
pub fn parse_interval(expression: &str) -> Result<Duration, String> {
    let interval = humantime::parse_duration(expression.trim())
        .map_err(|e| format!("Invalid interval '{expression}': {e}"))?;
    if interval.is_zero() {
        return Err(format!("Invalid interval '{expression}': must be non-zero"));
    }
    Ok(interval)
}

/// Next cron occurrence strictly after `after`
///
/// The expression is evaluated in the fixed reference zone `tz`; the result
/// comes back in UTC. `None` means the schedule has no future fire times.
pub fn next_cron_fire(schedule: &Schedule, tz: Tz, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    schedule
        .after(&after.with_timezone(&tz))
        .next()
        .map(|next| next.with_timezone(&Utc))
}
