// src/config/duration.rs

use std::time::Duration;

use crate::errors::{Result, ToolrunError};

/// Parse a simple duration string like `"3s"`, `"250ms"`, `"1m"`, `"2h"`.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(invalid(s, "empty duration string"));
    }

    // Boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| invalid(s, "missing unit suffix"))?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| invalid(s, &format!("invalid number '{num_part}': {e}")))?;

    match unit_part.trim().to_lowercase().as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => secs(s, value, 60),
        "h" => secs(s, value, 60 * 60),
        unit => Err(invalid(
            s,
            &format!("unsupported unit '{unit}'; expected ms, s, m, or h"),
        )),
    }
}

fn secs(s: &str, value: u64, per_unit: u64) -> Result<Duration> {
    value
        .checked_mul(per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| invalid(s, "duration too large"))
}

fn invalid(s: &str, reason: &str) -> ToolrunError {
    ToolrunError::ConfigError(format!("invalid duration '{s}': {reason}"))
}
