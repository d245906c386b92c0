// src/progress/matcher.rs

//! Pluggable line matchers for the progress parser.
//!
//! A [`LineMatcher`] extracts a time-like value in seconds from one output
//! line; a [`CounterMatcher`] extracts a `(done, total)` pair. Regex-backed
//! implementations are provided, and plain closures work as well.

use regex::Regex;

use crate::errors::{Result, ToolrunError};

/// Extracts a number of seconds from a line, if the line carries one.
pub trait LineMatcher: Send + Sync {
    fn seconds(&self, line: &str) -> Option<f64>;
}

impl<F> LineMatcher for F
where
    F: Fn(&str) -> Option<f64> + Send + Sync,
{
    fn seconds(&self, line: &str) -> Option<f64> {
        self(line)
    }
}

/// Extracts a `(done, total)` counter pair from a line.
pub trait CounterMatcher: Send + Sync {
    fn counts(&self, line: &str) -> Option<(f64, f64)>;
}

impl<F> CounterMatcher for F
where
    F: Fn(&str) -> Option<(f64, f64)> + Send + Sync,
{
    fn counts(&self, line: &str) -> Option<(f64, f64)> {
        self(line)
    }
}

/// Regex matcher for durations and positions.
///
/// The pattern must define either a `secs` group (a plain number of
/// seconds) or an `s` group with optional `h` and `m` groups:
///
/// ```
/// use toolrun::progress::{LineMatcher, TimestampPattern};
///
/// let p = TimestampPattern::new(r"time=(?P<h>\d+):(?P<m>\d+):(?P<s>\d+(?:\.\d+)?)").unwrap();
/// assert_eq!(p.seconds("frame=1 time=00:01:02.50 bitrate=1"), Some(62.5));
/// ```
#[derive(Debug, Clone)]
pub struct TimestampPattern {
    regex: Regex,
}

impl TimestampPattern {
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = compile(pattern)?;
        let names: Vec<&str> = regex.capture_names().flatten().collect();
        if !names.contains(&"secs") && !names.contains(&"s") {
            return Err(ToolrunError::ConfigError(format!(
                "timestamp pattern '{pattern}' needs a `secs` or `s` capture group"
            )));
        }
        Ok(Self { regex })
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

impl LineMatcher for TimestampPattern {
    fn seconds(&self, line: &str) -> Option<f64> {
        let caps = self.regex.captures(line)?;

        if let Some(secs) = caps.name("secs") {
            return secs.as_str().parse().ok();
        }

        let part = |name: &str| -> Option<f64> {
            match caps.name(name) {
                Some(m) => m.as_str().parse().ok(),
                None => Some(0.0),
            }
        };
        Some(part("h")? * 3600.0 + part("m")? * 60.0 + part("s")?)
    }
}

/// Regex matcher for counter pairs such as `frame 12/340` or `45%`.
///
/// Requires a `done` group; when the pattern has no `total` group the total
/// is taken to be 100, which makes percentage lines work directly.
#[derive(Debug, Clone)]
pub struct CounterPattern {
    regex: Regex,
}

impl CounterPattern {
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = compile(pattern)?;
        if !regex.capture_names().flatten().any(|n| n == "done") {
            return Err(ToolrunError::ConfigError(format!(
                "counter pattern '{pattern}' needs a `done` capture group"
            )));
        }
        Ok(Self { regex })
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

impl CounterMatcher for CounterPattern {
    fn counts(&self, line: &str) -> Option<(f64, f64)> {
        let caps = self.regex.captures(line)?;
        let done = caps.name("done")?.as_str().parse().ok()?;
        let total = match caps.name("total") {
            Some(m) => m.as_str().parse().ok()?,
            None => 100.0,
        };
        Some((done, total))
    }
}

/// Parse `HH:MM:SS[.frac]`, `MM:SS[.frac]` or `SS[.frac]` into seconds.
pub fn parse_timestamp(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let mut total = 0.0;
    let mut parts = 0;
    for part in s.split(':') {
        parts += 1;
        if parts > 3 || part.is_empty() {
            return None;
        }
        let value: f64 = part.parse().ok()?;
        if value < 0.0 {
            return None;
        }
        total = total * 60.0 + value;
    }
    Some(total)
}

/// Matcher for `Duration: 00:01:23.45,` announcements.
pub(crate) fn ffmpeg_duration(line: &str) -> Option<f64> {
    let rest = line.split_once("Duration:")?.1.trim_start();
    let token = rest.split(|c: char| c == ',' || c.is_whitespace()).next()?;
    parse_timestamp(token)
}

/// Matcher for `time=00:00:05.00` position reports.
pub(crate) fn ffmpeg_position(line: &str) -> Option<f64> {
    let rest = line.split_once("time=")?.1.trim_start();
    let token = rest.split(char::is_whitespace).next()?;
    parse_timestamp(token)
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|source| ToolrunError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}
