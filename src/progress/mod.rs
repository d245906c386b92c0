// src/progress/mod.rs

//! Log-driven progress parsing.
//!
//! Many media tools continuously print a total-duration announcement once
//! and a processed position many times. A [`ProgressParser`] turns that
//! line stream into [`ProgressEvent`]s carrying `processed / total`.
//!
//! - [`matcher`] defines the pluggable [`LineMatcher`] / [`CounterMatcher`]
//!   strategies (regex-backed or closures).
//! - [`parser`] holds the per-invocation state machine, the reusable
//!   [`ProgressProfile`] and the [`ProgressTracker`] line subscriber.

pub mod matcher;
pub mod parser;

pub use matcher::{CounterMatcher, CounterPattern, LineMatcher, TimestampPattern, parse_timestamp};
pub use parser::{ProgressEvent, ProgressParser, ProgressProfile, ProgressTracker, ProgressUnit};
