// src/progress/parser.rs

use std::fmt;
use std::sync::Arc;

use crate::errors::Result;
use crate::exec::LineSubscriber;
use crate::progress::matcher::{
    CounterMatcher, CounterPattern, LineMatcher, TimestampPattern, ffmpeg_duration,
    ffmpeg_position,
};
use crate::types::OutputLine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressUnit {
    /// Derived from a processed position against a total duration.
    Seconds,
    /// Derived from a `(done, total)` counter pair.
    Items,
}

/// A computed progress fraction.
///
/// `fraction` is **not** clamped: tools regularly report a position slightly
/// past the nominal duration. Use [`clamped`](ProgressEvent::clamped) or
/// [`is_complete`](ProgressEvent::is_complete) when presenting it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressEvent {
    pub processed: f64,
    pub total: f64,
    pub fraction: f64,
    pub unit: ProgressUnit,
}

impl ProgressEvent {
    pub fn clamped(&self) -> f64 {
        self.fraction.clamp(0.0, 1.0)
    }

    pub fn is_complete(&self) -> bool {
        self.fraction >= 1.0
    }
}

/// The matchers that define how one tool reports progress.
///
/// A profile is immutable and cheap to clone; every invocation gets its own
/// [`ProgressParser`] from [`parser`](ProgressProfile::parser).
#[derive(Clone)]
pub struct ProgressProfile {
    duration: Arc<dyn LineMatcher>,
    position: Arc<dyn LineMatcher>,
    counter: Option<Arc<dyn CounterMatcher>>,
}

impl ProgressProfile {
    pub fn new(
        duration: impl LineMatcher + 'static,
        position: impl LineMatcher + 'static,
    ) -> Self {
        Self {
            duration: Arc::new(duration),
            position: Arc::new(position),
            counter: None,
        }
    }

    pub fn with_counter(mut self, counter: impl CounterMatcher + 'static) -> Self {
        self.counter = Some(Arc::new(counter));
        self
    }

    /// `Duration: HH:MM:SS.ff,` announcements and `time=HH:MM:SS.ff`
    /// positions, as printed by ffmpeg and tools built on it.
    pub fn ffmpeg() -> Self {
        Self::new(ffmpeg_duration, ffmpeg_position)
    }

    /// Build a profile from regex source strings.
    pub fn from_patterns(duration: &str, position: &str, counter: Option<&str>) -> Result<Self> {
        let mut profile = Self::new(
            TimestampPattern::new(duration)?,
            TimestampPattern::new(position)?,
        );
        if let Some(counter) = counter {
            profile = profile.with_counter(CounterPattern::new(counter)?);
        }
        Ok(profile)
    }

    /// Fresh parser with no total known.
    pub fn parser(&self) -> ProgressParser {
        ProgressParser::new(self.clone())
    }
}

impl fmt::Debug for ProgressProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressProfile")
            .field("counter", &self.counter.is_some())
            .finish_non_exhaustive()
    }
}

/// Per-invocation progress state machine.
///
/// The total duration is a latch: the first announcement wins and later ones
/// (e.g. for a second input) are ignored until [`reset`](Self::reset).
/// Positions seen before the total is known are dropped, not replayed.
#[derive(Debug, Clone)]
pub struct ProgressParser {
    profile: ProgressProfile,
    total: Option<f64>,
    processed: Option<f64>,
}

impl ProgressParser {
    pub fn new(profile: ProgressProfile) -> Self {
        Self {
            profile,
            total: None,
            processed: None,
        }
    }

    /// Feed one output line; returns an event when the line yields progress.
    pub fn observe(&mut self, line: &str) -> Option<ProgressEvent> {
        if self.total.is_none() {
            self.total = self.profile.duration.seconds(line);
        }

        if let Some(position) = self.profile.position.seconds(line) {
            let total = self.total.filter(|t| *t > 0.0)?;
            self.processed = Some(position);
            return Some(ProgressEvent {
                processed: position,
                total,
                fraction: position / total,
                unit: ProgressUnit::Seconds,
            });
        }

        let (done, total) = self.profile.counter.as_ref()?.counts(line)?;
        if total <= 0.0 {
            return None;
        }
        Some(ProgressEvent {
            processed: done,
            total,
            fraction: done / total,
            unit: ProgressUnit::Items,
        })
    }

    pub fn total(&self) -> Option<f64> {
        self.total
    }

    pub fn processed(&self) -> Option<f64> {
        self.processed
    }

    /// `processed / total`, or `None` while either is unknown or total is 0.
    pub fn fraction(&self) -> Option<f64> {
        match (self.processed, self.total) {
            (Some(p), Some(t)) if t > 0.0 => Some(p / t),
            _ => None,
        }
    }

    /// Forget the latched total and last position.
    pub fn reset(&mut self) {
        self.total = None;
        self.processed = None;
    }
}

/// Feeds every line of an invocation through a [`ProgressParser`] and hands
/// resulting events to a callback.
pub struct ProgressTracker<F> {
    parser: ProgressParser,
    on_progress: F,
}

impl<F> ProgressTracker<F>
where
    F: FnMut(ProgressEvent) + Send,
{
    pub fn new(parser: ProgressParser, on_progress: F) -> Self {
        Self {
            parser,
            on_progress,
        }
    }
}

impl<F> LineSubscriber for ProgressTracker<F>
where
    F: FnMut(ProgressEvent) + Send,
{
    fn on_line(&mut self, line: &OutputLine) {
        if let Some(event) = self.parser.observe(&line.text) {
            (self.on_progress)(event);
        }
    }
}
