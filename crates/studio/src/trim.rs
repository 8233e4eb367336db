use serde::Serialize;
use std::fmt;

use crate::error::{Result, StudioError};

/// Smallest selectable trim span, in seconds
pub const MIN_TRIM_SPAN: f64 = 0.1;

/// Smallest slack allowed when comparing spans, so that `start + 0.1`
/// computed in floating point still counts as a 0.1s span
pub const SPAN_TOLERANCE: f64 = 1e-9;

/// Slack for span comparisons near `magnitude` seconds
///
/// Rounding error grows with the size of the endpoints, so the slack is one
/// ulp of the magnitude and never less than `SPAN_TOLERANCE`.
pub fn span_tolerance(magnitude: f64) -> f64 {
    SPAN_TOLERANCE.max(magnitude.abs() * f64::EPSILON)
}

/// A selected sub-interval `[start, end]` of a media timeline, in seconds.
///
/// Values are immutable: re-trimming produces a new range rather than
/// editing an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrimRange {
    start: f64,
    end: f64,
}

impl TrimRange {
    /// Build a range from explicit endpoints, requiring `0 <= start < end`
    pub fn new(start: f64, end: f64) -> Result<Self> {
        if !start.is_finite() || !end.is_finite() || start < 0.0 || start >= end {
            return Err(StudioError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn span(&self) -> f64 {
        self.end - self.start
    }

    /// Whether the span meets the 0.1s minimum
    pub fn is_wide_enough(&self) -> bool {
        self.span() >= MIN_TRIM_SPAN - span_tolerance(self.end)
    }
}

impl fmt::Display for TrimRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.1}s - {:.1}s ({:.1}s duration)",
            self.start,
            self.end,
            self.span()
        )
    }
}

/// Check that a media duration can carry a timeline
pub fn validate_duration(duration_seconds: f64) -> Result<f64> {
    if !duration_seconds.is_finite() || duration_seconds <= 0.0 {
        return Err(StudioError::InvalidDuration(duration_seconds));
    }
    Ok(duration_seconds)
}

/// The untrimmed range `[0, duration]`
pub fn compute_initial_range(duration_seconds: f64) -> Result<TrimRange> {
    let duration = validate_duration(duration_seconds)?;
    Ok(TrimRange {
        start: 0.0,
        end: duration,
    })
}

/// Fit a candidate range into `[0, duration]` with at least `MIN_TRIM_SPAN`
/// between the endpoints.
///
/// `start` is clamped into the timeline, `end` is clamped between `start` and
/// the duration, and a span that is too narrow is widened by moving `end`
/// forward. When `end` is already at the duration, `start` moves back
/// instead. A NaN `start` reads as 0 and a NaN `end` as the duration.
///
/// Fails with `RangeTooNarrow` when the timeline is shorter than the minimum
/// span, or when the duration is so large that a 0.1s span cannot be
/// represented at its end.
pub fn clamp_range(start: f64, end: f64, duration_seconds: f64) -> Result<TrimRange> {
    let duration = validate_duration(duration_seconds)?;
    if duration < MIN_TRIM_SPAN - SPAN_TOLERANCE {
        return Err(StudioError::RangeTooNarrow {
            start: 0.0,
            end: duration,
        });
    }

    let start = if start.is_nan() { 0.0 } else { start };
    let end = if end.is_nan() { duration } else { end };

    let latest_start = (duration - MIN_TRIM_SPAN).max(0.0);
    let start = start.clamp(0.0, latest_start);
    let mut end = end.clamp(start, duration);

    if end - start < MIN_TRIM_SPAN - span_tolerance(end) {
        end = (start + MIN_TRIM_SPAN).min(duration);
    }

    let range = TrimRange { start, end };
    if end <= start || !range.is_wide_enough() {
        return Err(StudioError::RangeTooNarrow { start, end });
    }
    Ok(range)
}

/// Render seconds as `m:ss.cc`
pub fn format_time(seconds: f64) -> String {
    let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
    let minutes = (seconds / 60.0).floor() as u64;
    let whole = (seconds % 60.0).floor() as u64;
    let hundredths = ((seconds % 1.0) * 100.0).floor() as u64;
    format!("{}:{:02}.{:02}", minutes, whole, hundredths)
}
