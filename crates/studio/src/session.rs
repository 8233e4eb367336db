use serde::Serialize;
use tracing::debug;

use crate::error::{Result, StudioError};
use crate::media::MediaAsset;
use crate::trim::{
    clamp_range, compute_initial_range, span_tolerance, TrimRange, MIN_TRIM_SPAN,
};

/// Working trim state for one media asset.
///
/// The session tracks the playback cursor and a tentative range. Nothing
/// leaves the session until [`TrimSession::apply`] is called, and applying
/// does not end it: the user may keep adjusting and apply again.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrimSession {
    duration_seconds: f64,
    candidate_range: TrimRange,
    playback_position: f64,
}

impl TrimSession {
    /// Start a session covering the whole timeline
    pub fn new(duration_seconds: f64) -> Result<Self> {
        let candidate_range = compute_initial_range(duration_seconds)?;
        Ok(Self {
            duration_seconds,
            candidate_range,
            playback_position: 0.0,
        })
    }

    /// Start a session for an uploaded asset
    ///
    /// Images have no timeline and are rejected with `UnsupportedKind`. An
    /// asset that has not been probed yet has no duration and is rejected
    /// with `InvalidDuration`.
    pub fn for_asset(asset: &MediaAsset) -> Result<Self> {
        if !asset.kind.has_timeline() {
            return Err(StudioError::unsupported_kind(format!(
                "{} ({}) cannot be trimmed",
                asset.name, asset.kind
            )));
        }
        let duration = asset
            .duration_seconds
            .ok_or(StudioError::InvalidDuration(f64::NAN))?;
        Self::new(duration)
    }

    pub fn duration_seconds(&self) -> f64 {
        self.duration_seconds
    }

    pub fn candidate_range(&self) -> TrimRange {
        self.candidate_range
    }

    pub fn playback_position(&self) -> f64 {
        self.playback_position
    }

    /// Move the playback cursor, keeping it inside the timeline
    pub fn seek(&mut self, position: f64) -> f64 {
        self.playback_position = if position.is_nan() {
            0.0
        } else {
            position.clamp(0.0, self.duration_seconds)
        };
        self.playback_position
    }

    /// Replace the candidate range
    ///
    /// Both endpoints must be finite, ordered, and at least `MIN_TRIM_SPAN`
    /// apart; otherwise the call fails with `InvalidRange` and the previous
    /// candidate is kept. Accepted endpoints are clamped into the timeline.
    pub fn adjust_range(&mut self, start: f64, end: f64) -> Result<TrimRange> {
        if !start.is_finite() || !end.is_finite() || start >= end {
            return Err(StudioError::InvalidRange { start, end });
        }
        if end - start < MIN_TRIM_SPAN - span_tolerance(end) {
            return Err(StudioError::InvalidRange { start, end });
        }

        let range = clamp_range(start, end, self.duration_seconds)?;
        debug!("Trim candidate adjusted to {}", range);
        self.candidate_range = range;
        Ok(range)
    }

    /// Go back to the whole timeline
    pub fn reset(&mut self) -> TrimRange {
        self.candidate_range = TrimRange::new(0.0, self.duration_seconds)
            .unwrap_or(self.candidate_range);
        self.candidate_range
    }

    /// Commit the current candidate
    pub fn apply(&self) -> Result<TrimRange> {
        let range = self.candidate_range;
        if !range.is_wide_enough() {
            return Err(StudioError::RangeTooNarrow {
                start: range.start(),
                end: range.end(),
            });
        }
        Ok(range)
    }
}
