//! Playback state owned by the orchestrator task.

use crate::error::{PlaybackError, Result};
use core_runtime::events::PlaybackStatus;
use serde::Serialize;
use std::time::Duration;

/// Snapshot of the single active playback session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaybackState {
    /// Loaded track; `None` while idle.
    pub track_id: Option<String>,
    pub status: PlaybackStatus,
    pub position: Duration,
    /// Media duration, once known.
    pub duration: Option<Duration>,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            track_id: None,
            status: PlaybackStatus::Idle,
            position: Duration::ZERO,
            duration: None,
        }
    }
}

impl PlaybackState {
    /// Fail with `InvalidState` unless the status is one of `allowed`.
    pub(crate) fn require(&self, operation: &'static str, allowed: &[PlaybackStatus]) -> Result<()> {
        if allowed.contains(&self.status) {
            Ok(())
        } else {
            Err(PlaybackError::InvalidState {
                operation,
                status: self.status,
            })
        }
    }

    /// Start over for a freshly requested track.
    pub(crate) fn begin(&mut self, track_id: &str) {
        self.track_id = Some(track_id.to_string());
        self.status = PlaybackStatus::Buffering;
        self.position = Duration::ZERO;
        self.duration = None;
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }

    /// Record an engine-reported position. Never moves backwards.
    pub(crate) fn advance_position(&mut self, reported: Duration) -> Duration {
        let reported = match self.duration {
            Some(duration) => reported.min(duration),
            None => reported,
        };
        self.position = self.position.max(reported);
        self.position
    }

    pub(crate) fn seek(&mut self, position: Duration) {
        self.position = position;
    }

    /// Whether the position has reached a known duration.
    pub(crate) fn is_finished(&self) -> bool {
        matches!(self.duration, Some(duration) if !duration.is_zero() && self.position >= duration)
    }

    pub fn position_ms(&self) -> u64 {
        self.position.as_millis() as u64
    }

    pub fn duration_ms(&self) -> Option<u64> {
        self.duration.map(|d| d.as_millis() as u64)
    }
}
