//! # Playback Error Types
//!
//! Errors surfaced to callers of the playback orchestrator. Recognition
//! failures never appear here; they are reported through the event bus.

use core_library::{LibraryError, RecognitionStatus};
use core_runtime::events::PlaybackStatus;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Engine Errors
    // ========================================================================
    /// The engine could not open or prepare the track.
    #[error("Failed to load track {track_id}: {message}")]
    LoadFailed { track_id: String, message: String },

    /// The engine rejected a transport or telemetry call.
    #[error("Playback engine failure: {0}")]
    EngineFailure(String),

    /// Attempted operation when no track is loaded.
    #[error("No track loaded")]
    NoTrackLoaded,

    // ========================================================================
    // Playback Control Errors
    // ========================================================================
    /// The call is not permitted in the current status. Nothing changed.
    #[error("Cannot {operation} while {status}")]
    InvalidState {
        operation: &'static str,
        status: PlaybackStatus,
    },

    /// Seek target lies beyond the media duration.
    #[error("Seek position {position:?} beyond duration {duration:?}")]
    SeekOutOfBounds {
        position: Duration,
        duration: Duration,
    },

    // ========================================================================
    // Queue Errors
    // ========================================================================
    #[error("Play queue is empty")]
    QueueEmpty,

    #[error("Queue index {index} out of range (queue holds {len} tracks)")]
    QueueIndexOutOfRange { index: usize, len: usize },

    // ========================================================================
    // Recognition Control Errors
    // ========================================================================
    /// Only tracks whose last attempt failed can be retried.
    #[error("Recognition of track {track_id} cannot be retried while {status}")]
    NotRetryable {
        track_id: String,
        status: RecognitionStatus,
    },

    // ========================================================================
    // Generic Errors
    // ========================================================================
    /// Library error from core-library.
    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    /// The orchestrator task is gone.
    #[error("Playback orchestrator is not running")]
    OrchestratorClosed,
}

impl PlaybackError {
    /// Returns `true` for calls rejected without any state change.
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, PlaybackError::InvalidState { .. })
    }

    /// Returns `true` if the engine failed and playback halted.
    pub fn is_engine_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::LoadFailed { .. } | PlaybackError::EngineFailure(_)
        )
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let invalid = PlaybackError::InvalidState {
            operation: "seek",
            status: PlaybackStatus::Idle,
        };
        assert!(invalid.is_invalid_state());
        assert!(!invalid.is_engine_error());
        assert_eq!(invalid.to_string(), "Cannot seek while idle");

        let load = PlaybackError::LoadFailed {
            track_id: "t".to_string(),
            message: "codec".to_string(),
        };
        assert!(load.is_engine_error());
    }
}
