//! Domain models for the music library
//!
//! This module contains the persisted entities with validation and database
//! mapping, plus the recognition status machine every track follows.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

// =============================================================================
// ID Types
// =============================================================================

/// Unique identifier for a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackId(pub Uuid);

impl TrackId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for TrackId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a playlist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlaylistId(pub Uuid);

impl PlaylistId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlaylistId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlaylistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Recognition Status
// =============================================================================

/// Where a track stands with fingerprint recognition.
///
/// Status only moves forward: `unrecognized → pending → {recognized | failed}`.
/// A failed track may go back to `pending` for a retry; nothing returns to
/// `unrecognized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum RecognitionStatus {
    Unrecognized,
    Pending,
    Recognized,
    Failed,
}

impl RecognitionStatus {
    /// Whether `self → next` is a legal transition.
    pub fn can_transition_to(self, next: RecognitionStatus) -> bool {
        use RecognitionStatus::*;
        matches!(
            (self, next),
            (Unrecognized, Pending)
                | (Pending, Recognized)
                | (Pending, Failed)
                | (Failed, Pending)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecognitionStatus::Unrecognized => "unrecognized",
            RecognitionStatus::Pending => "pending",
            RecognitionStatus::Recognized => "recognized",
            RecognitionStatus::Failed => "failed",
        }
    }
}

impl Default for RecognitionStatus {
    fn default() -> Self {
        Self::Unrecognized
    }
}

impl fmt::Display for RecognitionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Domain Models
// =============================================================================

/// A playable track and what recognition has learned about it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Track {
    /// Unique identifier
    pub id: String,
    /// Display title; the file name until recognition enriches it
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    /// Duration in milliseconds, 0 when unknown
    pub duration_ms: i64,
    /// Playable locator: a file path or an http(s) stream URL
    pub source: String,
    /// Identifier assigned by the recognition service on a match
    pub external_id: Option<String>,
    /// Confidence of the last accepted match, in `[0, 1]`
    pub match_confidence: Option<f64>,
    pub recognition_status: RecognitionStatus,

    // Timestamps
    /// When first added
    pub created_at: i64,
    /// Last update time
    pub updated_at: i64,
}

impl Track {
    /// Create an unrecognized track for a locator.
    pub fn new(title: impl Into<String>, source: impl Into<String>, duration_ms: i64) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: TrackId::new().to_string(),
            title: title.into(),
            artist: None,
            album: None,
            duration_ms,
            source: source.into(),
            external_id: None,
            match_confidence: None,
            recognition_status: RecognitionStatus::Unrecognized,
            created_at: now,
            updated_at: now,
        }
    }

    /// Validate track data
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("Track id cannot be empty".to_string());
        }

        if self.title.trim().is_empty() {
            return Err("Track title cannot be empty".to_string());
        }

        if self.source.trim().is_empty() {
            return Err("Track source cannot be empty".to_string());
        }

        if self.duration_ms < 0 {
            return Err("Track duration cannot be negative".to_string());
        }

        if let Some(confidence) = self.match_confidence {
            if !(0.0..=1.0).contains(&confidence) {
                return Err(format!("Match confidence {} is outside [0, 1]", confidence));
            }
        }

        Ok(())
    }

    /// Whether this track applies the given enrichment already.
    pub fn matches_metadata(&self, metadata: &TrackMetadata) -> bool {
        self.recognition_status == RecognitionStatus::Recognized
            && self.title == metadata.title
            && self.artist == metadata.artist
            && self.album == metadata.album
            && self.external_id == metadata.external_id
            && self.match_confidence == Some(metadata.confidence)
    }
}

/// Metadata written onto a track when recognition finds a match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub external_id: Option<String>,
    /// Match confidence in `[0, 1]`
    pub confidence: f64,
}

impl TrackMetadata {
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("Enriched title cannot be empty".to_string());
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(format!(
                "Match confidence {} is outside [0, 1]",
                self.confidence
            ));
        }
        Ok(())
    }
}

/// Playlist snapshot with its ordered track ids
///
/// Order is significant and the same track may appear more than once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    /// Unique identifier
    pub id: String,
    /// Playlist name
    pub name: String,
    /// Track ids in play order
    pub track_ids: Vec<String>,
    /// Timestamps
    pub created_at: i64,
    pub updated_at: i64,
}

impl Playlist {
    /// Create a new empty playlist
    pub fn new(name: String) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: PlaylistId::new().to_string(),
            name,
            track_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Validate playlist data
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Playlist name cannot be empty".to_string());
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.track_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.track_ids.is_empty()
    }

    pub fn contains(&self, track_id: &str) -> bool {
        self.track_ids.iter().any(|id| id == track_id)
    }
}
