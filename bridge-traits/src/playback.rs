//! Media engine bridge traits and supporting types.
//!
//! The core never decodes or renders audio itself. Host applications hand it a
//! [`PlaybackAdapter`] wrapping their native media engine (ExoPlayer, AVPlayer,
//! a desktop sink) and the core drives it through this narrow surface:
//! load, transport controls, and position/duration telemetry.

use crate::error::Result;
use bytes::Bytes;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

/// High-level audio source descriptor provided to playback adapters.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioSource {
    /// Local file accessible to the host runtime.
    LocalFile { path: PathBuf },
    /// Remote HTTP(S) stream to be fetched by the host.
    RemoteStream {
        url: String,
        headers: HashMap<String, String>,
    },
    /// In-memory audio buffer supplied by the caller.
    MemoryBuffer { data: Bytes },
}

impl AudioSource {
    /// Build a source from a persisted locator string.
    ///
    /// `http://` and `https://` locators become remote streams, `file://`
    /// prefixes are stripped, anything else is treated as a local path.
    pub fn from_locator(locator: &str) -> Self {
        let lower = locator.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            AudioSource::RemoteStream {
                url: locator.to_string(),
                headers: HashMap::new(),
            }
        } else if let Some(path) = locator.strip_prefix("file://") {
            AudioSource::LocalFile {
                path: PathBuf::from(path),
            }
        } else {
            AudioSource::LocalFile {
                path: PathBuf::from(locator),
            }
        }
    }

    /// Determine whether the source represents remote content.
    pub fn is_remote(&self) -> bool {
        matches!(self, AudioSource::RemoteStream { .. })
    }
}

/// Unique identifier for playback sessions managed by a host adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaybackSessionId(Uuid);

impl PlaybackSessionId {
    /// Generate a new session identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Construct an identifier from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Borrow the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PlaybackSessionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Metadata associated with a playback request. Implementations may use this to
/// enrich platform media sessions or notification center entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackMetadata {
    /// Optional opaque track identifier.
    pub track_id: Option<String>,
    /// Display title for the track.
    pub title: Option<String>,
    /// Display artist string.
    pub artist: Option<String>,
    /// Album or collection name.
    pub album: Option<String>,
}

/// Request describing the media the adapter should load.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackRequest {
    /// Source to feed into the engine.
    pub source: AudioSource,
    /// Optional metadata surfaced to the host.
    pub metadata: PlaybackMetadata,
}

impl PlaybackRequest {
    /// Construct a new playback request for the provided source.
    pub fn new(source: AudioSource) -> Self {
        Self {
            source,
            metadata: PlaybackMetadata::default(),
        }
    }

    /// Attach metadata to the request.
    pub fn with_metadata(mut self, metadata: PlaybackMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Returned by [`PlaybackAdapter::prepare`] once the engine reports the media
/// as ready to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreparedMedia {
    /// Session handle for subsequent control calls.
    pub session: PlaybackSessionId,
    /// Media duration, when the engine could determine it at load time.
    pub duration: Option<Duration>,
}

/// Trait for platform-specific playback adapters that drive native audio engines.
#[async_trait::async_trait]
pub trait PlaybackAdapter: Send + Sync {
    /// Load the requested media. Resolves once the engine is ready to start,
    /// or fails if the source cannot be opened.
    async fn prepare(&self, request: PlaybackRequest) -> Result<PreparedMedia>;

    /// Begin or resume playback for the provided session.
    async fn play(&self, session: PlaybackSessionId) -> Result<()>;

    /// Pause playback without releasing the session.
    async fn pause(&self, session: PlaybackSessionId) -> Result<()>;

    /// Stop playback and reset position to the start of the stream.
    async fn stop(&self, session: PlaybackSessionId) -> Result<()>;

    /// Seek to an absolute position within the stream.
    async fn seek(&self, session: PlaybackSessionId, position: Duration) -> Result<()>;

    /// Query the current playback position.
    async fn get_position(&self, session: PlaybackSessionId) -> Result<Duration>;

    /// Query the media duration. `None` for live or unbounded streams.
    async fn get_duration(&self, session: PlaybackSessionId) -> Result<Option<Duration>>;

    /// Release resources associated with a playback session.
    async fn unload(&self, session: PlaybackSessionId) -> Result<()>;
}
