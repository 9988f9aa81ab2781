//! # Playback Engine Façade
//!
//! Narrow wrapper over the host [`PlaybackAdapter`]. It remembers the loaded
//! session so callers deal in tracks instead of session ids, and turns
//! bridge failures into [`PlaybackError`]s. Owned by the orchestrator task.

use crate::error::{PlaybackError, Result};
use bridge_traits::{
    AudioSource, BridgeError, PlaybackAdapter, PlaybackMetadata, PlaybackRequest,
    PlaybackSessionId, PreparedMedia,
};
use core_library::Track;
use core_runtime::logging::strip_path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub struct PlaybackEngine {
    adapter: Arc<dyn PlaybackAdapter>,
    loaded: Option<PreparedMedia>,
}

fn engine_failure(err: BridgeError) -> PlaybackError {
    PlaybackError::EngineFailure(err.to_string())
}

impl PlaybackEngine {
    pub fn new(adapter: Arc<dyn PlaybackAdapter>) -> Self {
        Self {
            adapter,
            loaded: None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    fn session(&self) -> Result<PlaybackSessionId> {
        self.loaded
            .map(|media| media.session)
            .ok_or(PlaybackError::NoTrackLoaded)
    }

    /// Load `track`, replacing whatever was loaded. Resolves once the engine
    /// is ready and returns the media duration when one is known.
    pub async fn load(&mut self, track: &Track) -> Result<Option<Duration>> {
        self.unload().await;

        let request = PlaybackRequest::new(AudioSource::from_locator(&track.source)).with_metadata(
            PlaybackMetadata {
                track_id: Some(track.id.clone()),
                title: Some(track.title.clone()),
                artist: track.artist.clone(),
                album: track.album.clone(),
            },
        );

        debug!(track_id = %track.id, source = %strip_path(&track.source), "Preparing media");
        let prepared = self
            .adapter
            .prepare(request)
            .await
            .map_err(|e| PlaybackError::LoadFailed {
                track_id: track.id.clone(),
                message: e.to_string(),
            })?;
        self.loaded = Some(prepared);

        let duration = match prepared.duration {
            Some(duration) => Some(duration),
            None => match self.adapter.get_duration(prepared.session).await {
                Ok(duration) => duration,
                Err(e) => {
                    debug!(error = %e, "Engine duration unavailable");
                    None
                }
            },
        };
        let library_duration = u64::try_from(track.duration_ms)
            .ok()
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis);

        Ok(duration.or(library_duration))
    }

    pub async fn play(&self) -> Result<()> {
        self.adapter
            .play(self.session()?)
            .await
            .map_err(engine_failure)
    }

    pub async fn pause(&self) -> Result<()> {
        self.adapter
            .pause(self.session()?)
            .await
            .map_err(engine_failure)
    }

    pub async fn seek(&self, position: Duration) -> Result<()> {
        self.adapter
            .seek(self.session()?, position)
            .await
            .map_err(engine_failure)
    }

    pub async fn position(&self) -> Result<Duration> {
        self.adapter
            .get_position(self.session()?)
            .await
            .map_err(engine_failure)
    }

    /// Stop and release the loaded session. Engine errors are logged only.
    pub async fn unload(&mut self) {
        let Some(media) = self.loaded.take() else {
            return;
        };
        if let Err(e) = self.adapter.stop(media.session).await {
            warn!(error = %e, "Engine stop failed");
        }
        if let Err(e) = self.adapter.unload(media.session).await {
            warn!(error = %e, "Engine unload failed");
        }
    }
}
