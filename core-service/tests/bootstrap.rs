//! Bootstrapping the composed core against minimal host bridges.

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    AudioSampler, AudioSnippet, AudioSource, MatchedTrack, PlaybackAdapter,
    PlaybackRequest, PlaybackSessionId, PreparedMedia, RecognitionOutcome, RecognitionRequestId,
    RecognitionService, SnippetWindow,
};
use bytes::Bytes;
use core_runtime::config::RecognitionConfig;
use core_runtime::events::{PlaybackStatus, RecognitionEvent};
use core_service::{
    CoreConfig, CoreDependencies, CoreError, CoreEvent, CoreService, EventStream, RecognitionStatus,
    Track,
};
use std::sync::Arc;
use std::time::Duration;

struct InstantEngine;

#[async_trait]
impl PlaybackAdapter for InstantEngine {
    async fn prepare(&self, _request: PlaybackRequest) -> BridgeResult<PreparedMedia> {
        Ok(PreparedMedia {
            session: PlaybackSessionId::new(),
            duration: Some(Duration::from_secs(180)),
        })
    }
    async fn play(&self, _session: PlaybackSessionId) -> BridgeResult<()> {
        Ok(())
    }
    async fn pause(&self, _session: PlaybackSessionId) -> BridgeResult<()> {
        Ok(())
    }
    async fn stop(&self, _session: PlaybackSessionId) -> BridgeResult<()> {
        Ok(())
    }
    async fn seek(&self, _session: PlaybackSessionId, _position: Duration) -> BridgeResult<()> {
        Ok(())
    }
    async fn get_position(&self, _session: PlaybackSessionId) -> BridgeResult<Duration> {
        Ok(Duration::ZERO)
    }
    async fn get_duration(&self, _session: PlaybackSessionId) -> BridgeResult<Option<Duration>> {
        Ok(Some(Duration::from_secs(180)))
    }
    async fn unload(&self, _session: PlaybackSessionId) -> BridgeResult<()> {
        Ok(())
    }
}

struct SilentSampler;

#[async_trait]
impl AudioSampler for SilentSampler {
    async fn capture(&self, _source: &AudioSource, window: SnippetWindow) -> BridgeResult<AudioSnippet> {
        Ok(AudioSnippet::new(Bytes::from_static(&[0; 64]), 8_000, 1, window))
    }
}

struct KnowsEverything;

#[async_trait]
impl RecognitionService for KnowsEverything {
    async fn submit(
        &self,
        _request_id: RecognitionRequestId,
        _snippet: AudioSnippet,
    ) -> BridgeResult<RecognitionOutcome> {
        Ok(RecognitionOutcome::Matched(MatchedTrack {
            title: "Windowlicker".to_string(),
            artist: Some("Aphex Twin".to_string()),
            album: None,
            external_id: Some("isrc:GBBPW9900011".to_string()),
            confidence: 0.88,
        }))
    }

    async fn cancel(&self, _request_id: RecognitionRequestId) -> BridgeResult<()> {
        Ok(())
    }
}

fn deps() -> CoreDependencies {
    CoreDependencies::new(
        Arc::new(InstantEngine),
        Arc::new(SilentSampler),
        Arc::new(KnowsEverything),
    )
}

fn quiet_config() -> CoreConfig {
    CoreConfig::builder()
        .in_memory()
        .position_poll_interval(None)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_bootstrap_plays_and_enriches() {
    let core = CoreService::bootstrap(quiet_config(), deps()).await.unwrap();
    let mut enriched = EventStream::new(core.events().subscribe()).filter(|event| {
        matches!(event, CoreEvent::Recognition(RecognitionEvent::TrackEnriched { .. }))
    });

    let track = Track::new("Untitled 04", "/music/unknown.flac", 0);
    let track_id = track.id.clone();
    core.player().play(track).await.unwrap();

    let event = tokio::time::timeout(Duration::from_secs(5), enriched.recv())
        .await
        .expect("no enrichment within 5s")
        .unwrap();
    assert!(matches!(
        event,
        CoreEvent::Recognition(RecognitionEvent::TrackEnriched { ref title, .. }) if title == "Windowlicker"
    ));

    let stored = core.library().get_track(&track_id).await.unwrap();
    assert_eq!(stored.recognition_status, RecognitionStatus::Recognized);
    assert_eq!(stored.artist.as_deref(), Some("Aphex Twin"));
    assert_eq!(
        core.player().state().await.unwrap().status,
        PlaybackStatus::Playing
    );

    core.shutdown().await.unwrap();
    assert!(core.player().state().await.is_err());
}

#[tokio::test]
async fn test_bootstrap_rejects_invalid_config() {
    let config = CoreConfig {
        recognition: RecognitionConfig {
            timeout: Duration::ZERO,
            ..RecognitionConfig::default()
        },
        ..CoreConfig::default()
    };

    let result = CoreService::bootstrap(config, deps()).await;
    assert!(matches!(result, Err(CoreError::Config(_))));
}

#[tokio::test]
async fn test_library_survives_restart() {
    let path = std::env::temp_dir().join(format!("earmark-{}.db", uuid::Uuid::new_v4()));
    let config = CoreConfig::builder()
        .database_path(&path)
        .position_poll_interval(None)
        .build()
        .unwrap();

    let core = CoreService::bootstrap(config.clone(), deps()).await.unwrap();
    let library = core.library();
    let track = library
        .import_track(Track::new("Kept", "/music/kept.mp3", 90_000))
        .await
        .unwrap();
    let playlist = library.create_playlist("Road trip").await.unwrap();
    library.append_to_playlist(&playlist.id, &track.id).await.unwrap();
    core.shutdown().await.unwrap();

    let reopened = CoreService::bootstrap(config, deps()).await.unwrap();
    let library = reopened.library();
    assert_eq!(library.get_track(&track.id).await.unwrap().title, "Kept");
    assert_eq!(
        library.get_playlist(&playlist.id).await.unwrap().track_ids,
        vec![track.id.clone()]
    );
    reopened.shutdown().await.unwrap();

    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
    }
}
