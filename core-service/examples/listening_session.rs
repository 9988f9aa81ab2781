//! # Listening Session Example
//!
//! Boots the core against simulated host bridges, plays an untagged track
//! and prints the events a UI would observe while recognition enriches it.
//!
//! Run with: `cargo run --example listening_session --package core-service`

use anyhow::Context;
use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    AudioSampler, AudioSnippet, AudioSource, MatchedTrack, PlaybackAdapter,
    PlaybackRequest, PlaybackSessionId, PreparedMedia, RecognitionOutcome, RecognitionRequestId,
    RecognitionService, SnippetWindow,
};
use bytes::Bytes;
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use core_service::{CoreConfig, CoreDependencies, CoreService, Track};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

// ============================================================================
// Simulated host bridges
// ============================================================================

/// Pretends to play anything; position follows the wall clock.
#[derive(Default)]
struct SimulatedEngine {
    started: Mutex<Option<Instant>>,
}

#[async_trait]
impl PlaybackAdapter for SimulatedEngine {
    async fn prepare(&self, request: PlaybackRequest) -> BridgeResult<PreparedMedia> {
        println!("  [engine] preparing {:?}", request.metadata.title);
        Ok(PreparedMedia {
            session: PlaybackSessionId::new(),
            duration: Some(Duration::from_secs(4)),
        })
    }

    async fn play(&self, _session: PlaybackSessionId) -> BridgeResult<()> {
        *self.started.lock() = Some(Instant::now());
        Ok(())
    }

    async fn pause(&self, _session: PlaybackSessionId) -> BridgeResult<()> {
        Ok(())
    }

    async fn stop(&self, _session: PlaybackSessionId) -> BridgeResult<()> {
        *self.started.lock() = None;
        Ok(())
    }

    async fn seek(&self, _session: PlaybackSessionId, _position: Duration) -> BridgeResult<()> {
        Ok(())
    }

    async fn get_position(&self, _session: PlaybackSessionId) -> BridgeResult<Duration> {
        let started = *self.started.lock();
        Ok(started.map(|at| at.elapsed()).unwrap_or_default())
    }

    async fn get_duration(&self, _session: PlaybackSessionId) -> BridgeResult<Option<Duration>> {
        Ok(Some(Duration::from_secs(4)))
    }

    async fn unload(&self, _session: PlaybackSessionId) -> BridgeResult<()> {
        Ok(())
    }
}

struct SilenceSampler;

#[async_trait]
impl AudioSampler for SilenceSampler {
    async fn capture(&self, _source: &AudioSource, window: SnippetWindow) -> BridgeResult<AudioSnippet> {
        Ok(AudioSnippet::new(
            Bytes::from(vec![0u8; 16_000]),
            8_000,
            1,
            window,
        ))
    }
}

/// Answers after a second, like a real fingerprinting round trip.
struct SlowRecognizer;

#[async_trait]
impl RecognitionService for SlowRecognizer {
    async fn submit(
        &self,
        request_id: RecognitionRequestId,
        _snippet: AudioSnippet,
    ) -> BridgeResult<RecognitionOutcome> {
        println!("  [service] fingerprinting request {request_id}");
        tokio::time::sleep(Duration::from_secs(1)).await;
        Ok(RecognitionOutcome::Matched(MatchedTrack {
            title: "Teardrop".to_string(),
            artist: Some("Massive Attack".to_string()),
            album: Some("Mezzanine".to_string()),
            external_id: Some("isrc:GBAAA9800041".to_string()),
            confidence: 0.97,
        }))
    }

    async fn cancel(&self, _request_id: RecognitionRequestId) -> BridgeResult<()> {
        Ok(())
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging(
        LoggingConfig::default()
            .with_format(LogFormat::Compact)
            .with_filter("warn"),
    )
    .context("initializing logging")?;

    println!("=== Listening Session Example ===\n");

    let config = CoreConfig::builder()
        .in_memory()
        .position_poll_interval(Some(Duration::from_millis(500)))
        .build()?;
    let deps = CoreDependencies::new(
        Arc::new(SimulatedEngine::default()),
        Arc::new(SilenceSampler),
        Arc::new(SlowRecognizer),
    );
    let core = CoreService::bootstrap(config, deps)
        .await
        .context("bootstrapping core")?;

    let mut events = core.events().subscribe();
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let payload = serde_json::to_string(&event).unwrap_or_default();
            println!("  [event] {}: {payload}", event.description());
        }
    });

    println!("1. Playing an untagged file...");
    core.player()
        .play(Track::new("track 07", "/sdcard/Music/track07.mp3", 0))
        .await?;

    println!("2. Listening for five seconds...");
    tokio::time::sleep(Duration::from_secs(5)).await;

    println!("3. Library after the session:");
    let library = core.library();
    let page = library.list_tracks(Default::default()).await?;
    for track in &page.items {
        println!(
            "   - {} by {} ({})",
            track.title,
            track.artist.as_deref().unwrap_or("unknown artist"),
            track.recognition_status
        );
    }

    core.shutdown().await?;
    printer.abort();
    println!("\n=== Example Complete ===");
    Ok(())
}
