//! Scripted host collaborators for orchestrator tests.
//!
//! The engine keeps time with `tokio::time::Instant`, so tests running on a
//! paused clock see positions advance exactly as far as the clock does.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    AudioSampler, AudioSnippet, AudioSource, BridgeError, ManualClock, MatchedTrack,
    PlaybackAdapter, PlaybackRequest, PlaybackSessionId, PreparedMedia, RecognitionOutcome,
    RecognitionRequestId, RecognitionService, SnippetWindow,
};
use bytes::Bytes;
use core_library::LibraryStore;
use core_playback::{OrchestratorDeps, PlaybackOrchestrator};
use core_recognition::RecognitionClient;
use core_runtime::config::{PlaybackConfig, RecognitionConfig};
use core_runtime::events::{CoreEvent, EventBus, EventStream, PlaybackEvent, PlaybackStatus};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

// ============================================================================
// Engine
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Prepare(String),
    Play,
    Pause,
    Seek(Duration),
    Stop,
    Unload,
}

struct Media {
    duration: Option<Duration>,
    base: Duration,
    playing_since: Option<Instant>,
}

impl Media {
    fn position(&self) -> Duration {
        match self.playing_since {
            Some(since) => self.base + since.elapsed(),
            None => self.base,
        }
    }
}

#[derive(Default)]
struct EngineInner {
    media: HashMap<PlaybackSessionId, Media>,
    durations: HashMap<String, Duration>,
    unplayable: HashSet<String>,
    calls: Vec<EngineCall>,
}

/// In-process media engine whose position follows the tokio clock.
#[derive(Default)]
pub struct ScriptedEngine {
    inner: Mutex<EngineInner>,
}

fn locator(source: &AudioSource) -> String {
    match source {
        AudioSource::LocalFile { path } => path.display().to_string(),
        AudioSource::RemoteStream { url, .. } => url.clone(),
        AudioSource::MemoryBuffer { .. } => "memory".to_string(),
    }
}

impl ScriptedEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Report `duration` when `source` is prepared.
    pub fn with_duration(self: Arc<Self>, source: &str, duration: Duration) -> Arc<Self> {
        self.inner.lock().durations.insert(source.to_string(), duration);
        self
    }

    /// Refuse to prepare `source`.
    pub fn with_unplayable(self: Arc<Self>, source: &str) -> Arc<Self> {
        self.inner.lock().unplayable.insert(source.to_string());
        self
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.inner.lock().calls.clone()
    }

    pub fn loaded_sessions(&self) -> usize {
        self.inner.lock().media.len()
    }

    fn with_media<T>(
        &self,
        session: PlaybackSessionId,
        call: EngineCall,
        f: impl FnOnce(&mut Media) -> T,
    ) -> BridgeResult<T> {
        let mut inner = self.inner.lock();
        inner.calls.push(call);
        inner
            .media
            .get_mut(&session)
            .map(f)
            .ok_or_else(|| BridgeError::OperationFailed("unknown session".to_string()))
    }
}

#[async_trait]
impl PlaybackAdapter for ScriptedEngine {
    async fn prepare(&self, request: PlaybackRequest) -> BridgeResult<PreparedMedia> {
        let source = locator(&request.source);
        let mut inner = self.inner.lock();
        inner.calls.push(EngineCall::Prepare(source.clone()));
        if inner.unplayable.contains(&source) {
            return Err(BridgeError::OperationFailed(format!(
                "cannot open {source}"
            )));
        }

        let session = PlaybackSessionId::new();
        let duration = inner.durations.get(&source).copied();
        inner.media.insert(
            session,
            Media {
                duration,
                base: Duration::ZERO,
                playing_since: None,
            },
        );
        Ok(PreparedMedia { session, duration })
    }

    async fn play(&self, session: PlaybackSessionId) -> BridgeResult<()> {
        self.with_media(session, EngineCall::Play, |media| {
            if media.playing_since.is_none() {
                media.playing_since = Some(Instant::now());
            }
        })
    }

    async fn pause(&self, session: PlaybackSessionId) -> BridgeResult<()> {
        self.with_media(session, EngineCall::Pause, |media| {
            media.base = media.position();
            media.playing_since = None;
        })
    }

    async fn stop(&self, session: PlaybackSessionId) -> BridgeResult<()> {
        self.with_media(session, EngineCall::Stop, |media| {
            media.base = Duration::ZERO;
            media.playing_since = None;
        })
    }

    async fn seek(&self, session: PlaybackSessionId, position: Duration) -> BridgeResult<()> {
        self.with_media(session, EngineCall::Seek(position), |media| {
            media.base = position;
            if media.playing_since.is_some() {
                media.playing_since = Some(Instant::now());
            }
        })
    }

    async fn get_position(&self, session: PlaybackSessionId) -> BridgeResult<Duration> {
        let inner = self.inner.lock();
        inner
            .media
            .get(&session)
            .map(Media::position)
            .ok_or_else(|| BridgeError::OperationFailed("unknown session".to_string()))
    }

    async fn get_duration(&self, session: PlaybackSessionId) -> BridgeResult<Option<Duration>> {
        let inner = self.inner.lock();
        Ok(inner.media.get(&session).and_then(|media| media.duration))
    }

    async fn unload(&self, session: PlaybackSessionId) -> BridgeResult<()> {
        let mut inner = self.inner.lock();
        inner.calls.push(EngineCall::Unload);
        inner.media.remove(&session);
        Ok(())
    }
}

// ============================================================================
// Sampler
// ============================================================================

/// Returns one second of silence for every capture.
#[derive(Default)]
pub struct SilentSampler {
    captures: AtomicUsize,
}

impl SilentSampler {
    pub fn captures(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioSampler for SilentSampler {
    async fn capture(&self, _source: &AudioSource, window: SnippetWindow) -> BridgeResult<AudioSnippet> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        Ok(AudioSnippet::new(
            Bytes::from(vec![0u8; 8_000 * 2]),
            8_000,
            1,
            window,
        ))
    }
}

// ============================================================================
// Recognition service
// ============================================================================

#[derive(Debug, Clone)]
enum Verdict {
    Match(MatchedTrack),
    NoMatch,
    Network,
}

/// One scripted service answer.
#[derive(Debug, Clone)]
pub struct Answer {
    delay: Duration,
    verdict: Verdict,
}

impl Answer {
    pub fn matched(title: &str, after: Duration) -> Self {
        Self {
            delay: after,
            verdict: Verdict::Match(MatchedTrack {
                title: title.to_string(),
                artist: Some("Scripted Artist".to_string()),
                album: Some("Scripted Album".to_string()),
                external_id: Some(format!("ext-{title}")),
                confidence: 0.93,
            }),
        }
    }

    pub fn no_match(after: Duration) -> Self {
        Self {
            delay: after,
            verdict: Verdict::NoMatch,
        }
    }

    pub fn network_error(after: Duration) -> Self {
        Self {
            delay: after,
            verdict: Verdict::Network,
        }
    }

    /// An answer that arrives long after any sensible timeout.
    pub fn never() -> Self {
        Self::no_match(Duration::from_secs(3_600))
    }
}

/// Plays back queued answers in order, then repeats the fallback.
pub struct ScriptedRecognizer {
    answers: Mutex<VecDeque<Answer>>,
    fallback: Answer,
    submits: AtomicUsize,
    cancels: Mutex<Vec<RecognitionRequestId>>,
}

impl ScriptedRecognizer {
    pub fn new(fallback: Answer) -> Arc<Self> {
        Arc::new(Self {
            answers: Mutex::new(VecDeque::new()),
            fallback,
            submits: AtomicUsize::new(0),
            cancels: Mutex::new(Vec::new()),
        })
    }

    pub fn then(self: Arc<Self>, answer: Answer) -> Arc<Self> {
        self.answers.lock().push_back(answer);
        self
    }

    pub fn submits(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
    }

    pub fn cancels(&self) -> usize {
        self.cancels.lock().len()
    }
}

#[async_trait]
impl RecognitionService for ScriptedRecognizer {
    async fn submit(
        &self,
        _request_id: RecognitionRequestId,
        _snippet: AudioSnippet,
    ) -> BridgeResult<RecognitionOutcome> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        let answer = self
            .answers
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        tokio::time::sleep(answer.delay).await;
        match answer.verdict {
            Verdict::Match(track) => Ok(RecognitionOutcome::Matched(track)),
            Verdict::NoMatch => Ok(RecognitionOutcome::NoMatch),
            Verdict::Network => Err(BridgeError::Network("connection reset".to_string())),
        }
    }

    async fn cancel(&self, request_id: RecognitionRequestId) -> BridgeResult<()> {
        self.cancels.lock().push(request_id);
        Ok(())
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub player: PlaybackOrchestrator,
    pub library: Arc<LibraryStore>,
    pub events: EventBus,
    pub engine: Arc<ScriptedEngine>,
    pub recognizer: Arc<ScriptedRecognizer>,
    pub sampler: Arc<SilentSampler>,
}

pub fn recognition_config(timeout: Duration) -> RecognitionConfig {
    RecognitionConfig {
        timeout,
        ..RecognitionConfig::default()
    }
}

/// Playback config with position polling at `interval`, or off.
pub fn playback_config(interval: Option<Duration>) -> PlaybackConfig {
    PlaybackConfig {
        position_poll_interval: interval,
        ..PlaybackConfig::default()
    }
}

impl Harness {
    pub fn start(
        engine: Arc<ScriptedEngine>,
        recognizer: Arc<ScriptedRecognizer>,
        playback: PlaybackConfig,
        recognition: RecognitionConfig,
    ) -> Self {
        let events = EventBus::new(1_024, Duration::from_secs(5));
        let clock = Arc::new(ManualClock::starting_at(1_700_000_000_000));
        let library = Arc::new(LibraryStore::in_memory(clock.clone(), events.clone()));
        let sampler = Arc::new(SilentSampler::default());

        let player = PlaybackOrchestrator::spawn(
            OrchestratorDeps {
                adapter: engine.clone(),
                sampler: sampler.clone(),
                client: RecognitionClient::from_config(recognizer.clone(), &recognition),
                library: library.clone(),
                events: events.clone(),
                clock,
            },
            &playback,
            &recognition,
        );

        Self {
            player,
            library,
            events,
            engine,
            recognizer,
            sampler,
        }
    }

    /// Stream of playback and recognition events, skipping position ticks.
    pub fn watch(&self) -> EventStream {
        EventStream::new(self.events.subscribe()).filter(|event| match event {
            CoreEvent::Playback(PlaybackEvent::PositionChanged { .. }) => false,
            CoreEvent::Playback(_) | CoreEvent::Recognition(_) => true,
            CoreEvent::Library(_) => false,
        })
    }
}

/// Drain whatever is queued right now.
pub fn drain(stream: &mut EventStream) -> Vec<CoreEvent> {
    std::iter::from_fn(|| stream.try_recv()).collect()
}

pub fn status_of(event: &CoreEvent) -> Option<PlaybackStatus> {
    match event {
        CoreEvent::Playback(PlaybackEvent::StateChanged { status, .. }) => Some(*status),
        _ => None,
    }
}
