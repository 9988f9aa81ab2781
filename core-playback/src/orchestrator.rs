//! # Playback Orchestrator
//!
//! Owns the one active playback session and decides when tracks get
//! recognized.
//!
//! ## Architecture
//!
//! ```text
//!  PlaybackOrchestrator (handle, Clone)
//!        │ Command + oneshot reply
//!        ▼
//!  ┌──────────────────────────────┐   terminal attempts   ┌────────────────────┐
//!  │ orchestrator task            │ ◄──────────────────── │ RecognitionSession │
//!  │  PlaybackState, PlayQueue    │                       │  (own tasks)       │
//!  │  PlaybackEngine              │ ── start ───────────► └────────────────────┘
//!  └──────────────┬───────────────┘
//!                 │ enrich / status writes        events
//!                 ▼                                  ▼
//!           LibraryStore                         EventBus
//! ```
//!
//! Every state mutation and engine call happens on the orchestrator task.
//! Recognition runs on its own tasks and reports back through a channel, so
//! its outcome is applied between commands and never interrupts playback.
//!
//! ## Status transitions
//!
//! ```text
//! idle ──play──> buffering ──engine ready──> playing ──pause──> paused
//!                    │                          ▲  ◄──resume──┘
//!                    └──load failure──> error   └── next / previous / queue end
//! any but idle ──stop──> idle          queue end (repeat off) ──> stopped
//! ```

use crate::engine::PlaybackEngine;
use crate::error::{PlaybackError, Result};
use crate::queue::{PlayQueue, QueueSnapshot, RepeatMode};
use crate::state::PlaybackState;
use bridge_traits::{AudioSampler, AudioSource, Clock, PlaybackAdapter, SnippetWindow};
use core_library::{LibraryStore, RecognitionStatus, Track, TrackMetadata};
use core_recognition::{
    AttemptId, AttemptStatus, RecognitionAttempt, RecognitionClient, RecognitionSession,
    SessionContext,
};
use core_runtime::config::{PlaybackConfig, RecognitionConfig};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent, PlaybackStatus, RecognitionEvent};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

/// `previous()` restarts the current track instead once past this point.
const RESTART_THRESHOLD: Duration = Duration::from_secs(3);

/// Reason code for matches that could not be written to the library.
const ENRICHMENT_FAILED: &str = "enrichment_failed";

use core_runtime::events::PlaybackStatus::{
    Buffering, Error as Errored, Idle, Paused, Playing, Stopped,
};

/// What `on_track_started` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecognitionStart {
    /// A new attempt was started.
    Started(AttemptId),
    /// An attempt for the track is already running.
    AlreadyInFlight(AttemptId),
    /// The track is not `unrecognized`; nothing to do.
    Skipped(RecognitionStatus),
}

/// Collaborators the orchestrator task drives.
pub struct OrchestratorDeps {
    pub adapter: Arc<dyn PlaybackAdapter>,
    pub sampler: Arc<dyn AudioSampler>,
    pub client: RecognitionClient,
    pub library: Arc<LibraryStore>,
    pub events: EventBus,
    pub clock: Arc<dyn Clock>,
}

type Reply<T> = oneshot::Sender<Result<T>>;

enum Command {
    Play(Track, Reply<()>),
    Pause(Reply<()>),
    Resume(Reply<()>),
    Seek(Duration, Reply<()>),
    Stop(Reply<()>),
    SetQueue(Vec<Track>, usize, Reply<()>),
    Next(Reply<Option<String>>),
    Previous(Reply<()>),
    SkipTo(usize, Reply<()>),
    SetShuffle(bool, Reply<()>),
    CycleRepeat(Reply<RepeatMode>),
    TrackStarted(String, Reply<RecognitionStart>),
    RetryRecognition(String, Reply<AttemptId>),
    State(Reply<PlaybackState>),
    Queue(Reply<QueueSnapshot>),
    InFlight(String, Reply<Option<AttemptId>>),
    Shutdown(oneshot::Sender<()>),
}

/// Handle to the orchestrator task. Cheap to clone.
#[derive(Clone)]
pub struct PlaybackOrchestrator {
    commands: mpsc::Sender<Command>,
}

impl PlaybackOrchestrator {
    /// Spawn the orchestrator task on the current tokio runtime.
    pub fn spawn(
        deps: OrchestratorDeps,
        playback: &PlaybackConfig,
        recognition: &RecognitionConfig,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::channel(playback.command_buffer.max(1));
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();

        let actor = Orchestrator {
            engine: PlaybackEngine::new(deps.adapter),
            library: deps.library,
            events: deps.events,
            sessions: SessionContext::new(
                deps.client,
                deps.sampler,
                deps.clock,
                recognition.timeout,
                completions_tx,
            ),
            window: SnippetWindow::new(recognition.snippet_offset, recognition.snippet_duration),
            state: PlaybackState::default(),
            queue: PlayQueue::new(),
            in_flight: HashMap::new(),
        };

        tokio::spawn(actor.run(commands_rx, completions_rx, playback.position_poll_interval));
        Self {
            commands: commands_tx,
        }
    }

    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| PlaybackError::OrchestratorClosed)?;
        response.await.map_err(|_| PlaybackError::OrchestratorClosed)?
    }

    /// Load and start `track`, registering it in the library first.
    ///
    /// Replaces the queue with this single track. Fails with `LoadFailed`
    /// or `EngineFailure` and leaves the status `error` when the engine
    /// cannot start it.
    pub async fn play(&self, track: Track) -> Result<()> {
        self.request(|reply| Command::Play(track, reply)).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.request(Command::Pause).await
    }

    pub async fn resume(&self) -> Result<()> {
        self.request(Command::Resume).await
    }

    pub async fn seek(&self, position: Duration) -> Result<()> {
        self.request(|reply| Command::Seek(position, reply)).await
    }

    /// Stop playback and return to `idle`. Also the way out of `error`.
    pub async fn stop(&self) -> Result<()> {
        self.request(Command::Stop).await
    }

    /// Replace the queue and play the entry at `start`.
    pub async fn set_queue(&self, tracks: Vec<Track>, start: usize) -> Result<()> {
        self.request(|reply| Command::SetQueue(tracks, start, reply))
            .await
    }

    /// Skip forward. Returns the id of the track now playing, or `None`
    /// when the queue ended and playback stopped.
    pub async fn next(&self) -> Result<Option<String>> {
        self.request(Command::Next).await
    }

    pub async fn previous(&self) -> Result<()> {
        self.request(Command::Previous).await
    }

    pub async fn skip_to(&self, index: usize) -> Result<()> {
        self.request(|reply| Command::SkipTo(index, reply)).await
    }

    pub async fn set_shuffle(&self, shuffle: bool) -> Result<()> {
        self.request(|reply| Command::SetShuffle(shuffle, reply))
            .await
    }

    pub async fn cycle_repeat_mode(&self) -> Result<RepeatMode> {
        self.request(Command::CycleRepeat).await
    }

    /// Start recognition for an `unrecognized` track. Repeated calls while
    /// an attempt runs are no-ops.
    pub async fn on_track_started(&self, track_id: &str) -> Result<RecognitionStart> {
        let track_id = track_id.to_string();
        self.request(|reply| Command::TrackStarted(track_id, reply))
            .await
    }

    /// Start a fresh attempt for a track whose last attempt failed.
    pub async fn retry_recognition(&self, track_id: &str) -> Result<AttemptId> {
        let track_id = track_id.to_string();
        self.request(|reply| Command::RetryRecognition(track_id, reply))
            .await
    }

    pub async fn state(&self) -> Result<PlaybackState> {
        self.request(Command::State).await
    }

    pub async fn queue(&self) -> Result<QueueSnapshot> {
        self.request(Command::Queue).await
    }

    /// Attempt currently running for `track_id`, if any.
    pub async fn recognition_in_flight(&self, track_id: &str) -> Result<Option<AttemptId>> {
        let track_id = track_id.to_string();
        self.request(|reply| Command::InFlight(track_id, reply))
            .await
    }

    /// Cancel running attempts, release the engine and end the task.
    pub async fn shutdown(&self) -> Result<()> {
        let (reply, done) = oneshot::channel();
        self.commands
            .send(Command::Shutdown(reply))
            .await
            .map_err(|_| PlaybackError::OrchestratorClosed)?;
        done.await.map_err(|_| PlaybackError::OrchestratorClosed)
    }
}

// ============================================================================
// Orchestrator task
// ============================================================================

struct Orchestrator {
    engine: PlaybackEngine,
    library: Arc<LibraryStore>,
    events: EventBus,
    sessions: SessionContext,
    window: SnippetWindow,
    state: PlaybackState,
    queue: PlayQueue,
    in_flight: HashMap<String, RecognitionSession>,
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

fn reply<T>(reply: Reply<T>, result: Result<T>) {
    // The caller may have given up waiting.
    let _ = reply.send(result);
}

impl Orchestrator {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut completions: mpsc::UnboundedReceiver<RecognitionAttempt>,
        poll_interval: Option<Duration>,
    ) {
        let mut ticker = poll_interval.filter(|period| !period.is_zero()).map(|period| {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval
        });
        info!("Playback orchestrator started");

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown(done)) => {
                        self.shutdown(&mut completions).await;
                        let _ = done.send(());
                        break;
                    }
                    Some(command) => self.handle(command).await,
                    None => {
                        self.shutdown(&mut completions).await;
                        break;
                    }
                },
                Some(attempt) = completions.recv() => self.on_recognition_resolved(attempt).await,
                _ = tick(&mut ticker), if self.state.status == Playing => self.poll_position().await,
            }
        }

        info!("Playback orchestrator stopped");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Play(track, tx) => reply(tx, self.play(track).await),
            Command::Pause(tx) => reply(tx, self.pause().await),
            Command::Resume(tx) => reply(tx, self.resume().await),
            Command::Seek(position, tx) => reply(tx, self.seek(position).await),
            Command::Stop(tx) => reply(tx, self.stop().await),
            Command::SetQueue(tracks, start, tx) => reply(tx, self.set_queue(tracks, start).await),
            Command::Next(tx) => reply(tx, self.next().await),
            Command::Previous(tx) => reply(tx, self.previous().await),
            Command::SkipTo(index, tx) => reply(tx, self.skip_to(index).await),
            Command::SetShuffle(shuffle, tx) => {
                self.queue.set_shuffle(shuffle);
                reply(tx, Ok(()))
            }
            Command::CycleRepeat(tx) => reply(tx, Ok(self.queue.cycle_repeat())),
            Command::TrackStarted(track_id, tx) => {
                reply(tx, self.start_recognition(&track_id, false).await)
            }
            Command::RetryRecognition(track_id, tx) => {
                let started = match self.start_recognition(&track_id, true).await {
                    Ok(RecognitionStart::Started(id) | RecognitionStart::AlreadyInFlight(id)) => Ok(id),
                    Ok(RecognitionStart::Skipped(status)) => {
                        Err(PlaybackError::NotRetryable { track_id, status })
                    }
                    Err(e) => Err(e),
                };
                reply(tx, started)
            }
            Command::State(tx) => reply(tx, Ok(self.state.clone())),
            Command::Queue(tx) => reply(tx, Ok(self.queue.snapshot())),
            Command::InFlight(track_id, tx) => {
                reply(tx, Ok(self.in_flight.get(&track_id).map(RecognitionSession::id)))
            }
            // intercepted by `run`
            Command::Shutdown(done) => {
                let _ = done.send(());
            }
        }
    }

    // ------------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------------

    async fn set_status(&mut self, status: PlaybackStatus) {
        self.state.status = status;
        debug!(status = %status, "Playback status changed");
        self.events
            .publish(CoreEvent::Playback(PlaybackEvent::StateChanged {
                track_id: self.state.track_id.clone(),
                status,
            }))
            .await;
    }

    async fn emit_position(&self) {
        if let Some(track_id) = &self.state.track_id {
            self.events
                .publish(CoreEvent::Playback(PlaybackEvent::PositionChanged {
                    track_id: track_id.clone(),
                    position_ms: self.state.position_ms(),
                    duration_ms: self.state.duration_ms(),
                }))
                .await;
        }
    }

    /// Halt playback after an engine failure and hand the error back.
    async fn fail(&mut self, err: PlaybackError) -> PlaybackError {
        warn!(track_id = ?self.state.track_id, error = %err, "Playback failed");
        self.events
            .publish(CoreEvent::Playback(PlaybackEvent::Error {
                track_id: self.state.track_id.clone(),
                message: err.to_string(),
            }))
            .await;
        self.set_status(Errored).await;
        err
    }

    // ------------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------------

    #[instrument(skip(self, track), fields(track_id = %track.id))]
    async fn play(&mut self, track: Track) -> Result<()> {
        self.state
            .require("play", &[Idle, Playing, Paused, Stopped])?;

        let track = self.library.import_track(track).await?;
        self.queue.set(vec![track.clone()], 0)?;
        self.start_track(track).await
    }

    async fn set_queue(&mut self, tracks: Vec<Track>, start: usize) -> Result<()> {
        self.state
            .require("set queue", &[Idle, Playing, Paused, Stopped])?;
        if tracks.is_empty() {
            return Err(PlaybackError::QueueEmpty);
        }
        if start >= tracks.len() {
            return Err(PlaybackError::QueueIndexOutOfRange {
                index: start,
                len: tracks.len(),
            });
        }

        let mut imported = Vec::with_capacity(tracks.len());
        for track in tracks {
            imported.push(self.library.import_track(track).await?);
        }
        let current = self.queue.set(imported, start)?.clone();
        self.start_track(current).await
    }

    /// Load, start and hand the track to recognition.
    async fn start_track(&mut self, track: Track) -> Result<()> {
        self.state.begin(&track.id);
        self.set_status(Buffering).await;

        match self.engine.load(&track).await {
            Ok(duration) => self.state.duration = duration,
            Err(e) => return Err(self.fail(e).await),
        }
        if let Err(e) = self.engine.play().await {
            return Err(self.fail(e).await);
        }
        self.set_status(Playing).await;
        info!(track_id = %track.id, "Playback started");

        if let Err(e) = self.start_recognition(&track.id, false).await {
            warn!(track_id = %track.id, error = %e, "Could not start recognition");
        }
        Ok(())
    }

    async fn pause(&mut self) -> Result<()> {
        self.state.require("pause", &[Playing])?;
        if let Err(e) = self.engine.pause().await {
            return Err(self.fail(e).await);
        }
        self.set_status(Paused).await;
        Ok(())
    }

    async fn resume(&mut self) -> Result<()> {
        self.state.require("resume", &[Paused])?;
        if let Err(e) = self.engine.play().await {
            return Err(self.fail(e).await);
        }
        self.set_status(Playing).await;
        Ok(())
    }

    async fn seek(&mut self, position: Duration) -> Result<()> {
        self.state.require("seek", &[Playing, Paused])?;
        if let Some(duration) = self.state.duration {
            if position > duration {
                return Err(PlaybackError::SeekOutOfBounds { position, duration });
            }
        }

        if let Err(e) = self.engine.seek(position).await {
            return Err(self.fail(e).await);
        }
        self.state.seek(position);
        self.emit_position().await;
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        self.state
            .require("stop", &[Buffering, Playing, Paused, Stopped, Errored])?;

        self.engine.unload().await;
        self.state.reset();
        self.set_status(Idle).await;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Queue
    // ------------------------------------------------------------------------

    fn require_queue_control(&self, operation: &'static str) -> Result<()> {
        self.state
            .require(operation, &[Idle, Playing, Paused, Stopped])?;
        if self.queue.is_empty() {
            return Err(PlaybackError::QueueEmpty);
        }
        Ok(())
    }

    async fn next(&mut self) -> Result<Option<String>> {
        self.require_queue_control("skip")?;
        match self.queue.advance(false).cloned() {
            Some(track) => {
                let track_id = track.id.clone();
                self.start_track(track).await?;
                Ok(Some(track_id))
            }
            None => {
                self.finish_queue().await;
                Ok(None)
            }
        }
    }

    async fn previous(&mut self) -> Result<()> {
        self.require_queue_control("skip back")?;

        if matches!(self.state.status, Playing | Paused) && self.state.position > RESTART_THRESHOLD {
            if let Err(e) = self.engine.seek(Duration::ZERO).await {
                return Err(self.fail(e).await);
            }
            self.state.seek(Duration::ZERO);
            self.emit_position().await;
            return Ok(());
        }

        match self.queue.previous().cloned() {
            Some(track) => self.start_track(track).await,
            None => Err(PlaybackError::QueueEmpty),
        }
    }

    async fn skip_to(&mut self, index: usize) -> Result<()> {
        self.require_queue_control("skip")?;
        let track = self.queue.skip_to(index)?.clone();
        self.start_track(track).await
    }

    async fn finish_queue(&mut self) {
        info!("Reached end of queue");
        self.engine.unload().await;
        self.state.position = Duration::ZERO;
        self.set_status(Stopped).await;
    }

    // ------------------------------------------------------------------------
    // Telemetry
    // ------------------------------------------------------------------------

    async fn poll_position(&mut self) {
        let reported = match self.engine.position().await {
            Ok(position) => position,
            Err(e) => {
                warn!(error = %e, "Position poll failed");
                return;
            }
        };
        self.state.advance_position(reported);
        self.emit_position().await;

        if self.state.is_finished() {
            debug!(track_id = ?self.state.track_id, "Track finished");
            match self.queue.advance(true).cloned() {
                Some(track) => {
                    if let Err(e) = self.start_track(track).await {
                        warn!(error = %e, "Automatic advance failed");
                    }
                }
                None => self.finish_queue().await,
            }
        }
    }

    // ------------------------------------------------------------------------
    // Recognition
    // ------------------------------------------------------------------------

    #[instrument(skip(self))]
    async fn start_recognition(&mut self, track_id: &str, retry: bool) -> Result<RecognitionStart> {
        if let Some(session) = self.in_flight.get(track_id) {
            debug!(attempt_id = %session.id(), "Recognition already in flight");
            return Ok(RecognitionStart::AlreadyInFlight(session.id()));
        }

        let track = self.library.get_track(track_id).await?;
        let expected = if retry {
            RecognitionStatus::Failed
        } else {
            RecognitionStatus::Unrecognized
        };
        if track.recognition_status != expected {
            return Ok(RecognitionStart::Skipped(track.recognition_status));
        }

        self.library.begin_recognition(track_id).await?;
        let session = RecognitionSession::start(
            &self.sessions,
            track_id,
            AudioSource::from_locator(&track.source),
            self.window,
        );
        let attempt_id = session.id();
        self.in_flight.insert(track_id.to_string(), session);

        self.events
            .publish(CoreEvent::Recognition(RecognitionEvent::Started {
                track_id: track_id.to_string(),
                attempt_id: attempt_id.to_string(),
            }))
            .await;
        Ok(RecognitionStart::Started(attempt_id))
    }

    #[instrument(skip(self, attempt), fields(track_id = %attempt.track_id, attempt_id = %attempt.id))]
    async fn on_recognition_resolved(&mut self, attempt: RecognitionAttempt) {
        let tracked = self.in_flight.get(&attempt.track_id).map(RecognitionSession::id);
        if tracked != Some(attempt.id) {
            debug!("Ignoring result of an attempt that is no longer tracked");
            return;
        }
        self.in_flight.remove(&attempt.track_id);

        let track_id = attempt.track_id.clone();
        let attempt_id = attempt.id.to_string();

        match (attempt.status, attempt.result, attempt.failure) {
            (AttemptStatus::Recognized, Some(matched), _) => {
                let metadata = TrackMetadata {
                    title: matched.title,
                    artist: matched.artist,
                    album: matched.album,
                    external_id: matched.external_id,
                    confidence: matched.confidence,
                };
                match self.library.enrich(&track_id, metadata).await {
                    Ok(track) => {
                        self.queue.refresh(&track);
                        self.events
                            .publish(CoreEvent::Recognition(RecognitionEvent::TrackEnriched {
                                track_id,
                                attempt_id,
                                title: track.title,
                                artist: track.artist,
                                album: track.album,
                                confidence: track.match_confidence.unwrap_or_default(),
                            }))
                            .await;
                    }
                    Err(e) => {
                        warn!(error = %e, "Enrichment write failed");
                        self.record_failure(track_id, attempt_id, ENRICHMENT_FAILED, Some(e.to_string()))
                            .await;
                    }
                }
            }
            (_, _, Some(reason)) => {
                let detail = reason.detail().map(str::to_string);
                self.record_failure(track_id, attempt_id, reason.code(), detail)
                    .await;
            }
            (status, _, _) => {
                warn!(status = %status, "Attempt resolved without result or reason");
                self.record_failure(track_id, attempt_id, "service", None).await;
            }
        }
    }

    async fn record_failure(
        &mut self,
        track_id: String,
        attempt_id: String,
        reason: &str,
        detail: Option<String>,
    ) {
        match self.library.mark_recognition_failed(&track_id).await {
            Ok(track) => self.queue.refresh(&track),
            Err(e) => warn!(%track_id, error = %e, "Could not mark recognition failed"),
        }
        self.events
            .publish(CoreEvent::Recognition(RecognitionEvent::Failed {
                track_id,
                attempt_id,
                reason: reason.to_string(),
                detail,
            }))
            .await;
    }

    async fn shutdown(&mut self, completions: &mut mpsc::UnboundedReceiver<RecognitionAttempt>) {
        for session in self.in_flight.values() {
            session.cancel();
        }
        // Cancelled attempts resolve synchronously; record them before leaving.
        while let Ok(attempt) = completions.try_recv() {
            self.on_recognition_resolved(attempt).await;
        }

        self.engine.unload().await;
        if self.state.status != Idle {
            self.state.reset();
            self.set_status(Idle).await;
        }
    }
}
