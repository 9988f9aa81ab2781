//! # Recognition Session
//!
//! Lifecycle of one recognition attempt for one track.
//!
//! ## State Machine
//!
//! ```text
//! Pending ──match──────────────────────────────> Recognized
//!    │
//!    └──no match | timeout | client error ──────> Failed
//!       | snippet unavailable | cancelled
//! ```
//!
//! Both outcomes are terminal. A retry is a new attempt with a new
//! [`AttemptId`].
//!
//! ## Concurrency
//!
//! [`RecognitionSession::start`] spawns two tasks: one captures the snippet
//! and submits it, the other waits out the timeout. Whichever finishes first
//! resolves the attempt; the attempt mutex makes that transition happen
//! exactly once, and the terminal attempt is sent on the completion channel
//! exactly once. A response arriving after the timeout is discarded.
//! Cancellation towards the service is best effort.

use crate::client::RecognitionClient;
use crate::error::RecognitionError;
use bridge_traits::{
    AudioSampler, AudioSource, Clock, MatchedTrack, RecognitionOutcome, RecognitionRequestId,
    SnippetWindow,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::AbortHandle;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

// ============================================================================
// Attempt model
// ============================================================================

/// Identity of a single recognition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttemptId(Uuid);

impl AttemptId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AttemptId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptStatus {
    Pending,
    Recognized,
    Failed,
}

impl AttemptStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AttemptStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::Pending => "pending",
            AttemptStatus::Recognized => "recognized",
            AttemptStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an attempt ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    /// The service answered that it does not know the recording.
    NoMatch,
    /// No terminal answer within the configured bound.
    Timeout,
    Network(String),
    Service(String),
    SnippetUnavailable(String),
    Cancelled,
}

impl FailureReason {
    /// Stable machine-readable code, as carried by `RecognitionFailed` events.
    pub fn code(&self) -> &'static str {
        match self {
            FailureReason::NoMatch => "no_match",
            FailureReason::Timeout => "timeout",
            FailureReason::Network(_) => "network",
            FailureReason::Service(_) => "service",
            FailureReason::SnippetUnavailable(_) => "snippet_unavailable",
            FailureReason::Cancelled => "cancelled",
        }
    }

    pub fn detail(&self) -> Option<&str> {
        match self {
            FailureReason::Network(detail)
            | FailureReason::Service(detail)
            | FailureReason::SnippetUnavailable(detail) => Some(detail),
            _ => None,
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.detail() {
            Some(detail) => write!(f, "{}: {}", self.code(), detail),
            None => f.write_str(self.code()),
        }
    }
}

impl From<RecognitionError> for FailureReason {
    fn from(err: RecognitionError) -> Self {
        match err {
            RecognitionError::Network(detail) => FailureReason::Network(detail),
            RecognitionError::Service(detail) => FailureReason::Service(detail),
            RecognitionError::SnippetUnavailable(detail) => {
                FailureReason::SnippetUnavailable(detail)
            }
        }
    }
}

/// Snapshot of one recognition attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionAttempt {
    pub id: AttemptId,
    pub track_id: String,
    /// Part of the track that is sampled.
    pub window: SnippetWindow,
    pub status: AttemptStatus,
    /// Matched metadata, set when `Recognized`.
    pub result: Option<MatchedTrack>,
    /// Set when `Failed`.
    pub failure: Option<FailureReason>,
    pub started_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl RecognitionAttempt {
    pub fn new(track_id: impl Into<String>, window: SnippetWindow, started_at: DateTime<Utc>) -> Self {
        Self {
            id: AttemptId::new(),
            track_id: track_id.into(),
            window,
            status: AttemptStatus::Pending,
            result: None,
            failure: None,
            started_at,
            resolved_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn apply(&mut self, resolution: Resolution, at: DateTime<Utc>) {
        match resolution {
            Resolution::Matched(matched) => {
                self.status = AttemptStatus::Recognized;
                self.result = Some(matched);
            }
            Resolution::Failed(reason) => {
                self.status = AttemptStatus::Failed;
                self.failure = Some(reason);
            }
        }
        self.resolved_at = Some(at);
    }
}

enum Resolution {
    Matched(MatchedTrack),
    Failed(FailureReason),
}

// ============================================================================
// Session
// ============================================================================

/// Collaborators shared by every session the orchestrator starts.
#[derive(Clone)]
pub struct SessionContext {
    pub client: RecognitionClient,
    pub sampler: Arc<dyn AudioSampler>,
    pub clock: Arc<dyn Clock>,
    /// Upper bound from start to terminal state.
    pub timeout: Duration,
    /// Receives every terminal attempt exactly once.
    pub completions: UnboundedSender<RecognitionAttempt>,
}

impl SessionContext {
    pub fn new(
        client: RecognitionClient,
        sampler: Arc<dyn AudioSampler>,
        clock: Arc<dyn Clock>,
        timeout: Duration,
        completions: UnboundedSender<RecognitionAttempt>,
    ) -> Self {
        Self {
            client,
            sampler,
            clock,
            timeout,
            completions,
        }
    }
}

struct Shared {
    attempt: Mutex<RecognitionAttempt>,
    request_id: RecognitionRequestId,
    clock: Arc<dyn Clock>,
    completions: UnboundedSender<RecognitionAttempt>,
    timer: Mutex<Option<AbortHandle>>,
    submit: Mutex<Option<AbortHandle>>,
}

impl Shared {
    /// Move the attempt to its terminal state. Returns `false` if another
    /// path already did.
    fn resolve(&self, resolution: Resolution) -> bool {
        let terminal = {
            let mut attempt = self.attempt.lock();
            if attempt.is_terminal() {
                debug!(status = %attempt.status, "Late recognition result discarded");
                return false;
            }
            attempt.apply(resolution, self.clock.now());
            attempt.clone()
        };

        match &terminal.failure {
            Some(reason) => info!(reason = %reason, "Recognition attempt failed"),
            None => info!("Recognition attempt recognized"),
        }
        if self.completions.send(terminal).is_err() {
            warn!("Recognition completion dropped, receiver gone");
        }
        true
    }

    fn abort_tasks(&self) {
        for handle in [self.timer.lock().take(), self.submit.lock().take()]
            .into_iter()
            .flatten()
        {
            handle.abort();
        }
    }
}

/// Handle to a running recognition attempt.
pub struct RecognitionSession {
    id: AttemptId,
    track_id: String,
    shared: Arc<Shared>,
    client: RecognitionClient,
}

impl RecognitionSession {
    /// Create a pending attempt for `track_id` and start working on it.
    ///
    /// Must be called within a tokio runtime.
    pub fn start(
        ctx: &SessionContext,
        track_id: impl Into<String>,
        source: AudioSource,
        window: SnippetWindow,
    ) -> Self {
        let attempt = RecognitionAttempt::new(track_id, window, ctx.clock.now());
        let id = attempt.id;
        let track_id = attempt.track_id.clone();
        let span = info_span!("recognition", attempt_id = %id, track_id = %track_id);

        let shared = Arc::new(Shared {
            attempt: Mutex::new(attempt),
            request_id: RecognitionRequestId::new(),
            clock: Arc::clone(&ctx.clock),
            completions: ctx.completions.clone(),
            timer: Mutex::new(None),
            submit: Mutex::new(None),
        });

        span.in_scope(|| {
            info!(
                timeout_ms = ctx.timeout.as_millis() as u64,
                remote = source.is_remote(),
                "Recognition attempt started"
            )
        });

        // Armed before submission so a fast answer can always disarm it.
        let timer = tokio::spawn({
            let shared = Arc::clone(&shared);
            let client = ctx.client.clone();
            let timeout = ctx.timeout;
            async move {
                tokio::time::sleep(timeout).await;
                if shared.resolve(Resolution::Failed(FailureReason::Timeout)) {
                    client.cancel(shared.request_id).await;
                }
            }
            .instrument(span.clone())
        });
        *shared.timer.lock() = Some(timer.abort_handle());

        let submit = tokio::spawn({
            let shared = Arc::clone(&shared);
            let client = ctx.client.clone();
            let sampler = Arc::clone(&ctx.sampler);
            async move {
                let resolution = match sampler.capture(&source, window).await {
                    Err(e) => {
                        Resolution::Failed(FailureReason::SnippetUnavailable(e.to_string()))
                    }
                    Ok(snippet) => match client.submit(shared.request_id, snippet).await {
                        Ok(RecognitionOutcome::Matched(matched)) => Resolution::Matched(matched),
                        Ok(RecognitionOutcome::NoMatch) => {
                            Resolution::Failed(FailureReason::NoMatch)
                        }
                        Err(e) => Resolution::Failed(e.into()),
                    },
                };

                if shared.resolve(resolution) {
                    if let Some(timer) = shared.timer.lock().take() {
                        timer.abort();
                    }
                }
            }
            .instrument(span)
        });
        *shared.submit.lock() = Some(submit.abort_handle());

        Self {
            id,
            track_id,
            shared,
            client: ctx.client.clone(),
        }
    }

    pub fn id(&self) -> AttemptId {
        self.id
    }

    pub fn track_id(&self) -> &str {
        &self.track_id
    }

    pub fn request_id(&self) -> RecognitionRequestId {
        self.shared.request_id
    }

    /// Current snapshot of the attempt.
    pub fn attempt(&self) -> RecognitionAttempt {
        self.shared.attempt.lock().clone()
    }

    pub fn is_terminal(&self) -> bool {
        self.shared.attempt.lock().is_terminal()
    }

    /// Fail a pending attempt with [`FailureReason::Cancelled`].
    ///
    /// Returns `false` if the attempt had already ended.
    pub fn cancel(&self) -> bool {
        if !self
            .shared
            .resolve(Resolution::Failed(FailureReason::Cancelled))
        {
            return false;
        }
        self.shared.abort_tasks();

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let client = self.client.clone();
            let request_id = self.shared.request_id;
            handle.spawn(async move { client.cancel(request_id).await });
        }
        true
    }
}

impl fmt::Debug for RecognitionSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecognitionSession")
            .field("id", &self.id)
            .field("track_id", &self.track_id)
            .field("status", &self.shared.attempt.lock().status)
            .finish()
    }
}
