//! # Event Bus System
//!
//! Ordered, in-process delivery of core state transitions to observers such
//! as the UI layer or telemetry. Observers only ever see [`CoreEvent`]
//! values; they never touch orchestrator or session internals.
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **Event Types**: Strongly-typed enum hierarchies for playback, recognition and library
//! - **EventBus**: Fan-out publisher with one bounded queue per subscriber
//! - **EventSubscription**: The receiving half handed to each observer
//! - **EventStream**: Wrapper for consuming a subscription with filtering
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  publish   ┌───────────┐   queue #1   ┌────────────┐
//! │ Orchestrator ├───────────>│           ├─────────────>│ Subscriber │
//! └──────────────┘            │ EventBus  │              └────────────┘
//!                             │ (ordered, │
//! ┌──────────────┐  publish   │  bounded) │   queue #2   ┌────────────┐
//! │ LibraryStore ├───────────>│           ├─────────────>│ Subscriber │
//! └──────────────┘            └───────────┘              └────────────┘
//! ```
//!
//! ## Delivery guarantees
//!
//! - Publishes are serialized, so every subscriber observes the same global
//!   order of events.
//! - Within one publish, subscribers are served in subscription order.
//! - A publish never waits on a subscriber for longer than the configured
//!   dispatch grace. A subscriber whose queue stays full for that long is
//!   dropped and logged; its subscription drains what was already queued and
//!   then reports closure.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent, PlaybackStatus};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::default();
//! let mut subscription = bus.subscribe();
//!
//! bus.publish(CoreEvent::Playback(PlaybackEvent::StateChanged {
//!     track_id: Some("track-1".to_string()),
//!     status: PlaybackStatus::Buffering,
//! }))
//! .await;
//!
//! let event = subscription.recv().await.unwrap();
//! assert!(matches!(event, CoreEvent::Playback(_)));
//! # }
//! ```

use crate::config::{EventBusConfig, DEFAULT_DISPATCH_GRACE, DEFAULT_SUBSCRIBER_CAPACITY};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

pub use tokio::sync::mpsc::error::TryRecvError;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Playback lifecycle and telemetry
    Playback(PlaybackEvent),
    /// Recognition attempt outcomes
    Recognition(RecognitionEvent),
    /// Library and playlist mutations
    Library(LibraryEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Playback(e) => e.description(),
            CoreEvent::Recognition(e) => e.description(),
            CoreEvent::Library(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Playback(PlaybackEvent::Error { .. }) => EventSeverity::Error,
            CoreEvent::Playback(PlaybackEvent::StateChanged {
                status: PlaybackStatus::Error,
                ..
            }) => EventSeverity::Error,
            CoreEvent::Recognition(RecognitionEvent::Failed { .. }) => EventSeverity::Warning,
            CoreEvent::Recognition(RecognitionEvent::TrackEnriched { .. }) => EventSeverity::Info,
            CoreEvent::Playback(PlaybackEvent::StateChanged { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

// ============================================================================
// Playback Events
// ============================================================================

/// Observable playback status of the single active session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    Idle,
    Buffering,
    Playing,
    Paused,
    Stopped,
    Error,
}

impl PlaybackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackStatus::Idle => "idle",
            PlaybackStatus::Buffering => "buffering",
            PlaybackStatus::Playing => "playing",
            PlaybackStatus::Paused => "paused",
            PlaybackStatus::Stopped => "stopped",
            PlaybackStatus::Error => "error",
        }
    }
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events emitted by the playback orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// The orchestrator moved to a new status.
    StateChanged {
        /// Track loaded at the time of the change, if any.
        track_id: Option<String>,
        /// The status just entered.
        status: PlaybackStatus,
    },
    /// Periodic position telemetry while playing.
    PositionChanged {
        track_id: String,
        position_ms: u64,
        /// Known media duration; absent for unbounded streams.
        duration_ms: Option<u64>,
    },
    /// The engine failed to load or drive a track.
    Error {
        track_id: Option<String>,
        message: String,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::StateChanged { .. } => "Playback state changed",
            PlaybackEvent::PositionChanged { .. } => "Playback position updated",
            PlaybackEvent::Error { .. } => "Playback error occurred",
        }
    }
}

// ============================================================================
// Recognition Events
// ============================================================================

/// Events describing the lifecycle of recognition attempts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum RecognitionEvent {
    /// A recognition attempt was started for a track.
    Started { track_id: String, attempt_id: String },
    /// A match was written to the library.
    TrackEnriched {
        track_id: String,
        attempt_id: String,
        title: String,
        artist: Option<String>,
        album: Option<String>,
        /// Match confidence in `[0, 1]`.
        confidence: f64,
    },
    /// The attempt ended without enrichment.
    Failed {
        track_id: String,
        attempt_id: String,
        /// Stable reason code (`no_match`, `timeout`, `network`, ...).
        reason: String,
        /// Extra context from the failing layer, when available.
        detail: Option<String>,
    },
}

impl RecognitionEvent {
    fn description(&self) -> &str {
        match self {
            RecognitionEvent::Started { .. } => "Recognition started",
            RecognitionEvent::TrackEnriched { .. } => "Track enriched from recognition",
            RecognitionEvent::Failed { .. } => "Recognition failed",
        }
    }

    /// Track the event refers to.
    pub fn track_id(&self) -> &str {
        match self {
            RecognitionEvent::Started { track_id, .. }
            | RecognitionEvent::TrackEnriched { track_id, .. }
            | RecognitionEvent::Failed { track_id, .. } => track_id,
        }
    }
}

// ============================================================================
// Library Events
// ============================================================================

/// Events emitted by the library store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LibraryEvent {
    /// A track entered the library.
    TrackImported { track_id: String, title: String },
    /// A track left the library.
    TrackDeleted { track_id: String },
    PlaylistCreated { playlist_id: String, name: String },
    /// Name or track order of a playlist changed.
    PlaylistUpdated {
        playlist_id: String,
        track_count: usize,
    },
    PlaylistDeleted { playlist_id: String },
}

impl LibraryEvent {
    fn description(&self) -> &str {
        match self {
            LibraryEvent::TrackImported { .. } => "Track imported",
            LibraryEvent::TrackDeleted { .. } => "Track deleted",
            LibraryEvent::PlaylistCreated { .. } => "Playlist created",
            LibraryEvent::PlaylistUpdated { .. } => "Playlist updated",
            LibraryEvent::PlaylistDeleted { .. } => "Playlist deleted",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Identifier assigned to each subscription, in subscription order.
pub type SubscriberId = u64;

struct SubscriberSlot {
    id: SubscriberId,
    sender: mpsc::Sender<CoreEvent>,
}

struct BusInner {
    subscribers: Mutex<Vec<SubscriberSlot>>,
    publish_gate: tokio::sync::Mutex<()>,
    next_id: AtomicU64,
    capacity: usize,
    dispatch_grace: Duration,
}

/// Central event bus for publishing and subscribing to core events.
///
/// Cloning is cheap; all clones publish into the same subscriber set.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// Creates an event bus with the given per-subscriber queue depth and
    /// dispatch grace.
    pub fn new(capacity: usize, dispatch_grace: Duration) -> Self {
        Self {
            inner: Arc::new(BusInner {
                subscribers: Mutex::new(Vec::new()),
                publish_gate: tokio::sync::Mutex::new(()),
                next_id: AtomicU64::new(0),
                capacity: capacity.max(1),
                dispatch_grace,
            }),
        }
    }

    pub fn from_config(config: &EventBusConfig) -> Self {
        Self::new(config.subscriber_capacity, config.dispatch_grace)
    }

    /// Registers a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> EventSubscription {
        let (sender, receiver) = mpsc::channel(self.inner.capacity);
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.subscribers.lock().push(SubscriberSlot { id, sender });
        debug!(subscriber = id, "Event subscriber registered");
        EventSubscription { id, receiver }
    }

    /// Removes a subscriber. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.inner.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|slot| slot.id != id);
        before != subscribers.len()
    }

    /// Publishes an event to every current subscriber, in subscription order.
    ///
    /// Returns the number of subscribers the event was delivered to.
    /// Subscribers that have gone away are pruned; subscribers whose queue
    /// stays full past the dispatch grace are dropped with a warning.
    pub async fn publish(&self, event: CoreEvent) -> usize {
        let _gate = self.inner.publish_gate.lock().await;

        let targets: Vec<(SubscriberId, mpsc::Sender<CoreEvent>)> = self
            .inner
            .subscribers
            .lock()
            .iter()
            .map(|slot| (slot.id, slot.sender.clone()))
            .collect();

        let mut delivered = 0;
        let mut dropped = Vec::new();

        for (id, sender) in targets {
            match sender.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Closed(_)) => dropped.push(id),
                Err(TrySendError::Full(pending)) => {
                    match tokio::time::timeout(self.inner.dispatch_grace, sender.send(pending))
                        .await
                    {
                        Ok(Ok(())) => delivered += 1,
                        Ok(Err(_)) => dropped.push(id),
                        Err(_) => {
                            warn!(
                                subscriber = id,
                                grace_ms = self.inner.dispatch_grace.as_millis() as u64,
                                event = event.description(),
                                "Dropping slow event subscriber"
                            );
                            dropped.push(id);
                        }
                    }
                }
            }
        }

        if !dropped.is_empty() {
            self.inner
                .subscribers
                .lock()
                .retain(|slot| !dropped.contains(&slot.id));
        }

        delivered
    }

    /// Returns the number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.inner.subscribers.lock();
        subscribers.retain(|slot| !slot.sender.is_closed());
        subscribers.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_CAPACITY, DEFAULT_DISPATCH_GRACE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .field("capacity", &self.inner.capacity)
            .field("dispatch_grace", &self.inner.dispatch_grace)
            .finish()
    }
}

/// Receiving half of a bus subscription.
///
/// `recv` yields `None` once the bus has dropped this subscriber (or every
/// bus handle is gone) and the already queued events are drained.
#[derive(Debug)]
pub struct EventSubscription {
    id: SubscriberId,
    receiver: mpsc::Receiver<CoreEvent>,
}

impl EventSubscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub async fn recv(&mut self) -> Option<CoreEvent> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Result<CoreEvent, TryRecvError> {
        self.receiver.try_recv()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

/// Type alias for event filter functions.
type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around [`EventSubscription`] with filtering.
///
/// # Example
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let bus = EventBus::default();
/// let recognition_only = EventStream::new(bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Recognition(_)));
/// ```
pub struct EventStream {
    subscription: EventSubscription,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(subscription: EventSubscription) -> Self {
        Self {
            subscription,
            filter: None,
        }
    }

    /// Adds a filter function to this stream.
    ///
    /// Only events that match the filter will be returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter (if any).
    ///
    /// Returns `None` once the subscription is closed.
    pub async fn recv(&mut self) -> Option<CoreEvent> {
        loop {
            let event = self.subscription.recv().await?;
            if self.accepts(&event) {
                return Some(event);
            }
        }
    }

    /// Returns the next queued matching event without waiting.
    pub fn try_recv(&mut self) -> Option<CoreEvent> {
        loop {
            let event = self.subscription.try_recv().ok()?;
            if self.accepts(&event) {
                return Some(event);
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("subscriber", &self.subscription.id)
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
