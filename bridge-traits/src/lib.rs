//! # Host Bridge Traits
//!
//! Contracts between the core and the collaborators it treats as black boxes.
//!
//! ## Overview
//!
//! The core coordinates playback with recognition and persistence, but owns
//! none of the heavy machinery. Each trait here is a narrow surface that a
//! host platform (Android, iOS, desktop) implements on top of its native
//! stack.
//!
//! ## Traits
//!
//! - [`PlaybackAdapter`](playback::PlaybackAdapter) - media engine: load, transport controls, telemetry
//! - [`AudioSampler`](sampling::AudioSampler) - PCM snapshot of a source for recognition
//! - [`RecognitionService`](recognition::RecognitionService) - external fingerprint matcher
//! - [`Clock`](time::Clock) - time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits report failures as [`BridgeError`](error::BridgeError).
//! Implementations should map platform errors onto the closest variant; in
//! particular recognition adapters must keep transport failures
//! (`Network`) apart from service-side failures (`Service`).
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so implementations can be shared
//! across tasks behind `Arc`.

pub mod error;
pub mod playback;
pub mod recognition;
pub mod sampling;
pub mod time;

pub use error::BridgeError;

pub use playback::{
    AudioSource, PlaybackAdapter, PlaybackMetadata, PlaybackRequest, PlaybackSessionId,
    PreparedMedia,
};
pub use recognition::{MatchedTrack, RecognitionOutcome, RecognitionRequestId, RecognitionService};
pub use sampling::{AudioSampler, AudioSnippet, SnippetWindow};
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};
