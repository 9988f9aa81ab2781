//! # Core Configuration Module
//!
//! Provides configuration management for the Earmark core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance holding every tunable the core reads at bootstrap. Validation is
//! fail-fast: `build()` rejects zero timeouts, empty snippet windows, and
//! out-of-range confidence thresholds before any subsystem starts.
//!
//! Host bridges (media engine, sampler, recognition service) are not part of
//! the configuration; they are injected separately at bootstrap.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::config::CoreConfig;
//! use std::time::Duration;
//!
//! let config = CoreConfig::builder()
//!     .database_path("/data/earmark.db")
//!     .recognition_timeout(Duration::from_secs(8))
//!     .min_confidence(0.4)
//!     .build()
//!     .expect("valid configuration");
//!
//! assert_eq!(config.recognition.timeout, Duration::from_secs(8));
//! ```
//!
//! Each section derives `serde` traits so hosts may ship it as JSON:
//!
//! ```rust
//! use core_runtime::config::RecognitionConfig;
//!
//! let section: RecognitionConfig = serde_json::from_str(r#"{"min_confidence": 0.5}"#).unwrap();
//! assert_eq!(section.min_confidence, 0.5);
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default bound on a single recognition attempt.
pub const DEFAULT_RECOGNITION_TIMEOUT: Duration = Duration::from_secs(10);
/// Default length of the snippet submitted for recognition.
pub const DEFAULT_SNIPPET_DURATION: Duration = Duration::from_secs(10);
/// Default per-subscriber queue depth on the event bus.
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 100;
/// Default time a publish waits on a full subscriber before dropping it.
pub const DEFAULT_DISPATCH_GRACE: Duration = Duration::from_millis(250);
/// Default playback telemetry interval.
pub const DEFAULT_POSITION_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Default orchestrator mailbox size.
pub const DEFAULT_COMMAND_BUFFER: usize = 32;

/// Core configuration for the Earmark core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Path to the SQLite database file. `None` keeps the library in memory.
    pub database_path: Option<PathBuf>,

    /// Recognition session tuning.
    pub recognition: RecognitionConfig,

    /// Event bus dispatch limits.
    pub events: EventBusConfig,

    /// Playback orchestrator tuning.
    pub playback: PlaybackConfig,
}

/// Tuning for recognition attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// Upper bound on one attempt, from submission to terminal state.
    pub timeout: Duration,
    /// Offset into the track where the snippet starts.
    pub snippet_offset: Duration,
    /// Length of the captured snippet.
    pub snippet_duration: Duration,
    /// Matches scoring below this are treated as no match.
    pub min_confidence: f64,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_RECOGNITION_TIMEOUT,
            snippet_offset: Duration::ZERO,
            snippet_duration: DEFAULT_SNIPPET_DURATION,
            min_confidence: 0.0,
        }
    }
}

impl RecognitionConfig {
    /// Validates the recognition section.
    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(Error::Config(
                "Recognition timeout must be greater than zero".to_string(),
            ));
        }

        if self.snippet_duration.is_zero() {
            return Err(Error::Config(
                "Snippet duration must be greater than zero".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(Error::Config(format!(
                "Minimum confidence must be within [0, 1], got {}",
                self.min_confidence
            )));
        }

        Ok(())
    }
}

/// Dispatch limits for the event bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventBusConfig {
    /// Events buffered per subscriber before a publish has to wait.
    pub subscriber_capacity: usize,
    /// How long a publish waits on a full subscriber before dropping it.
    pub dispatch_grace: Duration,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            subscriber_capacity: DEFAULT_SUBSCRIBER_CAPACITY,
            dispatch_grace: DEFAULT_DISPATCH_GRACE,
        }
    }
}

impl EventBusConfig {
    pub fn validate(&self) -> Result<()> {
        if self.subscriber_capacity == 0 {
            return Err(Error::Config(
                "Event subscriber capacity must be greater than zero".to_string(),
            ));
        }
        if self.dispatch_grace.is_zero() {
            return Err(Error::Config(
                "Event dispatch grace period must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Tuning for the playback orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Interval between engine position polls while playing. `None` turns
    /// position telemetry and automatic queue advance off.
    pub position_poll_interval: Option<Duration>,
    /// Capacity of the orchestrator command mailbox.
    pub command_buffer: usize,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            position_poll_interval: Some(DEFAULT_POSITION_POLL_INTERVAL),
            command_buffer: DEFAULT_COMMAND_BUFFER,
        }
    }
}

impl PlaybackConfig {
    pub fn validate(&self) -> Result<()> {
        if self.command_buffer == 0 {
            return Err(Error::Config(
                "Playback command buffer must be greater than zero".to_string(),
            ));
        }
        if matches!(self.position_poll_interval, Some(interval) if interval.is_zero()) {
            return Err(Error::Config(
                "Position poll interval must be greater than zero when enabled".to_string(),
            ));
        }
        Ok(())
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Database path, when given, is not empty
    /// - Every section's own bounds
    pub fn validate(&self) -> Result<()> {
        if let Some(path) = &self.database_path {
            if path.as_os_str().is_empty() {
                return Err(Error::Config("Database path cannot be empty".to_string()));
            }
        }

        self.recognition.validate()?;
        self.events.validate()?;
        self.playback.validate()?;

        Ok(())
    }

    /// Whether the library is backed by an in-memory database.
    pub fn is_in_memory(&self) -> bool {
        self.database_path.is_none()
    }
}

/// Builder for [`CoreConfig`].
#[derive(Debug, Default)]
pub struct CoreConfigBuilder {
    config: CoreConfig,
}

impl CoreConfigBuilder {
    /// Sets the SQLite database path.
    pub fn database_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config.database_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Keeps the library in memory.
    pub fn in_memory(mut self) -> Self {
        self.config.database_path = None;
        self
    }

    /// Replaces the whole recognition section.
    pub fn recognition(mut self, recognition: RecognitionConfig) -> Self {
        self.config.recognition = recognition;
        self
    }

    pub fn recognition_timeout(mut self, timeout: Duration) -> Self {
        self.config.recognition.timeout = timeout;
        self
    }

    /// Sets where and how long the recognition snippet is captured.
    pub fn snippet_window(mut self, offset: Duration, duration: Duration) -> Self {
        self.config.recognition.snippet_offset = offset;
        self.config.recognition.snippet_duration = duration;
        self
    }

    pub fn min_confidence(mut self, min_confidence: f64) -> Self {
        self.config.recognition.min_confidence = min_confidence;
        self
    }

    /// Replaces the whole event bus section.
    pub fn events(mut self, events: EventBusConfig) -> Self {
        self.config.events = events;
        self
    }

    pub fn subscriber_capacity(mut self, capacity: usize) -> Self {
        self.config.events.subscriber_capacity = capacity;
        self
    }

    pub fn dispatch_grace(mut self, grace: Duration) -> Self {
        self.config.events.dispatch_grace = grace;
        self
    }

    /// Replaces the whole playback section.
    pub fn playback(mut self, playback: PlaybackConfig) -> Self {
        self.config.playback = playback;
        self
    }

    /// Sets the telemetry interval; `None` disables polling.
    pub fn position_poll_interval(mut self, interval: Option<Duration>) -> Self {
        self.config.playback.position_poll_interval = interval;
        self
    }

    pub fn command_buffer(mut self, size: usize) -> Self {
        self.config.playback.command_buffer = size;
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid setting.
    pub fn build(self) -> Result<CoreConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
