//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the Earmark core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Ordered event bus with bounded per-subscriber dispatch
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that the library, recognition
//! and playback crates depend on. It establishes the logging conventions,
//! the configuration sections hosts can tune, and the event vocabulary the
//! UI layer observes.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{CoreConfig, CoreConfigBuilder, EventBusConfig, PlaybackConfig, RecognitionConfig};
pub use error::{Error, Result};
pub use events::{
    CoreEvent, EventBus, EventSeverity, EventStream, EventSubscription, LibraryEvent,
    PlaybackEvent, PlaybackStatus, RecognitionEvent,
};
