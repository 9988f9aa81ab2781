//! # Playback & Orchestration Module
//!
//! Drives the host playback engine and decides when tracks get recognized.
//!
//! ## Overview
//!
//! This module handles:
//! - A single playback session with validated transport transitions
//! - A play queue with shuffle and repeat
//! - Position telemetry and automatic advance at track end
//! - Starting recognition for unrecognized tracks and applying the outcome
//!   to the library without interrupting playback

pub mod engine;
pub mod error;
pub mod orchestrator;
pub mod queue;
pub mod state;

pub use engine::PlaybackEngine;
pub use error::{PlaybackError, Result};
pub use orchestrator::{OrchestratorDeps, PlaybackOrchestrator, RecognitionStart};
pub use queue::{PlayQueue, QueueSnapshot, RepeatMode};
pub use state::PlaybackState;
