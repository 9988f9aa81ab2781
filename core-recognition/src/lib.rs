//! # Recognition Module
//!
//! Identifies unknown tracks through an external fingerprinting service.
//!
//! ## Overview
//!
//! - [`RecognitionClient`] wraps the host's
//!   [`RecognitionService`](bridge_traits::RecognitionService): request ids,
//!   error normalization, confidence threshold.
//! - [`RecognitionSession`] drives one [`RecognitionAttempt`] from `pending`
//!   to exactly one terminal state, racing the service against a timeout.
//!
//! Terminal attempts are delivered over an unbounded channel to whoever owns
//! playback state; this crate never touches the library.

pub mod client;
pub mod error;
pub mod session;

pub use client::RecognitionClient;
pub use error::{RecognitionError, Result};
pub use session::{
    AttemptId, AttemptStatus, FailureReason, RecognitionAttempt, RecognitionSession,
    SessionContext,
};
