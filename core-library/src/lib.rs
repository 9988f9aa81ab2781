//! # Library Management Module
//!
//! Owns the persisted music library: tracks, their recognition status and
//! ordered playlists.
//!
//! ## Overview
//!
//! This module manages:
//! - SQLite schema, migrations and connection pooling
//! - Repository traits with SQLite and in-memory implementations
//! - [`LibraryStore`], the serialized write path every other crate goes through

pub mod db;
pub mod error;
mod locks;
pub mod models;
pub mod repositories;
pub mod store;

pub use db::{create_pool, create_test_pool, DatabaseConfig};
pub use error::{LibraryError, Result};
pub use models::{Playlist, PlaylistId, RecognitionStatus, Track, TrackId, TrackMetadata};
pub use repositories::{Page, PageRequest};
pub use store::LibraryStore;
