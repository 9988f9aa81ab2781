//! # Repository Pattern Implementation
//!
//! Persistence boundary for tracks and playlists.
//!
//! ## Architecture
//!
//! - Traits define the interface for each repository
//! - SQLite implementations use sqlx for async database access
//! - In-memory implementations serve hosts without a database, and tests
//! - All operations return `Result<T>` for error handling
//! - Pagination is supported via the `Page<T>` wrapper
//!
//! Repositories are plain CRUD. Write serialization and status-transition
//! rules live one level up, in [`LibraryStore`](crate::store::LibraryStore).

pub mod memory;
pub mod pagination;
pub mod playlist;
pub mod track;

pub use memory::{MemoryPlaylistRepository, MemoryTrackRepository};
pub use pagination::{Page, PageRequest};
pub use playlist::{PlaylistRepository, SqlitePlaylistRepository};
pub use track::{SqliteTrackRepository, TrackRepository};
