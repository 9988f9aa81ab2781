//! Track repository trait and implementation

use crate::error::{LibraryError, Result};
use crate::models::Track;
use crate::repositories::{Page, PageRequest};
use async_trait::async_trait;
use sqlx::{query, query_as, SqlitePool};

/// Track repository interface for data access operations
#[async_trait]
pub trait TrackRepository: Send + Sync {
    /// Find a track by its ID
    ///
    /// # Returns
    /// - `Ok(Some(track))` if found
    /// - `Ok(None)` if not found
    /// - `Err` if database error occurs
    async fn find_by_id(&self, id: &str) -> Result<Option<Track>>;

    /// Find the track registered for a playable locator
    async fn find_by_source(&self, source: &str) -> Result<Option<Track>>;

    /// Insert a new track
    ///
    /// # Errors
    /// Returns error if:
    /// - A track with the same ID or source already exists
    /// - Track validation fails
    async fn insert(&self, track: &Track) -> Result<()>;

    /// Overwrite every column of an existing track
    ///
    /// # Errors
    /// Returns `NotFound` if the track does not exist
    async fn update(&self, track: &Track) -> Result<()>;

    /// Delete a track by ID
    ///
    /// # Returns
    /// - `Ok(true)` if track was deleted
    /// - `Ok(false)` if track was not found
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Query tracks ordered by title
    async fn query(&self, page_request: PageRequest) -> Result<Page<Track>>;

    /// Count total tracks
    async fn count(&self) -> Result<i64>;
}

/// SQLite implementation of TrackRepository
pub struct SqliteTrackRepository {
    pool: SqlitePool,
}

impl SqliteTrackRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn validated(track: &Track) -> Result<()> {
    track.validate().map_err(|msg| LibraryError::InvalidInput {
        field: "track".to_string(),
        message: msg,
    })
}

#[async_trait]
impl TrackRepository for SqliteTrackRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Track>> {
        let track = query_as::<_, Track>("SELECT * FROM tracks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(track)
    }

    async fn find_by_source(&self, source: &str) -> Result<Option<Track>> {
        let track = query_as::<_, Track>("SELECT * FROM tracks WHERE source = ?")
            .bind(source)
            .fetch_optional(&self.pool)
            .await?;

        Ok(track)
    }

    async fn insert(&self, track: &Track) -> Result<()> {
        validated(track)?;

        query(
            r#"
            INSERT INTO tracks (
                id, title, artist, album, duration_ms, source, external_id,
                match_confidence, recognition_status, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&track.id)
        .bind(&track.title)
        .bind(&track.artist)
        .bind(&track.album)
        .bind(track.duration_ms)
        .bind(&track.source)
        .bind(&track.external_id)
        .bind(track.match_confidence)
        .bind(track.recognition_status)
        .bind(track.created_at)
        .bind(track.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(&self, track: &Track) -> Result<()> {
        validated(track)?;

        let result = query(
            r#"
            UPDATE tracks
            SET title = ?, artist = ?, album = ?, duration_ms = ?, source = ?,
                external_id = ?, match_confidence = ?, recognition_status = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&track.title)
        .bind(&track.artist)
        .bind(&track.album)
        .bind(track.duration_ms)
        .bind(&track.source)
        .bind(&track.external_id)
        .bind(track.match_confidence)
        .bind(track.recognition_status)
        .bind(track.updated_at)
        .bind(&track.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LibraryError::track_not_found(&track.id));
        }

        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = query("DELETE FROM tracks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn query(&self, page_request: PageRequest) -> Result<Page<Track>> {
        let total = self.count().await?;

        let tracks = query_as::<_, Track>(
            "SELECT * FROM tracks ORDER BY title ASC, id ASC LIMIT ? OFFSET ?",
        )
        .bind(page_request.limit())
        .bind(page_request.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(tracks, total as u64, page_request))
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = query_as("SELECT COUNT(*) FROM tracks")
            .fetch_one(&self.pool)
            .await
            .map(|row: (i64,)| row.0)?;

        Ok(count)
    }
}
