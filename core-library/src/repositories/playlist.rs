//! Playlist repository trait and implementation

use crate::error::{LibraryError, Result};
use crate::models::Playlist;
use crate::repositories::{Page, PageRequest};
use async_trait::async_trait;
use sqlx::{query, query_as, SqlitePool};

/// Playlist repository interface for data access operations
///
/// Playlists are read and written as whole snapshots including their ordered
/// track ids.
#[async_trait]
pub trait PlaylistRepository: Send + Sync {
    /// Find a playlist by its ID
    async fn find_by_id(&self, id: &str) -> Result<Option<Playlist>>;

    /// Insert a new playlist together with its track ids
    async fn insert(&self, playlist: &Playlist) -> Result<()>;

    /// Update name and timestamps; track ids are left untouched
    ///
    /// # Errors
    /// Returns `NotFound` if the playlist does not exist
    async fn update(&self, playlist: &Playlist) -> Result<()>;

    /// Replace the ordered track sequence in one atomic step
    ///
    /// # Errors
    /// Returns `NotFound` if the playlist does not exist
    async fn replace_track_ids(
        &self,
        playlist_id: &str,
        track_ids: &[String],
        updated_at: i64,
    ) -> Result<()>;

    /// Delete a playlist by ID
    ///
    /// # Returns
    /// - `Ok(true)` if playlist was deleted
    /// - `Ok(false)` if playlist was not found
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Query playlists ordered by name
    async fn query(&self, page_request: PageRequest) -> Result<Page<Playlist>>;

    /// Whether any playlist lists the track
    async fn is_track_referenced(&self, track_id: &str) -> Result<bool>;

    /// Count total playlists
    async fn count(&self) -> Result<i64>;
}

/// SQLite implementation of PlaylistRepository
pub struct SqlitePlaylistRepository {
    pool: SqlitePool,
}

impl SqlitePlaylistRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn track_ids(&self, playlist_id: &str) -> Result<Vec<String>> {
        let track_ids = query_as::<_, (String,)>(
            "SELECT track_id FROM playlist_tracks WHERE playlist_id = ? ORDER BY position ASC",
        )
        .bind(playlist_id)
        .fetch_all(&self.pool)
        .await
        .map(|rows| rows.into_iter().map(|(id,)| id).collect())?;

        Ok(track_ids)
    }
}

type PlaylistRow = (String, String, i64, i64);

fn from_row((id, name, created_at, updated_at): PlaylistRow, track_ids: Vec<String>) -> Playlist {
    Playlist {
        id,
        name,
        track_ids,
        created_at,
        updated_at,
    }
}

fn validated(playlist: &Playlist) -> Result<()> {
    playlist.validate().map_err(|e| LibraryError::InvalidInput {
        field: "playlist".to_string(),
        message: e,
    })
}

#[async_trait]
impl PlaylistRepository for SqlitePlaylistRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Playlist>> {
        let row = query_as::<_, PlaylistRow>(
            "SELECT id, name, created_at, updated_at FROM playlists WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let track_ids = self.track_ids(id).await?;
                Ok(Some(from_row(row, track_ids)))
            }
            None => Ok(None),
        }
    }

    async fn insert(&self, playlist: &Playlist) -> Result<()> {
        validated(playlist)?;

        let mut tx = self.pool.begin().await?;

        query("INSERT INTO playlists (id, name, created_at, updated_at) VALUES (?, ?, ?, ?)")
            .bind(&playlist.id)
            .bind(&playlist.name)
            .bind(playlist.created_at)
            .bind(playlist.updated_at)
            .execute(&mut *tx)
            .await?;

        for (position, track_id) in playlist.track_ids.iter().enumerate() {
            query("INSERT INTO playlist_tracks (playlist_id, position, track_id) VALUES (?, ?, ?)")
                .bind(&playlist.id)
                .bind(position as i64)
                .bind(track_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn update(&self, playlist: &Playlist) -> Result<()> {
        validated(playlist)?;

        let result = query("UPDATE playlists SET name = ?, updated_at = ? WHERE id = ?")
            .bind(&playlist.name)
            .bind(playlist.updated_at)
            .bind(&playlist.id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(LibraryError::playlist_not_found(&playlist.id));
        }

        Ok(())
    }

    async fn replace_track_ids(
        &self,
        playlist_id: &str,
        track_ids: &[String],
        updated_at: i64,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let touched = query("UPDATE playlists SET updated_at = ? WHERE id = ?")
            .bind(updated_at)
            .bind(playlist_id)
            .execute(&mut *tx)
            .await?;
        if touched.rows_affected() == 0 {
            return Err(LibraryError::playlist_not_found(playlist_id));
        }

        query("DELETE FROM playlist_tracks WHERE playlist_id = ?")
            .bind(playlist_id)
            .execute(&mut *tx)
            .await?;

        for (position, track_id) in track_ids.iter().enumerate() {
            query("INSERT INTO playlist_tracks (playlist_id, position, track_id) VALUES (?, ?, ?)")
                .bind(playlist_id)
                .bind(position as i64)
                .bind(track_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        // playlist_tracks rows go with it through ON DELETE CASCADE
        let result = query("DELETE FROM playlists WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn query(&self, page_request: PageRequest) -> Result<Page<Playlist>> {
        let total = self.count().await?;

        let rows = query_as::<_, PlaylistRow>(
            "SELECT id, name, created_at, updated_at FROM playlists \
             ORDER BY name ASC, id ASC LIMIT ? OFFSET ?",
        )
        .bind(page_request.limit())
        .bind(page_request.offset())
        .fetch_all(&self.pool)
        .await?;

        let mut playlists = Vec::with_capacity(rows.len());
        for row in rows {
            let track_ids = self.track_ids(&row.0).await?;
            playlists.push(from_row(row, track_ids));
        }

        Ok(Page::new(playlists, total as u64, page_request))
    }

    async fn is_track_referenced(&self, track_id: &str) -> Result<bool> {
        let (referenced,): (bool,) =
            query_as("SELECT EXISTS(SELECT 1 FROM playlist_tracks WHERE track_id = ?)")
                .bind(track_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(referenced)
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = query_as("SELECT COUNT(*) FROM playlists")
            .fetch_one(&self.pool)
            .await
            .map(|row: (i64,)| row.0)?;

        Ok(count)
    }
}
