//! # Library Store
//!
//! The single owner of persisted tracks and playlists. Everything outside
//! this crate reads and writes the library through [`LibraryStore`].
//!
//! ## Guarantees
//!
//! - Writes are serialized per entity id: two writes to the same track (or
//!   the same playlist) never interleave, while writes to different entities
//!   and all reads proceed concurrently.
//! - Enrichment does not queue behind another write to the same track; it
//!   fails fast with [`LibraryError::Conflict`].
//! - Adding a track to a playlist and deleting that track are serialized on
//!   the track id, so a playlist never lists a deleted track.
//! - Recognition status only moves along
//!   [`RecognitionStatus::can_transition_to`].
//! - Reads return owned snapshots.
//!
//! Successful mutations publish a [`LibraryEvent`] on the event bus while the
//! entity is still locked, so observers see them in write order.

use crate::error::{LibraryError, Result};
use crate::locks::KeyedLocks;
use crate::models::{Playlist, RecognitionStatus, Track, TrackMetadata};
use crate::repositories::{
    MemoryPlaylistRepository, MemoryTrackRepository, Page, PageRequest, PlaylistRepository,
    SqlitePlaylistRepository, SqliteTrackRepository, TrackRepository,
};
use bridge_traits::time::{Clock, SystemClock};
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub struct LibraryStore {
    tracks: Arc<dyn TrackRepository>,
    playlists: Arc<dyn PlaylistRepository>,
    clock: Arc<dyn Clock>,
    events: EventBus,
    track_locks: KeyedLocks,
    playlist_locks: KeyedLocks,
    // Held by playlist inserts and track deletes; taken after `track_locks`
    // and before `playlist_locks`.
    reference_locks: KeyedLocks,
}

impl LibraryStore {
    pub fn new(
        tracks: Arc<dyn TrackRepository>,
        playlists: Arc<dyn PlaylistRepository>,
        clock: Arc<dyn Clock>,
        events: EventBus,
    ) -> Self {
        Self {
            tracks,
            playlists,
            clock,
            events,
            track_locks: KeyedLocks::default(),
            playlist_locks: KeyedLocks::default(),
            reference_locks: KeyedLocks::default(),
        }
    }

    /// Store backed by SQLite repositories sharing `pool`.
    pub fn sqlite(pool: SqlitePool, clock: Arc<dyn Clock>, events: EventBus) -> Self {
        Self::new(
            Arc::new(SqliteTrackRepository::new(pool.clone())),
            Arc::new(SqlitePlaylistRepository::new(pool)),
            clock,
            events,
        )
    }

    /// Store backed by in-memory repositories.
    pub fn in_memory(clock: Arc<dyn Clock>, events: EventBus) -> Self {
        let playlists = Arc::new(MemoryPlaylistRepository::new());
        let tracks = Arc::new(MemoryTrackRepository::with_playlists(playlists.clone()));
        Self::new(tracks, playlists, clock, events)
    }

    /// In-memory store on the wall clock with a private event bus.
    pub fn ephemeral() -> Self {
        Self::in_memory(Arc::new(SystemClock), EventBus::default())
    }

    async fn emit(&self, event: LibraryEvent) {
        self.events.publish(CoreEvent::Library(event)).await;
    }

    // =========================================================================
    // Tracks
    // =========================================================================

    /// Register a track, or return the one already known.
    ///
    /// A track is matched first by id, then by source locator. Only a
    /// genuinely new track is written, stamped with the store clock, and
    /// announced with `TrackImported`.
    #[instrument(skip(self, track), fields(track_id = %track.id))]
    pub async fn import_track(&self, track: Track) -> Result<Track> {
        track.validate().map_err(|message| LibraryError::InvalidInput {
            field: "track".to_string(),
            message,
        })?;

        // Imports race on the locator, not the freshly minted id.
        let _guard = self.track_locks.lock(&format!("source:{}", track.source)).await;

        if let Some(existing) = self.tracks.find_by_id(&track.id).await? {
            return Ok(existing);
        }
        if let Some(existing) = self.tracks.find_by_source(&track.source).await? {
            debug!(existing = %existing.id, "Source already imported");
            return Ok(existing);
        }

        let now = self.clock.unix_timestamp();
        let track = Track {
            created_at: now,
            updated_at: now,
            ..track
        };
        self.tracks.insert(&track).await?;

        info!(title = %track.title, "Track imported");
        self.emit(LibraryEvent::TrackImported {
            track_id: track.id.clone(),
            title: track.title.clone(),
        })
        .await;

        Ok(track)
    }

    pub async fn find_track(&self, id: &str) -> Result<Option<Track>> {
        self.tracks.find_by_id(id).await
    }

    /// Snapshot of one track.
    ///
    /// # Errors
    /// `NotFound` if the id is unknown.
    pub async fn get_track(&self, id: &str) -> Result<Track> {
        self.tracks
            .find_by_id(id)
            .await?
            .ok_or_else(|| LibraryError::track_not_found(id))
    }

    pub async fn list_tracks(&self, page: PageRequest) -> Result<Page<Track>> {
        self.tracks.query(page).await
    }

    /// Remove a track that no playlist lists.
    ///
    /// # Errors
    /// `NotFound` for an unknown id, `Conflict` while any playlist refers to it.
    #[instrument(skip(self))]
    pub async fn delete_track(&self, track_id: &str) -> Result<()> {
        let _guard = self.track_locks.lock(track_id).await;
        let _references = self.reference_locks.lock(track_id).await;

        if self.tracks.find_by_id(track_id).await?.is_none() {
            return Err(LibraryError::track_not_found(track_id));
        }
        if self.playlists.is_track_referenced(track_id).await? {
            return Err(LibraryError::Conflict {
                entity_type: "Track".to_string(),
                id: track_id.to_string(),
                reason: "referenced by a playlist".to_string(),
            });
        }

        self.tracks.delete(track_id).await?;
        self.emit(LibraryEvent::TrackDeleted {
            track_id: track_id.to_string(),
        })
        .await;
        Ok(())
    }

    /// Move a track to `pending` ahead of a recognition attempt.
    #[instrument(skip(self))]
    pub async fn begin_recognition(&self, track_id: &str) -> Result<Track> {
        let _guard = self.track_locks.lock(track_id).await;
        self.transition(track_id, RecognitionStatus::Pending).await
    }

    /// Record that the current recognition attempt ended without a match.
    #[instrument(skip(self))]
    pub async fn mark_recognition_failed(&self, track_id: &str) -> Result<Track> {
        let _guard = self.track_locks.lock(track_id).await;
        self.transition(track_id, RecognitionStatus::Failed).await
    }

    async fn transition(&self, track_id: &str, next: RecognitionStatus) -> Result<Track> {
        let mut track = self.get_track(track_id).await?;

        if !track.recognition_status.can_transition_to(next) {
            return Err(LibraryError::InvalidTransition {
                id: track_id.to_string(),
                from: track.recognition_status,
                to: next,
            });
        }

        debug!(from = %track.recognition_status, to = %next, "Recognition status change");
        track.recognition_status = next;
        track.updated_at = self.clock.unix_timestamp();
        self.tracks.update(&track).await?;
        Ok(track)
    }

    /// Write recognition metadata onto a pending track and mark it recognized.
    ///
    /// Re-applying the metadata a track already carries is a no-op.
    ///
    /// # Errors
    /// - `InvalidInput` for an empty title or a confidence outside `[0, 1]`
    /// - `Conflict` if another write to the same track is in progress
    /// - `NotFound` for an unknown id
    /// - `InvalidTransition` unless the track is `pending`
    #[instrument(skip(self, metadata), fields(confidence = metadata.confidence))]
    pub async fn enrich(&self, track_id: &str, metadata: TrackMetadata) -> Result<Track> {
        metadata
            .validate()
            .map_err(|message| LibraryError::InvalidInput {
                field: "metadata".to_string(),
                message,
            })?;

        let Some(_guard) = self.track_locks.try_lock(track_id) else {
            warn!("Enrichment rejected, write already in progress");
            return Err(LibraryError::Conflict {
                entity_type: "Track".to_string(),
                id: track_id.to_string(),
                reason: "enrichment already in progress".to_string(),
            });
        };

        let mut track = self.get_track(track_id).await?;
        if track.matches_metadata(&metadata) {
            return Ok(track);
        }
        if !track
            .recognition_status
            .can_transition_to(RecognitionStatus::Recognized)
        {
            return Err(LibraryError::InvalidTransition {
                id: track_id.to_string(),
                from: track.recognition_status,
                to: RecognitionStatus::Recognized,
            });
        }

        track.title = metadata.title;
        track.artist = metadata.artist;
        track.album = metadata.album;
        track.external_id = metadata.external_id;
        track.match_confidence = Some(metadata.confidence);
        track.recognition_status = RecognitionStatus::Recognized;
        track.updated_at = self.clock.unix_timestamp();
        self.tracks.update(&track).await?;

        info!(title = %track.title, "Track enriched");
        Ok(track)
    }

    // =========================================================================
    // Playlists
    // =========================================================================

    #[instrument(skip(self))]
    pub async fn create_playlist(&self, name: &str) -> Result<Playlist> {
        let now = self.clock.unix_timestamp();
        let playlist = Playlist {
            created_at: now,
            updated_at: now,
            ..Playlist::new(name.trim().to_string())
        };
        self.playlists.insert(&playlist).await?;

        self.emit(LibraryEvent::PlaylistCreated {
            playlist_id: playlist.id.clone(),
            name: playlist.name.clone(),
        })
        .await;
        Ok(playlist)
    }

    #[instrument(skip(self))]
    pub async fn rename_playlist(&self, playlist_id: &str, name: &str) -> Result<Playlist> {
        let _guard = self.playlist_locks.lock(playlist_id).await;

        let mut playlist = self.get_playlist(playlist_id).await?;
        playlist.name = name.trim().to_string();
        playlist.updated_at = self.clock.unix_timestamp();
        self.playlists.update(&playlist).await?;

        self.emit(LibraryEvent::PlaylistUpdated {
            playlist_id: playlist.id.clone(),
            track_count: playlist.len(),
        })
        .await;
        Ok(playlist)
    }

    #[instrument(skip(self))]
    pub async fn delete_playlist(&self, playlist_id: &str) -> Result<()> {
        let _guard = self.playlist_locks.lock(playlist_id).await;

        if !self.playlists.delete(playlist_id).await? {
            return Err(LibraryError::playlist_not_found(playlist_id));
        }

        self.emit(LibraryEvent::PlaylistDeleted {
            playlist_id: playlist_id.to_string(),
        })
        .await;
        Ok(())
    }

    pub async fn get_playlist(&self, playlist_id: &str) -> Result<Playlist> {
        self.playlists
            .find_by_id(playlist_id)
            .await?
            .ok_or_else(|| LibraryError::playlist_not_found(playlist_id))
    }

    pub async fn list_playlists(&self, page: PageRequest) -> Result<Page<Playlist>> {
        self.playlists.query(page).await
    }

    pub async fn playlist_contains(&self, playlist_id: &str, track_id: &str) -> Result<bool> {
        Ok(self.get_playlist(playlist_id).await?.contains(track_id))
    }

    /// Add a track at the end of a playlist.
    pub async fn append_to_playlist(&self, playlist_id: &str, track_id: &str) -> Result<Playlist> {
        let _references = self.reference_locks.lock(track_id).await;
        self.ensure_track(track_id).await?;
        self.mutate_playlist(playlist_id, |track_ids| {
            track_ids.push(track_id.to_string());
            Ok(())
        })
        .await
    }

    /// Insert a track before `position`; `position == len` appends.
    ///
    /// # Errors
    /// `Range` when `position > len`, `NotFound` for an unknown playlist or track.
    #[instrument(skip(self))]
    pub async fn add_to_playlist(
        &self,
        playlist_id: &str,
        track_id: &str,
        position: usize,
    ) -> Result<Playlist> {
        let _references = self.reference_locks.lock(track_id).await;
        self.ensure_track(track_id).await?;
        self.mutate_playlist(playlist_id, |track_ids| {
            if position > track_ids.len() {
                return Err(range(playlist_id, position, track_ids.len()));
            }
            track_ids.insert(position, track_id.to_string());
            Ok(())
        })
        .await
    }

    /// Remove the entry at `position`.
    #[instrument(skip(self))]
    pub async fn remove_from_playlist(&self, playlist_id: &str, position: usize) -> Result<Playlist> {
        self.mutate_playlist(playlist_id, |track_ids| {
            if position >= track_ids.len() {
                return Err(range(playlist_id, position, track_ids.len()));
            }
            track_ids.remove(position);
            Ok(())
        })
        .await
    }

    /// Move the entry at `from` so it ends up at index `to`.
    #[instrument(skip(self))]
    pub async fn move_in_playlist(
        &self,
        playlist_id: &str,
        from: usize,
        to: usize,
    ) -> Result<Playlist> {
        self.mutate_playlist(playlist_id, |track_ids| {
            let len = track_ids.len();
            for position in [from, to] {
                if position >= len {
                    return Err(range(playlist_id, position, len));
                }
            }
            let entry = track_ids.remove(from);
            track_ids.insert(to, entry);
            Ok(())
        })
        .await
    }

    async fn ensure_track(&self, track_id: &str) -> Result<()> {
        self.get_track(track_id).await.map(|_| ())
    }

    async fn mutate_playlist<F>(&self, playlist_id: &str, edit: F) -> Result<Playlist>
    where
        F: FnOnce(&mut Vec<String>) -> Result<()>,
    {
        let _guard = self.playlist_locks.lock(playlist_id).await;

        let mut playlist = self.get_playlist(playlist_id).await?;
        edit(&mut playlist.track_ids)?;
        playlist.updated_at = self.clock.unix_timestamp();

        self.playlists
            .replace_track_ids(&playlist.id, &playlist.track_ids, playlist.updated_at)
            .await?;

        self.emit(LibraryEvent::PlaylistUpdated {
            playlist_id: playlist.id.clone(),
            track_count: playlist.len(),
        })
        .await;
        Ok(playlist)
    }
}

fn range(playlist_id: &str, position: usize, len: usize) -> LibraryError {
    LibraryError::Range {
        playlist_id: playlist_id.to_string(),
        position,
        len,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::time::ManualClock;
    use mockall::mock;

    mock! {
        Tracks {}
        #[async_trait]
        impl TrackRepository for Tracks {
            async fn find_by_id(&self, id: &str) -> Result<Option<Track>>;
            async fn find_by_source(&self, source: &str) -> Result<Option<Track>>;
            async fn insert(&self, track: &Track) -> Result<()>;
            async fn update(&self, track: &Track) -> Result<()>;
            async fn delete(&self, id: &str) -> Result<bool>;
            async fn query(&self, page_request: PageRequest) -> Result<Page<Track>>;
            async fn count(&self) -> Result<i64>;
        }
    }

    mock! {
        Playlists {}
        #[async_trait]
        impl PlaylistRepository for Playlists {
            async fn find_by_id(&self, id: &str) -> Result<Option<Playlist>>;
            async fn insert(&self, playlist: &Playlist) -> Result<()>;
            async fn update(&self, playlist: &Playlist) -> Result<()>;
            async fn replace_track_ids(
                &self,
                playlist_id: &str,
                track_ids: &[String],
                updated_at: i64,
            ) -> Result<()>;
            async fn delete(&self, id: &str) -> Result<bool>;
            async fn query(&self, page_request: PageRequest) -> Result<Page<Playlist>>;
            async fn is_track_referenced(&self, track_id: &str) -> Result<bool>;
            async fn count(&self) -> Result<i64>;
        }
    }

    fn store() -> LibraryStore {
        LibraryStore::in_memory(
            Arc::new(ManualClock::starting_at(1_700_000_000_000)),
            EventBus::default(),
        )
    }

    fn metadata(title: &str) -> TrackMetadata {
        TrackMetadata {
            title: title.to_string(),
            artist: Some("Artist".to_string()),
            album: Some("Album".to_string()),
            external_id: Some("ext-1".to_string()),
            confidence: 0.9,
        }
    }

    #[tokio::test]
    async fn test_import_is_idempotent_by_id_and_source() {
        let store = store();
        let track = Track::new("a.mp3", "/music/a.mp3", 1000);

        let first = store.import_track(track.clone()).await.unwrap();
        assert_eq!(first.created_at, 1_700_000_000);

        let again = store.import_track(track).await.unwrap();
        assert_eq!(again, first);

        let other_id = store
            .import_track(Track::new("copy", "/music/a.mp3", 1000))
            .await
            .unwrap();
        assert_eq!(other_id.id, first.id);
        assert_eq!(store.list_tracks(PageRequest::default()).await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn test_recognition_lifecycle() {
        let store = store();
        let track = store
            .import_track(Track::new("unknown.mp3", "/u.mp3", 0))
            .await
            .unwrap();

        // unrecognized -> recognized skips pending
        let skipped = store.enrich(&track.id, metadata("Song")).await;
        assert!(matches!(skipped, Err(LibraryError::InvalidTransition { .. })));

        let pending = store.begin_recognition(&track.id).await.unwrap();
        assert_eq!(pending.recognition_status, RecognitionStatus::Pending);

        let enriched = store.enrich(&track.id, metadata("Song")).await.unwrap();
        assert_eq!(enriched.recognition_status, RecognitionStatus::Recognized);

        let read = store.get_track(&track.id).await.unwrap();
        assert_eq!(read.title, "Song");
        assert_eq!(read.artist.as_deref(), Some("Artist"));
        assert_eq!(read.album.as_deref(), Some("Album"));
        assert_eq!(read.match_confidence, Some(0.9));

        // identical enrichment is a no-op
        let repeated = store.enrich(&track.id, metadata("Song")).await.unwrap();
        assert_eq!(repeated, read);

        // different metadata on a recognized track is not a legal transition
        let changed = store.enrich(&track.id, metadata("Other")).await;
        assert!(matches!(changed, Err(LibraryError::InvalidTransition { .. })));

        assert!(store.begin_recognition(&track.id).await.is_err());
    }

    #[tokio::test]
    async fn test_failed_track_can_retry_but_not_reset() {
        let store = store();
        let track = store
            .import_track(Track::new("x", "/x.mp3", 0))
            .await
            .unwrap();

        assert!(store.mark_recognition_failed(&track.id).await.is_err());
        store.begin_recognition(&track.id).await.unwrap();
        let failed = store.mark_recognition_failed(&track.id).await.unwrap();
        assert_eq!(failed.recognition_status, RecognitionStatus::Failed);

        let retry = store.begin_recognition(&track.id).await.unwrap();
        assert_eq!(retry.recognition_status, RecognitionStatus::Pending);
    }

    #[tokio::test]
    async fn test_enrich_validates_input_and_existence() {
        let store = store();
        let bad = TrackMetadata {
            confidence: 1.5,
            ..metadata("Song")
        };
        assert!(matches!(
            store.enrich("whatever", bad).await,
            Err(LibraryError::InvalidInput { .. })
        ));
        assert!(matches!(
            store.enrich("missing", metadata("Song")).await,
            Err(LibraryError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_enrich_conflicts_with_write_in_progress() {
        let store = store();
        let track = store
            .import_track(Track::new("x", "/x.mp3", 0))
            .await
            .unwrap();
        store.begin_recognition(&track.id).await.unwrap();

        let held = store.track_locks.lock(&track.id).await;
        let result = store.enrich(&track.id, metadata("Song")).await;
        assert!(matches!(result, Err(LibraryError::Conflict { .. })));
        drop(held);

        assert!(store.enrich(&track.id, metadata("Song")).await.is_ok());
    }

    #[tokio::test]
    async fn test_playlist_ordered_mutations() {
        let store = store();
        let mut ids = Vec::new();
        for name in ["a", "b", "c"] {
            let track = store
                .import_track(Track::new(name, format!("/{name}.mp3"), 0))
                .await
                .unwrap();
            ids.push(track.id);
        }

        let playlist = store.create_playlist("  Mix  ").await.unwrap();
        assert_eq!(playlist.name, "Mix");

        store.append_to_playlist(&playlist.id, &ids[0]).await.unwrap();
        store.append_to_playlist(&playlist.id, &ids[1]).await.unwrap();
        store.add_to_playlist(&playlist.id, &ids[2], 0).await.unwrap();
        // duplicates allowed
        let snapshot = store.add_to_playlist(&playlist.id, &ids[0], 3).await.unwrap();
        assert_eq!(snapshot.track_ids, vec![
            ids[2].clone(),
            ids[0].clone(),
            ids[1].clone(),
            ids[0].clone()
        ]);

        let moved = store.move_in_playlist(&playlist.id, 0, 3).await.unwrap();
        assert_eq!(moved.track_ids, vec![
            ids[0].clone(),
            ids[1].clone(),
            ids[0].clone(),
            ids[2].clone()
        ]);

        let removed = store.remove_from_playlist(&playlist.id, 1).await.unwrap();
        assert_eq!(removed.track_ids, vec![ids[0].clone(), ids[0].clone(), ids[2].clone()]);

        assert!(store.playlist_contains(&playlist.id, &ids[2]).await.unwrap());
        assert!(!store.playlist_contains(&playlist.id, &ids[1]).await.unwrap());
        assert_eq!(store.get_playlist(&playlist.id).await.unwrap(), removed);
    }

    #[tokio::test]
    async fn test_playlist_range_errors_leave_playlist_unchanged() {
        let store = store();
        let track = store
            .import_track(Track::new("a", "/a.mp3", 0))
            .await
            .unwrap();
        let playlist = store.create_playlist("p").await.unwrap();
        store.append_to_playlist(&playlist.id, &track.id).await.unwrap();

        assert!(matches!(
            store.add_to_playlist(&playlist.id, &track.id, 2).await,
            Err(LibraryError::Range { position: 2, len: 1, .. })
        ));
        assert!(matches!(
            store.remove_from_playlist(&playlist.id, 1).await,
            Err(LibraryError::Range { .. })
        ));
        assert!(matches!(
            store.move_in_playlist(&playlist.id, 0, 1).await,
            Err(LibraryError::Range { .. })
        ));
        assert!(matches!(
            store.add_to_playlist(&playlist.id, "ghost", 0).await,
            Err(LibraryError::NotFound { .. })
        ));

        let unchanged = store.get_playlist(&playlist.id).await.unwrap();
        assert_eq!(unchanged.track_ids, vec![track.id]);
    }

    #[tokio::test]
    async fn test_delete_track_referenced_by_playlist() {
        let store = store();
        let track = store
            .import_track(Track::new("a", "/a.mp3", 0))
            .await
            .unwrap();
        let playlist = store.create_playlist("p").await.unwrap();
        store.append_to_playlist(&playlist.id, &track.id).await.unwrap();

        assert!(matches!(
            store.delete_track(&track.id).await,
            Err(LibraryError::Conflict { .. })
        ));

        store.delete_playlist(&playlist.id).await.unwrap();
        store.delete_track(&track.id).await.unwrap();
        assert!(store.find_track(&track.id).await.unwrap().is_none());
        assert!(matches!(
            store.delete_track(&track.id).await,
            Err(LibraryError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_checks_references_before_deleting() {
        let track = Track::new("a", "/a.mp3", 0);
        let id = track.id.clone();

        let mut tracks = MockTracks::new();
        tracks
            .expect_find_by_id()
            .returning(move |_| Ok(Some(track.clone())));
        tracks.expect_delete().times(0);

        let mut playlists = MockPlaylists::new();
        playlists
            .expect_is_track_referenced()
            .times(1)
            .returning(|_| Ok(true));

        let store = LibraryStore::new(
            Arc::new(tracks),
            Arc::new(playlists),
            Arc::new(SystemClock),
            EventBus::default(),
        );

        let result = store.delete_track(&id).await;
        assert!(matches!(result, Err(LibraryError::Conflict { .. })));
    }

    /// Memory playlists whose lookups stall, widening the gap between the
    /// track existence check and the playlist write.
    struct StallingPlaylists {
        inner: Arc<MemoryPlaylistRepository>,
        entered: tokio::sync::Notify,
    }

    #[async_trait]
    impl PlaylistRepository for StallingPlaylists {
        async fn find_by_id(&self, id: &str) -> Result<Option<Playlist>> {
            self.entered.notify_one();
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            self.inner.find_by_id(id).await
        }
        async fn insert(&self, playlist: &Playlist) -> Result<()> {
            self.inner.insert(playlist).await
        }
        async fn update(&self, playlist: &Playlist) -> Result<()> {
            self.inner.update(playlist).await
        }
        async fn replace_track_ids(
            &self,
            playlist_id: &str,
            track_ids: &[String],
            updated_at: i64,
        ) -> Result<()> {
            self.inner
                .replace_track_ids(playlist_id, track_ids, updated_at)
                .await
        }
        async fn delete(&self, id: &str) -> Result<bool> {
            self.inner.delete(id).await
        }
        async fn query(&self, page_request: PageRequest) -> Result<Page<Playlist>> {
            self.inner.query(page_request).await
        }
        async fn is_track_referenced(&self, track_id: &str) -> Result<bool> {
            self.inner.is_track_referenced(track_id).await
        }
        async fn count(&self) -> Result<i64> {
            self.inner.count().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_waits_for_playlist_insert_of_same_track() {
        let inner = Arc::new(MemoryPlaylistRepository::new());
        let playlists = Arc::new(StallingPlaylists {
            inner: inner.clone(),
            entered: tokio::sync::Notify::new(),
        });
        let store = Arc::new(LibraryStore::new(
            Arc::new(MemoryTrackRepository::with_playlists(inner)),
            playlists.clone(),
            Arc::new(SystemClock),
            EventBus::default(),
        ));

        let track = store
            .import_track(Track::new("a", "/a.mp3", 0))
            .await
            .unwrap();
        let playlist = store.create_playlist("p").await.unwrap();

        let append = {
            let store = Arc::clone(&store);
            let (playlist_id, track_id) = (playlist.id.clone(), track.id.clone());
            tokio::spawn(async move { store.append_to_playlist(&playlist_id, &track_id).await })
        };
        // append has passed its existence check and is inside the playlist write
        playlists.entered.notified().await;

        let deleted = store.delete_track(&track.id).await;
        assert!(matches!(deleted, Err(LibraryError::Conflict { .. })));

        let appended = append.await.unwrap().unwrap();
        assert_eq!(appended.track_ids, vec![track.id.clone()]);
        assert!(store.find_track(&track.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_rename_persists_and_keeps_tracks() {
        let mut playlists = MockPlaylists::new();
        let existing = Playlist {
            id: "p1".to_string(),
            name: "Old".to_string(),
            track_ids: vec!["t1".to_string()],
            created_at: 1,
            updated_at: 1,
        };
        playlists
            .expect_find_by_id()
            .withf(|id| id == "p1")
            .returning(move |_| Ok(Some(existing.clone())));
        playlists
            .expect_update()
            .withf(|p| p.name == "New" && p.track_ids == vec!["t1".to_string()])
            .times(1)
            .returning(|_| Ok(()));

        let store = LibraryStore::new(
            Arc::new(MockTracks::new()),
            Arc::new(playlists),
            Arc::new(ManualClock::starting_at(5_000)),
            EventBus::default(),
        );

        let renamed = store.rename_playlist("p1", "New").await.unwrap();
        assert_eq!(renamed.updated_at, 5);
    }

    #[tokio::test]
    async fn test_mutations_publish_library_events() {
        let events = EventBus::default();
        let mut subscription = events.subscribe();
        let store = LibraryStore::in_memory(Arc::new(SystemClock), events);

        let track = store
            .import_track(Track::new("a", "/a.mp3", 0))
            .await
            .unwrap();
        let playlist = store.create_playlist("p").await.unwrap();
        store.append_to_playlist(&playlist.id, &track.id).await.unwrap();
        store.delete_playlist(&playlist.id).await.unwrap();

        let expected = vec![
            LibraryEvent::TrackImported {
                track_id: track.id.clone(),
                title: "a".to_string(),
            },
            LibraryEvent::PlaylistCreated {
                playlist_id: playlist.id.clone(),
                name: "p".to_string(),
            },
            LibraryEvent::PlaylistUpdated {
                playlist_id: playlist.id.clone(),
                track_count: 1,
            },
            LibraryEvent::PlaylistDeleted {
                playlist_id: playlist.id.clone(),
            },
        ];
        for event in expected {
            assert_eq!(subscription.recv().await, Some(CoreEvent::Library(event)));
        }
    }
}
