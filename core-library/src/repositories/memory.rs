//! In-memory repositories
//!
//! Same contracts as the SQLite repositories, backed by `parking_lot` maps.
//! Useful for hosts that keep the library elsewhere and for exercising the
//! orchestrator without database IO.

use crate::error::{LibraryError, Result};
use crate::models::{Playlist, Track};
use crate::repositories::{Page, PageRequest, PlaylistRepository, TrackRepository};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Track repository held in process memory
#[derive(Default)]
pub struct MemoryTrackRepository {
    tracks: RwLock<HashMap<String, Track>>,
    // Lets deletes honour playlist references the way the SQLite schema does.
    playlists: Option<Arc<MemoryPlaylistRepository>>,
}

impl MemoryTrackRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse deletes of tracks still listed in `playlists`.
    pub fn with_playlists(playlists: Arc<MemoryPlaylistRepository>) -> Self {
        Self {
            tracks: RwLock::default(),
            playlists: Some(playlists),
        }
    }
}

fn invalid(field: &str, message: String) -> LibraryError {
    LibraryError::InvalidInput {
        field: field.to_string(),
        message,
    }
}

fn paginate<T>(mut items: Vec<T>, request: PageRequest) -> Page<T> {
    let total = items.len();
    let window = request.window(total);
    let page_items: Vec<T> = items.drain(window).collect();
    Page::new(page_items, total as u64, request)
}

#[async_trait]
impl TrackRepository for MemoryTrackRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Track>> {
        Ok(self.tracks.read().get(id).cloned())
    }

    async fn find_by_source(&self, source: &str) -> Result<Option<Track>> {
        Ok(self
            .tracks
            .read()
            .values()
            .find(|track| track.source == source)
            .cloned())
    }

    async fn insert(&self, track: &Track) -> Result<()> {
        track.validate().map_err(|msg| invalid("track", msg))?;

        let mut tracks = self.tracks.write();
        if tracks.contains_key(&track.id) || tracks.values().any(|t| t.source == track.source) {
            return Err(LibraryError::Conflict {
                entity_type: "Track".to_string(),
                id: track.id.clone(),
                reason: "id or source already exists".to_string(),
            });
        }
        tracks.insert(track.id.clone(), track.clone());
        Ok(())
    }

    async fn update(&self, track: &Track) -> Result<()> {
        track.validate().map_err(|msg| invalid("track", msg))?;

        match self.tracks.write().get_mut(&track.id) {
            Some(existing) => {
                *existing = track.clone();
                Ok(())
            }
            None => Err(LibraryError::track_not_found(&track.id)),
        }
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        if let Some(playlists) = &self.playlists {
            if playlists.references(id) {
                return Err(LibraryError::Conflict {
                    entity_type: "Track".to_string(),
                    id: id.to_string(),
                    reason: "referenced by a playlist".to_string(),
                });
            }
        }
        Ok(self.tracks.write().remove(id).is_some())
    }

    async fn query(&self, page_request: PageRequest) -> Result<Page<Track>> {
        let mut tracks: Vec<Track> = self.tracks.read().values().cloned().collect();
        tracks.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.id.cmp(&b.id)));
        Ok(paginate(tracks, page_request))
    }

    async fn count(&self) -> Result<i64> {
        Ok(self.tracks.read().len() as i64)
    }
}

/// Playlist repository held in process memory
#[derive(Default)]
pub struct MemoryPlaylistRepository {
    playlists: RwLock<HashMap<String, Playlist>>,
}

impl MemoryPlaylistRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn references(&self, track_id: &str) -> bool {
        self.playlists
            .read()
            .values()
            .any(|playlist| playlist.contains(track_id))
    }
}

#[async_trait]
impl PlaylistRepository for MemoryPlaylistRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Playlist>> {
        Ok(self.playlists.read().get(id).cloned())
    }

    async fn insert(&self, playlist: &Playlist) -> Result<()> {
        playlist.validate().map_err(|msg| invalid("playlist", msg))?;

        let mut playlists = self.playlists.write();
        if playlists.contains_key(&playlist.id) {
            return Err(LibraryError::Conflict {
                entity_type: "Playlist".to_string(),
                id: playlist.id.clone(),
                reason: "id already exists".to_string(),
            });
        }
        playlists.insert(playlist.id.clone(), playlist.clone());
        Ok(())
    }

    async fn update(&self, playlist: &Playlist) -> Result<()> {
        playlist.validate().map_err(|msg| invalid("playlist", msg))?;

        match self.playlists.write().get_mut(&playlist.id) {
            Some(existing) => {
                existing.name = playlist.name.clone();
                existing.created_at = playlist.created_at;
                existing.updated_at = playlist.updated_at;
                Ok(())
            }
            None => Err(LibraryError::playlist_not_found(&playlist.id)),
        }
    }

    async fn replace_track_ids(
        &self,
        playlist_id: &str,
        track_ids: &[String],
        updated_at: i64,
    ) -> Result<()> {
        match self.playlists.write().get_mut(playlist_id) {
            Some(existing) => {
                existing.track_ids = track_ids.to_vec();
                existing.updated_at = updated_at;
                Ok(())
            }
            None => Err(LibraryError::playlist_not_found(playlist_id)),
        }
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.playlists.write().remove(id).is_some())
    }

    async fn query(&self, page_request: PageRequest) -> Result<Page<Playlist>> {
        let mut playlists: Vec<Playlist> = self.playlists.read().values().cloned().collect();
        playlists.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(paginate(playlists, page_request))
    }

    async fn is_track_referenced(&self, track_id: &str) -> Result<bool> {
        Ok(self.references(track_id))
    }

    async fn count(&self) -> Result<i64> {
        Ok(self.playlists.read().len() as i64)
    }
}
