//! # Play Queue
//!
//! Ordered tracks plus a play order. With shuffle off the play order is the
//! queue order; with shuffle on it is a random permutation that starts at the
//! entry playing when shuffle was turned on.

use crate::error::{PlaybackError, Result};
use core_library::Track;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    #[default]
    Off,
    One,
    All,
}

impl RepeatMode {
    /// `Off → One → All → Off`
    pub fn cycle(self) -> Self {
        match self {
            RepeatMode::Off => RepeatMode::One,
            RepeatMode::One => RepeatMode::All,
            RepeatMode::All => RepeatMode::Off,
        }
    }
}

/// Read-only view of the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueSnapshot {
    /// Track ids in queue order.
    pub track_ids: Vec<String>,
    /// Index into `track_ids` of the current entry.
    pub current_index: Option<usize>,
    pub shuffle: bool,
    pub repeat: RepeatMode,
}

#[derive(Debug, Default)]
pub struct PlayQueue {
    tracks: Vec<Track>,
    order: Vec<usize>,
    cursor: usize,
    shuffle: bool,
    repeat: RepeatMode,
}

impl PlayQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the queue and position it on `start`.
    pub fn set(&mut self, tracks: Vec<Track>, start: usize) -> Result<&Track> {
        if tracks.is_empty() {
            return Err(PlaybackError::QueueEmpty);
        }
        if start >= tracks.len() {
            return Err(PlaybackError::QueueIndexOutOfRange {
                index: start,
                len: tracks.len(),
            });
        }

        self.tracks = tracks;
        self.rebuild_order(start);
        self.current().ok_or(PlaybackError::QueueEmpty)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn current(&self) -> Option<&Track> {
        self.current_index().and_then(|index| self.tracks.get(index))
    }

    /// Queue position of the current entry.
    pub fn current_index(&self) -> Option<usize> {
        self.order.get(self.cursor).copied()
    }

    /// Step forward in play order.
    ///
    /// `automatic` marks the end of the current track rather than a user
    /// skip; only then does `RepeatMode::One` replay the same entry. Returns
    /// `None` at the end of the queue with repeat off.
    pub fn advance(&mut self, automatic: bool) -> Option<&Track> {
        if self.order.is_empty() {
            return None;
        }
        if automatic && self.repeat == RepeatMode::One {
            return self.current();
        }

        if self.cursor + 1 < self.order.len() {
            self.cursor += 1;
        } else if self.repeat != RepeatMode::Off {
            self.cursor = 0;
        } else {
            return None;
        }
        self.current()
    }

    /// Step back in play order, wrapping only when repeat is on.
    pub fn previous(&mut self) -> Option<&Track> {
        if self.order.is_empty() {
            return None;
        }
        if self.cursor > 0 {
            self.cursor -= 1;
        } else if self.repeat != RepeatMode::Off {
            self.cursor = self.order.len() - 1;
        }
        self.current()
    }

    /// Make the entry at queue position `index` current.
    pub fn skip_to(&mut self, index: usize) -> Result<&Track> {
        let cursor = self
            .order
            .iter()
            .position(|&entry| entry == index)
            .ok_or(PlaybackError::QueueIndexOutOfRange {
                index,
                len: self.tracks.len(),
            })?;
        self.cursor = cursor;
        self.current().ok_or(PlaybackError::QueueEmpty)
    }

    pub fn shuffle(&self) -> bool {
        self.shuffle
    }

    pub fn set_shuffle(&mut self, shuffle: bool) {
        if self.shuffle == shuffle {
            return;
        }
        self.shuffle = shuffle;
        if let Some(current) = self.current_index() {
            self.rebuild_order(current);
        }
    }

    pub fn repeat(&self) -> RepeatMode {
        self.repeat
    }

    pub fn cycle_repeat(&mut self) -> RepeatMode {
        self.repeat = self.repeat.cycle();
        self.repeat
    }

    /// Refresh every entry of `track` with the given snapshot.
    pub fn refresh(&mut self, track: &Track) {
        for entry in self.tracks.iter_mut().filter(|entry| entry.id == track.id) {
            *entry = track.clone();
        }
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            track_ids: self.tracks.iter().map(|track| track.id.clone()).collect(),
            current_index: self.current_index(),
            shuffle: self.shuffle,
            repeat: self.repeat,
        }
    }

    fn rebuild_order(&mut self, start: usize) {
        let mut order: Vec<usize> = (0..self.tracks.len()).collect();
        if self.shuffle {
            order.retain(|&entry| entry != start);
            order.shuffle(&mut rand::thread_rng());
            order.insert(0, start);
            self.cursor = 0;
        } else {
            self.cursor = start;
        }
        self.order = order;
    }
}
