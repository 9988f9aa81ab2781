use crate::models::RecognitionStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Conflict on {entity_type} {id}: {reason}")]
    Conflict {
        entity_type: String,
        id: String,
        reason: String,
    },

    #[error("Position {position} out of range for playlist {playlist_id} of length {len}")]
    Range {
        playlist_id: String,
        position: usize,
        len: usize,
    },

    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },

    #[error("Track {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: RecognitionStatus,
        to: RecognitionStatus,
    },

    #[error("Migration failed: {0}")]
    Migration(String),
}

impl LibraryError {
    pub(crate) fn track_not_found(id: &str) -> Self {
        Self::NotFound {
            entity_type: "Track".to_string(),
            id: id.to_string(),
        }
    }

    pub(crate) fn playlist_not_found(id: &str) -> Self {
        Self::NotFound {
            entity_type: "Playlist".to_string(),
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

pub type Result<T> = std::result::Result<T, LibraryError>;
