//! Error types for playback management

use crate::types::TrackId;
use thiserror::Error;

/// Playback errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PlaybackError {
    /// Track listing failed
    #[error("Catalog unavailable: {0}")]
    Catalog(String),

    /// Signed URL could not be minted for a track
    #[error("Failed to resolve URL for {track}: {message}")]
    Resolve { track: TrackId, message: String },

    /// The media sink rejected the source or never became ready
    #[error("Failed to load {track}: {message}")]
    Load { track: TrackId, message: String },

    /// Playback stalled and the recovery ladder could not restart it
    #[error("Playback of {track} stalled and could not be recovered")]
    Stall { track: TrackId },

    /// Runtime error reported by the media sink (decode failure etc.)
    #[error("Media error: {0}")]
    SinkFatal(String),

    /// A newer play request replaced this one before it completed
    #[error("Request for {0} was superseded")]
    Superseded(TrackId),

    /// Catalog view has no tracks
    #[error("No tracks available")]
    EmptyCatalog,

    /// Favorites view requested with no favorites
    #[error("No favorites to play")]
    NoFavorites,

    /// No track is currently loaded
    #[error("No track loaded")]
    NoTrackLoaded,

    /// Preference store failed to read or write
    #[error("Preference store error: {0}")]
    Preferences(String),
}

impl PlaybackError {
    /// Create a catalog error
    pub fn catalog(msg: impl Into<String>) -> Self {
        Self::Catalog(msg.into())
    }

    /// Create a resolve error
    pub fn resolve(track: &TrackId, msg: impl Into<String>) -> Self {
        Self::Resolve {
            track: track.clone(),
            message: msg.into(),
        }
    }

    /// Create a load error
    pub fn load(track: &TrackId, msg: impl Into<String>) -> Self {
        Self::Load {
            track: track.clone(),
            message: msg.into(),
        }
    }

    /// Whether the retry policy may attempt the operation again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Catalog(_) | Self::Resolve { .. } | Self::Load { .. }
        )
    }
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn superseded_is_not_retryable() {
        let track = TrackId::from("a.mp3");
        assert!(!PlaybackError::Superseded(track.clone()).is_retryable());
        assert!(!PlaybackError::SinkFatal("decode".into()).is_retryable());
        assert!(PlaybackError::load(&track, "timeout").is_retryable());
        assert!(PlaybackError::resolve(&track, "500").is_retryable());
    }

    #[test]
    fn messages_name_the_track() {
        let err = PlaybackError::load(&TrackId::from("song.flac"), "Audio load timeout");
        assert_eq!(err.to_string(), "Failed to load song.flac: Audio load timeout");
    }
}
