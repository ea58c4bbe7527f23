//! Playback Events
//!
//! Event-based communication for UI synchronization. The controller queues
//! events as its state changes and the UI drains them with
//! `PlaybackController::drain_events`:
//! - Status line updates
//! - Play/pause/buffering indicator changes
//! - Track and view changes
//! - Favorite and volume changes

use crate::types::{CatalogView, TrackId};
use serde::{Deserialize, Serialize};

/// Events emitted by the playback controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlaybackEvent {
    /// Status line text changed
    StatusChanged { text: String },

    /// Play/pause or buffering indicator changed
    StateChanged { is_playing: bool, is_buffering: bool },

    /// Shuffle toggled
    ShuffleChanged { enabled: bool },

    /// A track started playing
    TrackChanged {
        track_id: TrackId,
        previous_track_id: Option<TrackId>,
    },

    /// A load attempt failed and another one is scheduled
    RetryScheduled {
        track_id: TrackId,
        /// Retry number, starting at 1
        attempt: u32,
        max_retries: u32,
    },

    /// Active catalog view changed (all tracks / favorites)
    ViewChanged { view: CatalogView, track_count: usize },

    /// A track was added to or removed from favorites
    FavoriteChanged { track_id: TrackId, is_favorite: bool },

    /// Volume changed
    VolumeChanged {
        /// Level from 0.0 to 1.0
        level: f32,
        is_muted: bool,
    },

    /// Terminal error surfaced to the user
    Error { message: String },
}

impl PlaybackEvent {
    pub(crate) fn status(text: impl Into<String>) -> Self {
        Self::StatusChanged { text: text.into() }
    }
}
