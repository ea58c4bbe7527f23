//! Favorites and the persistent preference store

use crate::error::{PlaybackError, Result};
use crate::types::TrackId;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, PoisonError};
use tracing::warn;

/// Preference key holding the favorites JSON array
pub const FAVORITES_KEY: &str = "favorites";

/// Preference key holding the volume level
pub const VOLUME_KEY: &str = "volume";

/// String key/value store that survives restarts (local storage, a file, ...)
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// In-memory store, for tests and platforms without persistence
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Set of favorite tracks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Favorites {
    tracks: BTreeSet<TrackId>,
}

impl Favorites {
    /// Load favorites from the store
    ///
    /// A missing key is an empty set. A corrupt value is logged and treated
    /// as empty rather than blocking playback.
    pub fn load(store: &dyn PreferenceStore) -> Result<Self> {
        let Some(raw) = store.get(FAVORITES_KEY)? else {
            return Ok(Self::default());
        };

        match serde_json::from_str::<Vec<TrackId>>(&raw) {
            Ok(tracks) => Ok(Self {
                tracks: tracks.into_iter().collect(),
            }),
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable favorites");
                Ok(Self::default())
            }
        }
    }

    pub fn save(&self, store: &dyn PreferenceStore) -> Result<()> {
        let raw = serde_json::to_string(&self.tracks)
            .map_err(|e| PlaybackError::Preferences(e.to_string()))?;
        store.set(FAVORITES_KEY, &raw)
    }

    pub fn contains(&self, track: &TrackId) -> bool {
        self.tracks.contains(track)
    }

    pub fn insert(&mut self, track: TrackId) -> bool {
        self.tracks.insert(track)
    }

    pub fn remove(&mut self, track: &TrackId) -> bool {
        self.tracks.remove(track)
    }

    /// Flip membership; returns whether `track` is now a favorite
    pub fn toggle(&mut self, track: &TrackId) -> bool {
        if self.tracks.remove(track) {
            false
        } else {
            self.tracks.insert(track.clone());
            true
        }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackId> {
        self.tracks.iter()
    }

    /// Keep only favorites from `listing`, preserving listing order
    pub fn filter(&self, listing: &[TrackId]) -> Vec<TrackId> {
        listing
            .iter()
            .filter(|t| self.tracks.contains(*t))
            .cloned()
            .collect()
    }
}
