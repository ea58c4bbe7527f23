//! Volume preference with mute memory
//!
//! The level is the sink's linear output level from 0.0 to 1.0; muting drops
//! it to zero and remembers the previous level for unmuting.

use crate::favorites::{PreferenceStore, VOLUME_KEY};
use crate::error::Result;

/// Level used when nothing is stored
pub const DEFAULT_VOLUME: f32 = 0.5;

/// Volume controller
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    /// Level in 0.0..=1.0
    level: f32,

    /// Level restored on unmute
    previous: f32,
}

impl Volume {
    pub fn new(level: f32) -> Self {
        let level = Self::clamp(level);
        Self {
            level,
            previous: if level > 0.0 { level } else { DEFAULT_VOLUME },
        }
    }

    /// Load the stored level, falling back to the default
    pub fn load(store: &dyn PreferenceStore) -> Result<Self> {
        let level = store
            .get(VOLUME_KEY)?
            .and_then(|raw| raw.parse::<f32>().ok())
            .unwrap_or(DEFAULT_VOLUME);
        Ok(Self::new(level))
    }

    pub fn save(&self, store: &dyn PreferenceStore) -> Result<()> {
        store.set(VOLUME_KEY, &self.level.to_string())
    }

    pub fn set_level(&mut self, level: f32) {
        self.level = Self::clamp(level);
        if self.level > 0.0 {
            self.previous = self.level;
        }
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn is_muted(&self) -> bool {
        self.level == 0.0
    }

    /// Mute, or restore the level from before muting
    pub fn toggle_mute(&mut self) {
        if self.is_muted() {
            self.level = self.previous;
        } else {
            self.previous = self.level;
            self.level = 0.0;
        }
    }

    fn clamp(level: f32) -> f32 {
        if level.is_finite() {
            level.clamp(0.0, 1.0)
        } else {
            DEFAULT_VOLUME
        }
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self::new(DEFAULT_VOLUME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::favorites::MemoryPreferenceStore;

    #[test]
    fn default_volume_is_half() {
        let volume = Volume::default();
        assert_eq!(volume.level(), 0.5);
        assert!(!volume.is_muted());
    }

    #[test]
    fn level_is_clamped() {
        let mut volume = Volume::default();
        volume.set_level(1.5);
        assert_eq!(volume.level(), 1.0);
        volume.set_level(-0.2);
        assert_eq!(volume.level(), 0.0);
        volume.set_level(f32::NAN);
        assert_eq!(volume.level(), DEFAULT_VOLUME);
    }

    #[test]
    fn mute_remembers_previous_level() {
        let mut volume = Volume::new(0.8);

        volume.toggle_mute();
        assert!(volume.is_muted());
        assert_eq!(volume.level(), 0.0);

        volume.toggle_mute();
        assert_eq!(volume.level(), 0.8);
    }

    #[test]
    fn loads_and_saves_through_store() {
        let store = MemoryPreferenceStore::new();
        assert_eq!(Volume::load(&store).unwrap().level(), DEFAULT_VOLUME);

        Volume::new(0.25).save(&store).unwrap();
        assert_eq!(Volume::load(&store).unwrap().level(), 0.25);
    }

    #[test]
    fn garbage_falls_back_to_default() {
        let store = MemoryPreferenceStore::new();
        store.set(VOLUME_KEY, "loud").unwrap();
        assert_eq!(Volume::load(&store).unwrap().level(), DEFAULT_VOLUME);
    }
}
