use cirrus_playback::{PlaybackError, PreferenceStore, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};

/// Preference store backed by one JSON object on disk
///
/// The whole file is rewritten on every change.
#[derive(Debug)]
pub struct JsonFilePreferenceStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl JsonFilePreferenceStore {
    /// Open the store at `path`
    ///
    /// A missing file is an empty store. An unreadable one is logged and
    /// replaced on the next write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let values = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable preferences file");
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(PlaybackError::Preferences(format!(
                    "{}: {}",
                    path.display(),
                    e
                )))
            }
        };

        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> Result<()> {
        let raw = serde_json::to_string_pretty(values)
            .map_err(|e| PlaybackError::Preferences(e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| PlaybackError::Preferences(format!("{}: {}", parent.display(), e)))?;
        }
        fs::write(&self.path, raw)
            .map_err(|e| PlaybackError::Preferences(format!("{}: {}", self.path.display(), e)))?;

        debug!(path = %self.path.display(), "Saved preferences");
        Ok(())
    }
}

impl PreferenceStore for JsonFilePreferenceStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_string(), value.to_string());
        self.persist(&values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cirrus_playback::{Favorites, TrackId, Volume, FAVORITES_KEY};

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFilePreferenceStore::open(dir.path().join("prefs.json")).unwrap();

        assert_eq!(store.get(FAVORITES_KEY).unwrap(), None);
        assert!(Favorites::load(&store).unwrap().is_empty());
    }

    #[test]
    fn values_survive_reopening() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("prefs.json");

        {
            let store = JsonFilePreferenceStore::open(&path).unwrap();
            let mut favorites = Favorites::default();
            favorites.insert(TrackId::from("a.mp3"));
            favorites.save(&store).unwrap();
            Volume::new(0.7).save(&store).unwrap();
        }

        let store = JsonFilePreferenceStore::open(&path).unwrap();
        assert!(Favorites::load(&store).unwrap().contains(&TrackId::from("a.mp3")));
        assert_eq!(Volume::load(&store).unwrap().level(), 0.7);
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        fs::write(&path, "not json").unwrap();

        let store = JsonFilePreferenceStore::open(&path).unwrap();
        assert_eq!(store.get(FAVORITES_KEY).unwrap(), None);

        store.set(FAVORITES_KEY, "[]").unwrap();
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("favorites"));
    }
}
