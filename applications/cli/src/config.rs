use anyhow::{Context, Result};
use cirrus_playback::PlaybackConfig;
use cirrus_server_client::ClientConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Config file read when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "cirrus.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ClientConfig,
    pub playback: PlaybackConfig,
    /// JSON file holding favorites and volume
    pub preferences_path: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ClientConfig::default(),
            playback: PlaybackConfig::default(),
            preferences_path: PathBuf::from("cirrus-preferences.json"),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// An explicit `path` must exist; the default `cirrus.toml` is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, None)
    }

    /// Same as [`AppConfig::load`] with the environment replaced by `env`
    pub fn load_with_env(path: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                settings = settings.add_source(config::File::from(path.to_path_buf()).required(true));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        // Override with environment variables (CIRRUS_SERVER__URL, CIRRUS_PLAYBACK__MAX_RETRIES, ...)
        settings = settings.add_source(
            config::Environment::with_prefix("CIRRUS")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(env),
        );

        settings
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")
    }
}
