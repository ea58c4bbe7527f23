//! Core types for playback management

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Opaque name of a remote audio object (e.g. a blob name)
///
/// Unique within the catalog; equality is by value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for TrackId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Time-limited URL granting read access to one track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedUrl {
    pub url: String,
    pub valid_until: DateTime<Utc>,
}

impl SignedUrl {
    /// Whether the URL is still usable at `now`, keeping `margin` in reserve
    pub fn is_valid_at(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        let margin = chrono::Duration::from_std(margin).unwrap_or_else(|_| chrono::Duration::zero());
        now + margin < self.valid_until
    }
}

/// Snapshot of the playback session
///
/// Exactly one session lives inside each `PlaybackController`; callers get
/// copies of it, never a handle to mutate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Session {
    /// Track that last started playing successfully
    pub current_track: Option<TrackId>,

    pub is_playing: bool,

    pub is_buffering: bool,

    /// Retries spent by the load chain in progress (0 after success)
    pub retry_count: u32,

    pub shuffle_mode: bool,
}

/// Active ordered list of tracks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogView {
    /// Every track the catalog lists
    #[default]
    All,

    /// Only tracks marked as favorites
    Favorites,
}

/// What turning shuffle off does to the catalog view
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShuffleOffPolicy {
    /// Reload the current view from the catalog source
    #[default]
    Reload,

    /// Leave the loaded view untouched
    Keep,
}

/// Configuration for the playback controller
///
/// All durations are milliseconds so the struct maps directly onto
/// TOML / environment configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Retries after the first failed load attempt (default: 3)
    pub max_retries: u32,

    /// Fixed delay between load attempts (default: 1000)
    pub retry_delay_ms: u64,

    /// How long to wait for the sink's ready signal (default: 10000)
    pub ready_timeout_ms: u64,

    /// Stall monitor sampling interval (default: 1000, 0 is treated as 1)
    pub stall_interval_ms: u64,

    /// Consecutive unchanged samples that count as a stall (default: 2)
    pub stall_threshold: u32,

    /// Forward nudge applied by the second recovery step (default: 100)
    pub stall_nudge_ms: u64,

    /// Cool-down before the alternative shuffle pick (default: 2000)
    pub shuffle_cooldown_ms: u64,

    /// Behaviour when shuffle is switched off (default: reload)
    pub shuffle_off_policy: ShuffleOffPolicy,
}

impl PlaybackConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    /// Sampling period, never shorter than 1ms
    pub fn stall_interval(&self) -> Duration {
        Duration::from_millis(self.stall_interval_ms.max(1))
    }

    pub fn stall_nudge(&self) -> Duration {
        Duration::from_millis(self.stall_nudge_ms)
    }

    pub fn shuffle_cooldown(&self) -> Duration {
        Duration::from_millis(self.shuffle_cooldown_ms)
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 1000,
            ready_timeout_ms: 10_000,
            stall_interval_ms: 1000,
            stall_threshold: 2,
            stall_nudge_ms: 100,
            shuffle_cooldown_ms: 2000,
            shuffle_off_policy: ShuffleOffPolicy::Reload,
        }
    }
}
