//! Types for Cirrus backend requests and responses.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for connecting to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the backend (e.g., "https://music.example.com")
    pub url: String,

    /// Whole-request timeout in seconds
    pub request_timeout_secs: u64,

    /// Connect timeout in seconds
    pub connect_timeout_secs: u64,

    /// How long a freshly minted signed URL stays valid, in seconds.
    /// Matches the backend's signing window.
    pub url_validity_secs: u64,

    /// Signed URLs kept in the cache
    pub url_cache_size: usize,
}

impl ClientConfig {
    /// Create a config with just the URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn url_validity(&self) -> Duration {
        Duration::from_secs(self.url_validity_secs)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:3000".to_string(),
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
            url_validity_secs: 30 * 60,
            url_cache_size: 128,
        }
    }
}

// =============================================================================
// Responses
// =============================================================================

/// Response from `GET /api/tracks`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TracksResponse {
    pub tracks: Vec<String>,
}

/// Response from `GET /api/getsasurl/<track>`.
///
/// The backend answers with either a URL or an error message.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SasUrlResponse {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Response from `GET /api/version`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Error body the backend sends with non-2xx statuses.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: String,
}
