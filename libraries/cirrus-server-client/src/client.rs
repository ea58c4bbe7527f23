//! Main Cirrus backend client.

use crate::error::{Result, ServerClientError};
use crate::types::{ClientConfig, ErrorBody, SasUrlResponse, ServerInfo, TracksResponse};
use async_trait::async_trait;
use chrono::Utc;
use cirrus_playback::{CatalogSource, PlaybackError, SignedUrl, TrackId, UrlIssuer};
use lru::LruCache;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Cached URLs are dropped this long before they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Client for the track listing and signed URL backend.
///
/// Minted URLs are cached per track until shortly before they expire, so
/// replaying a track does not cost a round trip.
///
/// # Example
///
/// ```ignore
/// use cirrus_server_client::{CirrusClient, ClientConfig};
///
/// let client = CirrusClient::new(ClientConfig::new("https://music.example.com"))?;
///
/// let info = client.get_server_info().await?;
/// println!("Connected to {} v{}", info.name, info.version);
///
/// for track in client.get_tracks().await? {
///     println!("{}", track);
/// }
/// ```
pub struct CirrusClient {
    http: Client,
    base: Url,
    config: ClientConfig,
    urls: Mutex<LruCache<TrackId, SignedUrl>>,
}

impl CirrusClient {
    /// Create a new client with the given configuration.
    pub fn new(config: ClientConfig) -> Result<Self> {
        // Validate URL
        if config.url.is_empty() {
            return Err(ServerClientError::InvalidUrl("URL cannot be empty".into()));
        }

        // Parse and normalize URL
        let url = config.url.trim_end_matches('/').to_string();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ServerClientError::InvalidUrl(
                "URL must start with http:// or https://".into(),
            ));
        }
        let base = Url::parse(&url).map_err(|e| ServerClientError::InvalidUrl(e.to_string()))?;

        let http = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .user_agent(format!("Cirrus/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        let capacity = NonZeroUsize::new(config.url_cache_size).unwrap_or(NonZeroUsize::MIN);

        Ok(Self {
            http,
            base,
            config: ClientConfig { url, ..config },
            urls: Mutex::new(LruCache::new(capacity)),
        })
    }

    /// Get the normalized server URL.
    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// List every playable track.
    pub async fn get_tracks(&self) -> Result<Vec<String>> {
        let response: TracksResponse = self.get_json(self.endpoint(&["api", "tracks"])?).await?;
        info!(count = response.tracks.len(), "Fetched track listing");
        Ok(response.tracks)
    }

    /// Get a signed URL for `track`, minting a new one when the cached URL
    /// is missing or about to expire.
    pub async fn get_signed_url(&self, track: &TrackId) -> Result<SignedUrl> {
        if let Some(cached) = self.cached_url(track) {
            debug!(track = %track, "Using cached signed URL");
            return Ok(cached);
        }

        let url = self.endpoint(&["api", "getsasurl", track.as_str()])?;
        let response: SasUrlResponse = self.get_json(url).await?;

        let url = match (response.url, response.error) {
            (Some(url), _) => url,
            (None, Some(error)) => return Err(ServerClientError::UrlRejected(error)),
            (None, None) => {
                return Err(ServerClientError::ParseError(
                    "response has neither url nor error".into(),
                ))
            }
        };

        let validity = chrono::Duration::from_std(self.config.url_validity())
            .unwrap_or_else(|_| chrono::Duration::minutes(30));
        let signed = SignedUrl {
            url,
            valid_until: Utc::now() + validity,
        };
        debug!(track = %track, valid_until = %signed.valid_until, "Minted signed URL");

        self.lock_urls().put(track.clone(), signed.clone());
        Ok(signed)
    }

    /// Drop the cached URL for `track`.
    pub fn evict(&self, track: &TrackId) {
        if self.lock_urls().pop(track).is_some() {
            debug!(track = %track, "Evicted signed URL");
        }
    }

    /// Get backend name and version.
    ///
    /// Doubles as a connection test.
    pub async fn get_server_info(&self) -> Result<ServerInfo> {
        let info: ServerInfo = self.get_json(self.endpoint(&["api", "version"])?).await?;
        info!(name = %info.name, version = %info.version, "Connected to server");
        Ok(info)
    }

    fn cached_url(&self, track: &TrackId) -> Option<SignedUrl> {
        let mut urls = self.lock_urls();
        match urls.get(track) {
            Some(signed) if signed.is_valid_at(Utc::now(), EXPIRY_MARGIN) => Some(signed.clone()),
            Some(_) => {
                urls.pop(track);
                None
            }
            None => None,
        }
    }

    fn lock_urls(&self) -> std::sync::MutexGuard<'_, LruCache<TrackId, SignedUrl>> {
        self.urls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append percent-encoded path segments to the base URL.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| ServerClientError::InvalidUrl("URL cannot have a path".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!(path = %url.path(), "GET");

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(ServerClientError::from_send)?;
        let status = response.status();

        if status.is_success() {
            response
                .json::<T>()
                .await
                .map_err(|e| ServerClientError::ParseError(e.to_string()))
        } else {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|body| body.error)
                .unwrap_or(text);
            Err(ServerClientError::ServerError {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[async_trait]
impl CatalogSource for CirrusClient {
    async fn list_tracks(&self) -> cirrus_playback::Result<Vec<TrackId>> {
        let tracks = self.get_tracks().await?;
        Ok(tracks.into_iter().map(TrackId::from).collect())
    }
}

#[async_trait]
impl UrlIssuer for CirrusClient {
    async fn resolve(&self, track: &TrackId) -> cirrus_playback::Result<SignedUrl> {
        self.get_signed_url(track)
            .await
            .map_err(|e| PlaybackError::resolve(track, e.to_string()))
    }

    fn invalidate(&self, track: &TrackId) {
        self.evict(track);
    }
}
