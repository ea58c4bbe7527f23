//! Remote collaborators: track catalog and signed URL issuer

use crate::error::{PlaybackError, Result};
use crate::types::{SignedUrl, TrackId};
use async_trait::async_trait;
use rand::seq::SliceRandom;

/// Remote track listing
///
/// Only `list_tracks` is required. The navigation helpers default to a ring
/// over the listing, so implementors must return tracks in a stable order.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// All playable tracks in listing order
    async fn list_tracks(&self) -> Result<Vec<TrackId>>;

    async fn list_first(&self) -> Result<TrackId> {
        self.list_tracks()
            .await?
            .into_iter()
            .next()
            .ok_or(PlaybackError::EmptyCatalog)
    }

    /// Track after `after`, wrapping to the first; unknown ids start over
    async fn list_next(&self, after: &TrackId) -> Result<TrackId> {
        let tracks = self.list_tracks().await?;
        let index = match tracks.iter().position(|t| t == after) {
            Some(i) => (i + 1) % tracks.len(),
            None => 0,
        };
        tracks.get(index).cloned().ok_or(PlaybackError::EmptyCatalog)
    }

    /// Track before `after`, wrapping to the last; unknown ids start over
    async fn list_prev(&self, after: &TrackId) -> Result<TrackId> {
        let tracks = self.list_tracks().await?;
        let index = match tracks.iter().position(|t| t == after) {
            Some(i) => (i + tracks.len() - 1) % tracks.len(),
            None => 0,
        };
        tracks.get(index).cloned().ok_or(PlaybackError::EmptyCatalog)
    }

    async fn pick_random(&self) -> Result<TrackId> {
        let tracks = self.list_tracks().await?;
        tracks
            .choose(&mut rand::thread_rng())
            .cloned()
            .ok_or(PlaybackError::EmptyCatalog)
    }
}

/// Converts a track into a temporary fetchable URL
#[async_trait]
pub trait UrlIssuer: Send + Sync {
    async fn resolve(&self, track: &TrackId) -> Result<SignedUrl>;

    /// Forget any cached URL for `track`
    ///
    /// Called before a load is retried.
    fn invalidate(&self, _track: &TrackId) {}
}

/// Fixed in-memory catalog
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    tracks: Vec<TrackId>,
}

impl StaticCatalog {
    pub fn new<I, T>(tracks: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TrackId>,
    {
        Self {
            tracks: tracks.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl CatalogSource for StaticCatalog {
    async fn list_tracks(&self) -> Result<Vec<TrackId>> {
        Ok(self.tracks.clone())
    }
}
