//! Platform-agnostic media output traits
//!
//! Abstracts the streaming media element (HTML audio element, a native
//! player, a test double) and the platform wake lock.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::broadcast;

/// Signals published by a media sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SinkEvent {
    /// Enough data is buffered to start playing
    CanPlay,

    /// Enough data is buffered to play to the end without stopping
    CanPlayThrough,

    /// Playback started or resumed
    Playing,

    /// Playback paused (by the user, the platform, or a source change)
    Paused,

    /// Playback is waiting for more data
    Waiting,

    /// The network fetch stopped delivering data
    Stalled,

    /// Reached the end of the track
    Ended,

    /// Load or runtime failure (decode error, network abort, ...)
    Error { message: String },
}

/// Streaming media element
///
/// Implementors wrap one playback element. The controller only ever binds
/// one source at a time and learns about readiness and failures through
/// [`MediaSink::subscribe`].
#[async_trait]
pub trait MediaSink: Send + Sync {
    /// Bind a new source URL, discarding the previous one
    ///
    /// Loading continues asynchronously; readiness arrives as
    /// [`SinkEvent::CanPlay`] or [`SinkEvent::Error`].
    fn set_source(&self, url: &str) -> Result<()>;

    /// Start or resume playback
    async fn play(&self) -> Result<()>;

    /// Pause playback, keeping the position
    fn pause(&self);

    /// Current playback position
    fn position(&self) -> Duration;

    /// Move the playback position
    fn set_position(&self, position: Duration);

    /// Duration of the bound source, if known
    fn duration(&self) -> Option<Duration>;

    /// Whether the element believes it is paused
    fn is_paused(&self) -> bool;

    /// Output level from 0.0 to 1.0
    fn set_volume(&self, level: f32);

    /// Subscribe to the element's signals
    fn subscribe(&self) -> broadcast::Receiver<SinkEvent>;
}

/// Platform mechanism keeping the device awake during playback
#[async_trait]
pub trait WakeLock: Send + Sync {
    async fn acquire(&self) -> Result<()>;

    async fn release(&self) -> Result<()>;
}

/// Wake lock for platforms without one
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopWakeLock;

#[async_trait]
impl WakeLock for NoopWakeLock {
    async fn acquire(&self) -> Result<()> {
        Ok(())
    }

    async fn release(&self) -> Result<()> {
        Ok(())
    }
}
