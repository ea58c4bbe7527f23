//! Cirrus - Playback Resilience
//!
//! Keeps a streaming session alive while tracks are fetched from expiring
//! signed URLs over an unreliable network.
//!
//! This crate provides:
//! - Bounded fixed-delay retry of track loads
//! - Superseding of stale loads by newer play requests
//! - Stall detection with a three-step recovery ladder
//! - History-aware shuffle (no repeats within half the catalog)
//! - Sequential next/previous with wrap-around
//! - Favorites view and persisted volume
//! - Wake lock and visibility handling for mobile platforms
//!
//! # Architecture
//!
//! `cirrus-playback` has no I/O of its own. The catalog, the signed-URL
//! issuer, the media element, the wake lock and the preference store are all
//! traits; the backend client and the front ends provide implementations.
//!
//! # Example: Shuffle Selection
//!
//! ```rust
//! use cirrus_playback::{ShuffleSelector, TrackId};
//!
//! let catalog: Vec<TrackId> = ["a.mp3", "b.mp3", "c.mp3", "d.mp3"]
//!     .into_iter()
//!     .map(TrackId::from)
//!     .collect();
//!
//! let mut selector = ShuffleSelector::new();
//! let first = selector.pick(&catalog, None).unwrap();
//! let second = selector.pick(&catalog, Some(&first)).unwrap();
//! assert_ne!(first, second);
//! ```
//!
//! # Example: Platform Integration
//!
//! ```rust,ignore
//! use cirrus_playback::{Collaborators, PlaybackConfig, PlaybackController};
//! use std::sync::Arc;
//!
//! let controller = PlaybackController::new(
//!     PlaybackConfig::default(),
//!     Collaborators {
//!         catalog: Arc::new(my_catalog),
//!         issuer: Arc::new(my_issuer),
//!         sink: Arc::new(my_audio_element),
//!         wake_lock: Arc::new(NoopWakeLock),
//!         preferences: Arc::new(my_local_storage),
//!     },
//! )?;
//!
//! // Route media element signals into the controller
//! controller.spawn_event_pump();
//!
//! controller.toggle_play_pause().await?;
//! for event in controller.drain_events() {
//!     // update the UI
//! }
//! ```

mod catalog;
mod controller;
mod error;
pub mod events;
mod favorites;
mod history;
mod retry;
mod shuffle;
mod source;
mod stall;
pub mod types;
mod volume;

// Public exports
pub use catalog::{CatalogSource, StaticCatalog, UrlIssuer};
pub use controller::{Collaborators, PlaybackController};
pub use error::{PlaybackError, Result};
pub use events::PlaybackEvent;
pub use favorites::{Favorites, MemoryPreferenceStore, PreferenceStore, FAVORITES_KEY, VOLUME_KEY};
pub use history::History;
pub use retry::{RetryOutcome, RetryPolicy};
pub use shuffle::{history_capacity, ShuffleSelector};
pub use source::{MediaSink, NoopWakeLock, SinkEvent, WakeLock};
pub use stall::{MonitorState, StallDetector, StallVerdict};
pub use types::{CatalogView, PlaybackConfig, Session, ShuffleOffPolicy, SignedUrl, TrackId};
pub use volume::{Volume, DEFAULT_VOLUME};
