//! Playback controller - core orchestration
//!
//! Owns the playback session and sequences load → play → monitor → advance
//! against one media sink. Composes the retry policy, the stall monitor and
//! the shuffle selector with the wake lock and visibility lifecycle.
//!
//! All operations are async and cooperative. A newer play request supersedes
//! any load still in flight: every request takes a new generation number and
//! a load that resumes under an older generation abandons its work instead of
//! touching the session.

use crate::{
    catalog::{CatalogSource, UrlIssuer},
    error::{PlaybackError, Result},
    events::PlaybackEvent,
    favorites::{Favorites, PreferenceStore},
    retry::{RetryOutcome, RetryPolicy},
    shuffle::ShuffleSelector,
    source::{MediaSink, SinkEvent, WakeLock},
    stall::{MonitorState, StallDetector, StallMonitor, StallVerdict},
    types::{CatalogView, PlaybackConfig, Session, ShuffleOffPolicy, TrackId},
    volume::Volume,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{interval, sleep, timeout, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// External collaborators driven by the controller
#[derive(Clone)]
pub struct Collaborators {
    pub catalog: Arc<dyn CatalogSource>,
    pub issuer: Arc<dyn UrlIssuer>,
    pub sink: Arc<dyn MediaSink>,
    pub wake_lock: Arc<dyn WakeLock>,
    pub preferences: Arc<dyn PreferenceStore>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Next,
    Previous,
}

/// Why a track is being loaded; decides how a terminal failure is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadPurpose {
    Request,
    StallReload,
}

struct ControllerState {
    session: Session,

    /// Bumped by every play request and by `stop`
    generation: u64,

    /// Track the newest request is still loading
    loading: Option<TrackId>,

    view: CatalogView,
    tracks: Vec<TrackId>,
    shuffle: ShuffleSelector,
    favorites: Favorites,
    volume: Volume,

    wake_lock_held: bool,

    monitor_state: MonitorState,
    monitor: StallMonitor,
    pump: Option<AbortHandle>,

    // Event queue for UI synchronization
    pending_events: Vec<PlaybackEvent>,
}

impl ControllerState {
    fn emit(&mut self, event: PlaybackEvent) {
        debug!(?event, "Playback event");
        self.pending_events.push(event);
    }

    fn emit_status(&mut self, text: impl Into<String>) {
        self.emit(PlaybackEvent::status(text));
    }

    fn emit_state(&mut self) {
        let event = PlaybackEvent::StateChanged {
            is_playing: self.session.is_playing,
            is_buffering: self.session.is_buffering,
        };
        self.emit(event);
    }

    fn halt_monitor(&mut self) {
        self.monitor.stop();
        self.monitor_state = MonitorState::Idle;
    }
}

struct Shared {
    config: PlaybackConfig,
    catalog: Arc<dyn CatalogSource>,
    issuer: Arc<dyn UrlIssuer>,
    sink: Arc<dyn MediaSink>,
    wake_lock: Arc<dyn WakeLock>,
    preferences: Arc<dyn PreferenceStore>,
    state: Mutex<ControllerState>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(pump) = state.pump.take() {
            pump.abort();
        }
    }
}

/// Playback resilience controller
///
/// Cheap to clone; clones share one session. Long-lived background tasks
/// (stall monitor, shuffle alternatives, the sink event pump) only hold a
/// weak reference and wind down once the last clone is dropped.
/// Must be used from within a Tokio runtime.
#[derive(Clone)]
pub struct PlaybackController {
    shared: Arc<Shared>,
}

impl PlaybackController {
    /// Create a controller, restoring favorites and volume from preferences
    pub fn new(config: PlaybackConfig, collaborators: Collaborators) -> Result<Self> {
        let favorites = Favorites::load(collaborators.preferences.as_ref())?;
        let volume = Volume::load(collaborators.preferences.as_ref())?;
        collaborators.sink.set_volume(volume.level());

        let state = ControllerState {
            session: Session::default(),
            generation: 0,
            loading: None,
            view: CatalogView::All,
            tracks: Vec::new(),
            shuffle: ShuffleSelector::new(),
            favorites,
            volume,
            wake_lock_held: false,
            monitor_state: MonitorState::Idle,
            monitor: StallMonitor::default(),
            pump: None,
            pending_events: Vec::new(),
        };

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                catalog: collaborators.catalog,
                issuer: collaborators.issuer,
                sink: collaborators.sink,
                wake_lock: collaborators.wake_lock,
                preferences: collaborators.preferences,
                state: Mutex::new(state),
            }),
        })
    }

    fn state(&self) -> MutexGuard<'_, ControllerState> {
        self.shared.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn downgrade(&self) -> WeakController {
        WeakController {
            shared: Arc::downgrade(&self.shared),
        }
    }

    // ===== Playback Control =====

    /// Resolve, load and start `track`
    ///
    /// Load failures are retried by the retry policy. After the last retry the
    /// session is marked not-playing and a `Load` error is returned. Returns
    /// `Superseded` when a newer request replaced this one.
    pub async fn play_track(&self, track: TrackId) -> Result<()> {
        self.load_track(track, LoadPurpose::Request).await
    }

    async fn load_track(&self, track: TrackId, purpose: LoadPurpose) -> Result<()> {
        let generation = {
            let mut state = self.state();
            state.generation += 1;
            state.loading = Some(track.clone());
            state.session.retry_count = 0;
            state.halt_monitor();
            state.emit_status(format!("Loading {}...", track));
            state.generation
        };
        info!(track = %track, "Loading track");

        let policy = RetryPolicy::new(
            self.shared.config.max_retries,
            self.shared.config.retry_delay(),
        );
        let outcome = policy
            .run(
                |_| self.load_and_play(&track, generation),
                |attempt, error| self.note_retry(&track, generation, attempt, error),
            )
            .await;

        self.finish_load(track, generation, outcome, purpose).await
    }

    /// Play the next track: a shuffle pick, or the positional successor
    ///
    /// In shuffle mode a failed pick schedules one alternative pick after the
    /// cool-down and the call itself succeeds.
    pub async fn play_next(&self) -> Result<()> {
        self.advance(Direction::Next).await
    }

    /// Play the previous track: a shuffle pick, or the positional predecessor
    pub async fn play_previous(&self) -> Result<()> {
        self.advance(Direction::Previous).await
    }

    /// Start the first track, pause, or resume
    pub async fn toggle_play_pause(&self) -> Result<()> {
        let (current, playing) = {
            let state = self.state();
            (state.session.current_track.clone(), state.session.is_playing)
        };

        match current {
            None => {
                self.ensure_catalog().await?;
                let first = self
                    .state()
                    .tracks
                    .first()
                    .cloned()
                    .ok_or(PlaybackError::EmptyCatalog)?;
                self.play_track(first).await
            }
            Some(track) if playing => {
                self.pause_playback(&track);
                Ok(())
            }
            Some(track) => self.resume_playback(track).await,
        }
    }

    /// Stop playback and rewind, keeping the current track
    ///
    /// Abandons any load, recovery or shuffle alternative in flight.
    /// Calling it again is a no-op apart from the status update.
    pub async fn stop(&self) {
        self.shared.sink.pause();
        self.shared.sink.set_position(Duration::ZERO);

        {
            let mut state = self.state();
            state.generation += 1;
            state.loading = None;
            state.session.is_playing = false;
            state.session.is_buffering = false;
            state.session.retry_count = 0;
            state.halt_monitor();
            state.emit_state();
            state.emit_status("Stopped");
        }

        self.release_wake_lock().await;
        info!("Playback stopped");
    }

    /// Flip shuffle mode; returns whether shuffle is now on
    ///
    /// Turning it on clears the shuffle history and seeds it with the current
    /// track. Turning it off applies the configured [`ShuffleOffPolicy`].
    /// Playback is never interrupted.
    pub async fn toggle_shuffle(&self) -> Result<bool> {
        let (enabled, view) = {
            let mut guard = self.state();
            let state = &mut *guard;
            let enabled = !state.session.shuffle_mode;
            state.session.shuffle_mode = enabled;
            state.shuffle.reset();
            if enabled {
                if let Some(current) = state.session.current_track.clone() {
                    state.shuffle.seed(current, state.tracks.len());
                }
            }
            state.emit(PlaybackEvent::ShuffleChanged { enabled });
            (enabled, state.view)
        };
        info!(enabled, "Shuffle toggled");

        if !enabled && self.shared.config.shuffle_off_policy == ShuffleOffPolicy::Reload {
            self.load_catalog(view).await?;
        }

        self.state().emit_status(if enabled {
            "Shuffle mode enabled"
        } else {
            "Shuffle mode disabled"
        });
        Ok(enabled)
    }

    /// Seek to a fraction (0.0 - 1.0) of the current track
    pub fn seek_to_fraction(&self, fraction: f64) -> Result<()> {
        if self.state().session.current_track.is_none() {
            return Err(PlaybackError::NoTrackLoaded);
        }
        let duration = self
            .shared
            .sink
            .duration()
            .ok_or(PlaybackError::NoTrackLoaded)?;
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.shared.sink.set_position(duration.mul_f64(fraction));
        Ok(())
    }

    // ===== Catalog =====

    /// Fetch the listing and make `view` the active catalog view
    ///
    /// The favorites view keeps listing order. An empty favorites view is
    /// rejected with `NoFavorites` and leaves the active view unchanged.
    pub async fn load_catalog(&self, view: CatalogView) -> Result<Vec<TrackId>> {
        let listing = match self.shared.catalog.list_tracks().await {
            Ok(listing) => listing,
            Err(e) => {
                error!(error = %e, "Failed to list tracks");
                self.state()
                    .emit_status(format!("Error loading tracks: {}", e));
                return Err(e);
            }
        };

        let tracks = match view {
            CatalogView::All => listing,
            CatalogView::Favorites => {
                let favorites = self.state().favorites.filter(&listing);
                if favorites.is_empty() {
                    return Err(PlaybackError::NoFavorites);
                }
                favorites
            }
        };

        {
            let mut state = self.state();
            state.view = view;
            state.tracks = tracks.clone();
            state.emit(PlaybackEvent::ViewChanged {
                view,
                track_count: tracks.len(),
            });
        }
        info!(?view, tracks = tracks.len(), "Catalog loaded");

        Ok(tracks)
    }

    /// Switch between all tracks and favorites-only
    ///
    /// While playing, jumps to the first track of the new view. Without any
    /// favorites, falls back to all tracks and returns `NoFavorites`.
    pub async fn toggle_favorites_view(&self) -> Result<CatalogView> {
        let (view, playing) = {
            let state = self.state();
            (state.view, state.session.is_playing)
        };
        let target = match view {
            CatalogView::All => CatalogView::Favorites,
            CatalogView::Favorites => CatalogView::All,
        };

        match self.load_catalog(target).await {
            Ok(tracks) => {
                if playing {
                    if let Some(first) = tracks.first().cloned() {
                        self.play_track(first).await?;
                    }
                }
                self.state().emit_status(match target {
                    CatalogView::Favorites => "Playing favorites only",
                    CatalogView::All => "Playing all tracks",
                });
                Ok(target)
            }
            Err(PlaybackError::NoFavorites) => {
                warn!("No favorites to play, staying on all tracks");
                self.load_catalog(CatalogView::All).await?;
                self.state().emit_status("No favorites to play");
                Err(PlaybackError::NoFavorites)
            }
            Err(e) => Err(e),
        }
    }

    /// Flip the current track's favorite flag; returns whether it is now a favorite
    ///
    /// Removing the last favorite while in the favorites view switches back
    /// to all tracks.
    pub async fn toggle_favorite(&self) -> Result<bool> {
        let track = self
            .state()
            .session
            .current_track
            .clone()
            .ok_or(PlaybackError::NoTrackLoaded)?;

        let (is_favorite, leave_view) = self.update_favorites(&track, |favorites| {
            favorites.toggle(&track)
        })?;

        if leave_view {
            self.toggle_favorites_view().await?;
        }
        Ok(is_favorite)
    }

    /// Remove `track` from favorites (e.g. from the favorites list)
    pub fn remove_favorite(&self, track: &TrackId) -> Result<()> {
        self.update_favorites(track, |favorites| {
            favorites.remove(track);
            false
        })?;
        Ok(())
    }

    fn update_favorites(
        &self,
        track: &TrackId,
        change: impl FnOnce(&mut Favorites) -> bool,
    ) -> Result<(bool, bool)> {
        let (is_favorite, favorites, leave_view) = {
            let mut state = self.state();
            let is_favorite = change(&mut state.favorites);
            state.emit(PlaybackEvent::FavoriteChanged {
                track_id: track.clone(),
                is_favorite,
            });
            let leave_view = state.view == CatalogView::Favorites && state.favorites.is_empty();
            (is_favorite, state.favorites.clone(), leave_view)
        };

        favorites.save(self.shared.preferences.as_ref())?;
        Ok((is_favorite, leave_view))
    }

    // ===== Volume =====

    /// Set and persist the volume (0.0 - 1.0)
    pub fn set_volume(&self, level: f32) -> Result<()> {
        let volume = {
            let mut state = self.state();
            state.volume.set_level(level);
            let event = PlaybackEvent::VolumeChanged {
                level: state.volume.level(),
                is_muted: state.volume.is_muted(),
            };
            state.emit(event);
            state.volume.clone()
        };

        self.shared.sink.set_volume(volume.level());
        volume.save(self.shared.preferences.as_ref())
    }

    /// Mute, or restore the level from before muting
    pub fn toggle_mute(&self) {
        let level = {
            let mut state = self.state();
            state.volume.toggle_mute();
            let event = PlaybackEvent::VolumeChanged {
                level: state.volume.level(),
                is_muted: state.volume.is_muted(),
            };
            state.emit(event);
            state.volume.level()
        };
        self.shared.sink.set_volume(level);
    }

    // ===== Platform Lifecycle =====

    /// React to the page/app being hidden or shown
    pub async fn on_visibility_changed(&self, hidden: bool) {
        if !self.state().session.is_playing {
            return;
        }

        if hidden {
            debug!("Hidden - maintaining audio session");
            if let Err(e) = self.shared.sink.play().await {
                warn!(error = %e, "Error maintaining playback");
            }
            return;
        }

        debug!("Visible - checking audio state");
        if self.shared.sink.is_paused() {
            if let Err(e) = self.shared.sink.play().await {
                warn!(error = %e, "Error resuming playback");
                {
                    let mut state = self.state();
                    state.session.is_playing = false;
                    state.session.is_buffering = false;
                    state.halt_monitor();
                    state.emit_state();
                    state.emit_status("Playback interrupted - tap play to resume");
                }
                self.release_wake_lock().await;
                return;
            }
        }

        self.acquire_wake_lock().await;
    }

    /// The window regained focus: resume a session the platform paused
    pub async fn on_focus(&self) {
        if !self.state().session.is_playing || !self.shared.sink.is_paused() {
            return;
        }

        debug!("Focused - resuming paused audio");
        if let Err(e) = self.shared.sink.play().await {
            warn!(error = %e, "Error resuming on focus");
        }
    }

    /// The platform revoked the wake lock on its own
    pub fn on_wake_lock_released(&self) {
        debug!("Wake lock released by platform");
        self.state().wake_lock_held = false;
    }

    /// Apply one media sink signal
    pub async fn handle_sink_event(&self, event: SinkEvent) {
        let (loading, playing, has_track) = {
            let state = self.state();
            (
                state.loading.is_some(),
                state.session.is_playing,
                state.session.current_track.is_some(),
            )
        };

        match event {
            SinkEvent::Ended => {
                if loading {
                    return;
                }
                info!("Track ended, playing next");
                self.spawn_advance();
            }
            SinkEvent::Error { message } => {
                // Load-time errors belong to the load in progress
                if loading || !playing {
                    debug!(message = %message, "Ignoring media error outside active playback");
                    return;
                }
                let error = PlaybackError::SinkFatal(message);
                error!(error = %error, "Media sink failed during playback");
                self.end_session(&error, "Error playing audio".to_string())
                    .await;
            }
            SinkEvent::Paused => {
                if loading || !playing {
                    return;
                }
                debug!("Paused by the platform");
                let mut state = self.state();
                state.session.is_playing = false;
                state.halt_monitor();
                state.emit_state();
            }
            SinkEvent::Playing => {
                if loading || playing || !has_track {
                    return;
                }
                {
                    let mut state = self.state();
                    state.session.is_playing = true;
                    state.emit_state();
                }
                self.start_monitor();
                self.acquire_wake_lock().await;
            }
            SinkEvent::Waiting => self.set_buffering("Buffering..."),
            SinkEvent::Stalled => self.set_buffering("Audio stalled - buffering..."),
            SinkEvent::CanPlayThrough => self.clear_buffering(),
            SinkEvent::CanPlay => {}
        }
    }

    /// Forward media sink signals to [`Self::handle_sink_event`] on a task
    ///
    /// Replaces any earlier pump. The task ends when the sink closes or the
    /// controller is dropped.
    pub fn spawn_event_pump(&self) -> JoinHandle<()> {
        let mut events = self.shared.sink.subscribe();
        let weak = self.downgrade();

        let handle = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        let Some(controller) = weak.upgrade() else {
                            break;
                        };
                        controller.handle_sink_event(event).await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Media event pump fell behind");
                    }
                    Err(RecvError::Closed) => {
                        debug!("Media sink closed, stopping event pump");
                        break;
                    }
                }
            }
        });

        if let Some(previous) = self.state().pump.replace(handle.abort_handle()) {
            previous.abort();
        }
        handle
    }

    // ===== State Queries =====

    /// Snapshot of the playback session
    pub fn get_session(&self) -> Session {
        self.state().session.clone()
    }

    pub fn get_monitor_state(&self) -> MonitorState {
        self.state().monitor_state
    }

    pub fn get_view(&self) -> CatalogView {
        self.state().view
    }

    /// Tracks of the active catalog view
    pub fn get_tracks(&self) -> Vec<TrackId> {
        self.state().tracks.clone()
    }

    pub fn get_favorites(&self) -> Favorites {
        self.state().favorites.clone()
    }

    pub fn is_favorite(&self, track: &TrackId) -> bool {
        self.state().favorites.contains(track)
    }

    pub fn get_volume(&self) -> Volume {
        self.state().volume.clone()
    }

    /// Track the newest play request is still loading
    pub fn loading_track(&self) -> Option<TrackId> {
        self.state().loading.clone()
    }

    pub fn is_wake_lock_held(&self) -> bool {
        self.state().wake_lock_held
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.shared.config
    }

    // ===== Events =====

    /// Take all queued events (oldest first)
    pub fn drain_events(&self) -> Vec<PlaybackEvent> {
        std::mem::take(&mut self.state().pending_events)
    }

    pub fn has_pending_events(&self) -> bool {
        !self.state().pending_events.is_empty()
    }

    // ===== Loading =====

    async fn load_and_play(&self, track: &TrackId, generation: u64) -> Result<()> {
        self.ensure_current(track, generation)?;
        let signed = self.shared.issuer.resolve(track).await?;
        self.ensure_current(track, generation)?;

        let sink = &self.shared.sink;
        let mut events = sink.subscribe();
        sink.set_source(&signed.url)
            .map_err(|e| PlaybackError::load(track, e.to_string()))?;

        match timeout(self.shared.config.ready_timeout(), wait_until_ready(&mut events)).await {
            Ok(Ok(())) => {}
            Ok(Err(message)) => return Err(PlaybackError::load(track, message)),
            Err(_) => return Err(PlaybackError::load(track, "Audio load timeout")),
        }
        self.ensure_current(track, generation)?;

        sink.play()
            .await
            .map_err(|e| PlaybackError::load(track, e.to_string()))?;
        self.ensure_current(track, generation)
    }

    fn ensure_current(&self, track: &TrackId, generation: u64) -> Result<()> {
        let current = self.state().generation;
        if current == generation {
            Ok(())
        } else {
            Err(PlaybackError::Superseded(track.clone()))
        }
    }

    fn note_retry(&self, track: &TrackId, generation: u64, attempt: u32, error: &PlaybackError) {
        let max_retries = self.shared.config.max_retries;
        {
            let mut state = self.state();
            // A newer request may already hold a fresh URL for the same track
            if state.generation != generation {
                return;
            }
            debug!(track = %track, attempt, error = %error, "Scheduling retry");
            state.session.retry_count = attempt;
            state.emit(PlaybackEvent::RetryScheduled {
                track_id: track.clone(),
                attempt,
                max_retries,
            });
            state.emit_status(format!("Retrying {}... ({}/{})", track, attempt, max_retries));
        }

        self.shared.issuer.invalidate(track);
    }

    async fn finish_load(
        &self,
        track: TrackId,
        generation: u64,
        outcome: RetryOutcome<()>,
        purpose: LoadPurpose,
    ) -> Result<()> {
        let attempts = outcome.attempts();

        match outcome.into_result() {
            Ok(()) => {
                {
                    let mut state = self.state();
                    if state.generation != generation {
                        return Err(PlaybackError::Superseded(track));
                    }
                    let previous = state.session.current_track.replace(track.clone());
                    state.loading = None;
                    state.session.is_playing = true;
                    state.session.is_buffering = false;
                    state.session.retry_count = 0;
                    state.emit(PlaybackEvent::TrackChanged {
                        track_id: track.clone(),
                        previous_track_id: previous,
                    });
                    state.emit_state();
                    state.emit_status(track.to_string());
                }
                info!(track = %track, attempts, "Playing");

                self.start_monitor();
                self.acquire_wake_lock().await;
                Ok(())
            }
            Err(PlaybackError::Superseded(stale)) => {
                debug!(track = %stale, "Load superseded by a newer request");
                Err(PlaybackError::Superseded(stale))
            }
            Err(cause) => {
                let message = match cause {
                    PlaybackError::Load { message, .. } | PlaybackError::Resolve { message, .. } => {
                        message
                    }
                    other => other.to_string(),
                };
                let (error, status) = match purpose {
                    LoadPurpose::Request => (
                        PlaybackError::load(&track, message.clone()),
                        format!("Failed to play {}: {}", track, message),
                    ),
                    LoadPurpose::StallReload => {
                        let error = PlaybackError::Stall {
                            track: track.clone(),
                        };
                        let status = error.to_string();
                        (error, status)
                    }
                };
                error!(track = %track, attempts, error = %error, cause = %message, "Giving up on track");

                {
                    let mut state = self.state();
                    if state.generation != generation {
                        return Err(error);
                    }
                    state.loading = None;
                }
                self.end_session(&error, status).await;
                Err(error)
            }
        }
    }

    async fn ensure_catalog(&self) -> Result<()> {
        let (empty, view) = {
            let state = self.state();
            (state.tracks.is_empty(), state.view)
        };
        if empty {
            self.load_catalog(view).await?;
        }
        Ok(())
    }

    async fn advance(&self, direction: Direction) -> Result<()> {
        self.ensure_catalog().await?;

        let (track, shuffle, catalog_len) = {
            let mut guard = self.state();
            let state = &mut *guard;
            let current = state.session.current_track.clone();
            let shuffle = state.session.shuffle_mode;
            let pick = if shuffle {
                state.shuffle.pick(&state.tracks, current.as_ref())
            } else {
                positional(&state.tracks, current.as_ref(), direction)
            };
            let Some(track) = pick else {
                state.emit_status("No tracks available");
                return Err(PlaybackError::EmptyCatalog);
            };
            (track, shuffle, state.tracks.len())
        };
        debug!(track = %track, ?direction, shuffle, "Advancing");

        match self.play_track(track.clone()).await {
            Ok(()) => Ok(()),
            Err(PlaybackError::Superseded(stale)) => Err(PlaybackError::Superseded(stale)),
            Err(error) if shuffle && catalog_len > 1 => {
                warn!(track = %track, error = %error, "Shuffle pick failed, trying another track");
                self.schedule_alternative(track);
                Ok(())
            }
            Err(error) => Err(error),
        }
    }

    fn schedule_alternative(&self, failed: TrackId) {
        let weak = self.downgrade();
        let generation = self.state().generation;
        let cooldown = self.shared.config.shuffle_cooldown();

        tokio::spawn(async move {
            sleep(cooldown).await;

            let Some(controller) = weak.upgrade() else {
                return;
            };
            let pick = {
                let mut guard = controller.state();
                let state = &mut *guard;
                if state.generation != generation || !state.session.shuffle_mode {
                    return;
                }
                state.shuffle.pick(&state.tracks, Some(&failed))
            };
            let Some(alternative) = pick.filter(|t| *t != failed) else {
                return;
            };

            info!(track = %alternative, "Trying alternative shuffle track");
            if let Err(e) = controller.play_track(alternative).await {
                warn!(error = %e, "Alternative shuffle track also failed");
            }
        });
    }

    fn spawn_advance(&self) {
        let controller = self.clone();
        tokio::spawn(async move {
            if let Err(e) = controller.play_next().await {
                warn!(error = %e, "Could not advance after track end");
            }
        });
    }

    fn pause_playback(&self, track: &TrackId) {
        self.shared.sink.pause();

        let mut state = self.state();
        state.session.is_playing = false;
        state.session.is_buffering = false;
        state.halt_monitor();
        state.emit_state();
        state.emit_status(format!("⏸️ {}", track));
        debug!(track = %track, "Paused");
    }

    async fn resume_playback(&self, track: TrackId) -> Result<()> {
        if let Err(e) = self.shared.sink.play().await {
            let error = PlaybackError::load(&track, e.to_string());
            self.end_session(&error, format!("Error: {}", error)).await;
            return Err(error);
        }

        {
            let mut state = self.state();
            state.session.is_playing = true;
            state.emit_state();
            state.emit_status(track.to_string());
        }
        debug!(track = %track, "Resumed");

        self.start_monitor();
        self.acquire_wake_lock().await;
        Ok(())
    }

    /// Terminal failure: not playing, monitor idle, wake lock released
    async fn end_session(&self, error: &PlaybackError, status: String) {
        {
            let mut state = self.state();
            state.session.is_playing = false;
            state.session.is_buffering = false;
            state.halt_monitor();
            state.emit(PlaybackEvent::Error {
                message: error.to_string(),
            });
            state.emit_state();
            state.emit_status(status);
        }
        self.release_wake_lock().await;
    }

    fn set_buffering(&self, status: &str) {
        let mut state = self.state();
        if state.session.current_track.is_none() {
            return;
        }
        if !state.session.is_buffering {
            state.session.is_buffering = true;
            state.emit_state();
        }
        state.emit_status(status);
    }

    fn clear_buffering(&self) {
        let mut state = self.state();
        if !state.session.is_buffering {
            return;
        }
        state.session.is_buffering = false;
        state.emit_state();
        if let Some(track) = state.session.current_track.clone() {
            state.emit_status(track.to_string());
        }
    }

    // ===== Wake Lock =====

    async fn acquire_wake_lock(&self) {
        {
            let mut state = self.state();
            if state.wake_lock_held {
                return;
            }
            state.wake_lock_held = true;
        }

        match self.shared.wake_lock.acquire().await {
            Ok(()) => debug!("Wake lock acquired"),
            Err(e) => {
                // Not every platform supports it
                debug!(error = %e, "Wake lock unavailable");
                self.state().wake_lock_held = false;
            }
        }
    }

    async fn release_wake_lock(&self) {
        {
            let mut state = self.state();
            if !state.wake_lock_held {
                return;
            }
            state.wake_lock_held = false;
        }

        match self.shared.wake_lock.release().await {
            Ok(()) => debug!("Wake lock released"),
            Err(e) => warn!(error = %e, "Error releasing wake lock"),
        }
    }

    // ===== Stall Monitor =====

    /// Start watching playback progress, cancelling any previous watchdog
    fn start_monitor(&self) {
        let period = self.shared.config.stall_interval();
        let threshold = self.shared.config.stall_threshold;
        let mut state = self.state();
        state.monitor.stop();
        let handle = tokio::spawn(watch_playback(self.downgrade(), period, threshold));
        state.monitor.replace(handle);
        state.monitor_state = MonitorState::Watching;
    }

    // Runs outside the watchdog task: reloading restarts the watchdog, which
    // would otherwise abort the recovery midway.
    fn spawn_recovery(&self, generation: u64, position: Duration) {
        let controller = self.clone();
        tokio::spawn(controller.recover_stall(generation, position));
    }

    fn recovery_wanted(&self, generation: u64) -> bool {
        let state = self.state();
        state.generation == generation
            && state.monitor_state == MonitorState::Recovering
            && state.session.is_playing
    }

    async fn advanced_past(&self, baseline: Duration, generation: u64) -> bool {
        sleep(self.shared.config.stall_interval()).await;
        self.recovery_wanted(generation) && self.shared.sink.position() > baseline
    }

    /// Recovery ladder: resume in place, nudge forward, reload from scratch
    async fn recover_stall(self, generation: u64, position: Duration) {
        let Some(track) = self.get_session().current_track else {
            return;
        };
        warn!(track = %track, position_ms = position.as_millis() as u64, "Playback stalled, recovering");
        self.set_buffering("Audio stalled - buffering...");

        let sink = Arc::clone(&self.shared.sink);

        if !self.recovery_wanted(generation) {
            return;
        }
        if sink.play().await.is_ok() && self.advanced_past(position, generation).await {
            info!(track = %track, "Recovered by resuming in place");
            self.resume_watching();
            return;
        }

        if !self.recovery_wanted(generation) {
            return;
        }
        let nudged = position + self.shared.config.stall_nudge();
        sink.set_position(nudged);
        if sink.play().await.is_ok() && self.advanced_past(nudged, generation).await {
            info!(track = %track, "Recovered by nudging forward");
            self.resume_watching();
            return;
        }

        if !self.recovery_wanted(generation) {
            return;
        }
        info!(track = %track, "Reloading stalled track");
        match self.load_track(track.clone(), LoadPurpose::StallReload).await {
            Ok(()) => {
                if sink.duration().is_some_and(|duration| position < duration) {
                    sink.set_position(position);
                }
                info!(track = %track, "Recovered by reloading");
            }
            // The reload already ended the session and reported the stall
            Err(e) => debug!(track = %track, error = %e, "Stall recovery abandoned"),
        }
    }

    fn resume_watching(&self) {
        self.clear_buffering();
        self.start_monitor();
    }
}

#[derive(Clone)]
struct WeakController {
    shared: Weak<Shared>,
}

impl WeakController {
    fn upgrade(&self) -> Option<PlaybackController> {
        self.shared.upgrade().map(|shared| PlaybackController { shared })
    }
}

/// Stall watchdog: samples the sink position every `period`
async fn watch_playback(watchdog: WeakController, period: Duration, threshold: u32) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut detector = StallDetector::new(threshold);

    loop {
        ticker.tick().await;
        let Some(controller) = watchdog.upgrade() else {
            debug!("Controller dropped, stopping stall watchdog");
            return;
        };
        let position = controller.shared.sink.position();

        match detector.sample(position, controller.shared.sink.is_paused()) {
            StallVerdict::Progressing => controller.clear_buffering(),
            StallVerdict::Unchanged { count } => {
                debug!(count, position_ms = position.as_millis() as u64, "Playback position unchanged");
            }
            StallVerdict::Stalled => {
                let generation = {
                    let mut state = controller.state();
                    state.monitor_state = MonitorState::Recovering;
                    state.generation
                };
                controller.spawn_recovery(generation, position);
                return;
            }
        }
    }
}

async fn wait_until_ready(
    events: &mut broadcast::Receiver<SinkEvent>,
) -> std::result::Result<(), String> {
    loop {
        match events.recv().await {
            Ok(SinkEvent::CanPlay | SinkEvent::CanPlayThrough) => return Ok(()),
            Ok(SinkEvent::Error { message }) => return Err(format!("Audio load error: {}", message)),
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Missed media events while loading");
            }
            Err(RecvError::Closed) => return Err("Media sink closed".to_string()),
        }
    }
}

fn positional(tracks: &[TrackId], current: Option<&TrackId>, direction: Direction) -> Option<TrackId> {
    let len = tracks.len();
    let index = current.and_then(|c| tracks.iter().position(|t| t == c));
    let next = match (index, direction) {
        (None, _) => 0,
        (Some(i), Direction::Next) => (i + 1) % len,
        (Some(i), Direction::Previous) => (i + len - 1) % len,
    };
    tracks.get(next).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracks() -> Vec<TrackId> {
        ["t1", "t2", "t3"].into_iter().map(TrackId::from).collect()
    }

    #[test]
    fn positional_defaults_to_first() {
        let tracks = tracks();
        assert_eq!(positional(&tracks, None, Direction::Next), Some(tracks[0].clone()));
        assert_eq!(
            positional(&tracks, None, Direction::Previous),
            Some(tracks[0].clone())
        );
    }

    #[test]
    fn positional_wraps_both_ways() {
        let tracks = tracks();
        assert_eq!(
            positional(&tracks, Some(&tracks[2]), Direction::Next),
            Some(tracks[0].clone())
        );
        assert_eq!(
            positional(&tracks, Some(&tracks[0]), Direction::Previous),
            Some(tracks[2].clone())
        );
        assert_eq!(
            positional(&tracks, Some(&tracks[1]), Direction::Previous),
            Some(tracks[0].clone())
        );
    }

    #[test]
    fn positional_unknown_current_starts_over() {
        let tracks = tracks();
        let gone = TrackId::from("gone");
        assert_eq!(
            positional(&tracks, Some(&gone), Direction::Next),
            Some(tracks[0].clone())
        );
    }

    #[test]
    fn positional_empty_catalog() {
        assert_eq!(positional(&[], None, Direction::Next), None);
    }
}
