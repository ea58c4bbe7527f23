//! Shared test doubles for controller tests
//!
//! `MockSink` models a streaming audio element on the (paused) Tokio clock:
//! its position advances with time while playing and can be frozen to
//! simulate a stalled network.

#![allow(dead_code)]

use async_trait::async_trait;
use cirrus_playback::{
    Collaborators, MemoryPreferenceStore, MediaSink, PlaybackConfig, PlaybackController,
    PlaybackError, PlaybackEvent, Result, SignedUrl, SinkEvent, StaticCatalog, TrackId, UrlIssuer,
    WakeLock,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;

pub fn url_for(track: &str) -> String {
    format!("mock://{}", track)
}

// ===== Media Sink =====

struct SinkState {
    source: Option<String>,
    sources: Vec<String>,
    base: Duration,
    resumed_at: Option<Instant>,
    duration: Duration,
    paused: bool,
    frozen: bool,
    thaw_on_play: bool,
    volume: f32,
    play_calls: u32,
    fail_play: bool,
    ready_delays: HashMap<String, Duration>,
    load_errors: HashSet<String>,
    never_ready: HashSet<String>,
}

impl SinkState {
    fn position(&self) -> Duration {
        self.base + self.resumed_at.map_or(Duration::ZERO, |at| at.elapsed())
    }
}

pub struct MockSink {
    state: Arc<Mutex<SinkState>>,
    events: broadcast::Sender<SinkEvent>,
}

impl MockSink {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            state: Arc::new(Mutex::new(SinkState {
                source: None,
                sources: Vec::new(),
                base: Duration::ZERO,
                resumed_at: None,
                duration: Duration::from_secs(200),
                paused: true,
                frozen: false,
                thaw_on_play: false,
                volume: 1.0,
                play_calls: 0,
                fail_play: false,
                ready_delays: HashMap::new(),
                load_errors: HashSet::new(),
                never_ready: HashSet::new(),
            })),
            events,
        }
    }

    /// Delay the ready signal for `track`
    pub fn ready_after(&self, track: &str, delay: Duration) {
        self.state.lock().unwrap().ready_delays.insert(url_for(track), delay);
    }

    /// Report a load error instead of becoming ready
    pub fn fail_load(&self, track: &str) {
        self.state.lock().unwrap().load_errors.insert(url_for(track));
    }

    /// Never signal readiness for `track`
    pub fn never_ready(&self, track: &str) {
        self.state.lock().unwrap().never_ready.insert(url_for(track));
    }

    pub fn fail_play(&self, fail: bool) {
        self.state.lock().unwrap().fail_play = fail;
    }

    /// Stop the position from advancing while still claiming to play
    pub fn freeze(&self, thaw_on_play: bool) {
        let mut state = self.state.lock().unwrap();
        state.base = state.position();
        state.resumed_at = None;
        state.frozen = true;
        state.thaw_on_play = thaw_on_play;
    }

    /// Network recovered on its own: position advances again
    pub fn resume_now(&self) {
        let mut state = self.state.lock().unwrap();
        state.frozen = false;
        state.paused = false;
        if state.resumed_at.is_none() {
            state.resumed_at = Some(Instant::now());
        }
    }

    /// Pause from outside the controller (OS interruption)
    pub fn interrupt(&self) {
        MediaSink::pause(self);
    }

    pub fn emit(&self, event: SinkEvent) {
        let _ = self.events.send(event);
    }

    pub fn source(&self) -> Option<String> {
        self.state.lock().unwrap().source.clone()
    }

    pub fn sources(&self) -> Vec<String> {
        self.state.lock().unwrap().sources.clone()
    }

    pub fn is_paused_now(&self) -> bool {
        self.state.lock().unwrap().paused
    }

    pub fn position_now(&self) -> Duration {
        self.state.lock().unwrap().position()
    }

    pub fn play_calls(&self) -> u32 {
        self.state.lock().unwrap().play_calls
    }

    pub fn volume(&self) -> f32 {
        self.state.lock().unwrap().volume
    }
}

#[async_trait]
impl MediaSink for MockSink {
    fn set_source(&self, url: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.source = Some(url.to_string());
        state.sources.push(url.to_string());
        state.base = Duration::ZERO;
        state.resumed_at = None;
        state.paused = true;

        if state.load_errors.contains(url) {
            let _ = self.events.send(SinkEvent::Error {
                message: "decode failed".to_string(),
            });
            return Ok(());
        }
        if state.never_ready.contains(url) {
            return Ok(());
        }

        match state.ready_delays.get(url).copied() {
            None => {
                let _ = self.events.send(SinkEvent::CanPlay);
            }
            Some(delay) => {
                let shared = Arc::clone(&self.state);
                let events = self.events.clone();
                let url = url.to_string();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    // A replaced source never becomes ready
                    if shared.lock().unwrap().source.as_deref() == Some(url.as_str()) {
                        let _ = events.send(SinkEvent::CanPlay);
                    }
                });
            }
        }
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.play_calls += 1;
        if state.fail_play {
            return Err(PlaybackError::SinkFatal("play() rejected".to_string()));
        }
        state.paused = false;
        if state.frozen && state.thaw_on_play {
            state.frozen = false;
        }
        if !state.frozen && state.resumed_at.is_none() {
            state.resumed_at = Some(Instant::now());
        }
        drop(state);
        let _ = self.events.send(SinkEvent::Playing);
        Ok(())
    }

    fn pause(&self) {
        let mut state = self.state.lock().unwrap();
        state.base = state.position();
        state.resumed_at = None;
        state.paused = true;
    }

    fn position(&self) -> Duration {
        self.state.lock().unwrap().position()
    }

    fn set_position(&self, position: Duration) {
        let mut state = self.state.lock().unwrap();
        state.base = position;
        if state.resumed_at.is_some() {
            state.resumed_at = Some(Instant::now());
        }
    }

    fn duration(&self) -> Option<Duration> {
        let state = self.state.lock().unwrap();
        state.source.as_ref().map(|_| state.duration)
    }

    fn is_paused(&self) -> bool {
        self.state.lock().unwrap().paused
    }

    fn set_volume(&self, level: f32) {
        self.state.lock().unwrap().volume = level;
    }

    fn subscribe(&self) -> broadcast::Receiver<SinkEvent> {
        self.events.subscribe()
    }
}

// ===== URL Issuer =====

#[derive(Default)]
struct IssuerState {
    remaining_failures: HashMap<TrackId, u32>,
    delays: HashMap<TrackId, Duration>,
    calls: HashMap<TrackId, u32>,
    invalidated: Vec<TrackId>,
}

#[derive(Default)]
pub struct MockIssuer {
    state: Mutex<IssuerState>,
}

impl MockIssuer {
    /// Fail the next `times` resolves of `track`
    pub fn fail(&self, track: &str, times: u32) {
        self.state
            .lock()
            .unwrap()
            .remaining_failures
            .insert(TrackId::from(track), times);
    }

    /// Answer resolves of `track` only after `delay`
    pub fn resolve_after(&self, track: &str, delay: Duration) {
        self.state
            .lock()
            .unwrap()
            .delays
            .insert(TrackId::from(track), delay);
    }

    pub fn fail_always(&self, track: &str) {
        self.fail(track, u32::MAX);
    }

    pub fn calls(&self, track: &str) -> u32 {
        let state = self.state.lock().unwrap();
        state.calls.get(&TrackId::from(track)).copied().unwrap_or(0)
    }

    pub fn invalidated(&self) -> Vec<TrackId> {
        self.state.lock().unwrap().invalidated.clone()
    }
}

#[async_trait]
impl UrlIssuer for MockIssuer {
    async fn resolve(&self, track: &TrackId) -> Result<SignedUrl> {
        let (fails, delay) = {
            let mut state = self.state.lock().unwrap();
            *state.calls.entry(track.clone()).or_default() += 1;

            let fails = match state.remaining_failures.get_mut(track) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    true
                }
                _ => false,
            };
            (fails, state.delays.get(track).copied())
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fails {
            return Err(PlaybackError::resolve(track, "HTTP 500"));
        }

        Ok(SignedUrl {
            url: url_for(track.as_str()),
            valid_until: chrono::Utc::now() + chrono::Duration::minutes(30),
        })
    }

    fn invalidate(&self, track: &TrackId) {
        self.state.lock().unwrap().invalidated.push(track.clone());
    }
}

// ===== Wake Lock =====

#[derive(Default)]
pub struct CountingWakeLock {
    pub acquired: AtomicU32,
    pub released: AtomicU32,
}

impl CountingWakeLock {
    pub fn acquired(&self) -> u32 {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> u32 {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WakeLock for CountingWakeLock {
    async fn acquire(&self) -> Result<()> {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn release(&self) -> Result<()> {
        self.released.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ===== Harness =====

pub struct Harness {
    pub controller: PlaybackController,
    pub sink: Arc<MockSink>,
    pub issuer: Arc<MockIssuer>,
    pub wake_lock: Arc<CountingWakeLock>,
    pub preferences: Arc<MemoryPreferenceStore>,
}

impl Harness {
    pub fn new(tracks: &[&str]) -> Self {
        Self::with(tracks, PlaybackConfig::default(), MemoryPreferenceStore::new())
    }

    pub fn with(tracks: &[&str], config: PlaybackConfig, preferences: MemoryPreferenceStore) -> Self {
        let sink = Arc::new(MockSink::new());
        let issuer = Arc::new(MockIssuer::default());
        let wake_lock = Arc::new(CountingWakeLock::default());
        let preferences = Arc::new(preferences);

        let controller = PlaybackController::new(
            config,
            Collaborators {
                catalog: Arc::new(StaticCatalog::new(tracks.iter().copied())),
                issuer: issuer.clone(),
                sink: sink.clone(),
                wake_lock: wake_lock.clone(),
                preferences: preferences.clone(),
            },
        )
        .expect("controller");

        Self {
            controller,
            sink,
            issuer,
            wake_lock,
            preferences,
        }
    }

    pub fn current(&self) -> Option<String> {
        self.controller
            .get_session()
            .current_track
            .map(|t| t.as_str().to_string())
    }

    /// Status texts emitted since the last drain
    pub fn statuses(&self) -> Vec<String> {
        self.controller
            .drain_events()
            .into_iter()
            .filter_map(|event| match event {
                PlaybackEvent::StatusChanged { text } => Some(text),
                _ => None,
            })
            .collect()
    }
}

/// Let spawned tasks run without advancing the clock much
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
