//! Stall detection
//!
//! A watchdog samples the playback position at a fixed interval. A position
//! that stays put while the sink claims to be playing is counted; once the
//! count reaches the threshold the session is considered stalled and the
//! controller runs its recovery ladder. Brief buffering resolves before the
//! threshold and never triggers recovery.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Watchdog lifecycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonitorState {
    /// Not monitoring (stopped, paused, failed, or nothing loaded)
    #[default]
    Idle,

    /// Sampling the playback position
    Watching,

    /// Running the recovery ladder after a stall
    Recovering,
}

/// Result of one position sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StallVerdict {
    /// Position moved (or this is the first sample)
    Progressing,

    /// Position did not move; `count` consecutive unchanged samples so far
    Unchanged { count: u32 },

    /// Threshold reached
    Stalled,
}

/// Debounced position-progress detector
#[derive(Debug, Clone)]
pub struct StallDetector {
    last_position: Option<Duration>,
    unchanged: u32,
    threshold: u32,
}

impl StallDetector {
    pub fn new(threshold: u32) -> Self {
        Self {
            last_position: None,
            unchanged: 0,
            threshold: threshold.max(1),
        }
    }

    /// Feed one sample
    ///
    /// Unchanged samples only count while the sink is not paused.
    pub fn sample(&mut self, position: Duration, paused: bool) -> StallVerdict {
        let previous = self.last_position.replace(position);

        match previous {
            Some(previous) if previous == position => {
                if !paused {
                    self.unchanged += 1;
                }
                if self.unchanged >= self.threshold {
                    StallVerdict::Stalled
                } else {
                    StallVerdict::Unchanged {
                        count: self.unchanged,
                    }
                }
            }
            _ => {
                self.unchanged = 0;
                StallVerdict::Progressing
            }
        }
    }

    pub fn unchanged_samples(&self) -> u32 {
        self.unchanged
    }

    pub fn reset(&mut self) {
        self.last_position = None;
        self.unchanged = 0;
    }
}

/// Handle to the running watchdog task
///
/// Starting a new watchdog aborts the previous task first so two monitors
/// never overlap.
#[derive(Debug, Default)]
pub(crate) struct StallMonitor {
    handle: Option<JoinHandle<()>>,
}

impl StallMonitor {
    pub(crate) fn replace(&mut self, handle: JoinHandle<()>) {
        self.stop();
        self.handle = Some(handle);
    }

    pub(crate) fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    #[cfg(test)]
    pub(crate) fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for StallMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECOND: Duration = Duration::from_secs(1);

    #[test]
    fn stalls_after_exactly_two_unchanged_samples() {
        let mut detector = StallDetector::new(2);

        assert_eq!(detector.sample(SECOND, false), StallVerdict::Progressing);
        assert_eq!(
            detector.sample(SECOND, false),
            StallVerdict::Unchanged { count: 1 }
        );
        assert_eq!(detector.sample(SECOND, false), StallVerdict::Stalled);
    }

    #[test]
    fn progress_resets_the_count() {
        let mut detector = StallDetector::new(2);

        detector.sample(SECOND, false);
        detector.sample(SECOND, false);
        assert_eq!(detector.unchanged_samples(), 1);

        assert_eq!(detector.sample(2 * SECOND, false), StallVerdict::Progressing);
        assert_eq!(detector.unchanged_samples(), 0);
        assert_eq!(
            detector.sample(2 * SECOND, false),
            StallVerdict::Unchanged { count: 1 }
        );
    }

    #[test]
    fn paused_sink_never_stalls() {
        let mut detector = StallDetector::new(2);

        detector.sample(SECOND, true);
        for _ in 0..10 {
            assert_eq!(
                detector.sample(SECOND, true),
                StallVerdict::Unchanged { count: 0 }
            );
        }
    }

    #[test]
    fn reset_forgets_baseline() {
        let mut detector = StallDetector::new(2);
        detector.sample(SECOND, false);
        detector.sample(SECOND, false);

        detector.reset();
        assert_eq!(detector.sample(SECOND, false), StallVerdict::Progressing);
        assert_eq!(detector.unchanged_samples(), 0);
    }

    #[tokio::test]
    async fn replacing_the_monitor_aborts_the_old_task() {
        let mut monitor = StallMonitor::default();

        let first = tokio::spawn(std::future::pending::<()>());
        let first_abort = first.abort_handle();
        monitor.replace(first);
        assert!(monitor.is_running());

        monitor.replace(tokio::spawn(std::future::pending::<()>()));
        for _ in 0..10 {
            if first_abort.is_finished() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(first_abort.is_finished());

        monitor.stop();
        assert!(!monitor.is_running());
    }
}
