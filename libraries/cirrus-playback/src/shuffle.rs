//! Shuffle selection without immediate repeats
//!
//! Picks the next track at random while steering clear of the current track
//! and of recently picked ones. History holds at most half the catalog, so
//! every pick still has a pool to choose from.

use crate::history::History;
use crate::types::TrackId;
use rand::seq::SliceRandom;
use rand::Rng;

/// History capacity for a catalog of `catalog_len` tracks
pub fn history_capacity(catalog_len: usize) -> usize {
    (catalog_len / 2).max(1)
}

/// Shuffle picker with bounded history
#[derive(Debug, Clone, Default)]
pub struct ShuffleSelector {
    history: History,
}

impl ShuffleSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget all recent picks
    pub fn reset(&mut self) {
        self.history.clear();
    }

    /// Record `track` as recently played so the next pick avoids it
    pub fn seed(&mut self, track: TrackId, catalog_len: usize) {
        self.history.set_max_size(history_capacity(catalog_len));
        self.history.push(track);
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Pick the next track using the thread-local RNG
    pub fn pick(&mut self, catalog: &[TrackId], excluding: Option<&TrackId>) -> Option<TrackId> {
        self.pick_with(catalog, excluding, &mut rand::thread_rng())
    }

    /// Pick the next track
    ///
    /// Algorithm:
    /// 1. History as large as the catalog means the pool is exhausted: clear it
    /// 2. Candidates are the catalog minus history minus `excluding`
    /// 3. No candidates: fall back to the catalog minus `excluding`, then to
    ///    the first catalog entry
    /// 4. Choose uniformly, record the choice, trim history to capacity
    ///
    /// Returns `None` only for an empty catalog.
    pub fn pick_with<R: Rng + ?Sized>(
        &mut self,
        catalog: &[TrackId],
        excluding: Option<&TrackId>,
        rng: &mut R,
    ) -> Option<TrackId> {
        let first = catalog.first()?;

        if self.history.len() >= catalog.len() {
            self.history.clear();
        }

        let not_excluded = |track: &&TrackId| Some(*track) != excluding;

        let mut candidates: Vec<&TrackId> = catalog
            .iter()
            .filter(not_excluded)
            .filter(|track| !self.history.contains(track))
            .collect();

        if candidates.is_empty() {
            self.history.clear();
            candidates = catalog.iter().filter(not_excluded).collect();
        }

        let Some(&selected) = candidates.choose(rng) else {
            return Some(first.clone());
        };

        let selected = selected.clone();
        self.history.set_max_size(history_capacity(catalog.len()));
        self.history.push(selected.clone());
        Some(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn catalog(n: usize) -> Vec<TrackId> {
        (1..=n).map(|i| TrackId::from(format!("t{}", i))).collect()
    }

    #[test]
    fn capacity_is_half_the_catalog_at_least_one() {
        assert_eq!(history_capacity(0), 1);
        assert_eq!(history_capacity(1), 1);
        assert_eq!(history_capacity(3), 1);
        assert_eq!(history_capacity(10), 5);
        assert_eq!(history_capacity(11), 5);
    }

    #[test]
    fn empty_catalog_has_no_pick() {
        let mut selector = ShuffleSelector::new();
        assert_eq!(selector.pick(&[], None), None);
    }

    #[test]
    fn single_track_catalog_returns_that_track() {
        let tracks = catalog(1);
        let mut selector = ShuffleSelector::new();

        // Excluding the only track still yields it
        for _ in 0..5 {
            let pick = selector.pick(&tracks, Some(&tracks[0]));
            assert_eq!(pick, Some(tracks[0].clone()));
        }
    }

    #[test]
    fn never_picks_excluded_track() {
        let tracks = catalog(2);
        let mut selector = ShuffleSelector::new();
        let mut rng = StdRng::seed_from_u64(7);

        let mut current = tracks[0].clone();
        for _ in 0..50 {
            let next = selector.pick_with(&tracks, Some(&current), &mut rng).unwrap();
            assert_ne!(next, current);
            current = next;
        }
    }

    #[test]
    fn history_stays_within_capacity() {
        let tracks = catalog(10);
        let mut selector = ShuffleSelector::new();
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..100 {
            selector.pick_with(&tracks, None, &mut rng);
            assert!(selector.history().len() <= history_capacity(tracks.len()));
        }
    }

    #[test]
    fn recent_picks_are_not_repeated() {
        let tracks = catalog(8);
        let mut selector = ShuffleSelector::new();
        let mut rng = StdRng::seed_from_u64(3);
        let window = history_capacity(tracks.len()) + 1;

        let picks: Vec<TrackId> = (0..64)
            .map(|_| selector.pick_with(&tracks, None, &mut rng).unwrap())
            .collect();

        for chunk in picks.windows(window) {
            let unique: HashSet<_> = chunk.iter().collect();
            assert_eq!(unique.len(), chunk.len(), "repeat within {:?}", chunk);
        }
    }

    #[test]
    fn seeded_track_is_avoided() {
        let tracks = catalog(2);
        let mut selector = ShuffleSelector::new();
        selector.seed(tracks[0].clone(), tracks.len());

        assert_eq!(selector.pick(&tracks, None), Some(tracks[1].clone()));
    }

    #[test]
    fn oversized_history_is_reset() {
        let tracks = catalog(2);
        let mut selector = ShuffleSelector::new();
        selector.seed(tracks[0].clone(), 4);
        selector.seed(tracks[1].clone(), 4);
        assert_eq!(selector.history().len(), 2);

        // History covers the whole catalog: a fresh cycle starts
        let pick = selector.pick(&tracks, None).unwrap();
        assert!(tracks.contains(&pick));
        assert_eq!(selector.history().len(), 1);
    }
}
