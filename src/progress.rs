//! Keyed progress and error counters shared by every in-flight refresh task.
//!
//! Entries are created by [`ProgressTracker::start`] and frozen by
//! [`ProgressTracker::complete`]. `update` is an absolute, monotonic write;
//! `increment` and `record_error` are relative. All writes to a completed
//! entry are ignored.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct ProgressState {
    pub label: String,
    pub total: usize,
    pub processed: usize,
    pub errors: usize,
    pub chain_id: Option<u64>,
    pub started_at: Instant,
    pub completed_at: Option<Instant>,
}

impl ProgressState {
    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }

    pub fn elapsed(&self) -> Duration {
        self.completed_at
            .unwrap_or_else(Instant::now)
            .duration_since(self.started_at)
    }
}

/// Aggregate over every tracked entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressStats {
    pub tracked: usize,
    pub active: usize,
    pub completed: usize,
    pub total: usize,
    pub processed: usize,
    pub errors: usize,
}

#[derive(Default)]
pub struct ProgressTracker {
    entries: Mutex<HashMap<String, ProgressState>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide tracker used by the indexer binary.
    pub fn global() -> Arc<ProgressTracker> {
        static GLOBAL: OnceLock<Arc<ProgressTracker>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(ProgressTracker::new())).clone()
    }

    // A panic while holding the lock cannot leave an entry half-written, so
    // a poisoned map is still usable.
    fn entries(&self) -> MutexGuard<'_, HashMap<String, ProgressState>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn start(&self, key: &str, label: &str, total: usize, chain_id: Option<u64>) {
        let mut entries = self.entries();
        if let Some(existing) = entries.get(key).filter(|state| !state.is_complete()) {
            warn!(
                "Progress '{}' started again before completing ({}/{} processed), resetting",
                key, existing.processed, existing.total
            );
        }

        entries.insert(
            key.to_string(),
            ProgressState {
                label: label.to_string(),
                total,
                processed: 0,
                errors: 0,
                chain_id,
                started_at: Instant::now(),
                completed_at: None,
            },
        );
    }

    /// Sets `processed` to `max(current, processed)`.
    pub fn update(&self, key: &str, processed: usize) {
        self.with_active(key, |state| {
            state.processed = state.processed.max(processed);
        });
    }

    pub fn increment(&self, key: &str) {
        self.with_active(key, |state| state.processed += 1);
    }

    pub fn record_error(&self, key: &str) {
        self.with_active(key, |state| state.errors += 1);
    }

    pub fn complete(&self, key: &str) {
        self.with_active(key, |state| {
            state.completed_at = Some(Instant::now());
            debug!(
                "{} complete: {}/{} processed, {} errors in {:?}",
                state.label,
                state.processed,
                state.total,
                state.errors,
                state.elapsed()
            );
        });
    }

    pub fn snapshot(&self, key: &str) -> Option<ProgressState> {
        self.entries().get(key).cloned()
    }

    /// Drops completed entries. Entries still in flight are kept.
    pub fn prune_completed(&self) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, state| !state.is_complete());
        before - entries.len()
    }

    pub fn get_stats(&self) -> ProgressStats {
        self.entries()
            .values()
            .fold(ProgressStats::default(), |mut stats, state| {
                stats.tracked += 1;
                if state.is_complete() {
                    stats.completed += 1;
                } else {
                    stats.active += 1;
                }
                stats.total += state.total;
                stats.processed += state.processed;
                stats.errors += state.errors;
                stats
            })
    }

    fn with_active(&self, key: &str, f: impl FnOnce(&mut ProgressState)) {
        match self.entries().get_mut(key) {
            Some(state) if !state.is_complete() => f(state),
            Some(_) => debug!("Ignoring progress write to completed entry '{}'", key),
            None => warn!("Progress write to unknown entry '{}'", key),
        }
    }
}
