//! Per-plugin frame counters.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Snapshot of a plugin's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountersSnapshot {
    /// Frames received
    pub array_counter: u64,
    /// Frames that could not be processed
    pub dropped_arrays: u64,
    /// Frames whose unique id was lower than one already seen
    pub disordered_arrays: u64,
}

/// Lock-free counters shared by every thread running a plugin.
///
/// All counts only increase.
#[derive(Debug)]
pub struct PluginCounters {
    array_counter: AtomicU64,
    dropped_arrays: AtomicU64,
    disordered_arrays: AtomicU64,
    last_unique_id: AtomicI64,
}

impl PluginCounters {
    /// Counters starting at zero with no id seen yet.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            array_counter: AtomicU64::new(0),
            dropped_arrays: AtomicU64::new(0),
            disordered_arrays: AtomicU64::new(0),
            last_unique_id: AtomicI64::new(i64::MIN),
        }
    }

    /// Count an incoming frame. Returns `false` if it arrived out of order.
    pub fn record_arrival(&self, unique_id: i32) -> bool {
        self.array_counter.fetch_add(1, Ordering::Relaxed);
        let id = i64::from(unique_id);
        let highest = self.last_unique_id.fetch_max(id, Ordering::AcqRel);
        if id < highest {
            self.disordered_arrays.fetch_add(1, Ordering::Relaxed);
            false
        } else {
            true
        }
    }

    /// Count a frame that produced no output.
    pub fn record_drop(&self) {
        self.dropped_arrays.fetch_add(1, Ordering::Relaxed);
    }

    /// Frames received.
    pub fn array_counter(&self) -> u64 {
        self.array_counter.load(Ordering::Relaxed)
    }

    /// Frames that produced no output.
    pub fn dropped_arrays(&self) -> u64 {
        self.dropped_arrays.load(Ordering::Relaxed)
    }

    /// Frames that arrived after a higher unique id.
    pub fn disordered_arrays(&self) -> u64 {
        self.disordered_arrays.load(Ordering::Relaxed)
    }

    /// Copy of all counters.
    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            array_counter: self.array_counter(),
            dropped_arrays: self.dropped_arrays(),
            disordered_arrays: self.disordered_arrays(),
        }
    }
}

impl Default for PluginCounters {
    fn default() -> Self {
        Self::new()
    }
}
