//! Global History Register (GHR).
//!
//! The register holds the most recent outcomes, newest in bit 0. Decode shifts in
//! predicted outcomes speculatively; before doing so it snapshots the current value
//! under the branch's id so a flush can restore the exact history.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Global history with per-instruction snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ghr {
    bits: u32,
    value: u64,
    snapshots: BTreeMap<u64, u64>,
}

impl Ghr {
    /// Empty history of `bits` bits.
    pub fn new(bits: u32) -> Self {
        Self {
            bits: bits.min(63),
            value: 0,
            snapshots: BTreeMap::new(),
        }
    }

    /// Current history.
    pub const fn value(&self) -> u64 {
        self.value
    }

    /// Replaces the current history.
    pub const fn set(&mut self, value: u64) {
        self.value = value & self.mask();
    }

    const fn mask(&self) -> u64 {
        (1u64 << self.bits) - 1
    }

    /// Shifts one outcome in.
    pub const fn shift(&mut self, taken: bool) {
        self.value = ((self.value << 1) | taken as u64) & self.mask();
    }

    /// Records the current history under instruction `id`.
    pub fn snapshot(&mut self, id: u64) {
        let _ = self.snapshots.insert(id, self.value);
    }

    /// Removes and returns the snapshot of `id`.
    pub fn release(&mut self, id: u64) -> Option<u64> {
        self.snapshots.remove(&id)
    }

    /// Rewinds to the history seen by the oldest instruction with id `>= first` and
    /// drops all snapshots from `first` on.
    ///
    /// Nothing changes if no such snapshot exists.
    pub fn restore_from(&mut self, first: u64) {
        let dropped = self.snapshots.split_off(&first);
        if let Some((_, &value)) = dropped.iter().next() {
            self.value = value;
        }
    }

    /// Number of live snapshots.
    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }
}
