//! First-In, First-Out (FIFO) Replacement Policy.
//!
//! This policy evicts the oldest cache line in a set, regardless of how recently
//! it was accessed. It operates as a circular buffer (Round-Robin) for each set:
//! only fills move the pointer, hits leave it alone.

use serde::{Deserialize, Serialize};

use super::ReplacementPolicy;

/// FIFO Policy state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FifoPolicy {
    /// Tracks the next way to be evicted for each set.
    next_way: Vec<usize>,
    /// Number of ways in the cache.
    ways: usize,
}

impl FifoPolicy {
    /// Creates a new FIFO policy instance.
    ///
    /// # Arguments
    ///
    /// * `sets` - The number of sets in the cache.
    /// * `ways` - The associativity (number of ways) of the cache.
    pub fn new(sets: usize, ways: usize) -> Self {
        Self {
            next_way: vec![0; sets],
            ways: ways.max(1),
        }
    }
}

impl ReplacementPolicy for FifoPolicy {
    /// Hits do not change the insertion order.
    fn update(&mut self, _set: usize, _way: usize) {}

    /// If the filled way matches the current eviction pointer, the pointer is
    /// advanced. This keeps the "first-in" order as lines are filled.
    fn fill(&mut self, set: usize, way: usize) {
        if let Some(next) = self.next_way.get_mut(set) {
            if *next == way {
                *next = (*next + 1) % self.ways;
            }
        }
    }

    /// Returns the current round-robin pointer for the specified set.
    fn get_victim(&mut self, set: usize) -> usize {
        self.next_way.get(set).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hits_do_not_reorder() {
        let mut fifo = FifoPolicy::new(1, 2);
        fifo.fill(0, 0);
        fifo.fill(0, 1);
        fifo.update(0, 0);
        assert_eq!(fifo.get_victim(0), 0);
        fifo.fill(0, 0);
        assert_eq!(fifo.get_victim(0), 1);
    }
}
