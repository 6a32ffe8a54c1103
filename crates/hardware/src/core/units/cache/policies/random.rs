//! Random Replacement Policy.
//!
//! This policy evicts a pseudo-random cache line from the set. A xorshift generator
//! seeded from the configuration keeps runs reproducible.

use serde::{Deserialize, Serialize};

use super::ReplacementPolicy;

/// Seed used when the configured seed is zero (xorshift would stay at zero).
const FALLBACK_SEED: u64 = 123_456_789;

/// Random Policy state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomPolicy {
    /// Number of ways in the cache.
    ways: usize,
    /// Internal state for the pseudo-random number generator.
    state: u64,
}

impl RandomPolicy {
    /// Creates a new Random policy instance.
    ///
    /// # Arguments
    ///
    /// * `ways` - The associativity (number of ways) of the cache.
    /// * `seed` - Initial generator state.
    pub fn new(ways: usize, seed: u64) -> Self {
        Self {
            ways: ways.max(1),
            state: if seed == 0 { FALLBACK_SEED } else { seed },
        }
    }
}

impl ReplacementPolicy for RandomPolicy {
    /// Access patterns do not affect the state.
    fn update(&mut self, _set: usize, _way: usize) {}

    /// Generates a pseudo-random number and maps it to a valid way index.
    fn get_victim(&mut self, _set: usize) -> usize {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        (x % self.ways as u64) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = RandomPolicy::new(4, 42);
        let mut b = RandomPolicy::new(4, 42);
        let xs: Vec<usize> = (0..16).map(|_| a.get_victim(0)).collect();
        let ys: Vec<usize> = (0..16).map(|_| b.get_victim(0)).collect();
        assert_eq!(xs, ys);
        assert!(xs.iter().all(|&w| w < 4));
    }
}
