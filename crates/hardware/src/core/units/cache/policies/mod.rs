//! Cache Replacement Policies.
//!
//! Implements the algorithms for selecting victim lines in set-associative caches.
//!
//! # Policies
//!
//! - `Fifo`: First-In, First-Out.
//! - `Lru`: Least Recently Used.
//! - `Random`: Seeded pseudo-random selection.

/// First-In, First-Out replacement policy.
pub mod fifo;

/// Least Recently Used replacement policy.
pub mod lru;

/// Random replacement policy.
pub mod random;

use serde::{Deserialize, Serialize};

pub use fifo::FifoPolicy;
pub use lru::LruPolicy;
pub use random::RandomPolicy;

use crate::config::{CacheConfig, ReplacementPolicy as PolicyType};

/// Trait for cache replacement policies.
///
/// Defines the interface for updating usage state and selecting victim lines.
pub trait ReplacementPolicy: Send + Sync {
    /// Updates the policy state when a line is accessed.
    ///
    /// # Arguments
    ///
    /// * `set` - The cache set index.
    /// * `way` - The way index within the set that was accessed.
    fn update(&mut self, set: usize, way: usize);

    /// Updates the policy state when a line is filled with a new block.
    ///
    /// Defaults to [`ReplacementPolicy::update`].
    fn fill(&mut self, set: usize, way: usize) {
        self.update(set, way);
    }

    /// Selects a victim line to evict from a specific set.
    ///
    /// # Arguments
    ///
    /// * `set` - The cache set index.
    ///
    /// # Returns
    ///
    /// The index of the way to evict.
    fn get_victim(&mut self, set: usize) -> usize;
}

/// Enum wrapper for static dispatch of replacement policies.
///
/// Unlike a boxed trait object it can be cloned, compared and serialized with the
/// rest of the cache state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyState {
    /// Least recently used.
    Lru(LruPolicy),
    /// Round robin per set.
    Fifo(FifoPolicy),
    /// Seeded xorshift.
    Random(RandomPolicy),
}

impl PolicyState {
    /// Creates the configured policy for `sets` x `ways` lines.
    pub fn new(config: &CacheConfig, sets: usize, ways: usize) -> Self {
        match config.cache_replacement {
            PolicyType::Lru => Self::Lru(LruPolicy::new(sets, ways)),
            PolicyType::Fifo => Self::Fifo(FifoPolicy::new(sets, ways)),
            PolicyType::Random => Self::Random(RandomPolicy::new(ways, config.random_seed)),
        }
    }
}

impl ReplacementPolicy for PolicyState {
    #[inline]
    fn update(&mut self, set: usize, way: usize) {
        match self {
            Self::Lru(p) => p.update(set, way),
            Self::Fifo(p) => p.update(set, way),
            Self::Random(p) => p.update(set, way),
        }
    }

    #[inline]
    fn fill(&mut self, set: usize, way: usize) {
        match self {
            Self::Lru(p) => p.fill(set, way),
            Self::Fifo(p) => p.fill(set, way),
            Self::Random(p) => p.fill(set, way),
        }
    }

    #[inline]
    fn get_victim(&mut self, set: usize) -> usize {
        match self {
            Self::Lru(p) => p.get_victim(set),
            Self::Fifo(p) => p.get_victim(set),
            Self::Random(p) => p.get_victim(set),
        }
    }
}
