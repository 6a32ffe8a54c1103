//! Set-Associative Data Cache.
//!
//! This module implements a configurable set-associative, write-back cache in front
//! of main memory. It models hits, misses, line fills and dirty write-backs, and
//! returns the delay of every access so the memory unit can time it. Lines hold real
//! data: while a line is cached, main memory may be stale.

/// Cache replacement policy implementations (FIFO, LRU, Random).
pub mod policies;

use serde::{Deserialize, Serialize};

use self::policies::{PolicyState, ReplacementPolicy};
use super::memory::MainMemory;
use crate::common::error::RuntimeException;
use crate::config::{CacheConfig, CpuConfig};

/// Cache line entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheLine {
    /// Holds a block.
    pub valid: bool,
    /// Modified since the fill.
    pub dirty: bool,
    /// Address tag.
    pub tag: u64,
    /// Address of the first byte of the block.
    pub base: u64,
    /// Block contents.
    pub data: Vec<u8>,
    /// Tick at which the fill completes.
    pub ready_at: u64,
}

/// Outcome of one cache access.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheAccess {
    /// Ticks until the access completes.
    pub delay: u64,
    /// Lines that were not present.
    pub misses: u32,
    /// Dirty victims written back to memory.
    pub write_backs: u32,
    /// Bytes read (empty for stores).
    pub data: Vec<u8>,
}

impl CacheAccess {
    /// Returns true if every touched line was present.
    pub const fn is_hit(&self) -> bool {
        self.misses == 0
    }
}

/// Set-associative cache with real line contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cache {
    lines: Vec<CacheLine>,
    sets: usize,
    ways: usize,
    line_size: usize,
    policy: PolicyState,
}

impl Cache {
    /// Creates an empty cache.
    ///
    /// # Arguments
    ///
    /// * `config` - Geometry and replacement policy; assumed validated.
    pub fn new(config: &CacheConfig) -> Self {
        let ways = config.cache_assoc.max(1);
        let sets = config.sets().max(1);
        let line_size = config.cache_line_size.max(1);
        Self {
            lines: vec![CacheLine::default(); sets * ways],
            sets,
            ways,
            line_size,
            policy: PolicyState::new(config, sets, ways),
        }
    }

    /// All lines, set-major.
    pub fn lines(&self) -> &[CacheLine] {
        &self.lines
    }

    /// Bytes per line.
    pub const fn line_size(&self) -> usize {
        self.line_size
    }

    fn line_base(&self, address: u64) -> u64 {
        address - address % self.line_size as u64
    }

    fn set_of(&self, address: u64) -> usize {
        ((address / self.line_size as u64) % self.sets as u64) as usize
    }

    fn tag_of(&self, address: u64) -> u64 {
        address / (self.line_size * self.sets) as u64
    }

    /// Index into `lines` of the valid line holding `address`.
    fn find(&self, address: u64) -> Option<usize> {
        let set = self.set_of(address);
        let tag = self.tag_of(address);
        (set * self.ways..(set + 1) * self.ways)
            .find(|&i| self.lines.get(i).is_some_and(|l| l.valid && l.tag == tag))
    }

    /// Returns true if `address` is cached.
    pub fn contains(&self, address: u64) -> bool {
        self.find(address).is_some()
    }

    /// Byte at `address` if it is cached.
    pub fn peek_byte(&self, address: u64) -> Option<u8> {
        let line = self.lines.get(self.find(address)?)?;
        line.data.get((address - line.base) as usize).copied()
    }

    /// Brings the block at `base` into the cache.
    ///
    /// Uses an invalid way if the set has one, otherwise asks the policy for a victim
    /// and writes it back when dirty.
    ///
    /// # Returns
    ///
    /// The filled line index and whether a dirty victim was written back.
    fn fill(&mut self, memory: &mut MainMemory, base: u64) -> Result<(usize, bool), RuntimeException> {
        let set = self.set_of(base);
        let first = set * self.ways;
        let way = (0..self.ways)
            .find(|&w| self.lines.get(first + w).is_some_and(|l| !l.valid))
            .unwrap_or_else(|| self.policy.get_victim(set) % self.ways);
        let index = first + way;

        let data = memory.read_bytes(base, self.line_size)?.to_vec();
        let tag = self.tag_of(base);
        let mut written_back = false;
        if let Some(line) = self.lines.get_mut(index) {
            if line.valid && line.dirty {
                memory.write(line.base, &line.data)?;
                written_back = true;
            }
            *line = CacheLine {
                valid: true,
                dirty: false,
                tag,
                base,
                data,
                ready_at: 0,
            };
        }
        self.policy.fill(set, way);
        Ok((index, written_back))
    }

    /// Performs one load or store through the cache.
    ///
    /// The delay is `cacheAccessDelay`, plus `loadLatency + laneReplacementDelay` for
    /// every missing line (plus `storeLatency` when the victim was dirty), plus the
    /// remaining fill time of present lines when `addRemainingDelay` is set.
    ///
    /// # Arguments
    ///
    /// * `memory` - Backing store for fills and write-backs.
    /// * `config` - Latencies.
    /// * `address` - First byte accessed.
    /// * `size` - Access width in bytes; may straddle two lines.
    /// * `store` - Bytes to write, or `None` for a load.
    /// * `now` - Current tick.
    ///
    /// # Errors
    ///
    /// `MemoryAccessOutOfRange` if the access leaves main memory.
    pub fn access(
        &mut self,
        memory: &mut MainMemory,
        config: &CpuConfig,
        address: u64,
        size: usize,
        store: Option<&[u8]>,
        now: u64,
    ) -> Result<CacheAccess, RuntimeException> {
        memory.check(address, size)?;
        let cache = &config.cache;
        let mut report = CacheAccess {
            delay: cache.cache_access_delay.max(0) as u64,
            ..CacheAccess::default()
        };

        let first = self.line_base(address);
        let last = self.line_base(address + size.max(1) as u64 - 1);
        let mut wait = 0;
        let mut base = first;
        while base <= last {
            if let Some(index) = self.find(base) {
                let set = self.set_of(base);
                self.policy.update(set, index - set * self.ways);
                let ready_at = self.lines.get(index).map_or(0, |l| l.ready_at);
                if cache.add_remaining_delay && ready_at > now {
                    wait = wait.max(ready_at - now);
                }
            } else {
                let (index, written_back) = self.fill(memory, base)?;
                report.misses += 1;
                report.delay += (config.memory.load_latency + cache.lane_replacement_delay).max(0) as u64;
                if written_back {
                    report.write_backs += 1;
                    report.delay += config.memory.store_latency.max(0) as u64;
                }
                let ready_at = now + report.delay;
                if let Some(line) = self.lines.get_mut(index) {
                    line.ready_at = ready_at;
                }
            }
            base += self.line_size as u64;
        }
        report.delay += wait;

        for offset in 0..size {
            let byte_address = address + offset as u64;
            let Some(line) = self.find(byte_address).and_then(|i| self.lines.get_mut(i)) else {
                continue;
            };
            let at = (byte_address - line.base) as usize;
            match store {
                Some(bytes) => {
                    if let (Some(slot), Some(&value)) = (line.data.get_mut(at), bytes.get(offset)) {
                        *slot = value;
                        line.dirty = true;
                    }
                }
                None => report.data.push(line.data.get(at).copied().unwrap_or(0)),
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReplacementPolicy as PolicyType;

    fn setup(policy: PolicyType) -> (Cache, MainMemory, CpuConfig) {
        let mut config = CpuConfig::default();
        config.cache.cache_lines = 4;
        config.cache.cache_assoc = 2;
        config.cache.cache_line_size = 16;
        config.cache.cache_replacement = policy;
        config.memory.memory_size = 1024;
        let cache = Cache::new(&config.cache);
        let mut memory = MainMemory::new(1024);
        for i in 0..1024u64 {
            memory.write(i, &[i as u8]).unwrap();
        }
        let _ = memory.take_journal();
        (cache, memory, config)
    }

    #[test]
    fn test_miss_then_hit() {
        let (mut cache, mut memory, config) = setup(PolicyType::Lru);
        let miss = cache.access(&mut memory, &config, 20, 4, None, 0).unwrap();
        assert_eq!(miss.misses, 1);
        assert_eq!(miss.delay, 1 + 10 + 1);
        assert_eq!(miss.data, vec![20, 21, 22, 23]);
        let hit = cache.access(&mut memory, &config, 24, 4, None, 1).unwrap();
        assert!(hit.is_hit());
        assert_eq!(hit.delay, 1);
    }

    #[test]
    fn test_straddling_access_fills_two_lines() {
        let (mut cache, mut memory, config) = setup(PolicyType::Lru);
        let access = cache.access(&mut memory, &config, 14, 4, None, 0).unwrap();
        assert_eq!(access.misses, 2);
        assert_eq!(access.data, vec![14, 15, 16, 17]);
    }

    #[test]
    fn test_dirty_victim_is_written_back() {
        let (mut cache, mut memory, config) = setup(PolicyType::Fifo);
        let _ = cache.access(&mut memory, &config, 0, 1, Some(&[0xAA]), 0).unwrap();
        assert_eq!(memory.read_bytes(0, 1).unwrap(), &[0]);
        assert_eq!(cache.peek_byte(0), Some(0xAA));
        // Lines 0, 32 and 64 share set 0 of a 2-way cache.
        let _ = cache.access(&mut memory, &config, 32, 1, None, 1).unwrap();
        let evict = cache.access(&mut memory, &config, 64, 1, None, 2).unwrap();
        assert_eq!(evict.write_backs, 1);
        assert_eq!(evict.delay, 1 + 10 + 1 + 10);
        assert_eq!(memory.read_bytes(0, 1).unwrap(), &[0xAA]);
        assert!(!cache.contains(0));
    }

    #[test]
    fn test_out_of_range_access_faults() {
        let (mut cache, mut memory, config) = setup(PolicyType::Lru);
        let err = cache.access(&mut memory, &config, 1022, 4, None, 0).unwrap_err();
        assert_eq!(
            err,
            RuntimeException::MemoryAccessOutOfRange {
                address: 1022,
                size: 4
            }
        );
    }
}
