//! Main Memory and Access Coordination.
//!
//! This module implements the simulated byte-addressable main memory and the
//! functions memory units use to reach it. It provides:
//! 1. **Storage:** A flat little-endian byte array of `memorySize` bytes.
//! 2. **Journal:** Overwritten bytes of the current tick, so a backward step can undo
//!    writes without copying the whole array.
//! 3. **Coordination:** Loads and stores routed through the optional cache, returning
//!    the value and the access delay.
//! 4. **Coherent View:** Reads that see dirty cache lines before main memory.

use serde::{Deserialize, Serialize};

use super::cache::Cache;
use crate::common::error::RuntimeException;
use crate::config::CpuConfig;
use crate::program::layout::DataBlock;

/// Bytes overwritten by one write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    /// First overwritten byte.
    pub address: u64,
    /// Previous contents.
    pub old: Vec<u8>,
}

/// Flat simulated main memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MainMemory {
    bytes: Vec<u8>,
    #[serde(skip)]
    journal: Vec<JournalEntry>,
}

impl PartialEq for MainMemory {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for MainMemory {}

impl MainMemory {
    /// Zero-filled memory of `size` bytes.
    pub fn new(size: usize) -> Self {
        Self {
            bytes: vec![0; size],
            journal: Vec::new(),
        }
    }

    /// Size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true for a zero-sized memory.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Copies initialized data blocks into memory. Not journaled.
    ///
    /// # Errors
    ///
    /// `MemoryAccessOutOfRange` if a block does not fit.
    pub fn load_blocks(&mut self, blocks: &[DataBlock]) -> Result<(), RuntimeException> {
        for block in blocks {
            let range = self.range(block.address, block.bytes.len())?;
            if let Some(slot) = self.bytes.get_mut(range) {
                slot.copy_from_slice(&block.bytes);
            }
        }
        Ok(())
    }

    fn range(&self, address: u64, size: usize) -> Result<std::ops::Range<usize>, RuntimeException> {
        let start = usize::try_from(address).unwrap_or(usize::MAX);
        match start.checked_add(size) {
            Some(end) if end <= self.bytes.len() => Ok(start..end),
            _ => Err(RuntimeException::MemoryAccessOutOfRange {
                address,
                size: size as u64,
            }),
        }
    }

    /// Checks that `size` bytes from `address` lie inside memory.
    ///
    /// # Errors
    ///
    /// `MemoryAccessOutOfRange` otherwise.
    pub fn check(&self, address: u64, size: usize) -> Result<(), RuntimeException> {
        self.range(address, size).map(|_| ())
    }

    /// Borrows `size` bytes from `address`.
    ///
    /// # Errors
    ///
    /// `MemoryAccessOutOfRange` if the range leaves memory.
    pub fn read_bytes(&self, address: u64, size: usize) -> Result<&[u8], RuntimeException> {
        let range = self.range(address, size)?;
        Ok(self.bytes.get(range).unwrap_or_default())
    }

    /// Writes `data` at `address`, journaling the previous contents.
    ///
    /// # Errors
    ///
    /// `MemoryAccessOutOfRange` if the range leaves memory.
    pub fn write(&mut self, address: u64, data: &[u8]) -> Result<(), RuntimeException> {
        let range = self.range(address, data.len())?;
        if let Some(slot) = self.bytes.get_mut(range) {
            self.journal.push(JournalEntry {
                address,
                old: slot.to_vec(),
            });
            slot.copy_from_slice(data);
        }
        Ok(())
    }

    /// Moves out the writes recorded since the last call.
    pub fn take_journal(&mut self) -> Vec<JournalEntry> {
        std::mem::take(&mut self.journal)
    }

    /// Restores the bytes recorded in `journal`, newest write first.
    pub fn undo(&mut self, journal: &[JournalEntry]) {
        for entry in journal.iter().rev() {
            let end = entry.address as usize + entry.old.len();
            if let Some(slot) = self.bytes.get_mut(entry.address as usize..end) {
                slot.copy_from_slice(&entry.old);
            }
        }
    }

    /// Raw contents.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Outcome of a load or store issued by a memory unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Transfer {
    /// Loaded value, zero- or sign-extended to 64 bits. Zero for stores.
    pub value: u64,
    /// Ticks until the transfer completes.
    pub delay: u64,
    /// Cache result; `None` without a cache.
    pub cache_hit: Option<bool>,
    /// Missing lines filled.
    pub misses: u32,
    /// Dirty lines written back.
    pub write_backs: u32,
}

/// Zero- or sign-extends little-endian `bytes` to 64 bits.
pub fn extend(bytes: &[u8], signed: bool) -> u64 {
    let mut raw = [0u8; 8];
    let len = bytes.len().min(8);
    raw[..len].copy_from_slice(&bytes[..len]);
    let value = u64::from_le_bytes(raw);
    if signed && (1..8).contains(&len) {
        let shift = 64 - 8 * len as u32;
        ((value << shift) as i64 >> shift) as u64
    } else {
        value
    }
}

/// Reads `size` bytes at `address`.
///
/// # Arguments
///
/// * `cache` - Data cache, if enabled.
/// * `memory` - Main memory.
/// * `config` - Latencies.
/// * `address` - First byte.
/// * `size` - Width in bytes (1, 2, 4 or 8).
/// * `signed` - Sign-extend the loaded value.
/// * `now` - Current tick.
///
/// # Errors
///
/// `MemoryAccessOutOfRange` if the access leaves memory.
pub fn load(
    cache: Option<&mut Cache>,
    memory: &mut MainMemory,
    config: &CpuConfig,
    address: u64,
    size: usize,
    signed: bool,
    now: u64,
) -> Result<Transfer, RuntimeException> {
    if let Some(cache) = cache {
        let access = cache.access(memory, config, address, size, None, now)?;
        return Ok(Transfer {
            value: extend(&access.data, signed),
            delay: access.delay,
            cache_hit: Some(access.is_hit()),
            misses: access.misses,
            write_backs: access.write_backs,
        });
    }
    let bytes = memory.read_bytes(address, size)?;
    Ok(Transfer {
        value: extend(bytes, signed),
        delay: config.memory.load_latency.max(0) as u64,
        ..Transfer::default()
    })
}

/// Writes the low `size` bytes of `value` at `address`.
///
/// # Errors
///
/// `MemoryAccessOutOfRange` if the access leaves memory.
pub fn store(
    cache: Option<&mut Cache>,
    memory: &mut MainMemory,
    config: &CpuConfig,
    address: u64,
    size: usize,
    value: u64,
    now: u64,
) -> Result<Transfer, RuntimeException> {
    let raw = value.to_le_bytes();
    let data = raw.get(..size.min(8)).unwrap_or(&raw);
    if let Some(cache) = cache {
        let access = cache.access(memory, config, address, size, Some(data), now)?;
        return Ok(Transfer {
            value: 0,
            delay: access.delay,
            cache_hit: Some(access.is_hit()),
            misses: access.misses,
            write_backs: access.write_backs,
        });
    }
    memory.write(address, data)?;
    Ok(Transfer {
        delay: config.memory.store_latency.max(0) as u64,
        ..Transfer::default()
    })
}

/// Bytes from `address` as the program would see them: cached lines first.
///
/// Bytes outside memory read as zero.
pub fn peek(cache: Option<&Cache>, memory: &MainMemory, address: u64, len: usize) -> Vec<u8> {
    (address..address + len as u64)
        .map(|a| {
            cache
                .and_then(|c| c.peek_byte(a))
                .or_else(|| memory.as_bytes().get(a as usize).copied())
                .unwrap_or(0)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undo_restores_overwritten_bytes() {
        let mut memory = MainMemory::new(64);
        memory.write(8, &[1, 2, 3, 4]).unwrap();
        let _ = memory.take_journal();
        let before = memory.clone();
        memory.write(8, &[9, 9]).unwrap();
        memory.write(9, &[7, 7, 7]).unwrap();
        let journal = memory.take_journal();
        memory.undo(&journal);
        assert_eq!(memory.as_bytes(), before.as_bytes());
    }

    #[test]
    fn test_uncached_load_sign_extends() {
        let config = CpuConfig::default();
        let mut memory = MainMemory::new(64);
        memory.write(0, &[0xFE, 0xFF]).unwrap();
        let signed = load(None, &mut memory, &config, 0, 2, true, 0).unwrap();
        assert_eq!(signed.value as i64, -2);
        assert_eq!(signed.delay, 10);
        let unsigned = load(None, &mut memory, &config, 0, 2, false, 0).unwrap();
        assert_eq!(unsigned.value, 0xFFFE);
    }

    #[test]
    fn test_peek_sees_dirty_cache_lines() {
        let config = CpuConfig::default();
        let mut cache = Cache::new(&config.cache);
        let mut memory = MainMemory::new(config.memory.memory_size);
        let transfer = store(Some(&mut cache), &mut memory, &config, 100, 4, 0xDEAD_BEEF, 0).unwrap();
        assert_eq!(transfer.cache_hit, Some(false));
        assert_eq!(memory.read_bytes(100, 4).unwrap(), &[0, 0, 0, 0]);
        assert_eq!(peek(Some(&cache), &memory, 100, 4), vec![0xEF, 0xBE, 0xAD, 0xDE]);
    }

    #[test]
    fn test_out_of_range() {
        let memory = MainMemory::new(16);
        assert!(memory.check(12, 4).is_ok());
        assert!(memory.check(13, 4).is_err());
    }
}
