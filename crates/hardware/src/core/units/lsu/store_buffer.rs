//! Store Buffer.
//!
//! Stores enter at dispatch in program order. A store writes memory only when it reaches
//! the head of the reorder buffer, so until then younger loads read its data through
//! forwarding:
//! 1. **Hit:** The youngest older store with a known, overlapping address covers the load
//!    exactly and its data register is ready.
//! 2. **Stall:** Such a store exists but cannot forward (partial overlap, data pending).
//! 3. **Miss:** No older store overlaps; the load goes to memory.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::overlaps;
use crate::core::arch::{RegisterFile, RegisterRef};

/// Progress of a store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreState {
    /// Address not computed yet.
    #[default]
    WaitingAddress,
    /// Address known; waiting to reach the reorder buffer head.
    AddressReady,
    /// A memory unit is writing the data.
    Accessing,
    /// Data written.
    Done,
}

/// One in-flight store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreBufferItem {
    /// Instruction id.
    pub id: u64,
    /// Effective address.
    pub address: Option<u64>,
    /// Access width in bytes.
    pub size: usize,
    /// Register holding the data.
    pub source: RegisterRef,
    /// Progress.
    pub state: StoreState,
}

/// Result of searching the store buffer for a load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardResult {
    /// Store `from` supplies the loaded bytes.
    Hit {
        /// Id of the forwarding store.
        from: u64,
        /// Register holding its data.
        register: RegisterRef,
    },
    /// No older store touches the loaded bytes.
    Miss,
    /// An older store touches the bytes but cannot forward yet.
    Stall,
}

/// Program-ordered queue of stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreBuffer {
    capacity: usize,
    items: VecDeque<StoreBufferItem>,
}

impl StoreBuffer {
    /// Empty buffer holding at most `capacity` stores.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: VecDeque::with_capacity(capacity),
        }
    }

    /// Number of stores.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if no store is in flight.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns true if `extra` more stores would not fit.
    pub fn is_full(&self, extra: usize) -> bool {
        self.items.len() + extra > self.capacity
    }

    /// Appends a dispatched store whose data lives in `source`.
    pub fn push(&mut self, id: u64, size: usize, source: RegisterRef) {
        self.items.push_back(StoreBufferItem {
            id,
            address: None,
            size,
            source,
            state: StoreState::WaitingAddress,
        });
    }

    /// Store `id`.
    pub fn get(&self, id: u64) -> Option<&StoreBufferItem> {
        self.items.iter().find(|i| i.id == id)
    }

    /// Mutable store `id`.
    pub fn get_mut(&mut self, id: u64) -> Option<&mut StoreBufferItem> {
        self.items.iter_mut().find(|i| i.id == id)
    }

    /// Stores in program order.
    pub fn iter(&self) -> impl Iterator<Item = &StoreBufferItem> {
        self.items.iter()
    }

    /// Oldest store.
    pub fn head(&self) -> Option<&StoreBufferItem> {
        self.items.front()
    }

    /// Removes store `id` at commit.
    pub fn release(&mut self, id: u64) {
        self.items.retain(|i| i.id != id);
    }

    /// Drops stores with id `>= first`.
    pub fn flush_from(&mut self, first: u64) {
        self.items.retain(|i| i.id < first);
    }

    /// Looks for data a load `load_id` of `size` bytes at `address` can take from an
    /// older store.
    ///
    /// Stores whose address is still unknown are skipped; if one of them turns out to
    /// overlap, the store unit detects the violation later.
    pub fn forward(&self, load_id: u64, address: u64, size: usize, regs: &RegisterFile) -> ForwardResult {
        let youngest = self
            .items
            .iter()
            .rev()
            .filter(|s| s.id < load_id)
            .find(|s| s.address.is_some_and(|a| overlaps(a, s.size, address, size)));
        let Some(store) = youngest else {
            return ForwardResult::Miss;
        };
        if store.address == Some(address) && store.size == size && regs.is_ready(store.source) {
            ForwardResult::Hit {
                from: store.id,
                register: store.source,
            }
        } else {
            ForwardResult::Stall
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::abi::ArchReg;

    fn buffer_with(stores: &[(u64, Option<u64>, usize)]) -> StoreBuffer {
        let mut buffer = StoreBuffer::new(8);
        for &(id, address, size) in stores {
            buffer.push(id, size, RegisterRef::Arch(ArchReg::int(5)));
            if let Some(item) = buffer.get_mut(id) {
                item.address = address;
                if address.is_some() {
                    item.state = StoreState::AddressReady;
                }
            }
        }
        buffer
    }

    #[test]
    fn test_forward_from_youngest_older_store() {
        let regs = RegisterFile::new(4);
        let buffer = buffer_with(&[(1, Some(64), 4), (3, Some(64), 4), (9, Some(64), 4)]);
        assert_eq!(
            buffer.forward(5, 64, 4, &regs),
            ForwardResult::Hit {
                from: 3,
                register: RegisterRef::Arch(ArchReg::int(5)),
            }
        );
    }

    #[test]
    fn test_partial_overlap_stalls() {
        let regs = RegisterFile::new(4);
        let buffer = buffer_with(&[(1, Some(64), 4)]);
        assert_eq!(buffer.forward(2, 66, 4, &regs), ForwardResult::Stall);
        assert_eq!(buffer.forward(2, 64, 1, &regs), ForwardResult::Stall);
    }

    #[test]
    fn test_unknown_and_disjoint_addresses_miss() {
        let regs = RegisterFile::new(4);
        let buffer = buffer_with(&[(1, None, 4), (2, Some(128), 4)]);
        assert_eq!(buffer.forward(3, 64, 4, &regs), ForwardResult::Miss);
    }

    #[test]
    fn test_pending_data_stalls() {
        let mut regs = RegisterFile::new(4);
        let (n, _) = regs.allocate(ArchReg::int(5), 0).unwrap();
        let mut buffer = StoreBuffer::new(2);
        buffer.push(1, 4, RegisterRef::Speculative(n));
        buffer.get_mut(1).unwrap().address = Some(32);
        assert_eq!(buffer.forward(2, 32, 4, &regs), ForwardResult::Stall);
        regs.write(n, 11);
        assert!(matches!(buffer.forward(2, 32, 4, &regs), ForwardResult::Hit { from: 1, .. }));
    }
}
