//! Load Buffer.
//!
//! Loads enter at dispatch in program order and leave at commit or flush. Each entry
//! records the effective address once the load/store unit computes it and how the
//! value was obtained, which the store buffer needs to detect ordering violations.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::overlaps;

/// Progress of a load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadState {
    /// Address not computed yet.
    #[default]
    WaitingAddress,
    /// Address known; waiting for forwarding or a memory unit.
    AddressReady,
    /// Value forwarded from store `from`.
    Forwarded {
        /// Id of the forwarding store.
        from: u64,
    },
    /// A memory unit is reading the value.
    Accessing,
    /// Value read from memory.
    Done,
}

impl LoadState {
    /// Returns true once the load obtained its value (or is obtaining it).
    pub const fn has_value(self) -> bool {
        matches!(self, Self::Forwarded { .. } | Self::Accessing | Self::Done)
    }
}

/// One in-flight load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBufferItem {
    /// Instruction id.
    pub id: u64,
    /// Effective address.
    pub address: Option<u64>,
    /// Access width in bytes.
    pub size: usize,
    /// Sign-extend the loaded value.
    pub signed: bool,
    /// Progress.
    pub state: LoadState,
}

/// Program-ordered queue of loads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBuffer {
    capacity: usize,
    items: VecDeque<LoadBufferItem>,
}

impl LoadBuffer {
    /// Empty buffer holding at most `capacity` loads.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: VecDeque::with_capacity(capacity),
        }
    }

    /// Number of loads.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if no load is in flight.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns true if `extra` more loads would not fit.
    pub fn is_full(&self, extra: usize) -> bool {
        self.items.len() + extra > self.capacity
    }

    /// Appends a dispatched load.
    pub fn push(&mut self, id: u64, size: usize, signed: bool) {
        self.items.push_back(LoadBufferItem {
            id,
            address: None,
            size,
            signed,
            state: LoadState::WaitingAddress,
        });
    }

    /// Load `id`.
    pub fn get(&self, id: u64) -> Option<&LoadBufferItem> {
        self.items.iter().find(|i| i.id == id)
    }

    /// Mutable load `id`.
    pub fn get_mut(&mut self, id: u64) -> Option<&mut LoadBufferItem> {
        self.items.iter_mut().find(|i| i.id == id)
    }

    /// Loads in program order.
    pub fn iter(&self) -> impl Iterator<Item = &LoadBufferItem> {
        self.items.iter()
    }

    /// Id of the oldest load.
    pub fn head(&self) -> Option<u64> {
        self.items.front().map(|i| i.id)
    }

    /// Ids of loads whose address is known but whose value is not.
    pub fn ready_ids(&self) -> Vec<u64> {
        self.items
            .iter()
            .filter(|i| i.state == LoadState::AddressReady)
            .map(|i| i.id)
            .collect()
    }

    /// Removes load `id` at commit.
    pub fn release(&mut self, id: u64) {
        self.items.retain(|i| i.id != id);
    }

    /// Drops loads with id `>= first`.
    pub fn flush_from(&mut self, first: u64) {
        self.items.retain(|i| i.id < first);
    }

    /// Oldest load younger than store `store_id` that overlaps the store and already
    /// has a value not forwarded from a store younger than `store_id`.
    pub fn first_violation(&self, store_id: u64, address: u64, size: usize) -> Option<u64> {
        self.items
            .iter()
            .filter(|l| l.id > store_id && l.state.has_value())
            .filter(|l| !matches!(l.state, LoadState::Forwarded { from } if from > store_id))
            .find(|l| l.address.is_some_and(|a| overlaps(a, l.size, address, size)))
            .map(|l| l.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity() {
        let mut buffer = LoadBuffer::new(2);
        buffer.push(1, 4, true);
        assert!(!buffer.is_full(1));
        assert!(buffer.is_full(2));
    }

    #[test]
    fn test_violation_ignores_loads_forwarded_from_younger_store() {
        let mut buffer = LoadBuffer::new(4);
        buffer.push(5, 4, true);
        buffer.push(8, 4, true);
        for (id, state) in [(5, LoadState::Forwarded { from: 4 }), (8, LoadState::Done)] {
            let item = buffer.get_mut(id).unwrap();
            item.address = Some(100);
            item.state = state;
        }
        assert_eq!(buffer.first_violation(3, 100, 4), Some(8));
        assert_eq!(buffer.first_violation(9, 100, 4), None);
        assert_eq!(buffer.first_violation(3, 200, 4), None);
    }
}
