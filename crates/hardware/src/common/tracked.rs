//! Per-tick undo capture for pipeline components.
//!
//! A [`Tracked`] cell owns one component of the CPU state. The first mutable borrow
//! within a tick stores a copy of the value as it was before the tick; at the end of the
//! tick the copy is moved into the undo frame. Restoring the copy steps the component
//! back exactly one tick.

use std::ops::Deref;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A component value with lazily captured pre-tick state.
///
/// Reads go through `Deref`; writes must go through [`Tracked::get_mut`].
#[derive(Debug, Clone, Default)]
pub struct Tracked<T> {
    value: T,
    before: Option<T>,
}

impl<T: Clone> Tracked<T> {
    /// Wraps an initial value. Nothing is captured until the first mutation.
    pub const fn new(value: T) -> Self {
        Self {
            value,
            before: None,
        }
    }

    /// Mutable access; captures the pre-tick value on first use within a tick.
    pub fn get_mut(&mut self) -> &mut T {
        if self.before.is_none() {
            self.before = Some(self.value.clone());
        }
        &mut self.value
    }

    /// Moves the captured pre-tick value out, ending the current capture window.
    pub fn take_before(&mut self) -> Option<T> {
        self.before.take()
    }

    /// Replaces the value with a previously captured one.
    pub fn restore(&mut self, value: T) {
        self.value = value;
        self.before = None;
    }

    /// Drops the capture without restoring it.
    pub fn seal(&mut self) {
        self.before = None;
    }
}

impl<T> Deref for Tracked<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T: PartialEq> PartialEq for Tracked<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T: Eq> Eq for Tracked<T> {}

impl<T: Serialize> Serialize for Tracked<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value.serialize(serializer)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Tracked<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        T::deserialize(deserializer).map(|value| Self {
            value,
            before: None,
        })
    }
}
