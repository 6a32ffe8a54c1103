//! Load/Store Buffers.
//!
//! In-flight memory instructions are tracked in two program-ordered queues. This
//! module provides:
//! - [`load_buffer`]: Loads with their address, forwarding source and access state.
//! - [`store_buffer`]: Stores, store-to-load forwarding and ordering-violation checks.

/// In-flight loads.
pub mod load_buffer;

/// In-flight stores and forwarding.
pub mod store_buffer;

pub use load_buffer::{LoadBuffer, LoadBufferItem, LoadState};
pub use store_buffer::{ForwardResult, StoreBuffer, StoreBufferItem, StoreState};

/// Returns true if byte ranges `[a, a + a_size)` and `[b, b + b_size)` intersect.
pub const fn overlaps(a: u64, a_size: usize, b: u64, b_size: usize) -> bool {
    a < b + b_size as u64 && b < a + a_size as u64
}
