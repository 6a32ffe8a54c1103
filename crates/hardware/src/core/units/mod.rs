//! Execution units and functional components.
//!
//! This module contains the hardware blocks the pipeline drives: functional units,
//! branch prediction, the load and store buffers, the data cache and main memory.

/// Branch prediction unit: bit predictors, PHT, GHR, GShare and BTB.
pub mod bru;

/// Data cache with replacement policies and write-back.
pub mod cache;

/// Functional units (FX, FP, branch, load/store, memory).
pub mod fu;

/// Load and store buffers with store-to-load forwarding.
pub mod lsu;

/// Main memory and cache-aware access helpers.
pub mod memory;
