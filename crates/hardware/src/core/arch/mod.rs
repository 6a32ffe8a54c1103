//! Architectural state of the simulated core.
//!
//! This module contains the register storage seen by instructions:
//! 1. **Registers:** Architectural integer and floating-point files, the speculative
//!    rename pool and the rename map.

/// Unified architectural/speculative register file with renaming.
pub mod regs;

pub use regs::{PrevMapping, Readiness, RegisterFile, RegisterRef};
