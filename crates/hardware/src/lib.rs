//! Superscalar out-of-order RISC-V core simulator library.
//!
//! This crate implements a cycle-accurate model of a superscalar core with the following:
//! 1. **Front End:** Multi-instruction fetch steered by a BTB and 0/1/2-bit direction
//!    predictors with optional GShare indexing, decode with register renaming.
//! 2. **Back End:** Reorder buffer, per-class issue windows, configurable functional
//!    units, load/store buffers with store-to-load forwarding.
//! 3. **Memory:** Optional write-back cache (LRU, FIFO or seeded Random) in front of a
//!    flat main memory.
//! 4. **ISA:** RV32IM and single-precision F instructions described by an embedded JSON
//!    table and interpreted at execution time.
//! 5. **Simulation:** Forward and bit-identical backward stepping, snapshots and
//!    statistics.

/// Common types (typed values, errors, undo capture).
pub mod common;
/// Simulator configuration (defaults, enums, validation).
pub mod config;
/// Processor core (registers, in-flight instructions, pipeline, units).
pub mod core;
/// Instruction set table and expression interpreter.
pub mod isa;
/// Assembly parsing and memory layout.
pub mod program;
/// Stepping API and snapshots.
pub mod sim;
/// Simulation statistics collection and reporting.
pub mod stats;

/// Core parameters; use `CpuConfig::default()` or deserialize from JSON.
pub use crate::config::{CpuConfig, SimulationConfig};
/// Complete core state; compared and serialized by value.
pub use crate::core::{CpuState, StopReason};
/// Top-level driver; construct with `Simulation::new`.
pub use crate::sim::{Simulation, SimulationReport, Snapshot};
