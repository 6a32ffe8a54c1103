//! Core processor implementation.
//!
//! This module contains the out-of-order core: the register file with renaming, the
//! in-flight instruction records, the pipeline stages, the execution and memory units,
//! and the state container that ticks them in order.

/// Architectural and speculative registers.
pub mod arch;

/// CPU state and tick orchestration.
pub mod cpu;

/// In-flight instruction records.
pub mod instruction;

/// Pipeline stages (fetch, decode, dispatch/commit, issue, execute, load/store).
pub mod pipeline;

/// Execution units (functional units, branch prediction, load/store buffers, cache).
pub mod units;

use crate::config::CpuConfig;
use crate::program::Program;

pub use self::cpu::{CpuState, StopReason};

/// Immutable inputs shared by every tick.
#[derive(Debug, Clone)]
pub struct Context {
    /// Validated core parameters.
    pub config: CpuConfig,
    /// Loaded program.
    pub program: Program,
}
