//! # Unit Components
//!
//! Organizes the simulator tests by component: configuration, instruction set, program
//! loading, the core pipeline, the stepping API and statistics.

/// Configuration parsing, defaults and validation.
pub mod config;

/// Pipeline, prediction and memory behavior of the core.
pub mod core;

/// Instruction table and expression interpreter.
pub mod isa;

/// Assembly parsing and data layout.
pub mod program;

/// Stepping, backward simulation and snapshots.
pub mod sim;

/// Statistics consistency after complete runs.
pub mod stats_verification;
