//! Shared test infrastructure.

/// Simulation builder and run helpers.
pub mod harness;

/// Reusable assembly programs.
pub mod programs;
