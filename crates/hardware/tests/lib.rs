//! # Hardware Testing Library
//!
//! Central entry point for the simulator's integration tests. Scenarios build whole
//! simulations from assembly snippets and check architectural results, statistics and
//! the stepping API.

/// Shared test infrastructure.
///
/// - **Harness**: A `TestContext` that assembles a configuration, builds the simulation
///   and runs it.
/// - **Programs**: Reusable assembly sources.
pub mod common;

/// Unit tests for the simulator components.
pub mod unit;
