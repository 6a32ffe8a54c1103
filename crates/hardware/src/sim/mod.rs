//! Simulation driver.
//!
//! Owns an immutable context (configuration, program) next to the mutable core state
//! and provides:
//! 1. **Stepping:** Forward and backward single ticks, runs to a target tick, runs to
//!    completion.
//! 2. **History:** A bounded queue of undo frames; older ticks are reached by replaying
//!    from the initial state.
//! 3. **Snapshots:** Serializable configuration plus state, restorable into an
//!    independent simulation.

/// Stepping API.
pub mod simulation;

/// Serializable simulation snapshots.
pub mod snapshot;

pub use simulation::{Simulation, SimulationReport};
pub use snapshot::Snapshot;
