//! # Snapshot Tests
//!
//! JSON snapshots restore an equal, independent simulation; clones never share state.

use pretty_assertions::assert_eq;
use superscalar_core::{Simulation, Snapshot, StopReason};

use crate::common::harness::{TestContext, read_ints};
use crate::common::programs::{QUICKSORT, QUICKSORT_INPUT};

fn quicksort() -> Simulation {
    TestContext::new(QUICKSORT)
        .with_ints("arr", &QUICKSORT_INPUT)
        .build()
}

#[test]
fn test_json_round_trip_restores_equal_state() {
    let mut sim = quicksort();
    let _ = sim.simulate_to(80).unwrap();

    let json = sim.snapshot().to_json().unwrap();
    let snapshot = Snapshot::from_json(&json).unwrap();
    assert_eq!(snapshot, sim.snapshot());

    let mut restored = Simulation::from_snapshot(snapshot).unwrap();
    assert_eq!(restored.state(), sim.state());

    let a = sim.run().unwrap();
    let b = restored.run().unwrap();
    assert_eq!(a.stop_reason, StopReason::CallStackHalt);
    assert_eq!(a.tick, b.tick);
    assert_eq!(restored.state(), sim.state());
}

#[test]
fn test_restored_simulation_steps_back_by_replay() {
    let mut sim = quicksort();
    let _ = sim.simulate_to(30).unwrap();
    let mut restored = Simulation::from_snapshot(sim.snapshot()).unwrap();
    assert_eq!(restored.history_len(), 0);

    assert!(restored.step_back().unwrap());
    assert!(sim.step_back().unwrap());
    assert_eq!(restored.state(), sim.state());
}

#[test]
fn test_clone_is_independent() {
    let mut sim = quicksort();
    let _ = sim.simulate_to(8).unwrap();
    let copy = sim.clone();

    let _ = sim.run().unwrap();
    assert_eq!(copy.tick(), 8);
    assert_eq!(copy.stop_reason(), StopReason::NotStopped);
    assert_eq!(read_ints(&copy, "arr", 16), QUICKSORT_INPUT.map(|v| v as i32).to_vec());
    assert_eq!(read_ints(&sim, "arr", 16), (1..=16).collect::<Vec<i32>>());
}

#[test]
fn test_simulation_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Simulation>();
}
