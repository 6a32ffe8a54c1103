//! # Stepping Tests
//!
//! Backward steps must reproduce the earlier state exactly, whether they come from
//! undo frames or from replaying after the history ran out.

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use superscalar_core::{Simulation, StopReason};

use crate::common::harness::TestContext;
use crate::common::programs::{QUICKSORT, QUICKSORT_INPUT};

fn quicksort(history_limit: usize) -> Simulation {
    TestContext::new(QUICKSORT)
        .with_ints("arr", &QUICKSORT_INPUT)
        .with_cpu(|c| c.limits.history_limit = history_limit)
        .build()
}

fn forward(sim: &mut Simulation, ticks: u64) {
    for _ in 0..ticks {
        assert!(sim.step().unwrap());
    }
}

#[test]
fn test_forward_back_forward_matches_single_run() {
    let mut sim = quicksort(4096);
    let initial = sim.state().clone();

    forward(&mut sim, 120);
    let after = sim.state().clone();
    for _ in 0..120 {
        assert!(sim.step_back().unwrap());
    }
    assert_eq!(sim.state(), &initial);

    forward(&mut sim, 120);
    assert_eq!(sim.state(), &after);
}

#[test]
fn test_replay_beyond_history() {
    let mut sim = quicksort(5);
    forward(&mut sim, 60);
    let report = sim.simulate_to(45).unwrap();
    assert_eq!(report.tick, 45);
    assert_eq!(report.ticks_simulated, 15);

    let mut reference = quicksort(5);
    forward(&mut reference, 45);
    assert_eq!(sim.state(), reference.state());
}

#[test]
fn test_history_disabled_still_steps_back() {
    let mut sim = quicksort(0);
    forward(&mut sim, 10);
    assert_eq!(sim.history_len(), 0);
    assert!(sim.step_back().unwrap());

    let mut reference = quicksort(0);
    forward(&mut reference, 9);
    assert_eq!(sim.state(), reference.state());
}

#[test]
fn test_step_back_from_stop_resumes() {
    let mut sim = TestContext::new("ret").build();
    let report = sim.run().unwrap();
    assert_eq!(report.stop_reason, StopReason::CallStackHalt);
    assert!(!sim.step().unwrap());

    assert!(sim.step_back().unwrap());
    assert_eq!(sim.stop_reason(), StopReason::NotStopped);
    let again = sim.run().unwrap();
    assert_eq!(again.stop_reason, StopReason::CallStackHalt);
    assert_eq!(again.tick, report.tick);
}

#[test]
fn test_simulate_to_stops_early() {
    let mut sim = TestContext::new("addi x1, x0, 1").build();
    let report = sim.simulate_to(10_000).unwrap();
    assert_eq!(report.stop_reason, StopReason::EndOfCode);
    assert!(report.tick < 10_000);
    assert_eq!(report.ticks_simulated, report.tick);
}

#[test]
fn test_memory_writes_are_undone() {
    let mut sim = TestContext::new(QUICKSORT)
        .with_ints("arr", &QUICKSORT_INPUT)
        .with_cpu(|c| c.cache.use_cache = false)
        .build();
    let before = sim.read_label("arr", 64).unwrap();
    let _ = sim.run().unwrap();
    assert_ne!(sim.read_label("arr", 64).unwrap(), before);
    let _ = sim.simulate_to(0).unwrap();
    assert_eq!(sim.read_label("arr", 64).unwrap(), before);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn prop_back_then_forward_is_identity(n in 1u64..150, back in 0u64..150) {
        let back = back.min(n);
        let mut sim = quicksort(64);
        let _ = sim.simulate_to(n).unwrap();
        let target = sim.state().clone();

        let _ = sim.simulate_to(n - back).unwrap();
        let mut reference = quicksort(64);
        let _ = reference.simulate_to(sim.tick()).unwrap();
        prop_assert_eq!(sim.state(), reference.state());

        let _ = sim.simulate_to(n).unwrap();
        prop_assert_eq!(sim.state(), &target);
    }
}
