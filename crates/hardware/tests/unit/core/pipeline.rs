//! # Pipeline Scenario Tests
//!
//! Whole programs through fetch, rename, issue, execute and commit, checked through
//! architectural results, stop reasons and pipeline occupancy.

use pretty_assertions::assert_eq;
use rstest::rstest;
use superscalar_core::{Simulation, StopReason};
use superscalar_core::common::error::RuntimeException;

use crate::common::harness::{TestContext, read_ints, reg};
use crate::common::programs::{COUNTDOWN, QUICKSORT, QUICKSORT_INPUT};

#[test]
fn test_single_addi_commits() {
    let (sim, report) = TestContext::new("addi x1, x1, 5").run();
    assert_eq!(report.stop_reason, StopReason::EndOfCode);
    assert_eq!(sim.stats().committed, 1);
    assert_eq!(reg(&sim, "x1"), 5);
}

#[test]
fn test_initial_registers() {
    let sim = TestContext::new("nop").build();
    assert_eq!(sim.register("sp"), Some(512));
    assert_eq!(sim.register("ra"), Some(0));
    assert_eq!(sim.register("x1"), Some(0));
    assert_eq!(sim.register("a0"), Some(0));
}

#[test]
fn test_negative_addi_from_zero() {
    let (sim, _) = TestContext::new("addi x1, x1, -14").run();
    assert_eq!(reg(&sim, "x1"), -14);
}

#[test]
fn test_dependent_chain() {
    let code = "\
li   t0, 6
li   t1, 7
mul  t2, t0, t1
addi t2, t2, -2
sub  t3, t2, t0
";
    let (sim, _) = TestContext::new(code).run();
    assert_eq!(reg(&sim, "t2"), 40);
    assert_eq!(reg(&sim, "t3"), 34);
    assert_eq!(sim.stats().committed, 5);
}

#[test]
fn test_writes_to_x0_are_discarded() {
    let (sim, _) = TestContext::new("addi x0, x0, 9\naddi x1, x0, 1").run();
    assert_eq!(reg(&sim, "x0"), 0);
    assert_eq!(reg(&sim, "x1"), 1);
}

#[test]
fn test_division_by_zero_stops_at_commit() {
    let code = "\
li  x1, 7
li  x2, 0
li  x3, 99
div x3, x1, x2
addi x4, x0, 1
";
    let (sim, report) = TestContext::new(code).run();
    assert_eq!(report.stop_reason, StopReason::Exception);
    let committed = sim.state().status.exception.clone().unwrap();
    assert_eq!(committed.exception, RuntimeException::DivisionByZero);
    assert_eq!(committed.pc, 12);
    assert_eq!(reg(&sim, "x3"), 99);
    assert_eq!(reg(&sim, "x4"), 0);
    assert_eq!(sim.stats().committed, 3);
}

#[test]
fn test_exception_on_wrong_path_is_discarded() {
    let code = "\
    j    skip
    div  x3, x1, x0
skip:
    addi x1, x0, 1
";
    let (sim, report) = TestContext::new(code).run();
    assert_eq!(report.stop_reason, StopReason::EndOfCode);
    assert_eq!(reg(&sim, "x1"), 1);
    assert_eq!(reg(&sim, "x3"), 0);
}

#[test]
fn test_out_of_range_load_raises() {
    let (_, report) = TestContext::new("li x1, 100000\nlw x2, 0(x1)").run();
    assert_eq!(report.stop_reason, StopReason::Exception);
}

#[test]
fn test_ret_from_entry_halts() {
    let (sim, report) = TestContext::new("ret\naddi x1, x0, 1").run();
    assert_eq!(report.stop_reason, StopReason::CallStackHalt);
    assert_eq!(reg(&sim, "x1"), 0);
}

#[test]
fn test_return_through_restored_ra_halts() {
    let code = "\
main:
    addi sp, sp, -8
    sw   ra, 0(sp)
    li   a0, 4
    call f
    lw   ra, 0(sp)
    addi sp, sp, 8
    jr   ra
f:
    slli a0, a0, 1
    ret
";
    let (sim, report) = TestContext::new(code).run();
    assert_eq!(report.stop_reason, StopReason::CallStackHalt);
    assert_eq!(reg(&sim, "a0"), 8);
    assert_eq!(reg(&sim, "ra"), 0);
}

#[test]
fn test_ret_before_callee_halts() {
    let code = "\
main:
    li   a0, 8
    ret
f:
    slli a0, a0, 1
    ret
";
    let (sim, report) = TestContext::new(code).run();
    assert_eq!(report.stop_reason, StopReason::CallStackHalt);
    assert_eq!(sim.stats().committed, 2);
    assert_eq!(reg(&sim, "a0"), 8);
}

#[test]
fn test_function_call_and_return() {
    let code = "\
main:
    addi sp, sp, -4
    sw   ra, 0(sp)
    li   a0, 20
    call double
    lw   ra, 0(sp)
    addi sp, sp, 4
    ret
double:
    add  a0, a0, a0
    ret
";
    let (sim, report) = TestContext::new(code).run();
    assert_eq!(report.stop_reason, StopReason::CallStackHalt);
    assert_eq!(reg(&sim, "a0"), 40);
    assert_eq!(reg(&sim, "sp"), 512);
}

#[test]
fn test_quicksort_sorts_in_place() {
    let (sim, report) = TestContext::new(QUICKSORT)
        .with_ints("arr", &QUICKSORT_INPUT)
        .run();
    assert_eq!(report.stop_reason, StopReason::CallStackHalt);
    assert_eq!(read_ints(&sim, "arr", 16), (1..=16).collect::<Vec<i32>>());
}

#[test]
fn test_quicksort_without_cache() {
    let (sim, report) = TestContext::new(QUICKSORT)
        .with_ints("arr", &QUICKSORT_INPUT)
        .with_cpu(|c| c.cache.use_cache = false)
        .run();
    assert_eq!(report.stop_reason, StopReason::CallStackHalt);
    assert_eq!(read_ints(&sim, "arr", 16), (1..=16).collect::<Vec<i32>>());
    assert_eq!(sim.stats().cache_accesses, 0);
}

#[test]
fn test_store_then_load_same_address() {
    let code = "\
li   x1, 42
addi x2, x2, -4
sw   x1, 0(x2)
lw   x3, 0(x2)
";
    let (sim, _) = TestContext::new(code).run();
    assert_eq!(reg(&sim, "x3"), 42);
    let stats = sim.stats();
    assert_eq!(stats.forwarded_loads, 1);
    assert_eq!(stats.memory_loads, 0);
}

#[test]
fn test_load_ahead_of_unresolved_store_is_replayed() {
    // The store address waits on the divide; the load to the same word runs first.
    let code = "\
li   x5, 50
li   x6, 2
li   x7, 77
div  x8, x5, x6
slli x8, x8, 2
sw   x7, 0(x8)
lw   x9, 100(x0)
addi x10, x9, 1
";
    let mut sim = TestContext::new(code).build();
    let mut states = vec![sim.state().clone()];
    while sim.step().unwrap() {
        states.push(sim.state().clone());
    }
    assert_eq!(sim.stop_reason(), StopReason::EndOfCode);
    assert_eq!(reg(&sim, "x9"), 77);
    assert_eq!(reg(&sim, "x10"), 78);
    assert!(sim.stats().rob_flushes >= 1);

    let last = states.len() - 1;
    for expected in states[..last].iter().rev() {
        assert!(sim.step_back().unwrap());
        assert_eq!(sim.state(), expected);
    }
    let report = sim.run().unwrap();
    assert_eq!(report.stop_reason, StopReason::EndOfCode);
    assert_eq!(sim.state(), &states[last]);
}

#[test]
fn test_narrow_loads_extend() {
    let code = "\
li  x1, -1
sb  x1, 0(x0)
lb  x2, 0(x0)
lbu x3, 0(x0)
";
    let (sim, _) = TestContext::new(code).run();
    assert_eq!(reg(&sim, "x2"), -1);
    assert_eq!(reg(&sim, "x3"), 255);
}

#[test]
fn test_full_rob_stalls_decode() {
    let code = (1..=9)
        .map(|i| format!("addi x{i}, x0, {i}"))
        .collect::<Vec<_>>()
        .join("\n");
    let mut sim = TestContext::new(&code)
        .with_cpu(|c| {
            c.pipeline.rob_size = 3;
            c.pipeline.commit_width = 3;
            c.pipeline.fetch_width = 3;
        })
        .build();

    for _ in 0..3 {
        assert!(sim.step().unwrap());
    }
    assert_eq!(sim.state().decode.buffer.len(), 3);
    assert_eq!(sim.state().rob.len(), 3);
    assert!(!sim.state().decode.stalled);

    assert!(sim.step().unwrap());
    assert_eq!(sim.stats().committed, 0);
    assert!(sim.state().decode.stalled);

    while sim.stats().committed == 0 {
        assert!(sim.state().decode.stalled);
        assert!(sim.step().unwrap());
    }
    let report = sim.run().unwrap();
    assert_eq!(report.stop_reason, StopReason::EndOfCode);
    assert_eq!(reg(&sim, "x9"), 9);
}

#[test]
fn test_occupancy_and_commit_width_bounds() {
    let mut sim = TestContext::new(QUICKSORT)
        .with_ints("arr", &QUICKSORT_INPUT)
        .with_cpu(|c| {
            c.pipeline.rob_size = 8;
            c.pipeline.commit_width = 2;
        })
        .build();
    let mut committed = 0;
    while sim.step().unwrap() {
        let state = sim.state();
        assert!(state.rob.len() <= 8);
        let ids: Vec<u64> = state.rob.iter().collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]), "rob out of order: {ids:?}");
        assert!(state.stats.committed - committed <= 2);
        committed = state.stats.committed;
    }
    assert_eq!(sim.stop_reason(), StopReason::CallStackHalt);
}

#[test]
fn test_max_cycles_stops_infinite_loop() {
    let (sim, report) = TestContext::new("loop: j loop")
        .with_cpu(|c| c.limits.max_cycles = 50)
        .run();
    assert_eq!(report.stop_reason, StopReason::MaxCycles);
    assert_eq!(sim.tick(), 50);
}

#[test]
fn test_float_arithmetic() {
    let code = "\
li        x1, 3
fcvt.s.w  f1, x1
fadd.s    f2, f1, f1
fcvt.w.s  x2, f2
";
    let (sim, _) = TestContext::new(code).run();
    assert_eq!(reg(&sim, "x2"), 6);
    assert_eq!(sim.stats().inst_float_arith, 3);
}

#[rstest]
#[case::one_branch(1, 1)]
#[case::two_branches(2, 2)]
#[case::three_branches(3, 4)]
fn test_fetch_group_stops_before_extra_branch(#[case] limit: usize, #[case] group: usize) {
    let code = "\
bne  x0, x0, end
bne  x0, x0, end
bne  x0, x0, end
addi x1, x0, 1
end:
nop
";
    let mut sim = TestContext::new(code)
        .with_cpu(|c| {
            c.pipeline.fetch_width = 4;
            c.pipeline.branch_follow_limit = limit;
        })
        .build();
    assert!(sim.step().unwrap());
    assert_eq!(sim.state().fetch.group.len(), group);
}

fn countdown(flush_penalty: u32) -> Simulation {
    let (sim, report) = TestContext::new(COUNTDOWN)
        .with_cpu(|c| c.pipeline.flush_penalty = flush_penalty)
        .run();
    assert_eq!(report.stop_reason, StopReason::EndOfCode);
    assert_eq!(reg(&sim, "x1"), 0);
    sim
}

#[rstest]
#[case(1)]
#[case(3)]
#[case(10)]
fn test_flush_penalty_idles_fetch(#[case] penalty: u32) {
    let base = countdown(0);
    let slowed = countdown(penalty);
    let flushes = slowed.stats().rob_flushes;
    assert!(flushes >= 1);
    assert_eq!(flushes, base.stats().rob_flushes);
    assert_eq!(slowed.tick(), base.tick() + u64::from(penalty) * flushes);
    assert_eq!(slowed.state().ghr.snapshot_count(), 0);
}
