//! # Statistics Verification
//!
//! Cross-checks the counters a finished run reports against each other.

use rstest::rstest;
use superscalar_core::stats::{STATS_SECTIONS, SimStats};

use crate::common::harness::TestContext;
use crate::common::programs::{COUNTDOWN, QUICKSORT, QUICKSORT_INPUT};

fn quicksort_stats(use_cache: bool) -> SimStats {
    let (sim, _) = TestContext::new(QUICKSORT)
        .with_ints("arr", &QUICKSORT_INPUT)
        .with_cpu(|c| c.cache.use_cache = use_cache)
        .run();
    sim.stats().clone()
}

#[rstest]
#[case(true)]
#[case(false)]
fn test_counters_are_consistent(#[case] use_cache: bool) {
    let stats = quicksort_stats(use_cache);
    let by_class = stats.inst_int_arith
        + stats.inst_float_arith
        + stats.inst_load
        + stats.inst_store
        + stats.inst_branch;
    assert_eq!(by_class, stats.committed);
    assert_eq!(stats.mnemonics.values().sum::<u64>(), stats.committed);

    assert!(stats.fetched >= stats.decoded);
    assert!(stats.decoded >= stats.committed);
    assert!(stats.correctly_predicted <= stats.inst_branch);
    assert!(stats.conditional_branches <= stats.inst_branch);
    assert!(stats.taken_branches <= stats.inst_branch);
    assert!(
        stats.memory_loads + stats.forwarded_loads >= stats.inst_load,
        "every committed load was served by memory or forwarding"
    );

    if use_cache {
        assert_eq!(stats.cache_hits + stats.cache_misses, stats.cache_accesses);
        assert!(stats.cache_accesses > 0);
    } else {
        assert_eq!(stats.cache_accesses, 0);
    }
}

#[test]
fn test_ipc_matches_counters() {
    let stats = quicksort_stats(true);
    assert!(stats.cycles > 0);
    let expected = stats.committed as f64 / stats.cycles as f64;
    assert!((stats.ipc() - expected).abs() < 1e-12);
    assert!(stats.ipc() > 0.0);
}

#[test]
fn test_cycles_follow_ticks() {
    let (sim, report) = TestContext::new(COUNTDOWN).run();
    assert_eq!(sim.stats().cycles, report.tick);
    assert_eq!(sim.stats().mnemonics.get("bnez").copied(), Some(10));
}

#[test]
fn test_busy_ticks_bounded_by_cycles() {
    let stats = quicksort_stats(true);
    assert!(!stats.unit_busy.is_empty());
    for (name, busy) in &stats.unit_busy {
        assert!(*busy <= stats.cycles, "{name} busy {busy} of {}", stats.cycles);
    }
}

#[test]
fn test_render_sections() {
    let stats = quicksort_stats(true);
    let all = stats.render_sections(&[]);
    for header in ["PIPELINE", "INSTRUCTION MIX", "BRANCH PREDICTION", "FUNCTIONAL UNITS", "MEMORY HIERARCHY"] {
        assert!(all.contains(header), "missing {header}");
    }
    assert_eq!(STATS_SECTIONS.len(), 6);

    let branch_only = stats.render_sections(&["branch".to_string()]);
    assert!(branch_only.contains("BRANCH PREDICTION"));
    assert!(!branch_only.contains("MEMORY HIERARCHY"));
    assert!(!branch_only.contains("sim_ipc"));
}

#[test]
fn test_stats_serialize_to_json() {
    let stats = quicksort_stats(false);
    let json = serde_json::to_string(&stats).unwrap();
    let back: SimStats = serde_json::from_str(&json).unwrap();
    assert_eq!(back, stats);
}
