//! # Cache Behavior Tests
//!
//! Counters and contents of the data cache observed through whole programs.

use pretty_assertions::assert_eq;
use rstest::rstest;
use superscalar_core::config::ReplacementPolicy;

use crate::common::harness::{TestContext, read_ints};
use crate::common::programs::{QUICKSORT, QUICKSORT_INPUT};

fn sorted_with(policy: ReplacementPolicy, lines: usize) -> superscalar_core::Simulation {
    let (sim, _) = TestContext::new(QUICKSORT)
        .with_ints("arr", &QUICKSORT_INPUT)
        .with_cpu(|c| {
            c.cache.cache_replacement = policy;
            c.cache.cache_lines = lines;
            c.cache.cache_assoc = 2;
            c.cache.cache_line_size = 16;
        })
        .run();
    sim
}

#[rstest]
#[case(ReplacementPolicy::Lru)]
#[case(ReplacementPolicy::Fifo)]
#[case(ReplacementPolicy::Random)]
fn test_every_policy_sorts_correctly(#[case] policy: ReplacementPolicy) {
    let sim = sorted_with(policy, 4);
    assert_eq!(read_ints(&sim, "arr", 16), (1..=16).collect::<Vec<i32>>());
    let stats = sim.stats();
    assert_eq!(stats.cache_hits + stats.cache_misses, stats.cache_accesses);
    assert!(stats.cache_misses > 0);
}

#[test]
fn test_random_policy_is_deterministic() {
    let a = sorted_with(ReplacementPolicy::Random, 4);
    let b = sorted_with(ReplacementPolicy::Random, 4);
    assert_eq!(a.stats(), b.stats());
    assert_eq!(a.state(), b.state());
}

#[test]
fn test_dirty_lines_visible_before_write_back() {
    let code = "\
li  x1, 1234
sw  x1, 600(x0)
";
    let (sim, _) = TestContext::new(code).run();
    assert_eq!(sim.read_memory(600, 4), 1234i32.to_le_bytes().to_vec());
    let cache = sim.state().cache.as_ref().unwrap();
    assert!(cache.contains(600));
}

#[test]
fn test_small_cache_writes_back() {
    let sim = sorted_with(ReplacementPolicy::Lru, 2);
    assert!(sim.stats().cache_write_backs > 0);
}
