//! # Configuration Tests
//!
//! Deserialization of the flattened camelCase JSON form, defaults and the
//! collect-everything validation pass.

use pretty_assertions::assert_eq;
use rstest::rstest;
use superscalar_core::common::error::SimError;
use superscalar_core::config::*;
use superscalar_core::{Simulation, SimulationConfig};

#[test]
fn test_empty_object_yields_defaults() {
    let config: CpuConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(config, CpuConfig::default());
}

#[test]
fn test_flattened_groups() {
    let json = r#"{
        "robSize": 16,
        "commitWidth": 2,
        "btbSize": 64,
        "useGlobalHistory": false,
        "cacheReplacement": "FIFO",
        "storeBehavior": "write-back",
        "memorySize": 4096,
        "maxCycles": 500,
        "fUnits": [
            {"type": "FX", "name": "ALU", "latency": 1,
             "capabilities": [{"name": "addition", "latency": 1}]},
            {"type": "Memory", "name": "MEM", "latency": 1}
        ]
    }"#;
    let config: CpuConfig = serde_json::from_str(json).unwrap();
    assert_eq!(config.pipeline.rob_size, 16);
    assert_eq!(config.pipeline.commit_width, 2);
    assert_eq!(config.prediction.btb_size, 64);
    assert!(!config.prediction.use_global_history);
    assert_eq!(config.cache.cache_replacement, ReplacementPolicy::Fifo);
    assert_eq!(config.memory.memory_size, 4096);
    assert_eq!(config.limits.max_cycles, 500);
    assert_eq!(config.f_units.len(), 2);
    assert_eq!(config.f_units[0].capabilities[0].name, Capability::Addition);
    assert!(config.validate().is_ok());
}

#[rstest]
#[case("0bit", PredictorType::ZeroBit)]
#[case("1bit", PredictorType::OneBit)]
#[case("2bit", PredictorType::TwoBit)]
fn test_predictor_type_names(#[case] name: &str, #[case] expected: PredictorType) {
    let json = format!(r#"{{"predictorType": "{name}", "predictorDefault": "taken"}}"#);
    let config: CpuConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(config.prediction.predictor_type, expected);
}

#[rstest]
#[case("LRU", ReplacementPolicy::Lru)]
#[case("FIFO", ReplacementPolicy::Fifo)]
#[case("Random", ReplacementPolicy::Random)]
fn test_replacement_policy_names(#[case] name: &str, #[case] expected: ReplacementPolicy) {
    let json = format!(r#"{{"cacheReplacement": "{name}"}}"#);
    let config: CpuConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(config.cache.cache_replacement, expected);
}

#[rstest]
#[case::rob_too_large(|c: &mut CpuConfig| c.pipeline.rob_size = 2000, "robSize")]
#[case::fetch_zero(|c: &mut CpuConfig| c.pipeline.fetch_width = 0, "fetchWidth")]
#[case::commit_above_rob(|c: &mut CpuConfig| { c.pipeline.rob_size = 2; c.pipeline.commit_width = 3 }, "commitWidth")]
#[case::ghr_too_long(|c: &mut CpuConfig| c.prediction.ghr_size = 40, "ghrSize")]
#[case::bad_two_bit_state(|c: &mut CpuConfig| c.prediction.predictor_default = "taken".into(), "predictorDefault")]
#[case::line_not_power_of_two(|c: &mut CpuConfig| c.cache.cache_line_size = 48, "cacheLineSize")]
#[case::write_through(|c: &mut CpuConfig| c.cache.store_behavior = StoreBehavior::WriteThrough, "storeBehavior")]
#[case::stack_above_memory(|c: &mut CpuConfig| c.memory.call_stack_size = 65536, "memorySize")]
#[case::no_units(|c: &mut CpuConfig| c.f_units.clear(), "fUnits")]
fn test_single_violation(#[case] mutate: fn(&mut CpuConfig), #[case] field: &str) {
    let mut config = CpuConfig::default();
    mutate(&mut config);
    let errors = config.validate().unwrap_err();
    assert!(
        errors.iter().any(|e| e.field == field),
        "expected an error on {field}, got {errors}"
    );
}

#[test]
fn test_duplicate_unit_names() {
    let mut config = CpuConfig::default();
    let first = config.f_units[0].clone();
    config.f_units.push(first);
    let errors = config.validate().unwrap_err();
    assert!(errors.iter().any(|e| e.message.contains("duplicate unit name")));
}

#[test]
fn test_invalid_config_never_starts() {
    let mut config = SimulationConfig::with_code("addi x1, x1, 1");
    config.cpu_config.pipeline.rob_size = 0;
    config.cpu_config.memory.load_latency = 0;
    match Simulation::new(config) {
        Err(SimError::Config(errors)) => assert!(errors.iter().count() >= 2),
        other => panic!("expected configuration errors, got {other:?}"),
    }
}

#[test]
fn test_store_without_memory_unit() {
    let mut config = SimulationConfig::with_code("sw x1, 0(x2)");
    config
        .cpu_config
        .f_units
        .retain(|u| u.fu_type != FuType::Memory);
    match Simulation::new(config) {
        Err(SimError::Config(errors)) => {
            assert!(errors.iter().any(|e| e.message.contains("Memory unit")));
        }
        other => panic!("expected configuration errors, got {other:?}"),
    }
}

#[test]
fn test_simulation_config_json() {
    let json = r#"{
        "cpuConfig": {"robSize": 8, "commitWidth": 2},
        "code": "main: addi x1, x0, 3",
        "memoryLocations": [{"name": "arr", "alignment": 2, "dataType": "int", "values": [1, 2]}],
        "entryPoint": "main"
    }"#;
    let config: SimulationConfig = serde_json::from_str(json).unwrap();
    assert_eq!(config.entry_point, EntryPoint::Label("main".to_string()));
    assert_eq!(config.memory_locations[0].to_bytes(), vec![1, 0, 0, 0, 2, 0, 0, 0]);
    assert!(Simulation::new(config).is_ok());
}
