//! # Program Loading Tests
//!
//! Labels, operand forms, the `.data` section, configured memory locations and error
//! collection.

use pretty_assertions::assert_eq;
use superscalar_core::common::error::SimError;
use superscalar_core::config::{EntryPoint, SimulationConfig};
use superscalar_core::isa::Isa;
use superscalar_core::program::{INSTRUCTION_SIZE, Program, StaticOperand};

use crate::common::harness::{TestContext, read_ints};

fn load(config: &SimulationConfig) -> Result<Program, SimError> {
    Program::load(config, &Isa::embedded().unwrap())
}

#[test]
fn test_code_labels_are_instruction_addresses() {
    let config = SimulationConfig::with_code("start:\n  nop\n  nop\nend: nop\n");
    let program = load(&config).unwrap();
    assert_eq!(program.label("start"), Some(0));
    assert_eq!(program.label("end"), Some(2 * INSTRUCTION_SIZE));
    assert_eq!(program.instructions.len(), 3);
}

#[test]
fn test_branch_offsets_are_pc_relative() {
    let config = SimulationConfig::with_code("  nop\nback:\n  nop\n  bnez x1, back\n");
    let program = load(&config).unwrap();
    let branch = &program.instructions[2];
    assert_eq!(branch.pc, 8);
    assert!(branch.operands.contains(&StaticOperand::Immediate(-4)));
}

#[test]
fn test_displacement_operands_and_aliases() {
    let config = SimulationConfig::with_code("lw a0, 8(sp)\nsw t0, -4(s0)\n");
    let program = load(&config).unwrap();
    let text: Vec<String> = program.instructions.iter().map(ToString::to_string).collect();
    assert_eq!(text, vec!["lw x10, 8, x2", "sw x5, -4, x8"]);
}

#[test]
fn test_data_section_is_placed_above_call_stack() {
    let code = "\
.data
nums: .word 3, 4, 5
msg:  .asciz \"hi\"
.text
  la a0, nums
";
    let (sim, _) = TestContext::new(code).run();
    let nums = sim.context().program.label("nums").unwrap();
    assert!(nums >= sim.context().config.memory.call_stack_size as u64);
    assert_eq!(read_ints(&sim, "nums", 3), vec![3, 4, 5]);
    assert_eq!(sim.read_label("msg", 3), Some(b"hi\0".to_vec()));
}

#[test]
fn test_memory_locations_are_aligned() {
    let sim = TestContext::new("nop")
        .with_ints("a", &[1])
        .with_ints("b", &[2, 3])
        .build();
    let b = sim.context().program.label("b").unwrap();
    assert_eq!(b % 4, 0);
    assert_eq!(read_ints(&sim, "b", 2), vec![2, 3]);
}

#[test]
fn test_entry_point_label() {
    let mut config = SimulationConfig::with_code("  nop\nmain: addi x1, x0, 1\n");
    config.entry_point = EntryPoint::Label("main".to_string());
    assert_eq!(load(&config).unwrap().entry_pc, INSTRUCTION_SIZE);
}

#[test]
fn test_every_error_is_reported() {
    let config = SimulationConfig::with_code("frob x1\nadd x1, x2\nj nowhere\ndup:\ndup: nop\n");
    match load(&config) {
        Err(SimError::Parse(errors)) => {
            let lines: Vec<usize> = errors.0.iter().map(|e| e.line).collect();
            assert!(lines.contains(&1), "unknown mnemonic: {errors}");
            assert!(lines.contains(&2), "missing operand: {errors}");
            assert!(lines.contains(&3), "undefined label: {errors}");
            assert!(lines.contains(&5), "duplicate label: {errors}");
        }
        other => panic!("expected parse errors, got {other:?}"),
    }
}
