//! # Instruction Set Tests
//!
//! The embedded table, register naming and the postfix interpreter as instructions use it.

use proptest::prelude::*;
use rstest::rstest;
use superscalar_core::common::data::Value;
use superscalar_core::common::error::RuntimeException;
use superscalar_core::config::Capability;
use superscalar_core::isa::Isa;
use superscalar_core::isa::abi::ArchReg;
use superscalar_core::isa::descriptor::{InstructionClass, MemoryDirection};
use superscalar_core::isa::expr::{Environment, Expression};

fn isa() -> Isa {
    Isa::embedded().unwrap()
}

#[rstest]
#[case("zero", 0)]
#[case("ra", 1)]
#[case("sp", 2)]
#[case("fp", 8)]
#[case("s0", 8)]
#[case("a0", 10)]
#[case("t6", 31)]
#[case("x17", 17)]
#[case("f0", 32)]
fn test_register_names(#[case] name: &str, #[case] index: u8) {
    assert_eq!(isa().register(name), Some(ArchReg(index)));
}

#[rstest]
#[case("add", InstructionClass::IntArithmetic)]
#[case("fadd.s", InstructionClass::FloatArithmetic)]
#[case("lw", InstructionClass::LoadStore)]
#[case("bne", InstructionClass::JumpBranch)]
#[case("ret", InstructionClass::JumpBranch)]
fn test_instruction_classes(#[case] mnemonic: &str, #[case] class: InstructionClass) {
    let isa = isa();
    let descriptor = isa.get(mnemonic).unwrap();
    assert_eq!(descriptor.class, class);
}

#[test]
fn test_memory_descriptors() {
    let isa = isa();
    let lw = isa.get("lw").unwrap();
    assert_eq!(lw.memory_direction(), Some(MemoryDirection::Load));
    let sb = isa.get("sb").unwrap();
    assert_eq!(sb.memory_direction(), Some(MemoryDirection::Store));
    assert_eq!(sb.memory.as_ref().map(|m| m.size), Some(1));
    assert_eq!(isa.get("add").unwrap().memory_direction(), None);
}

#[test]
fn test_jump_kinds() {
    let isa = isa();
    assert!(isa.get("j").unwrap().is_direct_jump());
    assert!(isa.get("jal").unwrap().is_direct_jump());
    assert!(!isa.get("jr").unwrap().is_direct_jump());
    assert!(isa.get("beq").unwrap().is_conditional());
    assert!(!isa.get("jal").unwrap().is_conditional());
}

#[test]
fn test_division_needs_division_capability() {
    let isa = isa();
    let caps = isa.get("div").unwrap().capabilities();
    assert!(caps.contains(&Capability::Division));
    assert!(isa.get("lw").unwrap().capabilities().is_empty());
}

#[test]
fn test_mnemonics_are_unique_and_lowercase() {
    for descriptor in isa().instructions() {
        assert_eq!(descriptor.name, descriptor.name.to_ascii_lowercase());
    }
}

#[test]
fn test_integer_division_by_zero() {
    let expr = Expression::parse("\\a \\b / \\d =").unwrap();
    let mut env = Environment::new();
    env.bind("a", Value::Int(7));
    env.bind("b", Value::Int(0));
    env.bind("d", Value::Int(0));
    assert_eq!(expr.evaluate(&mut env), Err(RuntimeException::DivisionByZero));
}

#[test]
fn test_unknown_token_is_rejected() {
    assert!(Expression::parse("\\a \\b frobnicate").is_err());
}

proptest! {
    #[test]
    fn prop_add_wraps_like_rv32(a in any::<i32>(), b in any::<i32>()) {
        let expr = Expression::parse("\\a \\b + \\d =").unwrap();
        let mut env = Environment::new();
        env.bind("a", Value::Int(a));
        env.bind("b", Value::Int(b));
        env.bind("d", Value::Int(0));
        let _ = expr.evaluate(&mut env).unwrap();
        prop_assert_eq!(env.get("d"), Some(Value::Int(a.wrapping_add(b))));
    }

    #[test]
    fn prop_shift_left_masks_amount(a in any::<i32>(), s in 0i32..32) {
        let expr = Expression::parse("\\a \\s <<").unwrap();
        let mut env = Environment::new();
        env.bind("a", Value::Int(a));
        env.bind("s", Value::Int(s));
        let result = expr.evaluate(&mut env).unwrap();
        prop_assert_eq!(result, Some(Value::Int(a.wrapping_shl(s as u32))));
    }
}
