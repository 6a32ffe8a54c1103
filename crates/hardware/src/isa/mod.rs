//! Instruction Set Architecture (ISA) table.
//!
//! The supported instructions are data, not code: every mnemonic is described in the
//! embedded `isa.json` table and interpreted by the pipeline. This module provides:
//! 1. **Register Files:** Architectural register names and ABI aliases.
//! 2. **Descriptors:** Operand lists, execution class and semantics per mnemonic.
//! 3. **Expressions:** The postfix interpreter that evaluates instruction semantics.
//! 4. **Validation:** Table consistency checks performed once at load.

/// Architectural register identifiers and ABI register constants.
pub mod abi;

/// Static per-mnemonic instruction descriptors.
pub mod descriptor;

/// Postfix expression interpreter for instruction semantics.
pub mod expr;

use std::collections::BTreeMap;

use serde::Deserialize;

use self::abi::{ArchReg, REGISTERS_PER_FILE};
use self::descriptor::{InstructionClass, InstructionDescriptor, MemoryDirection};
use crate::common::data::DataType;
use crate::common::error::SimError;

/// The table shipped with the simulator.
const EMBEDDED_TABLE: &str = include_str!("isa.json");

/// One architectural register file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterFileDescriptor {
    /// File name.
    pub name: String,
    /// Type of the registers; float types make this the floating-point file.
    #[serde(rename = "type")]
    pub data_type: DataType,
    /// Prefix of the numbered names (`x`, `f`).
    pub prefix: String,
    /// ABI names of each register, in register order.
    pub aliases: Vec<Vec<String>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IsaTable {
    register_files: Vec<RegisterFileDescriptor>,
    instructions: Vec<InstructionDescriptor>,
}

/// Loaded and validated instruction set.
#[derive(Debug, Clone)]
pub struct Isa {
    instructions: BTreeMap<String, InstructionDescriptor>,
    registers: BTreeMap<String, ArchReg>,
    abi_names: Vec<String>,
}

impl Isa {
    /// Loads the embedded instruction table.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Isa` if the table is inconsistent.
    pub fn embedded() -> Result<Self, SimError> {
        Self::from_json(EMBEDDED_TABLE)
    }

    /// Loads an instruction table from JSON.
    ///
    /// # Arguments
    ///
    /// * `json` - Object with `registerFiles` (integer file first) and `instructions`.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Json` for malformed JSON and `SimError::Isa` for tables whose
    /// expressions reference unknown operands, duplicate mnemonics or register files
    /// that do not hold exactly 32 registers.
    pub fn from_json(json: &str) -> Result<Self, SimError> {
        let table: IsaTable = serde_json::from_str(json)?;

        let [int_file, float_file] = table.register_files.as_slice() else {
            return Err(SimError::Isa(
                "expected an integer and a floating-point register file".to_string(),
            ));
        };
        if int_file.data_type.is_float() || !float_file.data_type.is_float() {
            return Err(SimError::Isa(
                "the integer register file must come before the floating-point file".to_string(),
            ));
        }

        let mut registers = BTreeMap::new();
        let mut abi_names = Vec::with_capacity(abi::ARCH_REGISTERS);
        for (base, file) in [(0u8, int_file), (REGISTERS_PER_FILE, float_file)] {
            if file.aliases.len() != REGISTERS_PER_FILE as usize {
                return Err(SimError::Isa(format!(
                    "register file '{}' defines {} registers",
                    file.name,
                    file.aliases.len()
                )));
            }
            for (i, aliases) in file.aliases.iter().enumerate() {
                let reg = ArchReg(base + i as u8);
                let numbered = format!("{}{i}", file.prefix);
                abi_names.push(aliases.first().cloned().unwrap_or_else(|| numbered.clone()));
                for name in std::iter::once(&numbered).chain(aliases) {
                    if registers.insert(name.clone(), reg).is_some() {
                        return Err(SimError::Isa(format!("duplicate register name '{name}'")));
                    }
                }
            }
        }

        let mut instructions = BTreeMap::new();
        for descriptor in table.instructions {
            validate_descriptor(&descriptor)?;
            let name = descriptor.name.clone();
            if instructions.insert(name.clone(), descriptor).is_some() {
                return Err(SimError::Isa(format!("duplicate instruction '{name}'")));
            }
        }

        tracing::debug!(
            instructions = instructions.len(),
            registers = registers.len(),
            "instruction set loaded"
        );
        Ok(Self {
            instructions,
            registers,
            abi_names,
        })
    }

    /// Descriptor of the mnemonic `name`.
    pub fn get(&self, name: &str) -> Option<&InstructionDescriptor> {
        self.instructions.get(name)
    }

    /// Register called `name` (numbered or ABI alias).
    pub fn register(&self, name: &str) -> Option<ArchReg> {
        self.registers.get(name).copied()
    }

    /// Primary ABI name of `reg`.
    pub fn abi_name(&self, reg: ArchReg) -> &str {
        self.abi_names.get(reg.index()).map_or("?", String::as_str)
    }

    /// Every descriptor, ordered by mnemonic.
    pub fn instructions(&self) -> impl Iterator<Item = &InstructionDescriptor> {
        self.instructions.values()
    }
}

fn validate_descriptor(d: &InstructionDescriptor) -> Result<(), SimError> {
    let fail = |message: String| Err(SimError::Isa(format!("{}: {message}", d.name)));

    let expressions = std::iter::once(&d.interpretable_as)
        .chain(d.condition.as_ref())
        .chain(d.target.as_ref());
    for expression in expressions {
        for name in expression.reads() {
            if name != "pc" && d.arg_index(name).is_none() {
                return fail(format!("'{}' reads unknown operand '{name}'", expression.source()));
            }
        }
        for name in expression.writes() {
            if !d.args.iter().any(|a| a.name == name && a.write_back) {
                return fail(format!("'{}' assigns non-destination '{name}'", expression.source()));
            }
        }
    }

    match d.class {
        InstructionClass::LoadStore => match &d.memory {
            None => return fail("load/store without a memory access".to_string()),
            Some(access) => {
                if !matches!(access.size, 1 | 2 | 4 | 8) {
                    return fail(format!("unsupported access size {}", access.size));
                }
                match access.direction {
                    MemoryDirection::Load if d.destination().is_none() => {
                        return fail("load without a destination".to_string());
                    }
                    MemoryDirection::Store if d.arg_index(&access.source).is_none() => {
                        return fail(format!("store source '{}' is not an operand", access.source));
                    }
                    _ => {}
                }
            }
        },
        InstructionClass::JumpBranch if d.target.is_none() => {
            return fail("jump without a target".to_string());
        }
        _ => {}
    }
    Ok(())
}
