//! Static instruction descriptors.
//!
//! A descriptor tells the pipeline everything it needs about one mnemonic: its operand
//! list, which issue window and unit class execute it, and its semantics as expressions.

use std::collections::BTreeSet;

use serde::Deserialize;

use super::expr::Expression;
use crate::common::data::DataType;
use crate::config::{Capability, FuType};

/// Execution class of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InstructionClass {
    /// Integer arithmetic and logic.
    IntArithmetic,
    /// Floating-point arithmetic.
    FloatArithmetic,
    /// Loads and stores.
    LoadStore,
    /// Branches and jumps.
    JumpBranch,
}

impl InstructionClass {
    /// Unit class that issues instructions of this class.
    pub const fn unit_type(self) -> FuType {
        match self {
            Self::IntArithmetic => FuType::Fx,
            Self::FloatArithmetic => FuType::Fp,
            Self::LoadStore => FuType::LoadStore,
            Self::JumpBranch => FuType::Branch,
        }
    }
}

/// One operand of an instruction.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArgumentDescriptor {
    /// Operand name, referenced as `\name` in expressions.
    pub name: String,
    /// Operand type; float types select the floating-point register file.
    #[serde(rename = "type", default)]
    pub data_type: DataType,
    /// Value used when the assembly omits the operand.
    #[serde(default)]
    pub default_value: Option<String>,
    /// The operand is a destination register.
    #[serde(default)]
    pub write_back: bool,
    /// The operand never appears in assembly; it always takes its default.
    #[serde(default)]
    pub silent: bool,
    /// A label in this position resolves to `label - pc`.
    #[serde(default)]
    pub is_offset: bool,
}

impl ArgumentDescriptor {
    /// Immediates are the operands whose name starts with `imm`.
    pub fn is_immediate(&self) -> bool {
        self.name.starts_with("imm")
    }
}

/// Direction of a memory access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MemoryDirection {
    /// Read into the destination operand.
    Load,
    /// Write the source operand.
    Store,
}

/// Memory side of a load or store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryAccess {
    /// Load or store.
    pub direction: MemoryDirection,
    /// Access size in bytes.
    pub size: u8,
    /// Sign-extend loaded values.
    #[serde(default)]
    pub signed: bool,
    /// Operand holding the value to store.
    #[serde(default = "MemoryAccess::default_source")]
    pub source: String,
}

impl MemoryAccess {
    fn default_source() -> String {
        "rs2".to_string()
    }
}

/// Static description of one mnemonic.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructionDescriptor {
    /// Mnemonic.
    pub name: String,
    /// Execution class.
    #[serde(rename = "class")]
    pub class: InstructionClass,
    /// Operands in assembly order.
    #[serde(default)]
    pub args: Vec<ArgumentDescriptor>,
    /// Arithmetic: the result assignment. Load/store: the effective address.
    /// Jumps: the link assignment, if any.
    #[serde(default)]
    pub interpretable_as: Expression,
    /// Branch condition; absent for unconditional jumps.
    #[serde(default)]
    pub condition: Option<Expression>,
    /// Jump target.
    #[serde(default)]
    pub target: Option<Expression>,
    /// Memory side of loads and stores.
    #[serde(default)]
    pub memory: Option<MemoryAccess>,
}

impl InstructionDescriptor {
    /// Index and descriptor of the destination register operand.
    pub fn destination(&self) -> Option<(usize, &ArgumentDescriptor)> {
        self.args
            .iter()
            .enumerate()
            .find(|(_, a)| a.write_back && !a.is_immediate())
    }

    /// Returns true for register operands that are read.
    pub fn is_source(&self, index: usize) -> bool {
        self.args
            .get(index)
            .is_some_and(|a| !a.write_back && !a.is_immediate())
    }

    /// Index of the operand called `name`.
    pub fn arg_index(&self, name: &str) -> Option<usize> {
        self.args.iter().position(|a| a.name == name)
    }

    /// Returns true for branches with a condition.
    pub const fn is_conditional(&self) -> bool {
        self.condition.is_some()
    }

    /// Returns true for jumps and branches.
    pub fn is_control_flow(&self) -> bool {
        self.class == InstructionClass::JumpBranch
    }

    /// Load, store or neither.
    pub fn memory_direction(&self) -> Option<MemoryDirection> {
        self.memory.as_ref().map(|m| m.direction)
    }

    /// Unconditional jump whose target depends only on the pc and immediates.
    ///
    /// Such jumps are redirected at decode.
    pub fn is_direct_jump(&self) -> bool {
        if !self.is_control_flow() || self.is_conditional() {
            return false;
        }
        self.target.as_ref().is_some_and(|target| {
            target.reads().all(|name| {
                name == "pc"
                    || self
                        .args
                        .iter()
                        .any(|a| a.name == name && a.is_immediate())
            })
        })
    }

    /// Operands an issue window waits for before issuing.
    ///
    /// Loads and stores only need their address operands; the stored value is read later
    /// by the store buffer.
    pub fn issue_operands(&self) -> Vec<usize> {
        let mut needed: Vec<usize> = (0..self.args.len()).filter(|&i| self.is_source(i)).collect();
        if self.class == InstructionClass::LoadStore {
            let address: BTreeSet<&str> = self.interpretable_as.reads().collect();
            needed.retain(|&i| address.contains(self.args[i].name.as_str()));
        }
        needed
    }

    /// Operation classes an arithmetic unit must support.
    pub fn capabilities(&self) -> BTreeSet<Capability> {
        match self.class {
            InstructionClass::IntArithmetic | InstructionClass::FloatArithmetic => {
                self.interpretable_as.capabilities()
            }
            InstructionClass::LoadStore | InstructionClass::JumpBranch => BTreeSet::new(),
        }
    }
}
