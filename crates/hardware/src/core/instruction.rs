//! Dynamic (in-flight) instructions and their arena.
//!
//! Every fetched instruction gets a unique, increasing id and lives in the
//! [`InstructionArena`] until it commits or is flushed. Pipeline structures refer to
//! instructions by id only, so a snapshot of the arena plus the id lists of each
//! structure describes the whole in-flight state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::common::data::Value;
use crate::common::error::{RuntimeException, SimError};
use crate::config::FuType;
use crate::core::arch::{PrevMapping, RegisterFile, RegisterRef};
use crate::isa::abi::ArchReg;
use crate::isa::expr::Environment;
use crate::program::{StaticInstruction, StaticOperand};

/// A renamed operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    /// Resolved immediate.
    Immediate(i64),
    /// Register read by the instruction.
    Source(RegisterRef),
    /// Destination register; `None` when writing `x0`.
    Destination(Option<u16>),
}

/// Destination renaming, kept for commit and flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Renamed {
    /// Architectural destination.
    pub arch: ArchReg,
    /// Allocated speculative register.
    pub register: u16,
    /// Mapping replaced by the allocation.
    pub prev: PrevMapping,
}

/// What fetch assumed about a control-flow instruction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prediction {
    /// Predicted direction.
    pub taken: bool,
    /// Address fetch continued at after this instruction.
    pub next_pc: u64,
    /// Pattern history table entry used for the prediction.
    pub pht_index: Option<usize>,
}

/// Resolved control flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    /// Actual direction.
    pub taken: bool,
    /// Address of the next instruction in program order.
    pub next_pc: u64,
}

/// Tick at which the instruction passed each stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stamps {
    /// Fetched.
    pub fetched: u64,
    /// Renamed.
    pub decoded: Option<u64>,
    /// Entered the reorder buffer.
    pub dispatched: Option<u64>,
    /// Sent to a functional unit.
    pub issued: Option<u64>,
    /// Finished execution.
    pub executed: Option<u64>,
}

/// One in-flight instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicInstruction {
    /// Unique id, increasing in fetch order.
    pub id: u64,
    /// Code address.
    pub pc: u64,
    /// Renamed operands, one per descriptor argument; empty before decode.
    pub operands: Vec<Operand>,
    /// Renamed destination.
    pub destination: Option<Renamed>,
    /// Fetch-time prediction.
    pub prediction: Prediction,
    /// Resolved control flow, set by the branch unit.
    pub outcome: Option<Outcome>,
    /// Exception raised during execution.
    pub exception: Option<RuntimeException>,
    /// Fetched while an older control-flow instruction was unresolved.
    pub speculative: bool,
    /// Issue window that held the instruction.
    pub window: Option<FuType>,
    /// Index of the functional unit that executed it.
    pub unit: Option<usize>,
    /// Stage timing.
    pub stamps: Stamps,
}

impl DynamicInstruction {
    /// A freshly fetched instruction.
    pub fn fetched(id: u64, pc: u64, tick: u64, prediction: Prediction) -> Self {
        Self {
            id,
            pc,
            operands: Vec::new(),
            destination: None,
            prediction,
            outcome: None,
            exception: None,
            speculative: false,
            window: None,
            unit: None,
            stamps: Stamps {
                fetched: tick,
                ..Stamps::default()
            },
        }
    }

    /// Returns true once decode renamed the operands.
    pub const fn is_renamed(&self) -> bool {
        self.stamps.decoded.is_some()
    }

    /// Registers read by the instruction.
    pub fn sources(&self) -> impl Iterator<Item = RegisterRef> + '_ {
        self.operands.iter().filter_map(|o| match o {
            Operand::Source(r) => Some(*r),
            _ => None,
        })
    }

    /// Renames the operands of `code`, taking reader references and allocating the
    /// destination register.
    ///
    /// # Returns
    ///
    /// `false` (with nothing changed) if the destination cannot be allocated.
    pub fn rename(&mut self, code: &StaticInstruction, regs: &mut RegisterFile, tick: u64) -> bool {
        let destination = code.descriptor.destination().map(|(i, _)| i);
        let needs_register = destination
            .and_then(|i| code.operands.get(i))
            .is_some_and(|o| matches!(o, StaticOperand::Register(r) if !r.is_zero()));
        if needs_register && regs.free_count() == 0 {
            return false;
        }

        let mut operands = Vec::with_capacity(code.operands.len());
        for (i, operand) in code.operands.iter().enumerate() {
            operands.push(match *operand {
                StaticOperand::Immediate(v) => Operand::Immediate(v),
                StaticOperand::Register(reg) if Some(i) != destination => {
                    Operand::Source(regs.acquire_source(reg))
                }
                StaticOperand::Register(_) => Operand::Destination(None),
            });
        }
        // Sources are renamed before the destination so `add a0, a0, a1` reads the old a0.
        let target = destination.and_then(|i| match code.operands.get(i) {
            Some(StaticOperand::Register(reg)) if !reg.is_zero() => Some((i, *reg)),
            _ => None,
        });
        if let Some((i, reg)) = target {
            if let Some((register, prev)) = regs.allocate(reg, self.id) {
                if let Some(slot) = operands.get_mut(i) {
                    *slot = Operand::Destination(Some(register));
                }
                self.destination = Some(Renamed {
                    arch: reg,
                    register,
                    prev,
                });
            }
        }
        self.operands = operands;
        self.stamps.decoded = Some(tick);
        true
    }

    /// Returns true when every operand in `needed` can be read.
    pub fn operands_ready(&self, needed: &[usize], regs: &RegisterFile) -> bool {
        needed.iter().all(|&i| match self.operands.get(i) {
            Some(Operand::Source(r)) => regs.is_ready(*r),
            _ => true,
        })
    }

    /// Binds every operand value of the instruction and `pc` for expression evaluation.
    pub fn environment<'a>(&self, code: &'a StaticInstruction, regs: &RegisterFile) -> Environment<'a> {
        let mut env = Environment::new();
        env.bind("pc", Value::Int(self.pc as i32));
        for (arg, operand) in code.descriptor.args.iter().zip(&self.operands) {
            let value = match *operand {
                Operand::Immediate(v) => Value::from_i128(arg.data_type, i128::from(v)),
                Operand::Source(r) => Value::from_bits(arg.data_type, regs.read(r)),
                Operand::Destination(_) => Value::from_bits(arg.data_type, 0),
            };
            env.bind(arg.name.as_str(), value);
        }
        env
    }

    /// Drops every register reference the instruction holds, for a flush.
    pub fn squash(&self, regs: &mut RegisterFile) {
        if let Some(d) = self.destination {
            regs.squash(d.register, d.prev);
        }
        for source in self.sources() {
            regs.release_source(source);
        }
    }
}

/// Value an expression left in the destination of `code`, as a register container.
pub fn destination_bits(code: &StaticInstruction, env: &Environment<'_>) -> Option<u64> {
    let (_, arg) = code.descriptor.destination()?;
    env.get(&arg.name).map(Value::to_bits)
}

/// All in-flight instructions, keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionArena {
    instructions: BTreeMap<u64, DynamicInstruction>,
}

impl InstructionArena {
    /// Adds an instruction.
    pub fn insert(&mut self, instruction: DynamicInstruction) {
        let _ = self.instructions.insert(instruction.id, instruction);
    }

    /// Instruction `id`.
    ///
    /// # Errors
    ///
    /// `SimError::UnknownInstruction` if `id` is not in flight.
    pub fn get(&self, id: u64) -> Result<&DynamicInstruction, SimError> {
        self.instructions.get(&id).ok_or(SimError::UnknownInstruction(id))
    }

    /// Mutable instruction `id`.
    ///
    /// # Errors
    ///
    /// `SimError::UnknownInstruction` if `id` is not in flight.
    pub fn get_mut(&mut self, id: u64) -> Result<&mut DynamicInstruction, SimError> {
        self.instructions
            .get_mut(&id)
            .ok_or(SimError::UnknownInstruction(id))
    }

    /// Removes instruction `id`.
    pub fn remove(&mut self, id: u64) -> Option<DynamicInstruction> {
        self.instructions.remove(&id)
    }

    /// Removes and returns every instruction with id `>= first`, youngest first.
    pub fn split_off(&mut self, first: u64) -> Vec<DynamicInstruction> {
        let mut removed: Vec<_> = self.instructions.split_off(&first).into_values().collect();
        removed.reverse();
        removed
    }

    /// Number of instructions in flight.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Returns true if nothing is in flight.
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Instructions in id order.
    pub fn iter(&self) -> impl Iterator<Item = &DynamicInstruction> {
        self.instructions.values()
    }
}
