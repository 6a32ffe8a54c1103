//! Program loading.
//!
//! Turns assembly text and configured memory locations into the immutable program the
//! pipeline fetches from. It performs:
//! 1. **Reading:** Statements, labels and `.data` bytes (see [`parser`]).
//! 2. **Layout:** Data placed above the call stack (see [`layout`]).
//! 3. **Binding:** Operands resolved to registers, immediates and label addresses.
//!
//! Instruction `i` lives at code address `i * 4`; code and data addresses are separate
//! spaces, so a code label and a data label may share a numeric value.

/// Placement of data blocks in simulated memory.
pub mod layout;

/// Assembly source reader.
pub mod parser;

use std::collections::BTreeMap;
use std::fmt;

use self::layout::DataBlock;
use self::parser::{Statement, parse_integer};
use crate::common::error::{ParseError, ParseErrors, SimError};
use crate::config::{EntryPoint, SimulationConfig};
use crate::isa::Isa;
use crate::isa::abi::{ArchReg, REG_RA, REG_ZERO};
use crate::isa::descriptor::{ArgumentDescriptor, InstructionDescriptor};

/// Bytes occupied by one instruction in the code address space.
pub const INSTRUCTION_SIZE: u64 = 4;

/// A bound operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaticOperand {
    /// Architectural register.
    Register(ArchReg),
    /// Resolved immediate (label offsets already applied).
    Immediate(i64),
}

/// One instruction occurrence in the program.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticInstruction {
    /// Semantics of the mnemonic.
    pub descriptor: InstructionDescriptor,
    /// One operand per descriptor argument, in argument order.
    pub operands: Vec<StaticOperand>,
    /// 1-based source line.
    pub line: usize,
    /// Code address.
    pub pc: u64,
}

/// Place of a jump in the call structure of the program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallRole {
    /// Links the return address into `ra`.
    Call,
    /// Jumps through `ra` without linking.
    Return,
}

impl StaticInstruction {
    /// Mnemonic of the instruction.
    pub fn mnemonic(&self) -> &str {
        &self.descriptor.name
    }

    fn register_at(&self, index: usize) -> Option<ArchReg> {
        match self.operands.get(index) {
            Some(StaticOperand::Register(reg)) => Some(*reg),
            _ => None,
        }
    }

    /// Classifies unconditional jumps that call or return.
    ///
    /// `call`, `jal` and `jalr` linking into `ra` are calls; `ret`, `jr ra` and
    /// `jalr x0, 0(ra)` are returns. Other jumps and all branches have no role.
    pub fn call_role(&self) -> Option<CallRole> {
        let descriptor = &self.descriptor;
        if !descriptor.is_control_flow() || descriptor.is_conditional() {
            return None;
        }
        match descriptor.destination().and_then(|(i, _)| self.register_at(i)) {
            Some(REG_RA) => return Some(CallRole::Call),
            Some(reg) if reg != REG_ZERO => return None,
            _ => {}
        }
        let through_ra = descriptor.target.as_ref()?.reads().any(|name| {
            descriptor
                .arg_index(name)
                .and_then(|i| self.register_at(i))
                == Some(REG_RA)
        });
        through_ra.then_some(CallRole::Return)
    }
}

impl fmt::Display for StaticInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())?;
        let visible = self
            .descriptor
            .args
            .iter()
            .zip(&self.operands)
            .filter(|(arg, _)| !arg.silent);
        for (i, (_, operand)) in visible.enumerate() {
            f.write_str(if i == 0 { " " } else { ", " })?;
            match operand {
                StaticOperand::Register(reg) => write!(f, "{reg}")?,
                StaticOperand::Immediate(value) => write!(f, "{value}")?,
            }
        }
        Ok(())
    }
}

/// A loaded program.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    /// Instructions in address order.
    pub instructions: Vec<StaticInstruction>,
    /// Code and data labels.
    pub labels: BTreeMap<String, u64>,
    /// Initialized memory.
    pub data: Vec<DataBlock>,
    /// Address of the first fetched instruction.
    pub entry_pc: u64,
}

impl Program {
    /// Parses and lays out the program of `config`.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Parse` with every problem found: unknown mnemonics, bad
    /// operands, undefined or duplicate labels, data that does not fit in memory and an
    /// invalid entry point.
    pub fn load(config: &SimulationConfig, isa: &Isa) -> Result<Self, SimError> {
        let mut errors = Vec::new();
        let source = parser::read_source(&config.code, &mut errors);

        let mut labels = BTreeMap::new();
        for label in &source.code_labels {
            layout::define(
                &mut labels,
                &label.name,
                label.position as u64 * INSTRUCTION_SIZE,
                label.line,
                &mut errors,
            );
        }
        let mut placed = layout::place(
            &config.cpu_config.memory,
            &config.memory_locations,
            &source.data,
            &mut labels,
            &mut errors,
        );
        layout::apply_fixups(&mut placed, &source.data, &labels, &mut errors);

        let mut instructions = Vec::with_capacity(source.statements.len());
        for (index, statement) in source.statements.iter().enumerate() {
            match bind(isa, statement, index as u64 * INSTRUCTION_SIZE, &labels) {
                Ok(instruction) => instructions.push(instruction),
                Err(error) => errors.push(error),
            }
        }

        let code_end = source.statements.len() as u64 * INSTRUCTION_SIZE;
        let entry_pc = match &config.entry_point {
            EntryPoint::Address(address) => Some(*address),
            EntryPoint::Label(name) => labels.get(name).copied(),
        };
        let entry_pc = match entry_pc {
            Some(pc) if pc % INSTRUCTION_SIZE == 0 && pc <= code_end => pc,
            _ => {
                errors.push(ParseError::new(
                    0,
                    format!("invalid entry point {:?}", config.entry_point),
                ));
                0
            }
        };

        if !errors.is_empty() {
            return Err(ParseErrors(errors).into());
        }
        tracing::debug!(
            instructions = instructions.len(),
            labels = labels.len(),
            data_blocks = placed.blocks.len(),
            entry_pc,
            "program loaded"
        );
        Ok(Self {
            instructions,
            labels,
            data: placed.blocks,
            entry_pc,
        })
    }

    /// Instruction at code address `pc`.
    pub fn instruction_at(&self, pc: u64) -> Option<&StaticInstruction> {
        if pc % INSTRUCTION_SIZE != 0 {
            return None;
        }
        self.instructions.get((pc / INSTRUCTION_SIZE) as usize)
    }

    /// Returns true if `pc` addresses an instruction.
    pub fn contains(&self, pc: u64) -> bool {
        self.instruction_at(pc).is_some()
    }

    /// Address of `name`.
    pub fn label(&self, name: &str) -> Option<u64> {
        self.labels.get(name).copied()
    }
}

/// Resolves the textual operands of `statement` located at `pc`.
fn bind(
    isa: &Isa,
    statement: &Statement,
    pc: u64,
    labels: &BTreeMap<String, u64>,
) -> Result<StaticInstruction, ParseError> {
    let line = statement.line;
    let descriptor = isa
        .get(&statement.mnemonic.to_ascii_lowercase())
        .ok_or_else(|| ParseError::new(line, format!("unknown instruction '{}'", statement.mnemonic)))?;
    let args = &descriptor.args;

    let mut texts: Vec<Option<&str>> = vec![None; args.len()];
    let mut positional = Vec::with_capacity(statement.operands.len());
    for token in &statement.operands {
        let Some((offset, base)) = split_offset_form(isa, token) else {
            positional.push(token.as_str());
            continue;
        };
        let imm = args.iter().position(|a| a.is_immediate() && !a.silent);
        let reg = descriptor.arg_index("rs1");
        match (imm, reg) {
            (Some(i), Some(r)) if texts[i].is_none() && texts[r].is_none() => {
                texts[i] = Some(offset);
                texts[r] = Some(base);
            }
            _ => {
                return Err(ParseError::new(
                    line,
                    format!("'{token}' is not a valid operand of {}", descriptor.name),
                ));
            }
        }
    }

    let open: Vec<usize> = (0..args.len())
        .filter(|&i| !args[i].silent && texts[i].is_none())
        .collect();
    if positional.len() > open.len() {
        return Err(ParseError::new(
            line,
            format!(
                "{} takes {} operand(s), found {}",
                descriptor.name,
                open.len(),
                positional.len()
            ),
        ));
    }
    // Operands with defaults are omitted from the left first (`jal label`, `jalr rs1`).
    let mut omitted = open.len() - positional.len();
    let mut tokens = positional.into_iter();
    for &i in &open {
        if omitted > 0 && args[i].default_value.is_some() {
            omitted -= 1;
            continue;
        }
        texts[i] = tokens.next();
    }

    let mut operands = Vec::with_capacity(args.len());
    for (arg, text) in args.iter().zip(&texts) {
        let text = text
            .or(arg.default_value.as_deref())
            .ok_or_else(|| ParseError::new(line, format!("missing operand '{}'", arg.name)))?;
        operands.push(operand(isa, arg, text, pc, labels).map_err(|m| ParseError::new(line, m))?);
    }

    Ok(StaticInstruction {
        descriptor: descriptor.clone(),
        operands,
        line,
        pc,
    })
}

/// Splits `offset(reg)` into its parts when the parenthesized text names a register.
fn split_offset_form<'t>(isa: &Isa, token: &'t str) -> Option<(&'t str, &'t str)> {
    let body = token.strip_suffix(')')?;
    let open = body.rfind('(')?;
    let base = &body[open + 1..];
    let offset = &body[..open];
    isa.register(base)
        .map(|_| (if offset.is_empty() { "0" } else { offset }, base))
}

fn operand(
    isa: &Isa,
    arg: &ArgumentDescriptor,
    text: &str,
    pc: u64,
    labels: &BTreeMap<String, u64>,
) -> Result<StaticOperand, String> {
    if arg.is_immediate() {
        return immediate(text, arg.is_offset, pc, labels)
            .map(StaticOperand::Immediate)
            .ok_or_else(|| format!("'{text}' is neither a number nor a known label"));
    }
    let reg = isa
        .register(text)
        .ok_or_else(|| format!("'{text}' is not a register"))?;
    if reg.is_float() != arg.data_type.is_float() {
        let expected = if arg.data_type.is_float() {
            "a floating-point"
        } else {
            "an integer"
        };
        return Err(format!("operand '{}' expects {expected} register, found '{text}'", arg.name));
    }
    Ok(StaticOperand::Register(reg))
}

/// Literal, `%hi(sym)`, `%lo(sym)` or `label[+-offset]`; labels in offset positions
/// resolve relative to `pc`.
fn immediate(text: &str, is_offset: bool, pc: u64, labels: &BTreeMap<String, u64>) -> Option<i64> {
    if let Some(value) = parse_integer(text) {
        return Some(value);
    }
    if let Some(symbol) = text.strip_prefix("%hi(").and_then(|t| t.strip_suffix(')')) {
        let address = symbol_value(symbol, labels)?;
        return Some(((address + 0x800) >> 12) & 0xF_FFFF);
    }
    if let Some(symbol) = text.strip_prefix("%lo(").and_then(|t| t.strip_suffix(')')) {
        let address = symbol_value(symbol, labels)?;
        return Some(((address & 0xFFF) ^ 0x800) - 0x800);
    }
    let address = symbol_value(text, labels)?;
    Some(if is_offset {
        address - pc as i64
    } else {
        address
    })
}

fn symbol_value(text: &str, labels: &BTreeMap<String, u64>) -> Option<i64> {
    let split = text
        .char_indices()
        .skip(1)
        .filter(|&(_, c)| c == '+' || c == '-')
        .map(|(i, _)| i)
        .last();
    let (name, addend) = match split {
        Some(i) => (&text[..i], parse_integer(&text[i..])?),
        None => (text, 0),
    };
    labels.get(name).map(|&a| a as i64 + addend)
}
