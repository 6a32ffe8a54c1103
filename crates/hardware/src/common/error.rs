//! Error and exception definitions.
//!
//! This module defines every failure the simulator can report. It provides:
//! 1. **Runtime Exceptions:** Faults raised by a simulated instruction; they only become
//!    visible when the faulting instruction reaches the head of the reorder buffer.
//! 2. **Configuration Errors:** Every violated configuration constraint, collected in one list.
//! 3. **Parse Errors:** Assembly problems reported per source line.
//! 4. **Simulator Errors:** The top-level error returned across the public API.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Exception raised while executing a simulated instruction.
///
/// Exceptions are attached to the dynamic instruction that raised them. A speculative
/// instruction that is flushed takes its exception with it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Error)]
pub enum RuntimeException {
    /// Integer division or remainder with a zero divisor.
    #[error("division by zero")]
    DivisionByZero,

    /// Memory access outside the simulated main memory.
    ///
    /// Carries the first byte address and the access size.
    #[error("memory access out of range at {address:#x} ({size} bytes)")]
    MemoryAccessOutOfRange {
        /// First byte of the access.
        address: u64,
        /// Access size in bytes.
        size: u64,
    },

    /// Effective address computed as a negative number.
    #[error("negative memory address {0}")]
    NegativeAddress(i64),

    /// The instruction's expression could not be interpreted.
    #[error("invalid expression: {0}")]
    InvalidExpression(String),
}

/// One violated configuration constraint.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ConfigError {
    /// Configuration field the constraint applies to (camelCase JSON name).
    pub field: String,
    /// Human readable description of the violation.
    pub message: String,
}

impl ConfigError {
    /// Creates a new configuration error for `field`.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// All configuration errors found by a validation pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConfigErrors(pub Vec<ConfigError>);

impl ConfigErrors {
    /// Returns true when validation found no problems.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Records a violation.
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(ConfigError::new(field, message));
    }

    /// Iterates over the collected errors.
    pub fn iter(&self) -> impl Iterator<Item = &ConfigError> {
        self.0.iter()
    }

    /// Converts the collection into a `Result`.
    ///
    /// # Errors
    ///
    /// Returns `self` when at least one error was recorded.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ConfigErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} configuration error(s)", self.0.len())?;
        for error in &self.0 {
            write!(f, "\n  - {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ConfigErrors {}

/// Problem found while parsing assembly source.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct ParseError {
    /// 1-based source line.
    pub line: usize,
    /// Description of the problem.
    pub message: String,
}

impl ParseError {
    /// Creates a parse error for `line`.
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// All parse errors found in one assembly source.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParseErrors(pub Vec<ParseError>);

impl fmt::Display for ParseErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} parse error(s)", self.0.len())?;
        for error in &self.0 {
            write!(f, "\n  - {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseErrors {}

/// Top-level simulator error.
#[derive(Debug, Error)]
pub enum SimError {
    /// The configuration failed validation; the simulation never started.
    #[error(transparent)]
    Config(#[from] ConfigErrors),

    /// The assembly program could not be parsed.
    #[error(transparent)]
    Parse(#[from] ParseErrors),

    /// The instruction-set table is malformed.
    #[error("instruction set: {0}")]
    Isa(String),

    /// JSON (de)serialization failed.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// An in-flight instruction id is not present in the instruction arena.
    #[error("instruction {0} is not in flight")]
    UnknownInstruction(u64),

    /// The pipeline reached a state its bookkeeping does not allow.
    #[error("pipeline invariant violated: {0}")]
    Invariant(String),
}
