//! Architectural register identifiers and ABI register constants.
//!
//! Integer registers occupy indices 0..32 and floating-point registers 32..64 of one
//! flat architectural index space.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of registers in each architectural register file.
pub const REGISTERS_PER_FILE: u8 = 32;

/// Total number of architectural registers (integer + floating point).
pub const ARCH_REGISTERS: usize = 2 * REGISTERS_PER_FILE as usize;

/// Register x0 (zero register, always zero).
pub const REG_ZERO: ArchReg = ArchReg(0);
/// Register x1 (return address, ra).
pub const REG_RA: ArchReg = ArchReg(1);
/// Register x2 (stack pointer, sp).
pub const REG_SP: ArchReg = ArchReg(2);
/// Register x10 (first argument/return value, a0).
pub const REG_A0: ArchReg = ArchReg(10);

/// Index of an architectural register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArchReg(pub u8);

impl ArchReg {
    /// Integer register `x{index}`.
    pub const fn int(index: u8) -> Self {
        Self(index)
    }

    /// Floating-point register `f{index}`.
    pub const fn float(index: u8) -> Self {
        Self(REGISTERS_PER_FILE + index)
    }

    /// Position in the flat register space.
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Returns true for `f0`..`f31`.
    pub const fn is_float(self) -> bool {
        self.0 >= REGISTERS_PER_FILE
    }

    /// Returns true for the hard-wired `x0`.
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ArchReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_float() {
            write!(f, "f{}", self.0 - REGISTERS_PER_FILE)
        } else {
            write!(f, "x{}", self.0)
        }
    }
}
