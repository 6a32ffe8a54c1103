//! Unified Register File with Renaming.
//!
//! This module implements the architectural registers together with the pool of
//! speculative registers used for renaming. It performs the following:
//! 1. **Storage:** 32 integer and 32 floating-point architectural containers; `x0` is
//!    hardwired to zero.
//! 2. **Renaming:** A map from architectural register to the speculative register of its
//!    youngest in-flight producer.
//! 3. **Readiness:** Each speculative register moves through
//!    `Free -> Allocated -> Executed -> Assigned` and back to `Free` when unreferenced.
//! 4. **Reference Counting:** The rename map, the producer and every reader hold one
//!    reference each; a register returns to the free list when the count reaches zero.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::isa::abi::{ARCH_REGISTERS, ArchReg};

/// Life-cycle state of a speculative register.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Readiness {
    /// In the free list.
    #[default]
    Free,
    /// Renamed as a destination; the value is not computed yet.
    Allocated,
    /// The producer wrote the value.
    Executed,
    /// The producer committed; the value is also in the architectural register.
    Assigned,
}

/// One register of the speculative pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeculativeRegister {
    /// Current state.
    pub readiness: Readiness,
    /// 64-bit value container.
    pub bits: u64,
    /// Outstanding references.
    pub refs: u32,
    /// Id of the instruction that writes the register.
    pub producer: Option<u64>,
    /// Architectural register being renamed.
    pub arch: Option<ArchReg>,
}

/// Register an operand was renamed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegisterRef {
    /// Value is in the architectural file.
    Arch(ArchReg),
    /// Value comes from speculative register `n`.
    Speculative(u16),
}

/// Rename-map entry replaced by a destination allocation, restored on flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrevMapping {
    /// Previously mapped speculative register.
    pub register: Option<u16>,
    /// Producer of that register at allocation time.
    pub producer: Option<u64>,
}

/// Architectural and speculative registers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterFile {
    arch: Vec<u64>,
    map: Vec<Option<u16>>,
    pool: Vec<SpeculativeRegister>,
    free: VecDeque<u16>,
}

impl RegisterFile {
    /// Creates a register file with `speculative` rename registers.
    pub fn new(speculative: usize) -> Self {
        let count = speculative.min(usize::from(u16::MAX));
        Self {
            arch: vec![0; ARCH_REGISTERS],
            map: vec![None; ARCH_REGISTERS],
            pool: vec![SpeculativeRegister::default(); count],
            free: (0..count as u16).collect(),
        }
    }

    /// Committed value of `reg`.
    pub fn arch_value(&self, reg: ArchReg) -> u64 {
        self.arch.get(reg.index()).copied().unwrap_or(0)
    }

    /// Sets a committed value; writes to `x0` are ignored.
    pub fn set_arch(&mut self, reg: ArchReg, bits: u64) {
        if reg.is_zero() {
            return;
        }
        if let Some(slot) = self.arch.get_mut(reg.index()) {
            *slot = bits;
        }
    }

    /// Speculative register `n`.
    pub fn speculative(&self, n: u16) -> Option<&SpeculativeRegister> {
        self.pool.get(usize::from(n))
    }

    /// All speculative registers.
    pub fn pool(&self) -> &[SpeculativeRegister] {
        &self.pool
    }

    /// Rename-map target of `reg`.
    pub fn mapping(&self, reg: ArchReg) -> Option<u16> {
        self.map.get(reg.index()).copied().flatten()
    }

    /// Number of registers in the free list.
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Number of speculative registers in use.
    pub fn allocated_count(&self) -> usize {
        self.pool.len() - self.free.len()
    }

    /// Renames a source operand and takes a reader reference.
    pub fn acquire_source(&mut self, reg: ArchReg) -> RegisterRef {
        match self.mapping(reg) {
            Some(n) => {
                if let Some(r) = self.pool.get_mut(usize::from(n)) {
                    r.refs += 1;
                }
                RegisterRef::Speculative(n)
            }
            None => RegisterRef::Arch(reg),
        }
    }

    /// Drops a reader reference taken by [`Self::acquire_source`].
    pub fn release_source(&mut self, reference: RegisterRef) {
        if let RegisterRef::Speculative(n) = reference {
            self.release(n);
        }
    }

    /// Allocates a fresh register for destination `reg` written by `producer`.
    ///
    /// # Returns
    ///
    /// The new register and the mapping it replaced, or `None` if the pool is empty.
    pub fn allocate(&mut self, reg: ArchReg, producer: u64) -> Option<(u16, PrevMapping)> {
        let n = self.free.pop_front()?;
        let prev_register = self.mapping(reg);
        let prev = PrevMapping {
            register: prev_register,
            producer: prev_register
                .and_then(|p| self.speculative(p))
                .and_then(|r| r.producer),
        };
        if let Some(p) = prev_register {
            self.release(p);
        }
        if let Some(r) = self.pool.get_mut(usize::from(n)) {
            *r = SpeculativeRegister {
                readiness: Readiness::Allocated,
                bits: 0,
                refs: 2,
                producer: Some(producer),
                arch: Some(reg),
            };
        }
        if let Some(slot) = self.map.get_mut(reg.index()) {
            *slot = Some(n);
        }
        Some((n, prev))
    }

    /// Returns true if the value behind `reference` can be read.
    pub fn is_ready(&self, reference: RegisterRef) -> bool {
        match reference {
            RegisterRef::Arch(_) => true,
            RegisterRef::Speculative(n) => self.speculative(n).is_some_and(|r| {
                matches!(r.readiness, Readiness::Executed | Readiness::Assigned)
            }),
        }
    }

    /// Current value behind `reference`.
    pub fn read(&self, reference: RegisterRef) -> u64 {
        match reference {
            RegisterRef::Arch(reg) => self.arch_value(reg),
            RegisterRef::Speculative(n) => self.speculative(n).map_or(0, |r| r.bits),
        }
    }

    /// Stores a computed result and marks the register executed.
    pub fn write(&mut self, n: u16, bits: u64) {
        if let Some(r) = self.pool.get_mut(usize::from(n)) {
            r.bits = bits;
            r.readiness = Readiness::Executed;
        }
    }

    /// Copies the value of `n` into its architectural register at commit.
    ///
    /// Drops the producer reference, and the map reference if `n` is still the newest
    /// mapping of its architectural register.
    pub fn commit(&mut self, n: u16) {
        let Some(r) = self.pool.get_mut(usize::from(n)) else {
            return;
        };
        r.readiness = Readiness::Assigned;
        let (bits, arch) = (r.bits, r.arch);
        if let Some(reg) = arch {
            self.set_arch(reg, bits);
            if self.mapping(reg) == Some(n) {
                if let Some(slot) = self.map.get_mut(reg.index()) {
                    *slot = None;
                }
                self.release(n);
            }
        }
        self.release(n);
    }

    /// Undoes the allocation of `n` for a flushed producer.
    ///
    /// Must be called youngest producer first so that `prev` is the live mapping again.
    pub fn squash(&mut self, n: u16, prev: PrevMapping) {
        let Some(arch) = self.speculative(n).and_then(|r| r.arch) else {
            return;
        };
        if self.mapping(arch) == Some(n) {
            let restored = prev.register.filter(|&p| {
                self.speculative(p).is_some_and(|r| {
                    r.producer == prev.producer
                        && matches!(r.readiness, Readiness::Allocated | Readiness::Executed)
                })
            });
            if let Some(r) = restored.and_then(|p| self.pool.get_mut(usize::from(p))) {
                r.refs += 1;
            }
            if let Some(slot) = self.map.get_mut(arch.index()) {
                *slot = restored;
            }
            self.release(n);
        }
        self.release(n);
    }

    fn release(&mut self, n: u16) {
        let Some(r) = self.pool.get_mut(usize::from(n)) else {
            return;
        };
        r.refs = r.refs.saturating_sub(1);
        if r.refs == 0 && r.readiness != Readiness::Free {
            *r = SpeculativeRegister::default();
            self.free.push_back(n);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A0: ArchReg = ArchReg::int(10);

    #[test]
    fn test_x0_is_hardwired() {
        let mut regs = RegisterFile::new(4);
        regs.set_arch(ArchReg::int(0), 7);
        assert_eq!(regs.arch_value(ArchReg::int(0)), 0);
    }

    #[test]
    fn test_commit_frees_register_after_readers() {
        let mut regs = RegisterFile::new(4);
        let (n, _) = regs.allocate(A0, 1).unwrap();
        let reader = regs.acquire_source(A0);
        assert_eq!(reader, RegisterRef::Speculative(n));
        assert!(!regs.is_ready(reader));
        regs.write(n, 42);
        assert!(regs.is_ready(reader));
        regs.commit(n);
        assert_eq!(regs.arch_value(A0), 42);
        assert_eq!(regs.mapping(A0), None);
        assert_eq!(regs.speculative(n).unwrap().readiness, Readiness::Assigned);
        regs.release_source(reader);
        assert_eq!(regs.free_count(), 4);
    }

    #[test]
    fn test_squash_restores_previous_mapping() {
        let mut regs = RegisterFile::new(4);
        let (first, _) = regs.allocate(A0, 1).unwrap();
        let (second, prev) = regs.allocate(A0, 2).unwrap();
        assert_eq!(prev.register, Some(first));
        regs.squash(second, prev);
        assert_eq!(regs.mapping(A0), Some(first));
        assert_eq!(regs.free_count(), 3);
        regs.squash(first, PrevMapping::default());
        assert_eq!(regs.mapping(A0), None);
        assert_eq!(regs.free_count(), 4);
    }

    #[test]
    fn test_squash_skips_committed_previous_producer() {
        let mut regs = RegisterFile::new(4);
        let (first, _) = regs.allocate(A0, 1).unwrap();
        let (second, prev) = regs.allocate(A0, 2).unwrap();
        regs.write(first, 5);
        regs.commit(first);
        regs.squash(second, prev);
        assert_eq!(regs.mapping(A0), None);
        assert_eq!(regs.arch_value(A0), 5);
        assert_eq!(regs.free_count(), 4);
    }

    #[test]
    fn test_pool_exhaustion() {
        let mut regs = RegisterFile::new(1);
        assert!(regs.allocate(A0, 1).is_some());
        assert!(regs.allocate(ArchReg::int(11), 2).is_none());
    }
}
