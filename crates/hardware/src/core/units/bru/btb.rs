//! Branch Target Buffer (BTB).
//!
//! The BTB is a direct-mapped table that stores target addresses for control flow
//! instructions. It allows the fetch stage to redirect before the instruction is
//! decoded.

use serde::{Deserialize, Serialize};

/// An entry in the Branch Target Buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BtbEntry {
    /// Full pc of the branch, used as the tag.
    pub pc_tag: u64,
    /// The branch has a condition.
    pub conditional: bool,
    /// The predicted target address.
    pub target: u64,
    /// Id of the committed instruction that wrote the entry.
    pub instruction_id: u64,
    /// Indicates if this entry contains valid data.
    pub valid: bool,
}

/// Branch Target Buffer structure.
///
/// Writes are journaled so a backward step can restore single entries instead of a copy
/// of the whole table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Btb {
    /// The table of BTB entries.
    table: Vec<BtbEntry>,
    #[serde(skip)]
    journal: Vec<(usize, BtbEntry)>,
}

impl PartialEq for Btb {
    fn eq(&self, other: &Self) -> bool {
        self.table == other.table
    }
}

impl Eq for Btb {}

impl Btb {
    /// Creates a new Branch Target Buffer with the specified size.
    ///
    /// # Arguments
    ///
    /// * `size` - The number of entries in the BTB.
    pub fn new(size: usize) -> Self {
        Self {
            table: vec![BtbEntry::default(); size.max(1)],
            journal: Vec::new(),
        }
    }

    /// Index of `pc`: `pc mod size`.
    fn index(&self, pc: u64) -> usize {
        (pc % self.table.len() as u64) as usize
    }

    /// Looks up the entry for the given program counter.
    ///
    /// # Returns
    ///
    /// The entry if it is valid and its tag matches, otherwise `None`.
    pub fn lookup(&self, pc: u64) -> Option<&BtbEntry> {
        self.table
            .get(self.index(pc))
            .filter(|e| e.valid && e.pc_tag == pc)
    }

    /// Predicted target of `pc`.
    pub fn target(&self, pc: u64) -> Option<u64> {
        self.lookup(pc).map(|e| e.target)
    }

    /// Returns true if `pc` hits an entry written by an unconditional jump.
    pub fn is_unconditional(&self, pc: u64) -> bool {
        self.lookup(pc).is_some_and(|e| !e.conditional)
    }

    /// Writes the resolved target of a committed branch.
    ///
    /// # Arguments
    ///
    /// * `pc` - The program counter of the branch or jump.
    /// * `target` - The resolved target address.
    /// * `conditional` - The branch has a condition.
    /// * `instruction_id` - Id of the committing instruction.
    pub fn update(&mut self, pc: u64, target: u64, conditional: bool, instruction_id: u64) {
        let idx = self.index(pc);
        if let Some(slot) = self.table.get_mut(idx) {
            self.journal.push((idx, *slot));
            *slot = BtbEntry {
                pc_tag: pc,
                conditional,
                target,
                instruction_id,
                valid: true,
            };
        }
    }

    /// Moves out the overwritten entries recorded since the last call.
    pub fn take_journal(&mut self) -> Vec<(usize, BtbEntry)> {
        std::mem::take(&mut self.journal)
    }

    /// Restores entries recorded in `journal`, newest write first.
    pub fn undo(&mut self, journal: &[(usize, BtbEntry)]) {
        for &(idx, entry) in journal.iter().rev() {
            if let Some(slot) = self.table.get_mut(idx) {
                *slot = entry;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_mismatch_misses() {
        let mut btb = Btb::new(4);
        btb.update(8, 40, true, 1);
        assert_eq!(btb.target(8), Some(40));
        assert_eq!(btb.target(24), None);
        assert!(!btb.is_unconditional(8));
        btb.update(24, 0, false, 2);
        assert_eq!(btb.target(8), None);
        assert!(btb.is_unconditional(24));
    }

    #[test]
    fn test_undo_restores_overwritten_entry() {
        let mut btb = Btb::new(4);
        btb.update(8, 40, true, 1);
        let _ = btb.take_journal();
        let before = btb.clone();
        btb.update(24, 0, false, 2);
        btb.update(8, 12, true, 3);
        let journal = btb.take_journal();
        btb.undo(&journal);
        assert_eq!(btb, before);
        assert_eq!(btb.target(8), Some(40));
    }
}
