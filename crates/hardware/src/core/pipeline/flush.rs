//! Pipeline flush.
//!
//! Removes every instruction with an id at or above a boundary from all structures,
//! undoes their renaming youngest first, rewinds the global history from the snapshot of
//! the oldest removed branch and redirects fetch.

use serde::{Deserialize, Serialize};

use crate::core::CpuState;

/// What caused a flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlushCause {
    /// A committed jump or branch went elsewhere than fetch predicted.
    Misprediction,
    /// A store resolved its address after a younger overlapping load read memory.
    OrderingViolation,
    /// Decode computed the target of a direct jump before fetch knew it.
    DecodeRedirect,
}

/// Removes instructions with id `>= first` and restarts fetch at `pc`.
///
/// Decode redirects cost no fetch bubble; the other causes charge `flushPenalty` ticks.
pub fn flush_from(cpu: &mut CpuState, first: u64, pc: u64, cause: FlushCause, penalty: u32) {
    let removed = cpu.arena.get_mut().split_off(first);
    let regs = cpu.regs.get_mut();
    for instruction in &removed {
        if instruction.is_renamed() {
            instruction.squash(regs);
        }
    }

    cpu.rob.get_mut().flush_from(first);
    cpu.decode.get_mut().buffer.retain(|&id| id < first);
    for window in cpu.windows.get_mut().iter_mut() {
        window.flush_from(first);
    }
    for unit in cpu.units.get_mut().iter_mut() {
        unit.flush_from(first);
    }
    cpu.load_buffer.get_mut().flush_from(first);
    cpu.store_buffer.get_mut().flush_from(first);
    cpu.ghr.get_mut().restore_from(first);

    let fetch = cpu.fetch.get_mut();
    fetch.group.retain(|&id| id < first);
    fetch.pc = pc;
    let stats = cpu.stats.get_mut();
    stats.flushed += removed.len() as u64;
    if cause != FlushCause::DecodeRedirect {
        fetch.penalty = penalty;
        stats.rob_flushes += 1;
    }
    tracing::debug!(
        tick = cpu.tick,
        first,
        pc,
        ?cause,
        removed = removed.len(),
        "pipeline flush"
    );
}
