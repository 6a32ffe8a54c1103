//! Decode and Rename Stage.
//!
//! Decode takes the whole fetched group once its own buffer has drained into the
//! reorder buffer. For each instruction in order it:
//! 1. **Drops No-ops:** `nop` never enters the back end.
//! 2. **Renames:** Sources read the current mapping; the destination gets a fresh
//!    speculative register. An empty pool stops renaming until registers are freed.
//! 3. **Tracks History:** Conditional branches snapshot the GHR under their id, then shift
//!    in the predicted direction.
//! 4. **Redirects Early:** A direct jump whose target differs from the fetched path
//!    flushes the younger instructions and restarts fetch at the target.

use serde::{Deserialize, Serialize};

use super::flush::{self, FlushCause};
use crate::common::error::SimError;
use crate::core::{Context, CpuState};

/// Decode stage registers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeUnit {
    /// Instructions waiting for dispatch, oldest first.
    pub buffer: Vec<u64>,
    /// Decode could not take a new group this tick.
    pub stalled: bool,
}

/// Executes the decode stage.
///
/// # Errors
///
/// `SimError::UnknownInstruction` or `SimError::Invariant` if the group refers to an
/// instruction that is not in flight or outside the program.
pub fn decode_stage(cpu: &mut CpuState, ctx: &Context) -> Result<(), SimError> {
    if cpu.decode.buffer.is_empty() {
        if cpu.decode.stalled {
            cpu.decode.get_mut().stalled = false;
        }
        if !cpu.fetch.group.is_empty() {
            let group = std::mem::take(&mut cpu.fetch.get_mut().group);
            let arena = cpu.arena.get_mut();
            let mut buffer = Vec::with_capacity(group.len());
            for id in group {
                let pc = arena.get(id)?.pc;
                let code = ctx.program.instruction_at(pc).ok_or_else(|| {
                    SimError::Invariant(format!("instruction {id} fetched outside the program at {pc:#x}"))
                })?;
                if code.descriptor.name == "nop" {
                    let _ = arena.remove(id);
                } else {
                    buffer.push(id);
                }
            }
            cpu.decode.get_mut().buffer = buffer;
        }
    } else {
        if !cpu.decode.stalled {
            cpu.decode.get_mut().stalled = true;
        }
        cpu.stats.get_mut().decode_stalls += 1;
    }
    rename_pending(cpu, ctx)
}

/// Renames buffered instructions that are not renamed yet, in order.
fn rename_pending(cpu: &mut CpuState, ctx: &Context) -> Result<(), SimError> {
    let pending: Vec<u64> = cpu
        .decode
        .buffer
        .iter()
        .copied()
        .filter(|&id| cpu.arena.get(id).is_ok_and(|i| !i.is_renamed()))
        .collect();
    let tick = cpu.tick;

    for id in pending {
        let instruction = cpu.arena.get_mut().get_mut(id)?;
        let code = ctx.program.instruction_at(instruction.pc).ok_or_else(|| {
            SimError::Invariant(format!("instruction {id} decoded outside the program"))
        })?;
        if !instruction.rename(code, cpu.regs.get_mut(), tick) {
            tracing::trace!(id, "rename stalled: no free speculative register");
            break;
        }
        cpu.stats.get_mut().decoded += 1;

        let descriptor = &code.descriptor;
        if descriptor.is_conditional() {
            let ghr = cpu.ghr.get_mut();
            ghr.snapshot(id);
            ghr.shift(instruction.prediction.taken);
        } else if descriptor.is_direct_jump() {
            let mut env = instruction.environment(code, &cpu.regs);
            let target = descriptor
                .target
                .as_ref()
                .map(|t| t.evaluate(&mut env))
                .transpose();
            // A faulting target expression is left for the branch unit to report.
            if let Ok(Some(Some(value))) = target {
                let target = value.as_code_address();
                if target != instruction.prediction.next_pc {
                    instruction.prediction.taken = true;
                    instruction.prediction.next_pc = target;
                    tracing::debug!(id, pc = instruction.pc, target, "decode redirects direct jump");
                    let penalty = ctx.config.pipeline.flush_penalty;
                    flush::flush_from(cpu, id + 1, target, FlushCause::DecodeRedirect, penalty);
                    break;
                }
            }
        }
    }
    Ok(())
}
