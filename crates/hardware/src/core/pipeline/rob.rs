//! Reorder Buffer (ROB), Commit and Dispatch.
//!
//! The ROB holds dispatched instructions in program order. Each tick it:
//! 1. **Commits:** Retires up to `commitWidth` finished instructions from the head,
//!    publishing results to the architectural registers and training the predictor.
//! 2. **Resolves Control Flow:** A retired jump or branch whose real next pc differs
//!    from the fetched path flushes everything younger.
//! 3. **Stops:** A faulting instruction at the head stops the simulation without
//!    retiring; a return from the entry function halts it after retiring.
//! 4. **Dispatches:** Moves the renamed prefix of the decode buffer into the ROB, the
//!    load/store buffers and the issue windows.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::flush::{self, FlushCause};
use crate::common::error::SimError;
use crate::core::cpu::{CommittedException, StopReason};
use crate::core::instruction::Operand;
use crate::core::{Context, CpuState};
use crate::isa::descriptor::MemoryDirection;
use crate::program::CallRole;

/// Program-ordered retirement queue of instruction ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rob {
    capacity: usize,
    entries: VecDeque<u64>,
}

impl Rob {
    /// Creates a new ROB with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Returns the ROB capacity.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of occupied entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the ROB is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true if no entry is free.
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// Id of the oldest entry.
    pub fn head(&self) -> Option<u64> {
        self.entries.front().copied()
    }

    /// Ids from oldest to youngest.
    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.entries.iter().copied()
    }

    /// Appends a dispatched instruction.
    pub fn push(&mut self, id: u64) {
        self.entries.push_back(id);
    }

    /// Removes the head entry.
    pub fn pop(&mut self) -> Option<u64> {
        self.entries.pop_front()
    }

    /// Drops entries with id `>= first`.
    pub fn flush_from(&mut self, first: u64) {
        self.entries.retain(|&id| id < first);
    }
}

/// Executes the ROB stage: commit, then dispatch.
///
/// # Errors
///
/// `SimError::UnknownInstruction` or `SimError::Invariant` if the ROB, decode buffer and
/// instruction arena disagree.
pub fn rob_stage(cpu: &mut CpuState, ctx: &Context) -> Result<(), SimError> {
    commit(cpu, ctx)?;
    if cpu.status.stop == StopReason::NotStopped {
        dispatch(cpu, ctx)?;
    }
    Ok(())
}

fn commit(cpu: &mut CpuState, ctx: &Context) -> Result<(), SimError> {
    for _ in 0..ctx.config.pipeline.commit_width {
        let Some(id) = cpu.rob.head() else {
            break;
        };
        let head = cpu.arena.get(id)?;
        if head.stamps.executed.is_none() {
            break;
        }
        if let Some(exception) = head.exception.clone() {
            tracing::debug!(id, pc = head.pc, %exception, "exception reached the ROB head");
            let status = cpu.status.get_mut();
            status.stop = StopReason::Exception;
            status.exception = Some(CommittedException {
                id,
                pc: head.pc,
                exception,
            });
            break;
        }

        let _ = cpu.rob.get_mut().pop();
        let instruction = cpu
            .arena
            .get_mut()
            .remove(id)
            .ok_or(SimError::UnknownInstruction(id))?;
        let code = ctx.program.instruction_at(instruction.pc).ok_or_else(|| {
            SimError::Invariant(format!("instruction {id} committed outside the program"))
        })?;
        let descriptor = &code.descriptor;

        let regs = cpu.regs.get_mut();
        if let Some(destination) = instruction.destination {
            regs.commit(destination.register);
        }
        for source in instruction.sources() {
            regs.release_source(source);
        }
        match descriptor.memory_direction() {
            Some(MemoryDirection::Load) => cpu.load_buffer.get_mut().release(id),
            Some(MemoryDirection::Store) => cpu.store_buffer.get_mut().release(id),
            None => {}
        }
        cpu.stats
            .get_mut()
            .record_commit(&descriptor.name, descriptor.class, descriptor.memory_direction());
        #[cfg(feature = "commit-log")]
        tracing::trace!(id, pc = instruction.pc, tick = cpu.tick, instruction = %code, "commit");

        if !descriptor.is_control_flow() {
            continue;
        }
        let outcome = instruction.outcome.ok_or_else(|| {
            SimError::Invariant(format!("branch {id} committed without an outcome"))
        })?;
        let prediction = instruction.prediction;
        let conditional = descriptor.is_conditional();
        cpu.stats
            .get_mut()
            .record_branch(conditional, outcome.taken, prediction.taken);

        let snapshot = if conditional {
            if let Some(index) = prediction.pht_index {
                cpu.pht.update(index, outcome.taken);
            }
            cpu.ghr.get_mut().release(id)
        } else {
            None
        };
        if outcome.taken {
            cpu.btb.update(instruction.pc, outcome.next_pc, conditional, id);
        }

        match code.call_role() {
            Some(CallRole::Call) => *cpu.call_depth.get_mut() += 1,
            Some(CallRole::Return) if *cpu.call_depth == 0 => {
                tracing::debug!(id, pc = instruction.pc, "returned from the entry function");
                cpu.status.get_mut().stop = StopReason::CallStackHalt;
                break;
            }
            Some(CallRole::Return) => *cpu.call_depth.get_mut() -= 1,
            None => {}
        }
        if outcome.next_pc != prediction.next_pc {
            tracing::debug!(
                id,
                pc = instruction.pc,
                predicted = prediction.next_pc,
                actual = outcome.next_pc,
                "branch mispredicted"
            );
            flush::flush_from(
                cpu,
                id + 1,
                outcome.next_pc,
                FlushCause::Misprediction,
                ctx.config.pipeline.flush_penalty,
            );
            if let Some(history) = snapshot {
                let ghr = cpu.ghr.get_mut();
                ghr.set(history);
                ghr.shift(outcome.taken);
            }
            break;
        }
    }
    Ok(())
}

fn dispatch(cpu: &mut CpuState, ctx: &Context) -> Result<(), SimError> {
    let mut dispatched = 0;
    let tick = cpu.tick;
    let buffer = cpu.decode.buffer.clone();

    for id in buffer {
        if cpu.rob.is_full() {
            break;
        }
        let instruction = cpu.arena.get(id)?;
        if !instruction.is_renamed() {
            break;
        }
        let code = ctx.program.instruction_at(instruction.pc).ok_or_else(|| {
            SimError::Invariant(format!("instruction {id} dispatched outside the program"))
        })?;
        let descriptor = &code.descriptor;

        if let Some(access) = &descriptor.memory {
            let size = usize::from(access.size);
            match access.direction {
                MemoryDirection::Load => {
                    if cpu.load_buffer.is_full(1) {
                        break;
                    }
                    cpu.load_buffer.get_mut().push(id, size, access.signed);
                }
                MemoryDirection::Store => {
                    if cpu.store_buffer.is_full(1) {
                        break;
                    }
                    let source = descriptor
                        .arg_index(&access.source)
                        .and_then(|i| instruction.operands.get(i))
                        .and_then(|o| match o {
                            Operand::Source(r) => Some(*r),
                            _ => None,
                        })
                        .ok_or_else(|| {
                            SimError::Invariant(format!("store {id} has no data operand"))
                        })?;
                    cpu.store_buffer.get_mut().push(id, size, source);
                }
            }
        }

        let kind = descriptor.class.unit_type();
        let window = cpu
            .windows
            .get_mut()
            .iter_mut()
            .find(|w| w.kind == kind)
            .ok_or_else(|| SimError::Invariant(format!("no issue window for {kind:?}")))?;
        window.incoming.push(id);
        cpu.rob.get_mut().push(id);
        let instruction = cpu.arena.get_mut().get_mut(id)?;
        instruction.window = Some(kind);
        instruction.stamps.dispatched = Some(tick);
        dispatched += 1;
    }

    if dispatched > 0 {
        let _ = cpu.decode.get_mut().buffer.drain(..dispatched);
    }
    Ok(())
}
