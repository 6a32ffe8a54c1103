//! Instruction Fetch Stage.
//!
//! Fetch produces one group per tick, which decode consumes whole. For every jump or
//! branch in the group it:
//! 1. **Predicts Direction:** Unconditional jumps are taken; conditional branches read
//!    the pattern history table at the GShare index.
//! 2. **Predicts Target:** Fetch follows the BTB target when the entry exists and the
//!    branch is predicted taken or the entry belongs to an unconditional jump.
//! 3. **Limits Speculation:** The group ends before the `branchFollowLimit + 1`-th
//!    control-flow instruction.

use serde::{Deserialize, Serialize};

use crate::common::error::SimError;
use crate::core::instruction::{DynamicInstruction, Prediction};
use crate::core::units::bru::gshare;
use crate::core::{Context, CpuState};
use crate::program::INSTRUCTION_SIZE;

/// Fetch stage registers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchUnit {
    /// Address of the next instruction to fetch.
    pub pc: u64,
    /// Ids of the current group, oldest first, until decode takes it.
    pub group: Vec<u64>,
    /// Ticks left before fetch resumes after a flush.
    pub penalty: u32,
    /// Id given to the next fetched instruction.
    pub next_id: u64,
}

impl FetchUnit {
    /// Fetch unit starting at `pc`.
    pub const fn new(pc: u64) -> Self {
        Self {
            pc,
            group: Vec::new(),
            penalty: 0,
            next_id: 0,
        }
    }
}

/// Executes the fetch stage.
///
/// # Errors
///
/// Never fails today; the signature matches the other stages.
pub fn fetch_stage(cpu: &mut CpuState, ctx: &Context) -> Result<(), SimError> {
    if cpu.fetch.penalty > 0 {
        cpu.fetch.get_mut().penalty -= 1;
        return Ok(());
    }
    if !cpu.fetch.group.is_empty() {
        return Ok(());
    }
    let pipeline = &ctx.config.pipeline;
    let mut pc = cpu.fetch.pc;
    if !ctx.program.contains(pc) {
        return Ok(());
    }

    let mut speculative = cpu.arena.iter().any(|i| {
        ctx.program
            .instruction_at(i.pc)
            .is_some_and(|c| c.descriptor.is_control_flow())
    });
    let mut followed = 0;
    let mut next_id = cpu.fetch.next_id;
    let mut group = Vec::with_capacity(pipeline.fetch_width);

    while group.len() < pipeline.fetch_width {
        let Some(code) = ctx.program.instruction_at(pc) else {
            break;
        };
        let descriptor = &code.descriptor;
        let control = descriptor.is_control_flow();
        if control && followed >= pipeline.branch_follow_limit {
            break;
        }

        let mut prediction = Prediction {
            taken: false,
            next_pc: pc + INSTRUCTION_SIZE,
            pht_index: None,
        };
        if control {
            followed += 1;
            prediction.taken = if descriptor.is_conditional() {
                let index = gshare::index(&ctx.config.prediction, pc, cpu.ghr.value());
                prediction.pht_index = Some(index);
                cpu.pht.predict(index)
            } else {
                true
            };
            if let Some(target) = cpu.btb.target(pc) {
                if prediction.taken || cpu.btb.is_unconditional(pc) {
                    prediction.next_pc = target;
                }
            }
        }

        let mut instruction = DynamicInstruction::fetched(next_id, pc, cpu.tick, prediction);
        instruction.speculative = speculative;
        cpu.arena.get_mut().insert(instruction);
        group.push(next_id);
        next_id += 1;
        speculative |= control;
        if prediction.next_pc != pc + INSTRUCTION_SIZE {
            tracing::trace!(pc, target = prediction.next_pc, "fetch follows predicted target");
        }
        pc = prediction.next_pc;
    }

    cpu.stats.get_mut().fetched += group.len() as u64;
    let fetch = cpu.fetch.get_mut();
    fetch.pc = pc;
    fetch.next_id = next_id;
    fetch.group = group;
    Ok(())
}
