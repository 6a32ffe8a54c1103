//! Functional Unit Stage.
//!
//! Units advance in class order FX, FP, L/S, Memory, Branch. An instruction that
//! finishes this tick is completed according to the unit kind:
//! 1. **Arithmetic:** Evaluates the expression and writes the destination register.
//! 2. **Load/Store:** Computes and checks the effective address, hands it to the load or
//!    store buffer and, for stores, looks for younger loads that read too early.
//! 3. **Memory:** Delivers the loaded value, or marks the store written.
//! 4. **Branch:** Resolves direction, target and link register.
//!
//! A runtime exception is attached to the instruction and recorded in the unit's failed
//! list instead of producing a result. Either way the instruction is no longer busy.

use crate::common::error::{RuntimeException, SimError};
use crate::config::FuType;
use crate::core::instruction::{DynamicInstruction, Outcome, destination_bits};
use crate::core::pipeline::flush::{self, FlushCause};
use crate::core::units::fu::Execution;
use crate::core::units::lsu::{LoadState, StoreState};
use crate::core::{Context, CpuState};
use crate::isa::descriptor::MemoryDirection;
use crate::program::{INSTRUCTION_SIZE, StaticInstruction};

/// Unit class order of the stage.
pub const UNIT_ORDER: [FuType; 5] = [
    FuType::Fx,
    FuType::Fp,
    FuType::LoadStore,
    FuType::Memory,
    FuType::Branch,
];

/// Executes the functional unit stage.
///
/// # Errors
///
/// `SimError::UnknownInstruction` or `SimError::Invariant` if a unit holds an
/// instruction that is not in flight.
pub fn execute_stage(cpu: &mut CpuState, ctx: &Context) -> Result<(), SimError> {
    let mut violation: Option<u64> = None;
    for kind in UNIT_ORDER {
        for index in 0..cpu.units.len() {
            let unit = &cpu.units[index];
            if unit.fu_type != kind || unit.is_idle() {
                continue;
            }
            cpu.stats.get_mut().record_busy(&unit.name);
            let Some(execution) = cpu.units.get_mut()[index].advance() else {
                continue;
            };
            let finished = match kind {
                FuType::Fx | FuType::Fp => finish_arithmetic(cpu, ctx, execution.id),
                FuType::Branch => finish_branch(cpu, ctx, execution.id),
                FuType::LoadStore => finish_address(cpu, ctx, execution.id, &mut violation),
                FuType::Memory => finish_memory(cpu, execution),
            }?;
            // A computed address only hands the access over to the load/store buffers.
            let complete = match finished {
                Ok(()) => kind != FuType::LoadStore,
                Err(exception) => {
                    let instruction = cpu.arena.get_mut().get_mut(execution.id)?;
                    tracing::debug!(
                        id = execution.id,
                        speculative = instruction.speculative,
                        %exception,
                        "execution raised an exception"
                    );
                    instruction.exception = Some(exception);
                    cpu.units.get_mut()[index].failed.push(execution.id);
                    true
                }
            };
            if complete {
                let tick = cpu.tick;
                cpu.arena.get_mut().get_mut(execution.id)?.stamps.executed = Some(tick);
            }
        }
    }

    if let Some(load) = violation {
        let pc = cpu.arena.get(load)?.pc;
        tracing::debug!(load, pc, "load/store ordering violation");
        flush::flush_from(
            cpu,
            load,
            pc,
            FlushCause::OrderingViolation,
            ctx.config.pipeline.flush_penalty,
        );
    }
    Ok(())
}

type Finished = Result<Result<(), RuntimeException>, SimError>;

fn code_of<'a>(ctx: &'a Context, instruction: &DynamicInstruction) -> Result<&'a StaticInstruction, SimError> {
    ctx.program.instruction_at(instruction.pc).ok_or_else(|| {
        SimError::Invariant(format!(
            "instruction {} executes outside the program",
            instruction.id
        ))
    })
}

fn finish_arithmetic(cpu: &mut CpuState, ctx: &Context, id: u64) -> Finished {
    let instruction = cpu.arena.get(id)?;
    let code = code_of(ctx, instruction)?;
    let mut env = instruction.environment(code, &cpu.regs);
    if let Err(exception) = code.descriptor.interpretable_as.evaluate(&mut env) {
        return Ok(Err(exception));
    }
    if let (Some(destination), Some(bits)) = (instruction.destination, destination_bits(code, &env)) {
        cpu.regs.get_mut().write(destination.register, bits);
    }
    Ok(Ok(()))
}

fn finish_branch(cpu: &mut CpuState, ctx: &Context, id: u64) -> Finished {
    let instruction = cpu.arena.get(id)?;
    let code = code_of(ctx, instruction)?;
    let descriptor = &code.descriptor;
    let mut env = instruction.environment(code, &cpu.regs);

    let taken = match &descriptor.condition {
        Some(condition) => match condition.evaluate(&mut env) {
            Ok(value) => value.is_some_and(|v| v.is_truthy()),
            Err(exception) => return Ok(Err(exception)),
        },
        None => true,
    };
    let target = match descriptor.target.as_ref().map(|t| t.evaluate(&mut env)) {
        Some(Ok(Some(value))) => value.as_code_address(),
        Some(Err(exception)) => return Ok(Err(exception)),
        Some(Ok(None)) | None => instruction.pc + INSTRUCTION_SIZE,
    };
    if !descriptor.interpretable_as.is_empty() {
        if let Err(exception) = descriptor.interpretable_as.evaluate(&mut env) {
            return Ok(Err(exception));
        }
    }
    let link = instruction
        .destination
        .zip(destination_bits(code, &env));
    let next_pc = if taken {
        target
    } else {
        instruction.pc + INSTRUCTION_SIZE
    };

    if let Some((destination, bits)) = link {
        cpu.regs.get_mut().write(destination.register, bits);
    }
    cpu.arena.get_mut().get_mut(id)?.outcome = Some(Outcome { taken, next_pc });
    Ok(Ok(()))
}

fn finish_address(cpu: &mut CpuState, ctx: &Context, id: u64, violation: &mut Option<u64>) -> Finished {
    let instruction = cpu.arena.get(id)?;
    let code = code_of(ctx, instruction)?;
    let Some(access) = &code.descriptor.memory else {
        return Err(SimError::Invariant(format!("instruction {id} has no memory access")));
    };
    let size = usize::from(access.size);
    let mut env = instruction.environment(code, &cpu.regs);
    let value = match code.descriptor.interpretable_as.evaluate(&mut env) {
        Ok(Some(value)) => value,
        Ok(None) => {
            return Ok(Err(RuntimeException::InvalidExpression(format!(
                "'{}' yields no address",
                code.descriptor.interpretable_as.source()
            ))));
        }
        Err(exception) => return Ok(Err(exception)),
    };
    let address = match value.as_address() {
        Ok(address) => address,
        Err(negative) => return Ok(Err(RuntimeException::NegativeAddress(negative))),
    };
    if let Err(exception) = cpu.memory.check(address, size) {
        return Ok(Err(exception));
    }

    match access.direction {
        MemoryDirection::Load => {
            if let Some(item) = cpu.load_buffer.get_mut().get_mut(id) {
                item.address = Some(address);
                item.state = LoadState::AddressReady;
            }
        }
        MemoryDirection::Store => {
            if let Some(item) = cpu.store_buffer.get_mut().get_mut(id) {
                item.address = Some(address);
                item.state = StoreState::AddressReady;
            }
            if let Some(load) = cpu.load_buffer.first_violation(id, address, size) {
                *violation = Some(violation.map_or(load, |v| v.min(load)));
            }
        }
    }
    Ok(Ok(()))
}

fn finish_memory(cpu: &mut CpuState, execution: Execution) -> Finished {
    let id = execution.id;
    let destination = cpu.arena.get(id)?.destination;
    if cpu.load_buffer.get(id).is_some() {
        if let (Some(destination), Some(value)) = (destination, execution.value) {
            cpu.regs.get_mut().write(destination.register, value);
        }
        if let Some(item) = cpu.load_buffer.get_mut().get_mut(id) {
            item.state = LoadState::Done;
        }
    } else if let Some(item) = cpu.store_buffer.get_mut().get_mut(id) {
        item.state = StoreState::Done;
    }
    Ok(Ok(()))
}
