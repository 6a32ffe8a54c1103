//! Load/Store Buffer Stage.
//!
//! Runs the buffer whose head instruction is older first.
//! 1. **Loads:** Every load with a known address asks the store buffer for forwarding.
//!    A hit completes the load at once, a stall waits, and a miss starts a memory
//!    transaction on an idle memory unit.
//! 2. **Stores:** The oldest store writes memory once it is at the ROB head with address
//!    and data ready; the memory unit then holds it for the access delay.

use crate::common::error::SimError;
use crate::config::FuType;
use crate::core::units::lsu::{ForwardResult, LoadState, StoreState};
use crate::core::units::memory::{self, extend};
use crate::core::{Context, CpuState};

/// Executes the load/store buffer stage.
///
/// # Errors
///
/// `SimError::UnknownInstruction` if a buffer entry is not in flight.
pub fn memory_stage(cpu: &mut CpuState, ctx: &Context) -> Result<(), SimError> {
    let loads_first = match (cpu.load_buffer.head(), cpu.store_buffer.head()) {
        (Some(load), Some(store)) => load < store.id,
        _ => true,
    };
    if loads_first {
        resolve_loads(cpu, ctx)?;
        start_store(cpu, ctx)
    } else {
        start_store(cpu, ctx)?;
        resolve_loads(cpu, ctx)
    }
}

fn idle_memory_unit(cpu: &CpuState) -> Option<usize> {
    cpu.units
        .iter()
        .position(|u| u.fu_type == FuType::Memory && u.is_idle())
}

fn resolve_loads(cpu: &mut CpuState, ctx: &Context) -> Result<(), SimError> {
    let tick = cpu.tick;
    for id in cpu.load_buffer.ready_ids() {
        let Some(item) = cpu.load_buffer.get(id) else {
            continue;
        };
        let (Some(address), size, signed) = (item.address, item.size, item.signed) else {
            continue;
        };

        match cpu.store_buffer.forward(id, address, size, &cpu.regs) {
            ForwardResult::Hit { from, register } => {
                let raw = cpu.regs.read(register).to_le_bytes();
                let value = extend(raw.get(..size).unwrap_or(&raw), signed);
                let instruction = cpu.arena.get_mut().get_mut(id)?;
                if let Some(destination) = instruction.destination {
                    cpu.regs.get_mut().write(destination.register, value);
                }
                instruction.stamps.executed = Some(tick);
                if let Some(item) = cpu.load_buffer.get_mut().get_mut(id) {
                    item.state = LoadState::Forwarded { from };
                }
                cpu.stats.get_mut().forwarded_loads += 1;
                tracing::trace!(id, from, address, "store-to-load forward");
            }
            ForwardResult::Stall => {}
            ForwardResult::Miss => {
                let Some(unit_index) = idle_memory_unit(cpu) else {
                    break;
                };
                let transfer = memory::load(
                    cpu.cache.get_mut().as_mut(),
                    &mut cpu.memory,
                    &ctx.config,
                    address,
                    size,
                    signed,
                    tick,
                );
                match transfer {
                    Ok(transfer) => {
                        let unit = &mut cpu.units.get_mut()[unit_index];
                        unit.start(id, unit.latency + transfer.delay, Some(transfer.value));
                        cpu.stats.get_mut().record_transfer(&transfer, size, false);
                        if let Some(item) = cpu.load_buffer.get_mut().get_mut(id) {
                            item.state = LoadState::Accessing;
                        }
                    }
                    Err(exception) => {
                        let instruction = cpu.arena.get_mut().get_mut(id)?;
                        instruction.exception = Some(exception);
                        instruction.stamps.executed = Some(tick);
                        if let Some(item) = cpu.load_buffer.get_mut().get_mut(id) {
                            item.state = LoadState::Done;
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

fn start_store(cpu: &mut CpuState, ctx: &Context) -> Result<(), SimError> {
    let Some(store) = cpu.store_buffer.head() else {
        return Ok(());
    };
    let (id, source, size) = (store.id, store.source, store.size);
    let Some(address) = store.address else {
        return Ok(());
    };
    if store.state != StoreState::AddressReady
        || cpu.rob.head() != Some(id)
        || !cpu.regs.is_ready(source)
    {
        return Ok(());
    }
    let Some(unit_index) = idle_memory_unit(cpu) else {
        return Ok(());
    };

    let tick = cpu.tick;
    let value = cpu.regs.read(source);
    let transfer = memory::store(
        cpu.cache.get_mut().as_mut(),
        &mut cpu.memory,
        &ctx.config,
        address,
        size,
        value,
        tick,
    );
    match transfer {
        Ok(transfer) => {
            let unit = &mut cpu.units.get_mut()[unit_index];
            unit.start(id, unit.latency + transfer.delay, None);
            cpu.stats.get_mut().record_transfer(&transfer, size, true);
            if let Some(item) = cpu.store_buffer.get_mut().get_mut(id) {
                item.state = StoreState::Accessing;
            }
            tracing::trace!(id, address, size, "store writes memory");
        }
        Err(exception) => {
            let instruction = cpu.arena.get_mut().get_mut(id)?;
            instruction.exception = Some(exception);
            instruction.stamps.executed = Some(tick);
        }
    }
    Ok(())
}
