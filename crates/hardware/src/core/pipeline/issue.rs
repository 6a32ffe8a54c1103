//! Issue Windows.
//!
//! There is one window per instruction class (FX, FP, Branch, L/S). A window first
//! accepts the instructions dispatched this tick, then issues, oldest first, every
//! instruction whose operands are ready to the first idle unit of its class that
//! supports the operation.

use serde::{Deserialize, Serialize};

use crate::common::error::SimError;
use crate::config::FuType;
use crate::core::{Context, CpuState};

/// Window order used by the issue stage.
pub const WINDOW_ORDER: [FuType; 4] = [FuType::Fx, FuType::Fp, FuType::Branch, FuType::LoadStore];

/// Instructions waiting for operands and a free unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueWindow {
    /// Unit class fed by the window.
    pub kind: FuType,
    /// Dispatched this tick, not yet visible to selection.
    pub incoming: Vec<u64>,
    /// Waiting instructions, oldest first.
    pub waiting: Vec<u64>,
}

impl IssueWindow {
    /// Empty window for `kind` units.
    pub const fn new(kind: FuType) -> Self {
        Self {
            kind,
            incoming: Vec::new(),
            waiting: Vec::new(),
        }
    }

    /// Number of held instructions.
    pub fn len(&self) -> usize {
        self.incoming.len() + self.waiting.len()
    }

    /// Returns true if the window holds nothing.
    pub fn is_empty(&self) -> bool {
        self.incoming.is_empty() && self.waiting.is_empty()
    }

    /// Drops instructions with id `>= first`.
    pub fn flush_from(&mut self, first: u64) {
        self.incoming.retain(|&id| id < first);
        self.waiting.retain(|&id| id < first);
    }
}

/// Executes the issue stage for every window.
///
/// # Errors
///
/// `SimError::UnknownInstruction` or `SimError::Invariant` if a window holds an
/// instruction that is not in flight.
pub fn issue_stage(cpu: &mut CpuState, ctx: &Context) -> Result<(), SimError> {
    for kind in WINDOW_ORDER {
        issue_window(cpu, ctx, kind)?;
    }
    Ok(())
}

fn issue_window(cpu: &mut CpuState, ctx: &Context, kind: FuType) -> Result<(), SimError> {
    let Some(index) = cpu.windows.iter().position(|w| w.kind == kind) else {
        return Ok(());
    };
    if cpu.windows[index].is_empty() {
        return Ok(());
    }
    let tick = cpu.tick;
    let window = &mut cpu.windows.get_mut()[index];
    let incoming = std::mem::take(&mut window.incoming);
    window.waiting.extend(incoming);
    let waiting = window.waiting.clone();

    let mut issued = Vec::new();
    for id in waiting {
        let instruction = cpu.arena.get(id)?;
        let code = ctx.program.instruction_at(instruction.pc).ok_or_else(|| {
            SimError::Invariant(format!("instruction {id} issued outside the program"))
        })?;
        let descriptor = &code.descriptor;
        if !instruction.operands_ready(&descriptor.issue_operands(), &cpu.regs) {
            continue;
        }
        let needed = descriptor.capabilities();
        let Some(unit_index) = cpu
            .units
            .iter()
            .position(|u| u.fu_type == kind && u.is_idle() && u.supports(&needed))
        else {
            continue;
        };

        let units = cpu.units.get_mut();
        let unit = &mut units[unit_index];
        let delay = unit.delay_for(&needed);
        unit.start(id, delay, None);
        tracing::trace!(id, unit = %unit.name, delay, "issue");
        let instruction = cpu.arena.get_mut().get_mut(id)?;
        instruction.unit = Some(unit_index);
        instruction.stamps.issued = Some(tick);
        issued.push(id);
    }

    if !issued.is_empty() {
        cpu.windows.get_mut()[index]
            .waiting
            .retain(|id| !issued.contains(id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flush_clears_both_lists() {
        let mut window = IssueWindow::new(FuType::Fx);
        window.waiting.extend([1, 5]);
        window.incoming.push(6);
        window.flush_from(5);
        assert_eq!(window.waiting, vec![1]);
        assert!(window.incoming.is_empty());
        assert_eq!(window.len(), 1);
    }
}
