//! Simulation: owns the core state and its history side-by-side.
//!
//! The context (configuration and program) never changes after construction and is
//! shared by clones; each clone owns its state and history, so clones step
//! independently.

use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::snapshot::Snapshot;
use crate::common::error::{ConfigErrors, SimError};
use crate::config::{CpuConfig, FuType, SimulationConfig};
use crate::core::cpu::undo::UndoFrame;
use crate::core::units::fu::FunctionalUnit;
use crate::core::{Context, CpuState, StopReason};
use crate::isa::Isa;
use crate::program::Program;
use crate::stats::SimStats;

/// Result of a multi-tick request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationReport {
    /// Ticks stepped, forward or backward.
    pub ticks_simulated: u64,
    /// Tick reached.
    pub tick: u64,
    /// Stop reason at that tick.
    pub stop_reason: StopReason,
}

/// A running simulation.
#[derive(Debug, Clone)]
pub struct Simulation {
    source: Arc<SimulationConfig>,
    isa: Arc<Isa>,
    ctx: Arc<Context>,
    initial: CpuState,
    cpu: CpuState,
    history: VecDeque<UndoFrame>,
}

impl Simulation {
    /// Validates `config`, loads its program and builds the initial state.
    ///
    /// # Errors
    ///
    /// * `SimError::Config` with every violated constraint, including instructions no
    ///   configured unit can execute.
    /// * `SimError::Parse` with every problem in the program.
    pub fn new(config: SimulationConfig) -> Result<Self, SimError> {
        config.cpu_config.validate()?;
        let isa = Isa::embedded()?;
        let program = Program::load(&config, &isa)?;
        check_units(&config.cpu_config, &program)?;

        let ctx = Context {
            config: config.cpu_config.clone(),
            program,
        };
        let initial = CpuState::new(&ctx)?;
        tracing::debug!(
            instructions = ctx.program.instructions.len(),
            units = ctx.config.f_units.len(),
            entry_pc = ctx.program.entry_pc,
            "simulation created"
        );
        Ok(Self {
            source: Arc::new(config),
            isa: Arc::new(isa),
            ctx: Arc::new(ctx),
            cpu: initial.clone(),
            initial,
            history: VecDeque::new(),
        })
    }

    /// Restores a simulation from a snapshot.
    ///
    /// The restored simulation has no history; stepping back replays from tick zero.
    ///
    /// # Errors
    ///
    /// The errors of [`Simulation::new`] for the snapshot's configuration.
    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self, SimError> {
        let mut simulation = Self::new(snapshot.config)?;
        simulation.cpu = snapshot.state;
        Ok(simulation)
    }

    /// Captures configuration and current state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            config: (*self.source).clone(),
            state: self.cpu.clone(),
        }
    }

    /// Simulates one tick.
    ///
    /// Returns false without doing anything once the simulation stopped.
    ///
    /// # Errors
    ///
    /// Pipeline bookkeeping errors from [`CpuState::tick`].
    pub fn step(&mut self) -> Result<bool, SimError> {
        if self.cpu.is_stopped() {
            return Ok(false);
        }
        let prev_tick = self.cpu.tick;
        self.cpu.tick(&self.ctx)?;

        let limit = self.ctx.config.limits.history_limit;
        if limit == 0 {
            self.cpu.seal_undo();
        } else {
            let frame = self.cpu.take_undo(prev_tick);
            self.history.push_back(frame);
            while self.history.len() > limit {
                let _ = self.history.pop_front();
            }
        }
        Ok(true)
    }

    /// Steps back one tick.
    ///
    /// Returns false at tick zero. Without a recorded frame the state is rebuilt by
    /// replaying from the initial state.
    ///
    /// # Errors
    ///
    /// Pipeline bookkeeping errors raised while replaying.
    pub fn step_back(&mut self) -> Result<bool, SimError> {
        if self.cpu.tick == 0 {
            return Ok(false);
        }
        if let Some(frame) = self.history.pop_back() {
            self.cpu.apply_undo(frame);
            return Ok(true);
        }
        let target = self.cpu.tick - 1;
        tracing::debug!(target, "history exhausted; replaying from the initial state");
        self.cpu = self.initial.clone();
        while self.cpu.tick < target {
            if !self.step()? {
                break;
            }
        }
        Ok(true)
    }

    /// Steps forward or backward until `tick` is reached or, going forward, the
    /// simulation stops.
    ///
    /// # Errors
    ///
    /// Errors of [`Simulation::step`] and [`Simulation::step_back`].
    pub fn simulate_to(&mut self, tick: u64) -> Result<SimulationReport, SimError> {
        let mut ticks_simulated = 0;
        while self.cpu.tick > tick && self.step_back()? {
            ticks_simulated += 1;
        }
        while self.cpu.tick < tick && self.step()? {
            ticks_simulated += 1;
        }
        Ok(self.report(ticks_simulated))
    }

    /// Runs until a stop condition is reached.
    ///
    /// # Errors
    ///
    /// Errors of [`Simulation::step`].
    pub fn run(&mut self) -> Result<SimulationReport, SimError> {
        let mut ticks_simulated = 0;
        while self.step()? {
            ticks_simulated += 1;
        }
        tracing::debug!(
            tick = self.cpu.tick,
            reason = ?self.cpu.stop_reason(),
            committed = self.cpu.stats.committed,
            "run finished"
        );
        Ok(self.report(ticks_simulated))
    }

    fn report(&self, ticks_simulated: u64) -> SimulationReport {
        SimulationReport {
            ticks_simulated,
            tick: self.cpu.tick,
            stop_reason: self.cpu.stop_reason(),
        }
    }

    /// Current state.
    pub const fn state(&self) -> &CpuState {
        &self.cpu
    }

    /// Shared configuration and program.
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Loaded instruction set.
    pub fn isa(&self) -> &Isa {
        &self.isa
    }

    /// Ticks simulated so far.
    pub const fn tick(&self) -> u64 {
        self.cpu.tick
    }

    /// Current stop reason.
    pub fn stop_reason(&self) -> StopReason {
        self.cpu.stop_reason()
    }

    /// Statistics gathered so far.
    pub fn stats(&self) -> &SimStats {
        &self.cpu.stats
    }

    /// Undo frames available before stepping back falls back to replay.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Committed value of the register named `name` (`x5`, `t0`, `f1`, ...).
    pub fn register(&self, name: &str) -> Option<u64> {
        self.isa.register(name).map(|reg| self.cpu.register(reg))
    }

    /// Bytes at `address` as the program sees them.
    pub fn read_memory(&self, address: u64, len: usize) -> Vec<u8> {
        self.cpu.read_memory(address, len)
    }

    /// Bytes of the data label `label`, if defined.
    pub fn read_label(&self, label: &str, len: usize) -> Option<Vec<u8>> {
        self.ctx
            .program
            .label(label)
            .map(|address| self.read_memory(address, len))
    }
}

/// Reports every mnemonic in `program` that no configured unit can execute.
fn check_units(config: &CpuConfig, program: &Program) -> Result<(), ConfigErrors> {
    let units: Vec<FunctionalUnit> = config.f_units.iter().map(FunctionalUnit::from_config).collect();
    let mut errors = ConfigErrors::default();
    let mut seen = BTreeSet::new();
    for instruction in &program.instructions {
        let descriptor = &instruction.descriptor;
        if !seen.insert(descriptor.name.as_str()) {
            continue;
        }
        let kind = descriptor.class.unit_type();
        let needed = descriptor.capabilities();
        if !units.iter().any(|u| u.fu_type == kind && u.supports(&needed)) {
            errors.push(
                "fUnits",
                format!("no unit can execute instruction '{}'", descriptor.name),
            );
        }
        if descriptor.memory.is_some() && !units.iter().any(|u| u.fu_type == FuType::Memory) {
            errors.push(
                "fUnits",
                format!("instruction '{}' needs a Memory unit", descriptor.name),
            );
        }
    }
    errors.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_unit_is_a_config_error() {
        let mut config = SimulationConfig::with_code("mul x1, x2, x3");
        config.cpu_config.f_units.retain(|u| u.fu_type != FuType::Fx);
        match Simulation::new(config) {
            Err(SimError::Config(errors)) => {
                assert!(errors.iter().any(|e| e.message.contains("'mul'")));
            }
            other => panic!("expected a configuration error, got {other:?}"),
        }
    }

    #[test]
    fn test_step_back_at_start_is_noop() {
        let mut sim = Simulation::new(SimulationConfig::with_code("addi x1, x1, 5")).unwrap();
        assert!(!sim.step_back().unwrap());
        assert!(sim.step().unwrap());
        assert!(sim.step_back().unwrap());
        assert_eq!(sim.tick(), 0);
    }
}
