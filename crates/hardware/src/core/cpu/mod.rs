//! CPU State Definition and Tick Orchestration.
//!
//! This module defines `CpuState`, the container for the entire simulated core. It
//! coordinates the following:
//! 1. **State Management:** Instruction arena, register file with renaming, predictor
//!    tables, buffers, units, cache, main memory and statistics.
//! 2. **Pipeline Control:** One tick runs commit/dispatch, functional units, load/store
//!    buffers, issue windows, decode and fetch, in that order.
//! 3. **Stop Detection:** Call-stack halt, committed exception, cycle limit and end of
//!    code, in that priority.
//! 4. **Backward Stepping:** Every component captures its pre-tick value on first
//!    mutation; [`undo::UndoFrame`] collects the captures of one tick.

/// Per-tick undo frames.
pub mod undo;

use serde::{Deserialize, Serialize};

use crate::common::error::{RuntimeException, SimError};
use crate::common::tracked::Tracked;
use crate::core::arch::RegisterFile;
use crate::core::instruction::InstructionArena;
use crate::core::pipeline::decode::{self, DecodeUnit};
use crate::core::pipeline::execute;
use crate::core::pipeline::fetch::{self, FetchUnit};
use crate::core::pipeline::issue::{self, IssueWindow, WINDOW_ORDER};
use crate::core::pipeline::memory;
use crate::core::pipeline::rob::{self, Rob};
use crate::core::units::bru::{Btb, Ghr, Pht};
use crate::core::units::cache::Cache;
use crate::core::units::fu::FunctionalUnit;
use crate::core::units::lsu::{LoadBuffer, StoreBuffer};
use crate::core::units::memory::{MainMemory, peek};
use crate::core::Context;
use crate::isa::abi::{ArchReg, REG_SP};
use crate::stats::SimStats;

/// Why the simulation stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StopReason {
    /// Still running.
    #[default]
    NotStopped,
    /// The entry function returned.
    CallStackHalt,
    /// A faulting instruction reached the ROB head.
    Exception,
    /// `maxCycles` ticks were simulated.
    MaxCycles,
    /// Fetch left the program and the pipeline drained.
    EndOfCode,
}

/// Exception that stopped the simulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommittedException {
    /// Faulting instruction.
    pub id: u64,
    /// Its code address.
    pub pc: u64,
    /// What went wrong.
    pub exception: RuntimeException,
}

/// Simulation status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    /// Stop reason, `NotStopped` while running.
    pub stop: StopReason,
    /// Set when the stop reason is `Exception`.
    pub exception: Option<CommittedException>,
}

/// Complete mutable state of the simulated core.
///
/// Equality compares values only, so two states reached by different step sequences
/// compare equal when they describe the same machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuState {
    /// Ticks simulated.
    pub tick: u64,
    /// In-flight instructions.
    pub arena: Tracked<InstructionArena>,
    /// Fetch stage.
    pub fetch: Tracked<FetchUnit>,
    /// Decode stage.
    pub decode: Tracked<DecodeUnit>,
    /// Reorder buffer.
    pub rob: Tracked<Rob>,
    /// Architectural and speculative registers.
    pub regs: Tracked<RegisterFile>,
    /// Global history register.
    pub ghr: Tracked<Ghr>,
    /// Pattern history table (journaled).
    pub pht: Pht,
    /// Branch target buffer (journaled).
    pub btb: Btb,
    /// Issue windows in [`WINDOW_ORDER`].
    pub windows: Tracked<Vec<IssueWindow>>,
    /// Functional units in configuration order.
    pub units: Tracked<Vec<FunctionalUnit>>,
    /// Load buffer.
    pub load_buffer: Tracked<LoadBuffer>,
    /// Store buffer.
    pub store_buffer: Tracked<StoreBuffer>,
    /// Data cache, if enabled.
    pub cache: Tracked<Option<Cache>>,
    /// Main memory (journaled).
    pub memory: MainMemory,
    /// Statistics.
    pub stats: Tracked<SimStats>,
    /// Calls committed and not yet returned from. A return at depth zero leaves the
    /// entry function and halts.
    pub call_depth: Tracked<u64>,
    /// Stop reason.
    pub status: Tracked<Status>,
}

impl CpuState {
    /// Initial state: empty pipeline, `sp` at the top of the call stack, every other
    /// register zero and the program's data in memory.
    ///
    /// # Errors
    ///
    /// `SimError::Invariant` if the program's data does not fit in memory.
    pub fn new(ctx: &Context) -> Result<Self, SimError> {
        let config = &ctx.config;
        let mut regs = RegisterFile::new(config.pipeline.speculative_registers);
        regs.set_arch(REG_SP, config.memory.call_stack_size as u64);

        let mut main_memory = MainMemory::new(config.memory.memory_size);
        main_memory
            .load_blocks(&ctx.program.data)
            .map_err(|e| SimError::Invariant(format!("program data: {e}")))?;

        Ok(Self {
            tick: 0,
            arena: Tracked::new(InstructionArena::default()),
            fetch: Tracked::new(FetchUnit::new(ctx.program.entry_pc)),
            decode: Tracked::new(DecodeUnit::default()),
            rob: Tracked::new(Rob::new(config.pipeline.rob_size)),
            regs: Tracked::new(regs),
            ghr: Tracked::new(Ghr::new(config.prediction.ghr_size)),
            pht: Pht::new(&config.prediction),
            btb: Btb::new(config.prediction.btb_size),
            windows: Tracked::new(WINDOW_ORDER.iter().map(|&k| IssueWindow::new(k)).collect()),
            units: Tracked::new(config.f_units.iter().map(FunctionalUnit::from_config).collect()),
            load_buffer: Tracked::new(LoadBuffer::new(config.pipeline.lb_size)),
            store_buffer: Tracked::new(StoreBuffer::new(config.pipeline.sb_size)),
            cache: Tracked::new(config.cache.use_cache.then(|| Cache::new(&config.cache))),
            memory: main_memory,
            stats: Tracked::new(SimStats::default()),
            call_depth: Tracked::new(0),
            status: Tracked::new(Status::default()),
        })
    }

    /// Current stop reason.
    pub fn stop_reason(&self) -> StopReason {
        self.status.stop
    }

    /// Returns true once a stop condition was reached.
    pub fn is_stopped(&self) -> bool {
        self.status.stop != StopReason::NotStopped
    }

    /// Committed value of an architectural register.
    pub fn register(&self, reg: ArchReg) -> u64 {
        self.regs.arch_value(reg)
    }

    /// `len` bytes from `address` as the program sees them, dirty cache lines included.
    pub fn read_memory(&self, address: u64, len: usize) -> Vec<u8> {
        peek(self.cache.as_ref(), &self.memory, address, len)
    }

    /// Simulates one tick.
    ///
    /// Does nothing once the simulation stopped.
    ///
    /// # Errors
    ///
    /// `SimError::UnknownInstruction` or `SimError::Invariant` if the pipeline
    /// bookkeeping is inconsistent.
    pub fn tick(&mut self, ctx: &Context) -> Result<(), SimError> {
        if self.is_stopped() {
            return Ok(());
        }
        self.tick += 1;
        self.stats.get_mut().cycles += 1;

        rob::rob_stage(self, ctx)?;
        if !self.is_stopped() {
            execute::execute_stage(self, ctx)?;
            memory::memory_stage(self, ctx)?;
            issue::issue_stage(self, ctx)?;
            decode::decode_stage(self, ctx)?;
            fetch::fetch_stage(self, ctx)?;
            self.check_limits(ctx);
        }
        if self.is_stopped() {
            tracing::debug!(tick = self.tick, reason = ?self.status.stop, "simulation stopped");
        }
        Ok(())
    }

    fn check_limits(&mut self, ctx: &Context) {
        let stop = if self.tick >= ctx.config.limits.max_cycles {
            StopReason::MaxCycles
        } else if !ctx.program.contains(self.fetch.pc)
            && self.rob.is_empty()
            && self.decode.buffer.is_empty()
            && self.fetch.group.is_empty()
        {
            StopReason::EndOfCode
        } else {
            return;
        };
        self.status.get_mut().stop = stop;
    }
}
