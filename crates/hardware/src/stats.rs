//! Simulation statistics collection and reporting.
//!
//! This module tracks performance metrics of the simulated core. It provides:
//! 1. **Cycle and IPC:** Total cycles, committed instructions, and derived IPC.
//! 2. **Pipeline:** Fetched, decoded and flushed instruction counts, ROB flushes and
//!    decode stalls.
//! 3. **Instruction mix:** Counts by class and by mnemonic.
//! 4. **Branch prediction:** Committed, conditional and taken branches, and how many
//!    directions were predicted correctly.
//! 5. **Units:** Busy cycles of every functional unit.
//! 6. **Memory:** Cache accesses, hits, misses, write-backs and delays, main-memory
//!    transfers and store-to-load forwards.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::core::units::memory::Transfer;
use crate::isa::descriptor::{InstructionClass, MemoryDirection};

/// Simulation statistics structure tracking all performance metrics.
///
/// Part of the CPU state, so backward steps rewind it along with everything else.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimStats {
    /// Ticks simulated.
    pub cycles: u64,
    /// Instructions retired.
    pub committed: u64,
    /// Instructions removed by flushes.
    pub flushed: u64,
    /// Instructions fetched.
    pub fetched: u64,
    /// Instructions renamed by decode.
    pub decoded: u64,
    /// Flushes caused by mispredictions and ordering violations.
    pub rob_flushes: u64,
    /// Ticks decode could not take a new group.
    pub decode_stalls: u64,

    /// Committed integer arithmetic instructions.
    pub inst_int_arith: u64,
    /// Committed floating-point arithmetic instructions.
    pub inst_float_arith: u64,
    /// Committed loads.
    pub inst_load: u64,
    /// Committed stores.
    pub inst_store: u64,
    /// Committed jumps and branches.
    pub inst_branch: u64,
    /// Committed instructions by mnemonic.
    pub mnemonics: BTreeMap<String, u64>,

    /// Committed conditional branches.
    pub conditional_branches: u64,
    /// Committed jumps and branches that were taken.
    pub taken_branches: u64,
    /// Committed jumps and branches whose direction was predicted correctly.
    pub correctly_predicted: u64,

    /// Busy ticks by functional unit name.
    pub unit_busy: BTreeMap<String, u64>,

    /// Cache accesses.
    pub cache_accesses: u64,
    /// Cache accesses that found every line.
    pub cache_hits: u64,
    /// Cache accesses that filled at least one line.
    pub cache_misses: u64,
    /// Dirty lines written back.
    pub cache_write_backs: u64,
    /// Bytes transferred through the cache.
    pub cache_bytes: u64,
    /// Sum of access delays.
    pub memory_delay: u64,
    /// Loads sent to the memory hierarchy.
    pub memory_loads: u64,
    /// Stores sent to the memory hierarchy.
    pub memory_stores: u64,
    /// Loads served by the store buffer.
    pub forwarded_loads: u64,
}

/// Section names for selective stats output.
///
/// Valid section identifiers: `"summary"`, `"pipeline"`, `"instruction_mix"`, `"branch"`,
/// `"units"`, `"memory"`. Pass an empty slice to `print_sections` to print all sections.
pub const STATS_SECTIONS: &[&str] = &[
    "summary",
    "pipeline",
    "instruction_mix",
    "branch",
    "units",
    "memory",
];

const RULE: &str = "----------------------------------------------------------";
const BANNER: &str = "==========================================================";

fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

impl SimStats {
    /// Committed instructions per cycle.
    pub fn ipc(&self) -> f64 {
        if self.cycles == 0 {
            0.0
        } else {
            self.committed as f64 / self.cycles as f64
        }
    }

    /// Fraction of committed branches whose direction was predicted correctly.
    pub fn branch_accuracy(&self) -> Option<f64> {
        (self.inst_branch > 0).then(|| self.correctly_predicted as f64 / self.inst_branch as f64)
    }

    /// Fraction of cache accesses that hit.
    pub fn cache_hit_rate(&self) -> Option<f64> {
        (self.cache_accesses > 0).then(|| self.cache_hits as f64 / self.cache_accesses as f64)
    }

    /// Counts one retired instruction.
    pub fn record_commit(&mut self, mnemonic: &str, class: InstructionClass, memory: Option<MemoryDirection>) {
        self.committed += 1;
        *self.mnemonics.entry(mnemonic.to_string()).or_default() += 1;
        match (class, memory) {
            (_, Some(MemoryDirection::Load)) => self.inst_load += 1,
            (_, Some(MemoryDirection::Store)) => self.inst_store += 1,
            (InstructionClass::IntArithmetic | InstructionClass::LoadStore, None) => {
                self.inst_int_arith += 1;
            }
            (InstructionClass::FloatArithmetic, None) => self.inst_float_arith += 1,
            (InstructionClass::JumpBranch, None) => self.inst_branch += 1,
        }
    }

    /// Counts the resolution of a retired jump or branch.
    pub fn record_branch(&mut self, conditional: bool, taken: bool, predicted_taken: bool) {
        if conditional {
            self.conditional_branches += 1;
        }
        if taken {
            self.taken_branches += 1;
        }
        if taken == predicted_taken {
            self.correctly_predicted += 1;
        }
    }

    /// Counts one transfer started by a memory unit.
    pub fn record_transfer(&mut self, transfer: &Transfer, size: usize, store: bool) {
        if store {
            self.memory_stores += 1;
        } else {
            self.memory_loads += 1;
        }
        self.memory_delay += transfer.delay;
        if let Some(hit) = transfer.cache_hit {
            self.cache_accesses += 1;
            self.cache_bytes += size as u64;
            self.cache_write_backs += u64::from(transfer.write_backs);
            if hit {
                self.cache_hits += 1;
            } else {
                self.cache_misses += 1;
            }
        }
    }

    /// Adds a busy tick to unit `name`.
    pub fn record_busy(&mut self, name: &str) {
        *self.unit_busy.entry(name.to_string()).or_default() += 1;
    }

    /// Renders the requested statistics sections.
    ///
    /// Each element of `sections` should be one of [`STATS_SECTIONS`]. An empty slice
    /// renders every section.
    pub fn render_sections(&self, sections: &[String]) -> String {
        let want = |s: &str| sections.is_empty() || sections.iter().any(|x| x == s);
        let mut out = String::new();
        let _ = writeln!(out, "\n{BANNER}");
        let _ = writeln!(out, "SUPERSCALAR SIMULATION STATISTICS");
        let _ = writeln!(out, "{BANNER}");

        if want("summary") {
            let _ = writeln!(out, "sim_cycles               {}", self.cycles);
            let _ = writeln!(out, "sim_insts                {}", self.committed);
            let _ = writeln!(out, "sim_ipc                  {:.4}", self.ipc());
            let _ = writeln!(out, "{RULE}");
        }
        if want("pipeline") {
            let _ = writeln!(out, "PIPELINE");
            let _ = writeln!(out, "  fetched                {}", self.fetched);
            let _ = writeln!(out, "  decoded                {}", self.decoded);
            let _ = writeln!(out, "  flushed                {}", self.flushed);
            let _ = writeln!(out, "  rob_flushes            {}", self.rob_flushes);
            let _ = writeln!(
                out,
                "  decode_stalls          {} ({:.2}%)",
                self.decode_stalls,
                percent(self.decode_stalls, self.cycles)
            );
            let _ = writeln!(out, "{RULE}");
        }
        if want("instruction_mix") {
            let _ = writeln!(out, "INSTRUCTION MIX");
            for (name, count) in [
                ("op.int_arith", self.inst_int_arith),
                ("op.float_arith", self.inst_float_arith),
                ("op.load", self.inst_load),
                ("op.store", self.inst_store),
                ("op.branch", self.inst_branch),
            ] {
                let _ = writeln!(
                    out,
                    "  {name:<22} {count} ({:.2}%)",
                    percent(count, self.committed)
                );
            }
            for (mnemonic, count) in &self.mnemonics {
                let _ = writeln!(out, "    {mnemonic:<20} {count}");
            }
            let _ = writeln!(out, "{RULE}");
        }
        if want("branch") {
            let _ = writeln!(out, "BRANCH PREDICTION");
            let _ = writeln!(out, "  bp.committed           {}", self.inst_branch);
            let _ = writeln!(out, "  bp.conditional         {}", self.conditional_branches);
            let _ = writeln!(out, "  bp.taken               {}", self.taken_branches);
            let _ = writeln!(out, "  bp.correct             {}", self.correctly_predicted);
            let _ = writeln!(
                out,
                "  bp.accuracy            {:.2}%",
                self.branch_accuracy().unwrap_or(0.0) * 100.0
            );
            let _ = writeln!(out, "{RULE}");
        }
        if want("units") {
            let _ = writeln!(out, "FUNCTIONAL UNITS");
            for (name, busy) in &self.unit_busy {
                let _ = writeln!(
                    out,
                    "  {name:<22} {busy} ({:.2}%)",
                    percent(*busy, self.cycles)
                );
            }
            let _ = writeln!(out, "{RULE}");
        }
        if want("memory") {
            let _ = writeln!(out, "MEMORY HIERARCHY");
            let _ = writeln!(
                out,
                "  cache  accesses: {:<10} | hits: {:<10} | miss_rate: {:.2}%",
                self.cache_accesses,
                self.cache_hits,
                percent(self.cache_misses, self.cache_accesses)
            );
            let _ = writeln!(out, "  cache.write_backs      {}", self.cache_write_backs);
            let _ = writeln!(out, "  cache.bytes            {}", self.cache_bytes);
            let _ = writeln!(out, "  memory.loads           {}", self.memory_loads);
            let _ = writeln!(out, "  memory.stores          {}", self.memory_stores);
            let _ = writeln!(out, "  memory.delay           {}", self.memory_delay);
            let _ = writeln!(out, "  lsu.forwarded_loads    {}", self.forwarded_loads);
        }
        let _ = writeln!(out, "{BANNER}");
        out
    }

    /// Prints only the requested statistics sections to stdout.
    pub fn print_sections(&self, sections: &[String]) {
        print!("{}", self.render_sections(sections));
    }

    /// Prints all statistics sections to stdout.
    ///
    /// Equivalent to `print_sections(&[])`.
    pub fn print(&self) {
        self.print_sections(&[]);
    }
}
