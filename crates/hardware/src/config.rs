//! Configuration system for the superscalar simulator.
//!
//! This module defines every parameter of the simulated core. It provides:
//! 1. **Defaults:** Baseline sizes, widths and latencies in a private `defaults` module.
//! 2. **Structures:** Pipeline, prediction, functional unit, cache, memory and limit groups,
//!    flattened into one camelCase JSON object.
//! 3. **Enums:** Predictor type, replacement policy, store behavior, unit type and capability.
//! 4. **Validation:** A pass that collects every violated constraint before a simulation starts.
//!
//! Configuration is supplied as JSON (`serde_json`) or built with `CpuConfig::default()`.

use serde::{Deserialize, Serialize};

use crate::common::error::ConfigErrors;

/// Default configuration constants for the simulator.
mod defaults {
    /// Reorder buffer capacity.
    pub const ROB_SIZE: usize = 64;
    /// Instructions retired per tick at most.
    pub const COMMIT_WIDTH: usize = 4;
    /// Instructions fetched per tick at most.
    pub const FETCH_WIDTH: usize = 3;
    /// Fetch bubble, in ticks, after a misprediction flush.
    pub const FLUSH_PENALTY: u32 = 1;
    /// Branches followed in one fetch group.
    pub const BRANCH_FOLLOW_LIMIT: usize = 1;
    /// Load buffer capacity.
    pub const LB_SIZE: usize = 64;
    /// Store buffer capacity.
    pub const SB_SIZE: usize = 64;
    /// Speculative (rename) register pool size.
    pub const SPECULATIVE_REGISTERS: usize = 256;

    /// Branch target buffer entries.
    pub const BTB_SIZE: usize = 1024;
    /// Pattern history table entries.
    pub const PHT_SIZE: usize = 1024;
    /// Global history register length in bits.
    pub const GHR_SIZE: u32 = 10;
    /// Initial predictor state.
    pub const PREDICTOR_DEFAULT: &str = "Weakly Taken";

    /// Cache lines in total.
    pub const CACHE_LINES: usize = 16;
    /// Bytes per cache line.
    pub const CACHE_LINE_SIZE: usize = 32;
    /// Ways per set.
    pub const CACHE_ASSOC: usize = 2;
    /// Ticks for every cache access.
    pub const CACHE_ACCESS_DELAY: i64 = 1;
    /// Extra ticks for bringing a new line into the cache.
    pub const LANE_REPLACEMENT_DELAY: i64 = 1;
    /// Seed of the random replacement generator.
    pub const RANDOM_SEED: u64 = 123_456_789;

    /// Main memory read latency in ticks.
    pub const LOAD_LATENCY: i64 = 10;
    /// Main memory write latency in ticks.
    pub const STORE_LATENCY: i64 = 10;
    /// Main memory size in bytes.
    pub const MEMORY_SIZE: usize = 16 * 1024;
    /// Call stack size in bytes; data is placed above it.
    pub const CALL_STACK_SIZE: usize = 512;

    /// Tick cap before the simulation stops with `MaxCycles`.
    pub const MAX_CYCLES: u64 = 1_000_000;
    /// Undo frames kept for backward stepping.
    pub const HISTORY_LIMIT: usize = 4096;
}

/// Direction predictor flavor stored in each PHT entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PredictorType {
    /// Static prediction; never learns.
    #[serde(rename = "0bit", alias = "zeroBit")]
    ZeroBit,
    /// Last outcome.
    #[serde(rename = "1bit", alias = "oneBit")]
    OneBit,
    /// Two-bit saturating counter.
    #[default]
    #[serde(rename = "2bit", alias = "twoBit")]
    TwoBit,
}

/// How `predictorDefault` is compared against `"taken"` for 0-bit and 1-bit predictors.
///
/// `Literal` keeps the exact lowercase comparison, so `"Taken"` yields a not-taken default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DefaultStateMatching {
    /// Only the exact string `"taken"` selects taken.
    #[default]
    Literal,
    /// `"taken"` in any letter case selects taken.
    CaseInsensitive,
}

/// Cache replacement policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReplacementPolicy {
    /// Least Recently Used.
    #[default]
    #[serde(alias = "Lru")]
    Lru,
    /// First-In, First-Out.
    #[serde(alias = "Fifo")]
    Fifo,
    /// Seeded pseudo-random victim.
    #[serde(rename = "Random", alias = "RANDOM", alias = "random")]
    Random,
}

/// What happens to the backing memory when the cache is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StoreBehavior {
    /// Dirty lines reach memory on eviction.
    #[default]
    WriteBack,
    /// Every store reaches memory immediately. Rejected by validation.
    WriteThrough,
}

/// Functional unit class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FuType {
    /// Integer arithmetic.
    #[serde(rename = "FX")]
    Fx,
    /// Floating-point arithmetic.
    #[serde(rename = "FP")]
    Fp,
    /// Address computation for loads and stores.
    #[serde(rename = "L/S", alias = "LS")]
    LoadStore,
    /// Branch and jump resolution.
    #[serde(rename = "Branch")]
    Branch,
    /// Memory access unit.
    #[serde(rename = "Memory")]
    Memory,
}

/// Operation class an arithmetic unit may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    /// Addition, subtraction and comparison.
    Addition,
    /// Logic and shifts.
    Bitwise,
    /// Multiplication.
    Multiplication,
    /// Division and remainder.
    Division,
    /// Square root and conversions.
    Special,
}

impl Capability {
    /// Every capability, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Addition,
        Self::Bitwise,
        Self::Multiplication,
        Self::Division,
        Self::Special,
    ];
}

/// One capability of an arithmetic unit with its latency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityConfig {
    /// Operation class.
    pub name: Capability,
    /// Ticks the unit is busy for operations of this class.
    pub latency: i64,
}

/// One functional unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionalUnitConfig {
    /// Unit class.
    #[serde(rename = "type")]
    pub fu_type: FuType,
    /// Unique unit name.
    pub name: String,
    /// Base latency in ticks.
    #[serde(default = "FunctionalUnitConfig::default_latency")]
    pub latency: i64,
    /// Supported operation classes (FX and FP only).
    #[serde(default)]
    pub capabilities: Vec<CapabilityConfig>,
}

impl FunctionalUnitConfig {
    fn default_latency() -> i64 {
        1
    }

    /// Arithmetic unit supporting every capability with the given latency.
    pub fn arithmetic(fu_type: FuType, name: &str, latency: i64) -> Self {
        Self {
            fu_type,
            name: name.to_string(),
            latency,
            capabilities: Capability::ALL
                .iter()
                .map(|&name| CapabilityConfig { name, latency })
                .collect(),
        }
    }

    /// Non-arithmetic unit (L/S, Branch, Memory).
    pub fn simple(fu_type: FuType, name: &str, latency: i64) -> Self {
        Self {
            fu_type,
            name: name.to_string(),
            latency,
            capabilities: Vec::new(),
        }
    }
}

/// Front end, back end and buffer sizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    /// Reorder buffer capacity.
    #[serde(default = "PipelineConfig::default_rob_size")]
    pub rob_size: usize,
    /// Maximum retirements per tick.
    #[serde(default = "PipelineConfig::default_commit_width")]
    pub commit_width: usize,
    /// Maximum fetched instructions per tick.
    #[serde(default = "PipelineConfig::default_fetch_width")]
    pub fetch_width: usize,
    /// Fetch bubble after a misprediction.
    #[serde(default = "PipelineConfig::default_flush_penalty")]
    pub flush_penalty: u32,
    /// Branches fetch follows per group.
    #[serde(default = "PipelineConfig::default_branch_follow_limit")]
    pub branch_follow_limit: usize,
    /// Load buffer capacity.
    #[serde(default = "PipelineConfig::default_lb_size")]
    pub lb_size: usize,
    /// Store buffer capacity.
    #[serde(default = "PipelineConfig::default_sb_size")]
    pub sb_size: usize,
    /// Speculative register pool size.
    #[serde(default = "PipelineConfig::default_speculative_registers")]
    pub speculative_registers: usize,
}

impl PipelineConfig {
    fn default_rob_size() -> usize {
        defaults::ROB_SIZE
    }

    fn default_commit_width() -> usize {
        defaults::COMMIT_WIDTH
    }

    fn default_fetch_width() -> usize {
        defaults::FETCH_WIDTH
    }

    fn default_flush_penalty() -> u32 {
        defaults::FLUSH_PENALTY
    }

    fn default_branch_follow_limit() -> usize {
        defaults::BRANCH_FOLLOW_LIMIT
    }

    fn default_lb_size() -> usize {
        defaults::LB_SIZE
    }

    fn default_sb_size() -> usize {
        defaults::SB_SIZE
    }

    fn default_speculative_registers() -> usize {
        defaults::SPECULATIVE_REGISTERS
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            rob_size: defaults::ROB_SIZE,
            commit_width: defaults::COMMIT_WIDTH,
            fetch_width: defaults::FETCH_WIDTH,
            flush_penalty: defaults::FLUSH_PENALTY,
            branch_follow_limit: defaults::BRANCH_FOLLOW_LIMIT,
            lb_size: defaults::LB_SIZE,
            sb_size: defaults::SB_SIZE,
            speculative_registers: defaults::SPECULATIVE_REGISTERS,
        }
    }
}

/// Branch prediction structures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictorConfig {
    /// Branch target buffer entries.
    #[serde(default = "PredictorConfig::default_btb_size")]
    pub btb_size: usize,
    /// Pattern history table entries.
    #[serde(default = "PredictorConfig::default_pht_size")]
    pub pht_size: usize,
    /// Global history register length in bits.
    #[serde(default = "PredictorConfig::default_ghr_size")]
    pub ghr_size: u32,
    /// XOR the global history into the PHT index (GShare).
    #[serde(default = "PredictorConfig::default_use_global_history")]
    pub use_global_history: bool,
    /// Predictor kind in each PHT entry.
    #[serde(default)]
    pub predictor_type: PredictorType,
    /// Initial predictor state (`"taken"`/`"not taken"`, or a two-bit state name).
    #[serde(default = "PredictorConfig::default_predictor_default")]
    pub predictor_default: String,
    /// How `predictor_default` is matched for 0-bit and 1-bit predictors.
    #[serde(default)]
    pub default_state_matching: DefaultStateMatching,
}

/// Names of the four two-bit predictor states, weakest-not-taken last.
pub const TWO_BIT_STATES: [&str; 4] = [
    "Strongly Not Taken",
    "Weakly Not Taken",
    "Weakly Taken",
    "Strongly Taken",
];

impl PredictorConfig {
    fn default_btb_size() -> usize {
        defaults::BTB_SIZE
    }

    fn default_pht_size() -> usize {
        defaults::PHT_SIZE
    }

    fn default_ghr_size() -> u32 {
        defaults::GHR_SIZE
    }

    fn default_use_global_history() -> bool {
        true
    }

    fn default_predictor_default() -> String {
        defaults::PREDICTOR_DEFAULT.to_string()
    }

    /// Initial direction of 0-bit and 1-bit predictors.
    ///
    /// With [`DefaultStateMatching::Literal`] only the exact string `"taken"` means taken.
    pub fn default_taken(&self) -> bool {
        let value = self.predictor_default.trim();
        match self.default_state_matching {
            DefaultStateMatching::Literal => {
                if value != "taken" && value.eq_ignore_ascii_case("taken") {
                    tracing::warn!(
                        predictor_default = %value,
                        "predictorDefault differs from \"taken\" only in case; literal matching selects not-taken"
                    );
                }
                value == "taken"
            }
            DefaultStateMatching::CaseInsensitive => value.eq_ignore_ascii_case("taken"),
        }
    }

    /// Initial counter (0..=3) of two-bit predictors, or `None` if the state name is unknown.
    pub fn default_counter(&self) -> Option<u8> {
        let value = self.predictor_default.trim();
        TWO_BIT_STATES
            .iter()
            .position(|state| state.eq_ignore_ascii_case(value))
            .map(|p| p as u8)
    }
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            btb_size: defaults::BTB_SIZE,
            pht_size: defaults::PHT_SIZE,
            ghr_size: defaults::GHR_SIZE,
            use_global_history: true,
            predictor_type: PredictorType::default(),
            predictor_default: defaults::PREDICTOR_DEFAULT.to_string(),
            default_state_matching: DefaultStateMatching::default(),
        }
    }
}

/// Data cache parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfig {
    /// Put a cache in front of main memory.
    #[serde(default = "CacheConfig::default_use_cache")]
    pub use_cache: bool,
    /// Total number of lines.
    #[serde(default = "CacheConfig::default_cache_lines")]
    pub cache_lines: usize,
    /// Bytes per line.
    #[serde(default = "CacheConfig::default_cache_line_size")]
    pub cache_line_size: usize,
    /// Ways per set.
    #[serde(default = "CacheConfig::default_cache_assoc")]
    pub cache_assoc: usize,
    /// Ticks for every access.
    #[serde(default = "CacheConfig::default_cache_access_delay")]
    pub cache_access_delay: i64,
    /// Victim selection.
    #[serde(default)]
    pub cache_replacement: ReplacementPolicy,
    /// Store behavior; only write-back is supported.
    #[serde(default)]
    pub store_behavior: StoreBehavior,
    /// Extra ticks for bringing in a new line.
    #[serde(default = "CacheConfig::default_lane_replacement_delay")]
    pub lane_replacement_delay: i64,
    /// Also wait for lines that are still being filled by an earlier access.
    #[serde(default)]
    pub add_remaining_delay: bool,
    /// Seed of the random replacement generator.
    #[serde(default = "CacheConfig::default_random_seed")]
    pub random_seed: u64,
}

impl CacheConfig {
    fn default_use_cache() -> bool {
        true
    }

    fn default_cache_lines() -> usize {
        defaults::CACHE_LINES
    }

    fn default_cache_line_size() -> usize {
        defaults::CACHE_LINE_SIZE
    }

    fn default_cache_assoc() -> usize {
        defaults::CACHE_ASSOC
    }

    fn default_cache_access_delay() -> i64 {
        defaults::CACHE_ACCESS_DELAY
    }

    fn default_lane_replacement_delay() -> i64 {
        defaults::LANE_REPLACEMENT_DELAY
    }

    fn default_random_seed() -> u64 {
        defaults::RANDOM_SEED
    }

    /// Number of sets.
    pub const fn sets(&self) -> usize {
        if self.cache_assoc == 0 {
            0
        } else {
            self.cache_lines / self.cache_assoc
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            use_cache: true,
            cache_lines: defaults::CACHE_LINES,
            cache_line_size: defaults::CACHE_LINE_SIZE,
            cache_assoc: defaults::CACHE_ASSOC,
            cache_access_delay: defaults::CACHE_ACCESS_DELAY,
            cache_replacement: ReplacementPolicy::default(),
            store_behavior: StoreBehavior::default(),
            lane_replacement_delay: defaults::LANE_REPLACEMENT_DELAY,
            add_remaining_delay: false,
            random_seed: defaults::RANDOM_SEED,
        }
    }
}

/// Main memory parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryConfig {
    /// Read latency in ticks.
    #[serde(default = "MemoryConfig::default_load_latency")]
    pub load_latency: i64,
    /// Write latency in ticks.
    #[serde(default = "MemoryConfig::default_store_latency")]
    pub store_latency: i64,
    /// Size in bytes.
    #[serde(default = "MemoryConfig::default_memory_size")]
    pub memory_size: usize,
    /// Bytes reserved for the call stack at the bottom of memory.
    #[serde(default = "MemoryConfig::default_call_stack_size")]
    pub call_stack_size: usize,
}

impl MemoryConfig {
    fn default_load_latency() -> i64 {
        defaults::LOAD_LATENCY
    }

    fn default_store_latency() -> i64 {
        defaults::STORE_LATENCY
    }

    fn default_memory_size() -> usize {
        defaults::MEMORY_SIZE
    }

    fn default_call_stack_size() -> usize {
        defaults::CALL_STACK_SIZE
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            load_latency: defaults::LOAD_LATENCY,
            store_latency: defaults::STORE_LATENCY,
            memory_size: defaults::MEMORY_SIZE,
            call_stack_size: defaults::CALL_STACK_SIZE,
        }
    }
}

/// Run limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitsConfig {
    /// Tick cap; reaching it stops the run with `MaxCycles`.
    #[serde(default = "LimitsConfig::default_max_cycles")]
    pub max_cycles: u64,
    /// Undo frames kept; older ticks are reached by replaying from the start.
    #[serde(default = "LimitsConfig::default_history_limit")]
    pub history_limit: usize,
}

impl LimitsConfig {
    fn default_max_cycles() -> u64 {
        defaults::MAX_CYCLES
    }

    fn default_history_limit() -> usize {
        defaults::HISTORY_LIMIT
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_cycles: defaults::MAX_CYCLES,
            history_limit: defaults::HISTORY_LIMIT,
        }
    }
}

/// Root configuration of the simulated core.
///
/// All groups are flattened, so the JSON form is a single object:
///
/// ```
/// use superscalar_core::config::{CpuConfig, PredictorType};
///
/// let json = r#"{
///     "robSize": 32,
///     "fetchWidth": 2,
///     "predictorType": "1bit",
///     "predictorDefault": "taken",
///     "useCache": false
/// }"#;
///
/// let config: CpuConfig = serde_json::from_str(json).unwrap();
/// assert_eq!(config.pipeline.rob_size, 32);
/// assert_eq!(config.prediction.predictor_type, PredictorType::OneBit);
/// assert!(!config.cache.use_cache);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuConfig {
    /// Widths and buffer sizes.
    #[serde(flatten)]
    pub pipeline: PipelineConfig,
    /// Branch prediction.
    #[serde(flatten)]
    pub prediction: PredictorConfig,
    /// Functional units.
    #[serde(default = "CpuConfig::default_units")]
    pub f_units: Vec<FunctionalUnitConfig>,
    /// Data cache.
    #[serde(flatten)]
    pub cache: CacheConfig,
    /// Main memory.
    #[serde(flatten)]
    pub memory: MemoryConfig,
    /// Run limits.
    #[serde(flatten)]
    pub limits: LimitsConfig,
}

impl CpuConfig {
    fn default_units() -> Vec<FunctionalUnitConfig> {
        let mut div = FunctionalUnitConfig::arithmetic(FuType::Fx, "FX2", 1);
        for capability in &mut div.capabilities {
            capability.latency = match capability.name {
                Capability::Multiplication => 2,
                Capability::Division => 10,
                _ => 1,
            };
        }
        vec![
            FunctionalUnitConfig::arithmetic(FuType::Fx, "FX1", 1),
            div,
            FunctionalUnitConfig::arithmetic(FuType::Fp, "FP1", 2),
            FunctionalUnitConfig::simple(FuType::LoadStore, "LS1", 1),
            FunctionalUnitConfig::simple(FuType::Branch, "Branch1", 1),
            FunctionalUnitConfig::simple(FuType::Memory, "Memory1", 1),
        ]
    }

    /// Checks every constraint and reports all violations at once.
    ///
    /// # Errors
    ///
    /// Returns the full list of violated constraints.
    pub fn validate(&self) -> Result<(), ConfigErrors> {
        let mut errors = ConfigErrors::default();
        self.validate_pipeline(&mut errors);
        self.validate_prediction(&mut errors);
        self.validate_units(&mut errors);
        self.validate_cache(&mut errors);
        self.validate_memory(&mut errors);
        if self.limits.max_cycles == 0 {
            errors.push("maxCycles", "must be at least 1");
        }
        errors.into_result()
    }

    fn validate_pipeline(&self, errors: &mut ConfigErrors) {
        let p = &self.pipeline;
        check_range(errors, "robSize", p.rob_size, 1, 1024);
        check_range(errors, "commitWidth", p.commit_width, 1, 10);
        if p.commit_width > p.rob_size {
            errors.push("commitWidth", "must not exceed robSize");
        }
        check_range(errors, "flushPenalty", p.flush_penalty as usize, 0, 100);
        check_range(errors, "fetchWidth", p.fetch_width, 1, 10);
        if p.branch_follow_limit == 0 {
            errors.push("branchFollowLimit", "must be at least 1");
        }
        check_range(errors, "lbSize", p.lb_size, 1, 1024);
        check_range(errors, "sbSize", p.sb_size, 1, 1024);
        check_range(errors, "speculativeRegisters", p.speculative_registers, 1, 1024);
    }

    fn validate_prediction(&self, errors: &mut ConfigErrors) {
        let p = &self.prediction;
        check_range(errors, "btbSize", p.btb_size, 1, 16384);
        check_range(errors, "phtSize", p.pht_size, 1, 16384);
        check_range(errors, "ghrSize", p.ghr_size as usize, 1, 32);
        let value = p.predictor_default.trim();
        match p.predictor_type {
            PredictorType::ZeroBit | PredictorType::OneBit => {
                let known = ["taken", "not taken"]
                    .iter()
                    .any(|s| s.eq_ignore_ascii_case(value));
                if !known {
                    errors.push(
                        "predictorDefault",
                        format!("'{value}' is not a valid state, expected 'taken' or 'not taken'"),
                    );
                }
            }
            PredictorType::TwoBit => {
                if p.default_counter().is_none() {
                    errors.push(
                        "predictorDefault",
                        format!(
                            "'{value}' is not a valid state, expected one of {}",
                            TWO_BIT_STATES.join(", ")
                        ),
                    );
                }
            }
        }
    }

    fn validate_units(&self, errors: &mut ConfigErrors) {
        if self.f_units.is_empty() {
            errors.push("fUnits", "at least one functional unit is required");
        }
        let mut names = std::collections::BTreeSet::new();
        for unit in &self.f_units {
            if unit.name.trim().is_empty() {
                errors.push("fUnits", "unit name must not be empty");
            } else if !names.insert(unit.name.as_str()) {
                errors.push("fUnits", format!("duplicate unit name '{}'", unit.name));
            }
            if unit.latency < 0 {
                errors.push(
                    "fUnits",
                    format!("unit '{}' latency must be non-negative", unit.name),
                );
            }
            for capability in &unit.capabilities {
                if capability.latency < 0 {
                    errors.push(
                        "fUnits",
                        format!(
                            "unit '{}' capability {:?} latency must be non-negative",
                            unit.name, capability.name
                        ),
                    );
                }
            }
            if matches!(unit.fu_type, FuType::Fx | FuType::Fp) && unit.capabilities.is_empty() {
                errors.push(
                    "fUnits",
                    format!("arithmetic unit '{}' has no capabilities", unit.name),
                );
            }
        }
    }

    fn validate_cache(&self, errors: &mut ConfigErrors) {
        let c = &self.cache;
        if c.cache_access_delay < 0 {
            errors.push("cacheAccessDelay", "must be non-negative");
        }
        if c.lane_replacement_delay < 0 {
            errors.push("laneReplacementDelay", "must be non-negative");
        }
        if c.store_behavior != StoreBehavior::WriteBack {
            errors.push("storeBehavior", "only write-back is supported");
        }
        if !c.use_cache {
            return;
        }
        check_range(errors, "cacheLines", c.cache_lines, 1, 65536);
        check_range(errors, "cacheLineSize", c.cache_line_size, 1, 512);
        if !c.cache_line_size.is_power_of_two() {
            errors.push("cacheLineSize", "must be a power of two");
        }
        if c.cache_assoc == 0 {
            errors.push("cacheAssoc", "must be at least 1");
        } else if c.cache_assoc > c.cache_lines {
            errors.push("cacheAssoc", "must not exceed cacheLines");
        } else if c.cache_lines % c.cache_assoc != 0 {
            errors.push("cacheLines", "must be divisible by cacheAssoc");
        } else if !c.sets().is_power_of_two() {
            errors.push("cacheLines", "cacheLines / cacheAssoc must be a power of two");
        }
        if c.cache_line_size > 0 && self.memory.memory_size % c.cache_line_size != 0 {
            errors.push("memorySize", "must be a multiple of cacheLineSize");
        }
    }

    fn validate_memory(&self, errors: &mut ConfigErrors) {
        let m = &self.memory;
        if m.load_latency < 1 {
            errors.push("loadLatency", "must be at least 1");
        }
        if m.store_latency < 1 {
            errors.push("storeLatency", "must be at least 1");
        }
        check_range(errors, "callStackSize", m.call_stack_size, 1, 65536);
        if m.memory_size < m.call_stack_size {
            errors.push("memorySize", "must be at least callStackSize");
        }
        if m.memory_size > u32::MAX as usize {
            errors.push("memorySize", "must fit a 32-bit address space");
        }
    }
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            prediction: PredictorConfig::default(),
            f_units: Self::default_units(),
            cache: CacheConfig::default(),
            memory: MemoryConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

fn check_range(errors: &mut ConfigErrors, field: &str, value: usize, min: usize, max: usize) {
    if value < min || value > max {
        errors.push(field, format!("{value} is outside {min}..={max}"));
    }
}

/// Element type of a memory location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    /// 1 byte.
    #[serde(alias = "char")]
    Byte,
    /// 2 bytes.
    #[serde(alias = "half")]
    Short,
    /// 4 bytes.
    #[default]
    #[serde(alias = "word")]
    Int,
    /// 8 bytes.
    #[serde(alias = "dword")]
    Long,
    /// 4-byte IEEE-754.
    Float,
    /// 8-byte IEEE-754.
    Double,
}

impl ElementType {
    /// Size of one element in bytes.
    pub const fn size(self) -> usize {
        match self {
            Self::Byte => 1,
            Self::Short => 2,
            Self::Int | Self::Float => 4,
            Self::Long | Self::Double => 8,
        }
    }
}

/// Literal element of a memory location.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataValue {
    /// Integer literal.
    Integer(i64),
    /// Floating-point literal.
    Real(f64),
}

/// Named, initialized block of simulated memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryLocation {
    /// Label under which programs refer to the block.
    pub name: String,
    /// Alignment as a power-of-two exponent (2 means 4-byte aligned).
    #[serde(default)]
    pub alignment: u32,
    /// Element type.
    #[serde(default)]
    pub data_type: ElementType,
    /// Initial elements.
    #[serde(default)]
    pub values: Vec<DataValue>,
}

impl MemoryLocation {
    /// Serializes the elements little-endian.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.values.len() * self.data_type.size());
        for value in &self.values {
            let (int, real) = match *value {
                DataValue::Integer(i) => (i, i as f64),
                DataValue::Real(r) => (r as i64, r),
            };
            match self.data_type {
                ElementType::Byte => bytes.push(int as u8),
                ElementType::Short => bytes.extend_from_slice(&(int as u16).to_le_bytes()),
                ElementType::Int => bytes.extend_from_slice(&(int as u32).to_le_bytes()),
                ElementType::Long => bytes.extend_from_slice(&int.to_le_bytes()),
                ElementType::Float => bytes.extend_from_slice(&(real as f32).to_le_bytes()),
                ElementType::Double => bytes.extend_from_slice(&real.to_le_bytes()),
            }
        }
        bytes
    }
}

/// Where execution starts: a code label or a byte address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntryPoint {
    /// Absolute code address.
    Address(u64),
    /// Code label.
    Label(String),
}

impl Default for EntryPoint {
    fn default() -> Self {
        Self::Address(0)
    }
}

/// Everything needed to start a simulation: core parameters, program and data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationConfig {
    /// Core parameters.
    #[serde(default)]
    pub cpu_config: CpuConfig,
    /// Assembly source.
    #[serde(default)]
    pub code: String,
    /// Initialized data blocks placed above the call stack.
    #[serde(default)]
    pub memory_locations: Vec<MemoryLocation>,
    /// Start of execution.
    #[serde(default)]
    pub entry_point: EntryPoint,
}

impl SimulationConfig {
    /// Configuration running `code` on the default core.
    pub fn with_code(code: impl Into<String>) -> Self {
        Self {
            cpu_config: CpuConfig::default(),
            code: code.into(),
            memory_locations: Vec::new(),
            entry_point: EntryPoint::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(CpuConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validation_collects_every_error() {
        let mut config = CpuConfig::default();
        config.pipeline.rob_size = 0;
        config.cache.cache_line_size = 24;
        config.memory.load_latency = 0;
        let errors = config.validate().unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"robSize"));
        assert!(fields.contains(&"commitWidth"));
        assert!(fields.contains(&"cacheLineSize"));
        assert!(fields.contains(&"loadLatency"));
    }

    #[test]
    fn test_literal_matching_keeps_capitalized_taken_as_not_taken() {
        let mut p = PredictorConfig {
            predictor_type: PredictorType::OneBit,
            predictor_default: "Taken".to_string(),
            ..PredictorConfig::default()
        };
        assert!(!p.default_taken());
        p.default_state_matching = DefaultStateMatching::CaseInsensitive;
        assert!(p.default_taken());
        p.predictor_default = "taken".to_string();
        p.default_state_matching = DefaultStateMatching::Literal;
        assert!(p.default_taken());
    }

    #[test]
    fn test_two_bit_state_names() {
        let mut p = PredictorConfig::default();
        p.predictor_default = "Strongly Not Taken".to_string();
        assert_eq!(p.default_counter(), Some(0));
        p.predictor_default = "weakly taken".to_string();
        assert_eq!(p.default_counter(), Some(2));
        p.predictor_default = "maybe".to_string();
        assert_eq!(p.default_counter(), None);
    }

    #[test]
    fn test_unit_json_names() {
        let json = r#"{"type": "L/S", "name": "LS9", "latency": 2}"#;
        let unit: FunctionalUnitConfig = serde_json::from_str(json).unwrap();
        assert_eq!(unit.fu_type, FuType::LoadStore);
        assert!(unit.capabilities.is_empty());
    }
}
