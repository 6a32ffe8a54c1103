//! Functional Units.
//!
//! A functional unit holds one instruction for a configured number of ticks. Units are a
//! closed set of kinds dispatched by `match`:
//! 1. **Arithmetic:** FX and FP units; each supports a set of operation classes with
//!    its own latency.
//! 2. **Branch:** Resolves conditions and targets.
//! 3. **Load/Store:** Computes effective addresses.
//! 4. **Memory:** Performs the memory transaction of a load or store.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::config::{Capability, FuType, FunctionalUnitConfig};

/// Kind-specific configuration of a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitKind {
    /// FX or FP unit with per-capability latencies.
    Arithmetic {
        /// Supported operation classes and their latencies.
        capabilities: BTreeMap<Capability, u64>,
    },
    /// Branch resolution.
    Branch,
    /// Address computation.
    LoadStore,
    /// Memory transactions.
    Memory,
}

/// Instruction occupying a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Execution {
    /// Instruction id.
    pub id: u64,
    /// Ticks left, including the current one.
    pub remaining: u64,
    /// Loaded value carried by memory units.
    pub value: Option<u64>,
}

/// One configured functional unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionalUnit {
    /// Unique name.
    pub name: String,
    /// Unit class.
    pub fu_type: FuType,
    /// Base latency.
    pub latency: u64,
    /// Kind-specific data.
    pub kind: UnitKind,
    /// Instruction in execution.
    pub current: Option<Execution>,
    /// Instructions that raised an exception here, oldest first.
    pub failed: Vec<u64>,
}

impl FunctionalUnit {
    /// Builds a unit from its configuration.
    pub fn from_config(config: &FunctionalUnitConfig) -> Self {
        let kind = match config.fu_type {
            FuType::Fx | FuType::Fp => UnitKind::Arithmetic {
                capabilities: config
                    .capabilities
                    .iter()
                    .map(|c| (c.name, c.latency.max(0) as u64))
                    .collect(),
            },
            FuType::Branch => UnitKind::Branch,
            FuType::LoadStore => UnitKind::LoadStore,
            FuType::Memory => UnitKind::Memory,
        };
        Self {
            name: config.name.clone(),
            fu_type: config.fu_type,
            latency: config.latency.max(0) as u64,
            kind,
            current: None,
            failed: Vec::new(),
        }
    }

    /// Returns true if no instruction occupies the unit.
    pub const fn is_idle(&self) -> bool {
        self.current.is_none()
    }

    /// Returns true if the unit can execute an operation needing `needed`.
    pub fn supports(&self, needed: &BTreeSet<Capability>) -> bool {
        match &self.kind {
            UnitKind::Arithmetic { capabilities } => {
                needed.iter().all(|c| capabilities.contains_key(c))
            }
            UnitKind::Branch | UnitKind::LoadStore | UnitKind::Memory => needed.is_empty(),
        }
    }

    /// Execution time of an operation needing `needed`.
    ///
    /// Arithmetic units take the slowest of the needed capabilities; other units use
    /// their base latency.
    pub fn delay_for(&self, needed: &BTreeSet<Capability>) -> u64 {
        match &self.kind {
            UnitKind::Arithmetic { capabilities } => needed
                .iter()
                .filter_map(|c| capabilities.get(c).copied())
                .max()
                .unwrap_or(self.latency),
            UnitKind::Branch | UnitKind::LoadStore | UnitKind::Memory => self.latency,
        }
    }

    /// Occupies the unit with instruction `id` for `delay` ticks (at least one).
    pub fn start(&mut self, id: u64, delay: u64, value: Option<u64>) {
        self.current = Some(Execution {
            id,
            remaining: delay.max(1),
            value,
        });
    }

    /// Advances the unit by one tick.
    ///
    /// # Returns
    ///
    /// The execution that completed in this tick, which leaves the unit.
    pub fn advance(&mut self) -> Option<Execution> {
        let execution = self.current.as_mut()?;
        execution.remaining = execution.remaining.saturating_sub(1);
        if execution.remaining == 0 {
            self.current.take()
        } else {
            None
        }
    }

    /// Drops the current instruction and failures with id `>= first`.
    pub fn flush_from(&mut self, first: u64) {
        if self.current.is_some_and(|e| e.id >= first) {
            self.current = None;
        }
        self.failed.retain(|&id| id < first);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CapabilityConfig;

    fn divider() -> FunctionalUnit {
        FunctionalUnit::from_config(&FunctionalUnitConfig {
            fu_type: FuType::Fx,
            name: "FX".to_string(),
            latency: 1,
            capabilities: vec![
                CapabilityConfig {
                    name: Capability::Addition,
                    latency: 1,
                },
                CapabilityConfig {
                    name: Capability::Division,
                    latency: 5,
                },
            ],
        })
    }

    #[test]
    fn test_capability_match() {
        let unit = divider();
        assert!(unit.supports(&BTreeSet::from([Capability::Addition])));
        assert!(!unit.supports(&BTreeSet::from([Capability::Multiplication])));
        assert_eq!(
            unit.delay_for(&BTreeSet::from([Capability::Addition, Capability::Division])),
            5
        );
    }

    #[test]
    fn test_unit_holds_instruction_for_latency() {
        let mut unit = divider();
        unit.start(7, 3, None);
        assert!(unit.advance().is_none());
        assert!(unit.advance().is_none());
        assert_eq!(unit.advance().map(|e| e.id), Some(7));
        assert!(unit.is_idle());
    }

    #[test]
    fn test_zero_latency_takes_one_tick() {
        let mut unit = divider();
        unit.start(1, 0, None);
        assert!(unit.advance().is_some());
    }
}
