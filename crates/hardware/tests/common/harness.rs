use superscalar_core::config::{CpuConfig, DataValue, ElementType, MemoryLocation};
use superscalar_core::{Simulation, SimulationConfig, SimulationReport};

/// Installs a test-friendly `tracing` subscriber once; `RUST_LOG` selects the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Fluent builder around a `SimulationConfig`.
pub struct TestContext {
    pub config: SimulationConfig,
}

impl TestContext {
    /// Default core running `code`.
    pub fn new(code: &str) -> Self {
        init_tracing();
        Self {
            config: SimulationConfig::with_code(code),
        }
    }

    /// Adjusts the core parameters.
    pub fn with_cpu(mut self, f: impl FnOnce(&mut CpuConfig)) -> Self {
        f(&mut self.config.cpu_config);
        self
    }

    /// Adds a word-aligned `int` memory location.
    pub fn with_ints(mut self, name: &str, values: &[i64]) -> Self {
        self.config.memory_locations.push(MemoryLocation {
            name: name.to_string(),
            alignment: 2,
            data_type: ElementType::Int,
            values: values.iter().map(|&v| DataValue::Integer(v)).collect(),
        });
        self
    }

    /// Builds the simulation, panicking on configuration or parse errors.
    pub fn build(self) -> Simulation {
        match Simulation::new(self.config) {
            Ok(sim) => sim,
            Err(e) => panic!("simulation setup failed: {e}"),
        }
    }

    /// Builds and runs to completion.
    pub fn run(self) -> (Simulation, SimulationReport) {
        let mut sim = self.build();
        let report = sim.run().unwrap();
        (sim, report)
    }
}

/// Reads `count` little-endian 32-bit integers at data label `label`.
pub fn read_ints(sim: &Simulation, label: &str, count: usize) -> Vec<i32> {
    let bytes = sim
        .read_label(label, count * 4)
        .unwrap_or_else(|| panic!("label '{label}' is not defined"));
    bytes
        .chunks_exact(4)
        .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Committed value of `name` as a signed 32-bit integer.
pub fn reg(sim: &Simulation, name: &str) -> i32 {
    sim.register(name)
        .unwrap_or_else(|| panic!("unknown register '{name}'")) as u32 as i32
}
