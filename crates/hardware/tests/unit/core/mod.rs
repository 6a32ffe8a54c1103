/// Cache behavior observed through whole programs.
pub mod memory;

/// End-to-end pipeline scenarios.
pub mod pipeline;

/// Branch prediction accuracy.
pub mod prediction;
