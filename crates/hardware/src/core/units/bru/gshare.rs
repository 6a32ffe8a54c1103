//! GShare indexing.
//!
//! GShare correlates global branch history with the program counter using an XOR
//! hash, so the same branch maps to different predictors in different contexts.
//! Without global history the table is indexed by the pc alone.

use crate::config::PredictorConfig;

/// PHT index of the branch at `pc` under the history value `ghr`.
///
/// `(pc mod size) XOR ghr`, folded back into the table.
pub fn index(config: &PredictorConfig, pc: u64, ghr: u64) -> usize {
    let size = config.pht_size.max(1) as u64;
    let local = pc % size;
    if config.use_global_history {
        ((local ^ ghr) % size) as usize
    } else {
        local as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_changes_the_index() {
        let mut config = PredictorConfig {
            pht_size: 16,
            ..PredictorConfig::default()
        };
        assert_eq!(index(&config, 20, 0), 4);
        assert_eq!(index(&config, 20, 0b11), 7);
        config.use_global_history = false;
        assert_eq!(index(&config, 20, 0b11), 4);
    }
}
