//! Pattern History Table (PHT).

use serde::{Deserialize, Serialize};

use super::predictor::BitPredictor;
use crate::config::PredictorConfig;

/// Table of direction predictors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pht {
    entries: Vec<BitPredictor>,
    #[serde(skip)]
    journal: Vec<(usize, BitPredictor)>,
}

impl PartialEq for Pht {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Eq for Pht {}

impl Pht {
    /// Table of `config.pht_size` predictors in the configured initial state.
    pub fn new(config: &PredictorConfig) -> Self {
        Self {
            entries: vec![BitPredictor::new(config); config.pht_size],
            journal: Vec::new(),
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true for an empty table.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Predicted direction at `index`; out-of-range indices predict not taken.
    pub fn predict(&self, index: usize) -> bool {
        self.entries.get(index).is_some_and(|p| p.predict())
    }

    /// Predictor at `index`.
    pub fn get(&self, index: usize) -> Option<&BitPredictor> {
        self.entries.get(index)
    }

    /// Trains the predictor at `index`.
    pub fn update(&mut self, index: usize, taken: bool) {
        if let Some(p) = self.entries.get_mut(index) {
            self.journal.push((index, *p));
            p.update(taken);
        }
    }

    /// Moves out the previous predictor states recorded since the last call.
    pub fn take_journal(&mut self) -> Vec<(usize, BitPredictor)> {
        std::mem::take(&mut self.journal)
    }

    /// Restores predictor states recorded in `journal`, newest update first.
    pub fn undo(&mut self, journal: &[(usize, BitPredictor)]) {
        for &(index, state) in journal.iter().rev() {
            if let Some(p) = self.entries.get_mut(index) {
                *p = state;
            }
        }
    }
}
