//! Direction predictors stored in each pattern history table entry.
//!
//! Variants are closed and dispatched by `match`:
//! 1. **Zero-bit:** A fixed direction that never learns.
//! 2. **One-bit:** The last observed direction.
//! 3. **Two-bit:** A saturating counter; values 2 and 3 predict taken.

use serde::{Deserialize, Serialize};

use crate::config::{PredictorConfig, PredictorType, TWO_BIT_STATES};

/// Counter value of the strongest taken state.
const TWO_BIT_MAX: u8 = 3;

/// One direction predictor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BitPredictor {
    /// Static direction.
    ZeroBit {
        /// Predicted direction.
        taken: bool,
    },
    /// Last outcome.
    OneBit {
        /// Predicted direction.
        taken: bool,
    },
    /// Saturating counter in `0..=3`.
    TwoBit {
        /// Counter value.
        counter: u8,
    },
}

impl BitPredictor {
    /// Initial predictor for `config`.
    ///
    /// Zero- and one-bit predictors derive their direction from `predictorDefault`
    /// through [`PredictorConfig::default_taken`]; two-bit predictors start in the named
    /// state, or weakly taken if the name is unknown.
    pub fn new(config: &PredictorConfig) -> Self {
        match config.predictor_type {
            PredictorType::ZeroBit => Self::ZeroBit {
                taken: config.default_taken(),
            },
            PredictorType::OneBit => Self::OneBit {
                taken: config.default_taken(),
            },
            PredictorType::TwoBit => Self::TwoBit {
                counter: config.default_counter().unwrap_or(2),
            },
        }
    }

    /// Predicted direction.
    pub const fn predict(self) -> bool {
        match self {
            Self::ZeroBit { taken } | Self::OneBit { taken } => taken,
            Self::TwoBit { counter } => counter >= 2,
        }
    }

    /// Moves the predictor towards taken.
    pub const fn up_the_probability(&mut self) {
        match self {
            Self::ZeroBit { .. } => {}
            Self::OneBit { taken } => *taken = true,
            Self::TwoBit { counter } => {
                if *counter < TWO_BIT_MAX {
                    *counter += 1;
                }
            }
        }
    }

    /// Moves the predictor towards not taken.
    pub const fn down_the_probability(&mut self) {
        match self {
            Self::ZeroBit { .. } => {}
            Self::OneBit { taken } => *taken = false,
            Self::TwoBit { counter } => {
                if *counter > 0 {
                    *counter -= 1;
                }
            }
        }
    }

    /// Trains the predictor with an observed direction.
    pub const fn update(&mut self, taken: bool) {
        if taken {
            self.up_the_probability();
        } else {
            self.down_the_probability();
        }
    }

    /// Human-readable state.
    pub fn state_name(self) -> &'static str {
        match self {
            Self::ZeroBit { taken } | Self::OneBit { taken } => {
                if taken {
                    "taken"
                } else {
                    "not taken"
                }
            }
            Self::TwoBit { counter } => TWO_BIT_STATES
                .get(counter as usize)
                .copied()
                .unwrap_or("invalid"),
        }
    }
}
