//! Branch prediction unit (BRU).
//!
//! Direction and target prediction used by fetch, trained at commit. It provides:
//! 1. **Bit Predictors:** Zero-, one- and two-bit direction predictors.
//! 2. **Pattern History Table:** A table of bit predictors.
//! 3. **Global History Register:** Speculative outcome history with per-instruction snapshots.
//! 4. **GShare:** PHT indexing that hashes the pc with the global history.
//! 5. **Branch Target Buffer:** Targets of previously taken branches.

/// Branch Target Buffer for storing predicted branch targets.
pub mod btb;

/// Global history register with per-instruction snapshots.
pub mod ghr;

/// GShare indexing of the pattern history table.
pub mod gshare;

/// Pattern history table.
pub mod pht;

/// Zero-, one- and two-bit direction predictors.
pub mod predictor;

pub use self::btb::Btb;
pub use self::ghr::Ghr;
pub use self::pht::Pht;
pub use self::predictor::BitPredictor;
