//! Out-of-order instruction pipeline.
//!
//! Each stage is a function over the CPU state, called once per tick in a fixed order by
//! [`crate::core::CpuState::tick`]:
//! 1. **Reorder Buffer:** In-order commit, then dispatch of renamed instructions.
//! 2. **Execute:** Functional units advance and finish their instructions.
//! 3. **Memory:** Load/store buffers forward values and start memory transactions.
//! 4. **Issue:** Windows accept dispatched instructions and issue ready ones.
//! 5. **Decode:** Renames the fetched group.
//! 6. **Fetch:** Predicts and fetches the next group.
//!
//! A misprediction, an ordering violation or an early jump redirect removes every
//! younger instruction through [`flush::flush_from`].

/// Rename and early redirect of direct jumps.
pub mod decode;

/// Functional unit stage.
pub mod execute;

/// Instruction fetch with branch prediction.
pub mod fetch;

/// Removal of instructions after a redirect.
pub mod flush;

/// Issue windows.
pub mod issue;

/// Load/store buffer stage.
pub mod memory;

/// Reorder buffer, commit and dispatch.
pub mod rob;
