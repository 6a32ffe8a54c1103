//! Common utilities and types used throughout the simulator.
//!
//! This module provides building blocks shared by every component:
//! 1. **Data:** Operand data types and typed scalar values.
//! 2. **Error Handling:** Runtime exceptions, configuration and parse errors, and the
//!    top-level simulator error.
//! 3. **Undo Capture:** The tracked cell that makes backward stepping exact.

/// Operand data types and typed values.
pub mod data;

/// Error types and runtime exceptions.
pub mod error;

/// Per-tick undo capture cell.
pub mod tracked;

pub use data::{DataType, Value};
pub use error::{ConfigError, ConfigErrors, ParseError, ParseErrors, RuntimeException, SimError};
pub use tracked::Tracked;
