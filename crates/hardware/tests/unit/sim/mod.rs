/// Serializable snapshots and deep copies.
pub mod snapshot;

/// Forward and backward stepping.
pub mod stepping;
