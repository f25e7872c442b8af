//! Error types for the simulation kernel
//!
//! Admission rejection is deliberately not an error: a full server counts the
//! failure and the run continues. Errors are reserved for faults that make a
//! run invalid.

use crate::entity::EntityId;
use thiserror::Error;

/// Top-level error type for model construction and execution.
#[derive(Debug, Error)]
pub enum SimError {
    /// The model was wired in a way an entity cannot support. Raised while
    /// building, before any tick runs.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A routing or balancing link names an entity that does not exist.
    #[error("unknown entity: {0}")]
    UnknownEntity(EntityId),

    /// Programmer error detected mid-run (e.g. a tick minimum no entity
    /// owns, or an arrival delivered to a source). The run halts and its
    /// partial statistics are invalid.
    #[error("invariant violation: {0}")]
    Invariant(String),
}
