//! Ready-made queueing models built on the `qsim-core` kernel
//!
//! Each scenario wires concrete entities into a [`qsim_core::Model`] and
//! exposes a config struct plus a `build` function returning the entity
//! handles, so callers can run the model and pull typed entities back out
//! for inspection.

pub mod failover;

pub use failover::{
    build as build_failover, FailoverConfig, FailoverIds, GeneratorMode, ModeSource, PrimaryUnit,
    StandbyState, StandbyUnit,
};
