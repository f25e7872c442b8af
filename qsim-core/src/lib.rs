//! Discrete event simulation kernel for queueing networks.
//!
//! Time-stamped entities (arrival [`Source`]s and [`Server`]s owning pools
//! of [`Device`]s) exchange arrivals and completions along a directed
//! routing graph while the [`Model`] advances a global clock strictly
//! event-to-event and accumulates time-weighted statistics.
//!
//! # Architecture Overview
//!
//! - [`Model`]: owns the entity registry and the clock; builds the network,
//!   runs the event loop, reports snapshots.
//! - [`Entity`]: the contract every participant implements: report a next
//!   event time, fire due timers, accept arrivals, accumulate statistics.
//!   An entity may own several independently scheduled timers; its reported
//!   next-event time is the minimum over all of them.
//! - [`router`]: the priority-plus-admission policy selecting a downstream
//!   entity among several candidates.
//!
//! # Basic Usage
//!
//! ```rust
//! use qsim_core::{dists::Constant, Model, Server, SimTime, Source};
//!
//! let mut model = Model::new();
//! let arrivals = model.add_entity(Source::new("arrivals", Box::new(Constant::secs(2.0))));
//! let teller = model.add_entity(Server::new("teller", Box::new(Constant::secs(1.0))));
//! model.route(arrivals, vec![teller]).unwrap();
//!
//! model.simulate(SimTime::from_secs(10)).unwrap();
//! let summary = model.snapshots();
//! assert_eq!(summary[1].completed, 5);
//! ```
//!
//! # Time Model
//!
//! All timing uses [`SimTime`] (simulation time, not wall-clock). Execution
//! is single-threaded and deterministic: simultaneous events fire in entity
//! registration order, and seeded delay distributions reproduce runs
//! exactly.

pub mod device;
pub mod dists;
pub mod entity;
pub mod error;
pub mod item;
pub mod logging;
pub mod model;
pub mod report;
pub mod router;
pub mod server;
pub mod source;
pub mod stats;
pub mod time;

pub use device::{Device, DeviceState};
pub use dists::Delay;
pub use entity::{Entity, EntityId, Outbox, Signal};
pub use error::SimError;
pub use item::{Item, ItemClass};
pub use logging::{init_simulation_logging, init_simulation_logging_with_level};
pub use model::Model;
pub use report::{CollectingReporter, ConsoleReporter, Reporter};
pub use server::{QueueDiscipline, Server};
pub use source::Source;
pub use stats::{Snapshot, StatsAccumulator};
pub use time::SimTime;
