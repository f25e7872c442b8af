//! The model: entity registry, global clock and event loop
//!
//! The model owns every entity; routing links between entities are plain
//! [`EntityId`]s into that registry, so the routing graph may contain cycles
//! without any ownership cycle. The event loop advances the clock strictly
//! event-to-event: each tick finds the global minimum next-event time,
//! integrates pre-tick statistics over the elapsed interval, propagates the
//! new time, and fires every due timer across the entity set in registry
//! order. Everything a handler wants to do to another entity travels through
//! the signal outbox and is resolved synchronously, still inside the tick.

use crate::entity::{Entity, EntityId, Outbox, Signal};
use crate::error::SimError;
use crate::report::Reporter;
use crate::router;
use crate::stats::Snapshot;
use crate::time::SimTime;
use tracing::{debug, info, trace};

/// A complete simulation model. One instance per run; the clock starts at
/// zero and the model is discarded when the run ends.
#[derive(Default)]
pub struct Model {
    entities: Vec<Box<dyn Entity>>,
    clock: SimTime,
    tick_reporter: Option<Box<dyn Reporter>>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity, returning its handle. Registration order is the
    /// deterministic tie-break order for simultaneous events.
    pub fn add_entity<E: Entity>(&mut self, entity: E) -> EntityId {
        let id = EntityId(self.entities.len());
        debug!(entity = entity.name(), %id, "entity registered");
        self.entities.push(Box::new(entity));
        id
    }

    /// Wire `from`'s downstream candidate list. Order encodes router
    /// priority fallback: the first target is the designated default.
    ///
    /// # Errors
    ///
    /// Configuration errors for unknown ids, targets without an inbound
    /// side, or a count that violates the entity's declared topology.
    pub fn route(&mut self, from: EntityId, targets: Vec<EntityId>) -> Result<(), SimError> {
        self.check_id(from)?;
        for target in &targets {
            self.check_id(*target)?;
            if !self.entities[target.index()].accepts_arrivals() {
                return Err(SimError::Configuration(format!(
                    "'{}' cannot be a routing target: it has no inbound side",
                    self.entities[target.index()].name()
                )));
            }
        }
        let entity = &mut self.entities[from.index()];
        if let Some(required) = entity.required_downstream() {
            if targets.len() != required {
                return Err(SimError::Configuration(format!(
                    "'{}' requires exactly {} downstream candidates, got {}",
                    entity.name(),
                    required,
                    targets.len()
                )));
            }
        }
        entity.set_downstream(targets);
        Ok(())
    }

    /// Enable the queue-balancing policy between two peer servers.
    pub fn pair_for_balancing(&mut self, a: EntityId, b: EntityId) -> Result<(), SimError> {
        self.check_id(a)?;
        self.check_id(b)?;
        if a == b {
            return Err(SimError::Configuration(
                "a server cannot balance against itself".to_string(),
            ));
        }
        for (this, peer) in [(a, b), (b, a)] {
            let server = self.entities[this.index()]
                .as_any_mut()
                .downcast_mut::<crate::Server>()
                .ok_or_else(|| {
                    SimError::Configuration(format!(
                        "balancing peer {this} is not a server",
                    ))
                })?;
            server.set_balance_peer(peer);
        }
        Ok(())
    }

    /// Borrow a registered entity by concrete type, typically to read final
    /// state after a run.
    pub fn entity<E: Entity>(&self, id: EntityId) -> Option<&E> {
        self.entities.get(id.index())?.as_any().downcast_ref::<E>()
    }

    /// Mutably borrow a registered entity by concrete type, typically to
    /// finish scenario wiring after registration.
    pub fn entity_mut<E: Entity>(&mut self, id: EntityId) -> Option<&mut E> {
        self.entities
            .get_mut(id.index())?
            .as_any_mut()
            .downcast_mut::<E>()
    }

    /// Current simulation time.
    pub fn time(&self) -> SimTime {
        self.clock
    }

    /// Emit every entity's snapshot once per tick, for debugging runs.
    pub fn set_tick_reporter(&mut self, reporter: Box<dyn Reporter>) {
        self.tick_reporter = Some(reporter);
    }

    /// Snapshots of every entity, in registration order.
    pub fn snapshots(&self) -> Vec<Snapshot> {
        self.entities.iter().map(|e| e.snapshot()).collect()
    }

    /// Emit every entity's snapshot to the given reporter.
    pub fn report_to(&self, reporter: &mut dyn Reporter) {
        for entity in &self.entities {
            reporter.emit(&entity.snapshot());
        }
    }

    /// Run until the clock reaches `horizon`.
    ///
    /// Events scheduled at or past the horizon are not processed, even when
    /// already computed; statistics integrate up to the horizon and the
    /// clock stops there. A model whose entities all go idle ends early.
    ///
    /// # Errors
    ///
    /// Configuration errors from validation, before any tick; invariant
    /// violations mid-run, after which partial statistics are invalid.
    pub fn simulate(&mut self, horizon: SimTime) -> Result<(), SimError> {
        self.validate()?;
        info!(%horizon, entities = self.entities.len(), "simulation started");
        while self.clock < horizon {
            let Some(t_next) = self
                .entities
                .iter()
                .filter_map(|e| e.next_event_time())
                .min()
            else {
                debug!(time = %self.clock, "all entities idle; run ends early");
                break;
            };

            // Statistics integrate from pre-tick state before any entity
            // mutates, clipped at the horizon.
            let bound = t_next.min(horizon);
            let delta = bound - self.clock;
            for entity in &mut self.entities {
                entity.accumulate_statistics(delta);
            }

            self.clock = bound;
            for entity in &mut self.entities {
                entity.advance_to(bound);
            }

            if t_next >= horizon {
                trace!(%t_next, "next event is at or past the horizon");
                break;
            }

            let due: Vec<usize> = (0..self.entities.len())
                .filter(|&i| self.entities[i].next_event_time() == Some(t_next))
                .collect();
            if due.is_empty() {
                return Err(SimError::Invariant(format!(
                    "no entity owns the tick minimum {t_next}"
                )));
            }

            trace!(time = %self.clock, due = due.len(), "tick");
            let mut outbox = Outbox::default();
            for index in due {
                self.entities[index].fire_due_timers(self.clock, &mut outbox);
                self.dispatch(EntityId(index), &mut outbox)?;
            }

            if let Some(reporter) = self.tick_reporter.as_mut() {
                for entity in &self.entities {
                    reporter.emit(&entity.snapshot());
                }
            }
        }
        info!(final_time = %self.clock, "simulation finished");
        Ok(())
    }

    /// Apply the signals one handler invocation emitted, in emission order.
    fn dispatch(&mut self, from: EntityId, outbox: &mut Outbox) -> Result<(), SimError> {
        for signal in outbox.drain() {
            match signal {
                Signal::Departure { item } => {
                    let candidates = self.entities[from.index()].downstream().to_vec();
                    match router::select(&self.entities, &candidates) {
                        Some(target) => {
                            let now = self.clock;
                            self.entities[target.index()].accept_arrival(item, now)?;
                        }
                        None => {
                            trace!(item = item.id, "item leaves the network");
                        }
                    }
                }
                Signal::Heartbeat { to } => {
                    self.check_id(to)?;
                    self.entities[to.index()].on_heartbeat(self.clock);
                }
                Signal::CompletionNotice { to } => {
                    self.check_id(to)?;
                    self.entities[to.index()].on_completion_notice(self.clock);
                }
                Signal::Rebalance { with } => {
                    self.check_id(with)?;
                    self.balance_once(from, with);
                }
            }
        }
        Ok(())
    }

    /// Shift at most one waiting item toward the shorter of the two queues,
    /// when the lengths differ by more than one. The shift is credited to
    /// the requesting entity.
    fn balance_once(&mut self, requester: EntityId, peer: EntityId) {
        if requester == peer {
            return;
        }
        let (a, b) = self.two_mut(requester.index(), peer.index());
        let (len_a, len_b) = (a.queue_len(), b.queue_len());
        if len_b > len_a + 1 {
            if let Some(item) = b.steal_queued() {
                a.push_queued(item);
                a.note_rebalanced();
                trace!(from = b.name(), to = a.name(), "queue rebalanced");
            }
        } else if len_a > len_b + 1 {
            if let Some(item) = a.steal_queued() {
                b.push_queued(item);
                a.note_rebalanced();
                trace!(from = a.name(), to = b.name(), "queue rebalanced");
            }
        }
    }

    fn two_mut(&mut self, a: usize, b: usize) -> (&mut Box<dyn Entity>, &mut Box<dyn Entity>) {
        debug_assert_ne!(a, b);
        if a < b {
            let (left, right) = self.entities.split_at_mut(b);
            (&mut left[a], &mut right[0])
        } else {
            let (left, right) = self.entities.split_at_mut(a);
            (&mut right[0], &mut left[b])
        }
    }

    /// Construction-time validation, run before the first tick.
    fn validate(&self) -> Result<(), SimError> {
        for entity in &self.entities {
            if let Some(required) = entity.required_downstream() {
                if entity.downstream().len() != required {
                    return Err(SimError::Configuration(format!(
                        "'{}' requires exactly {} downstream candidates, got {}",
                        entity.name(),
                        required,
                        entity.downstream().len()
                    )));
                }
            }
            for target in entity.downstream() {
                if target.index() >= self.entities.len() {
                    return Err(SimError::UnknownEntity(*target));
                }
            }
        }
        Ok(())
    }

    fn check_id(&self, id: EntityId) -> Result<(), SimError> {
        if id.index() < self.entities.len() {
            Ok(())
        } else {
            Err(SimError::UnknownEntity(id))
        }
    }
}
