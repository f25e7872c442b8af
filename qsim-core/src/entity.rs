//! The entity contract shared by every simulation participant
//!
//! An entity owns one or more timers (device completions, arrival timers,
//! named state-machine timers) and reacts when the event loop advances the
//! clock to one of them. The contract is deliberately narrow: the loop asks
//! for the next event time, propagates the clock, fires due timers, drives
//! statistics, and reads snapshots. Everything an entity wants to tell the
//! rest of the network goes through the [`Outbox`], which the loop resolves
//! synchronously within the same tick.

use crate::error::SimError;
use crate::item::Item;
use crate::stats::Snapshot;
use crate::time::SimTime;
use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::time::Duration;

/// Handle into the model's entity registry.
///
/// Ids are insertion-ordered indices; that order is also the deterministic
/// tie-break order when several entities share a tick. Routing links are
/// plain `EntityId`s, never owning references, so the routing graph may
/// contain cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct EntityId(pub(crate) usize);

impl EntityId {
    pub(crate) fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}

/// A cross-entity effect emitted from a timer handler.
///
/// Handlers never touch other entities directly; the event loop drains the
/// outbox and applies each signal in emission order, still within the
/// triggering tick.
#[derive(Debug)]
pub enum Signal {
    /// An item leaving the emitting entity, to be routed among its
    /// downstream candidates.
    Departure { item: Item },
    /// Liveness beacon for a failover standby.
    Heartbeat { to: EntityId },
    /// Completion acknowledgement for an upstream controller.
    CompletionNotice { to: EntityId },
    /// Ask the loop to run the queue-balancing policy against a peer.
    Rebalance { with: EntityId },
}

/// Ordered collection of signals emitted during one handler invocation.
#[derive(Debug, Default)]
pub struct Outbox {
    signals: Vec<Signal>,
}

impl Outbox {
    pub fn depart(&mut self, item: Item) {
        self.signals.push(Signal::Departure { item });
    }

    pub fn heartbeat(&mut self, to: EntityId) {
        self.signals.push(Signal::Heartbeat { to });
    }

    pub fn completion_notice(&mut self, to: EntityId) {
        self.signals.push(Signal::CompletionNotice { to });
    }

    pub fn rebalance(&mut self, with: EntityId) {
        self.signals.push(Signal::Rebalance { with });
    }

    pub(crate) fn drain(&mut self) -> Vec<Signal> {
        std::mem::take(&mut self.signals)
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }
}

/// A simulation participant.
///
/// Kernel-provided implementations are [`Source`](crate::Source) and
/// [`Server`](crate::Server); scenario crates add their own (for example the
/// failover primary/standby pair), all dispatched through this one contract.
pub trait Entity: Any {
    /// Diagnostic name, used in logs, metrics labels and reports.
    fn name(&self) -> &str;

    /// Minimum over every pending timer this entity owns, or `None` if it is
    /// permanently idle.
    fn next_event_time(&self) -> Option<SimTime>;

    /// Clock propagation only; no transition may happen here.
    fn advance_to(&mut self, now: SimTime);

    /// Fire every pending timer equal to `now`, once per timer. Handlers run
    /// sequentially and re-read current state, so an earlier handler in the
    /// same tick is visible to a later one.
    fn fire_due_timers(&mut self, now: SimTime, outbox: &mut Outbox);

    /// Deliver one arrival. Admission is evaluated against occupancy at this
    /// instant: free device, else queue room, else a counted failure.
    ///
    /// # Errors
    ///
    /// Entities that have no inbound side (sources) return
    /// [`SimError::Invariant`]; wiring validation makes that unreachable in
    /// a well-formed model.
    fn accept_arrival(&mut self, item: Item, now: SimTime) -> Result<(), SimError>;

    /// Whether this entity has an inbound side at all. Checked when routing
    /// links are wired.
    fn accepts_arrivals(&self) -> bool {
        false
    }

    /// Admission predicate consulted by the router: queue not at capacity.
    fn can_accept(&self) -> bool {
        false
    }

    /// Routing priority declared to upstream routers; lower wins. `None`
    /// for entities that are never routing candidates.
    fn routing_priority(&self) -> Option<u32> {
        None
    }

    /// Replace the downstream candidate list. Order encodes the router's
    /// fallback: the first candidate is the designated default.
    fn set_downstream(&mut self, targets: Vec<EntityId>);

    fn downstream(&self) -> &[EntityId];

    /// Exact downstream count this entity requires, if it has a fixed
    /// topology. Violations are configuration errors raised before any tick.
    fn required_downstream(&self) -> Option<usize> {
        None
    }

    /// Current queue length; consulted by the balancing policy.
    fn queue_len(&self) -> usize {
        0
    }

    /// Remove the most recently queued item, for the balancing policy.
    fn steal_queued(&mut self) -> Option<Item> {
        None
    }

    /// Insert an item shifted over by the balancing policy. The loop only
    /// calls this on the peer with the shorter queue.
    fn push_queued(&mut self, _item: Item) {}

    /// Record that the balancing policy moved an item on this entity's
    /// behalf.
    fn note_rebalanced(&mut self) {}

    /// Liveness beacon delivery; only the failover standby cares.
    fn on_heartbeat(&mut self, _now: SimTime) {}

    /// Completion acknowledgement delivery; only controllers that adapt
    /// their rate care.
    fn on_completion_notice(&mut self, _now: SimTime) {}

    /// Integrate pre-tick state over the elapsed interval. Called only by
    /// the event loop, before any mutation for the tick.
    fn accumulate_statistics(&mut self, delta: Duration);

    /// Side-effect-free report of counters and derived statistics.
    fn snapshot(&self) -> Snapshot;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::Item;

    #[test]
    fn outbox_preserves_emission_order() {
        let mut outbox = Outbox::default();
        outbox.depart(Item::ordinary(1));
        outbox.rebalance(EntityId(2));
        outbox.heartbeat(EntityId(3));

        let signals = outbox.drain();
        assert_eq!(signals.len(), 3);
        assert!(matches!(signals[0], Signal::Departure { .. }));
        assert!(matches!(signals[1], Signal::Rebalance { with: EntityId(2) }));
        assert!(matches!(signals[2], Signal::Heartbeat { to: EntityId(3) }));
        assert!(outbox.is_empty());
    }
}
