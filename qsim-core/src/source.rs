//! Arrival source entity

use crate::dists::Delay;
use crate::entity::{Entity, EntityId, Outbox};
use crate::error::SimError;
use crate::item::{Item, ItemClass};
use crate::stats::{Snapshot, StatsAccumulator};
use crate::time::SimTime;
use std::any::Any;
use std::time::Duration;
use tracing::trace;

/// Manufactures arrivals on a sampled inter-arrival schedule and routes each
/// one downstream.
///
/// A source never queues, never fails and owns no devices; while active it
/// holds exactly one pending next-arrival timer. The item class is fixed per
/// source; a mixed workload is modeled by wiring several sources.
pub struct Source {
    name: String,
    delay: Box<dyn Delay>,
    class: ItemClass,
    next_arrival: Option<SimTime>,
    t_curr: SimTime,
    next_item_id: u64,
    downstream: Vec<EntityId>,
    stats: StatsAccumulator,
}

impl Source {
    /// A source whose first arrival fires at time zero.
    pub fn new(name: impl Into<String>, delay: Box<dyn Delay>) -> Self {
        let name = name.into();
        Self {
            stats: StatsAccumulator::new(name.clone()),
            name,
            delay,
            class: ItemClass::Ordinary,
            next_arrival: Some(SimTime::zero()),
            t_curr: SimTime::zero(),
            next_item_id: 0,
            downstream: Vec::new(),
        }
    }

    /// Produce items of the given class instead of the ordinary default.
    pub fn with_class(mut self, class: ItemClass) -> Self {
        self.class = class;
        self
    }

    /// Delay the first arrival instead of firing at time zero.
    pub fn with_first_arrival(mut self, at: SimTime) -> Self {
        self.next_arrival = Some(at);
        self
    }

    pub fn produced(&self) -> u64 {
        self.stats.produced()
    }

    fn manufacture(&mut self) -> Item {
        let item = Item::new(self.next_item_id, self.class);
        self.next_item_id += 1;
        item
    }
}

impl Entity for Source {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_event_time(&self) -> Option<SimTime> {
        self.next_arrival
    }

    fn advance_to(&mut self, now: SimTime) {
        self.t_curr = now;
    }

    fn fire_due_timers(&mut self, now: SimTime, outbox: &mut Outbox) {
        if self.next_arrival != Some(now) {
            return;
        }
        self.stats.record_produced();
        self.next_arrival = Some(now + self.delay.sample());
        let item = self.manufacture();
        trace!(source = %self.name, item = item.id, "arrival produced");
        outbox.depart(item);
    }

    fn accept_arrival(&mut self, _item: Item, _now: SimTime) -> Result<(), SimError> {
        Err(SimError::Invariant(format!(
            "source '{}' received an arrival; sources have no inbound side",
            self.name
        )))
    }

    fn set_downstream(&mut self, targets: Vec<EntityId>) {
        self.downstream = targets;
    }

    fn downstream(&self) -> &[EntityId] {
        &self.downstream
    }

    fn accumulate_statistics(&mut self, delta: Duration) {
        // A source has no queue and no devices; only elapsed time matters.
        self.stats.observe(0, 0, delta);
    }

    fn snapshot(&self) -> Snapshot {
        self.stats.snapshot(0, 0, 0)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dists::Constant;
    use crate::entity::Signal;

    #[test]
    fn firing_reschedules_and_departs_one_item() {
        let mut source = Source::new("arrivals", Box::new(Constant::secs(2.0)));
        assert_eq!(source.next_event_time(), Some(SimTime::zero()));

        let mut outbox = Outbox::default();
        source.advance_to(SimTime::zero());
        source.fire_due_timers(SimTime::zero(), &mut outbox);

        assert_eq!(source.produced(), 1);
        assert_eq!(source.next_event_time(), Some(SimTime::from_secs(2)));
        let signals = outbox.drain();
        assert!(matches!(
            signals.as_slice(),
            [Signal::Departure { item }] if item.id == 0
        ));
    }

    #[test]
    fn firing_at_a_non_due_time_is_a_no_op() {
        let mut source = Source::new("arrivals", Box::new(Constant::secs(2.0)));
        let mut outbox = Outbox::default();
        source.fire_due_timers(SimTime::from_secs(1), &mut outbox);
        assert_eq!(source.produced(), 0);
        assert!(outbox.is_empty());
    }

    #[test]
    fn arrivals_to_a_source_are_an_invariant_violation() {
        let mut source = Source::new("arrivals", Box::new(Constant::secs(1.0)));
        let result = source.accept_arrival(Item::ordinary(9), SimTime::zero());
        assert!(matches!(result, Err(SimError::Invariant(_))));
    }

    #[test]
    fn first_arrival_can_be_postponed() {
        let source = Source::new("arrivals", Box::new(Constant::secs(1.0)))
            .with_first_arrival(SimTime::from(0.1));
        assert_eq!(source.next_event_time(), Some(SimTime::from(0.1)));
    }
}
