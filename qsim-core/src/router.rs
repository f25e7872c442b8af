//! Downstream selection policy
//!
//! An entity with several downstream candidates does not pick one itself; the
//! event loop asks this policy. Selection is by declared routing priority
//! (numerically lowest wins) among candidates that can currently accept. If
//! none can, the designated default (the first candidate in configured
//! order) receives the item anyway and applies its own admission control,
//! possibly counting a failure.

use crate::entity::{Entity, EntityId};
use tracing::trace;

/// Pick the delivery target among `candidates`, in declared order.
///
/// Returns `None` only for an empty candidate list (the item leaves the
/// network). A single candidate is returned directly, skipping priority
/// evaluation.
pub fn select(entities: &[Box<dyn Entity>], candidates: &[EntityId]) -> Option<EntityId> {
    match candidates {
        [] => None,
        [only] => Some(*only),
        _ => {
            let chosen = candidates
                .iter()
                .copied()
                .filter(|id| entities[id.index()].can_accept())
                .min_by_key(|id| entities[id.index()].routing_priority().unwrap_or(u32::MAX));
            match chosen {
                Some(id) => Some(id),
                None => {
                    trace!("no candidate can accept; falling back to the default");
                    Some(candidates[0])
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Outbox;
    use crate::error::SimError;
    use crate::item::Item;
    use crate::stats::{Snapshot, StatsAccumulator};
    use crate::SimTime;
    use std::any::Any;
    use std::time::Duration;

    struct Stub {
        name: String,
        priority: u32,
        accepting: bool,
    }

    impl Stub {
        fn boxed(name: &str, priority: u32, accepting: bool) -> Box<dyn Entity> {
            Box::new(Self {
                name: name.to_string(),
                priority,
                accepting,
            })
        }
    }

    impl Entity for Stub {
        fn name(&self) -> &str {
            &self.name
        }
        fn next_event_time(&self) -> Option<SimTime> {
            None
        }
        fn advance_to(&mut self, _now: SimTime) {}
        fn fire_due_timers(&mut self, _now: SimTime, _outbox: &mut Outbox) {}
        fn accept_arrival(&mut self, _item: Item, _now: SimTime) -> Result<(), SimError> {
            Ok(())
        }
        fn accepts_arrivals(&self) -> bool {
            true
        }
        fn can_accept(&self) -> bool {
            self.accepting
        }
        fn routing_priority(&self) -> Option<u32> {
            Some(self.priority)
        }
        fn set_downstream(&mut self, _targets: Vec<EntityId>) {}
        fn downstream(&self) -> &[EntityId] {
            &[]
        }
        fn accumulate_statistics(&mut self, _delta: Duration) {}
        fn snapshot(&self) -> Snapshot {
            StatsAccumulator::new(self.name.clone()).snapshot(0, 0, 0)
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn ids(n: usize) -> Vec<EntityId> {
        (0..n).map(EntityId).collect()
    }

    #[test]
    fn empty_candidate_list_drops_the_item() {
        let entities: Vec<Box<dyn Entity>> = vec![];
        assert_eq!(select(&entities, &[]), None);
    }

    #[test]
    fn single_candidate_skips_priority_evaluation() {
        // Even a candidate that cannot accept is selected when it is alone.
        let entities = vec![Stub::boxed("only", 5, false)];
        assert_eq!(select(&entities, &ids(1)), Some(EntityId(0)));
    }

    #[test]
    fn lowest_priority_accepting_candidate_wins() {
        let entities = vec![
            Stub::boxed("p2", 2, true),
            Stub::boxed("p1", 1, false),
            Stub::boxed("p3", 3, true),
        ];
        // Priority 1 cannot accept, so priority 2 wins.
        assert_eq!(select(&entities, &ids(3)), Some(EntityId(0)));
    }

    #[test]
    fn next_best_candidate_wins_when_better_ones_are_full() {
        let entities = vec![
            Stub::boxed("p2", 2, false),
            Stub::boxed("p1", 1, false),
            Stub::boxed("p3", 3, true),
        ];
        assert_eq!(select(&entities, &ids(3)), Some(EntityId(2)));
    }

    #[test]
    fn fallback_is_the_first_configured_candidate() {
        let entities = vec![
            Stub::boxed("p2", 2, false),
            Stub::boxed("p1", 1, false),
            Stub::boxed("p3", 3, false),
        ];
        assert_eq!(select(&entities, &ids(3)), Some(EntityId(0)));
    }
}
