//! Server entity: a device pool with a bounded queue

use crate::device::Device;
use crate::dists::Delay;
use crate::entity::{Entity, EntityId, Outbox};
use crate::error::SimError;
use crate::item::Item;
use crate::stats::{Snapshot, StatsAccumulator};
use crate::time::SimTime;
use std::any::Any;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, trace};

/// Queue ordering applied when a completion pulls the next waiting item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueDiscipline {
    #[default]
    Fifo,
    /// Priority-class items are pulled before everything else; within a
    /// class the order stays FIFO.
    PriorityFirst,
}

/// A service station: one or more [`Device`]s plus a bounded waiting queue.
///
/// Admission at arrival time is strict and never reserved in advance: a free
/// device is acquired, else the queue absorbs the item if it has room, else
/// the failure counter increments and the run continues. On completion the
/// device is released, the next queued item (per discipline) is pulled into
/// the freed device, and the finished item departs downstream.
pub struct Server {
    name: String,
    devices: Vec<Device>,
    queue: VecDeque<Item>,
    capacity: Option<usize>,
    discipline: QueueDiscipline,
    service: Box<dyn Delay>,
    priority: u32,
    balance_peer: Option<EntityId>,
    downstream: Vec<EntityId>,
    t_curr: SimTime,
    stats: StatsAccumulator,
}

impl Server {
    /// A single-device, unbounded-queue FIFO server with routing priority 0.
    pub fn new(name: impl Into<String>, service: Box<dyn Delay>) -> Self {
        let name = name.into();
        Self {
            stats: StatsAccumulator::new(name.clone()),
            name,
            devices: vec![Device::new(0)],
            queue: VecDeque::new(),
            capacity: None,
            discipline: QueueDiscipline::Fifo,
            service,
            priority: 0,
            balance_peer: None,
            downstream: Vec::new(),
            t_curr: SimTime::zero(),
        }
    }

    /// Fixed device count, set at construction.
    ///
    /// # Panics
    ///
    /// Panics if `count` is zero.
    pub fn with_devices(mut self, count: usize) -> Self {
        assert!(count >= 1, "a server owns at least one device");
        self.devices = (0..count).map(Device::new).collect();
        self
    }

    /// Bound the waiting queue; arrivals beyond it are counted failures.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn with_discipline(mut self, discipline: QueueDiscipline) -> Self {
        self.discipline = discipline;
        self
    }

    /// Routing priority declared to upstream routers; lower wins.
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Pre-seed waiting items, for scenarios that start mid-flight.
    pub fn with_initial_queue(mut self, items: Vec<Item>) -> Self {
        self.queue = items.into();
        self
    }

    /// Enable the balancing policy against `peer`: after each completion,
    /// if the two queues differ by more than one, shift one waiting item
    /// toward the shorter queue.
    pub fn set_balance_peer(&mut self, peer: EntityId) {
        self.balance_peer = Some(peer);
    }

    pub fn completed(&self) -> u64 {
        self.stats.completed()
    }

    pub fn failures(&self) -> u64 {
        self.stats.failures()
    }

    pub fn busy_devices(&self) -> usize {
        self.devices.iter().filter(|d| !d.is_free()).count()
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    fn queue_has_room(&self) -> bool {
        match self.capacity {
            Some(cap) => self.queue.len() < cap,
            None => true,
        }
    }

    fn free_device_index(&self) -> Option<usize> {
        self.devices.iter().position(Device::is_free)
    }

    fn dequeue_next(&mut self) -> Option<Item> {
        match self.discipline {
            QueueDiscipline::Fifo => self.queue.pop_front(),
            QueueDiscipline::PriorityFirst => {
                if let Some(pos) = self.queue.iter().position(Item::is_priority) {
                    self.queue.remove(pos)
                } else {
                    self.queue.pop_front()
                }
            }
        }
    }

    /// Occupancy bound: busy devices plus queued items never exceed device
    /// count plus queue capacity.
    fn check_occupancy(&self) {
        if let Some(cap) = self.capacity {
            debug_assert!(
                self.busy_devices() + self.queue.len() <= self.devices.len() + cap,
                "occupancy bound violated on '{}'",
                self.name
            );
        }
    }

    fn complete_one(&mut self, device_index: usize, now: SimTime, outbox: &mut Outbox) {
        self.stats.record_completed();
        let finished = self.devices[device_index].release();

        if let Some(next) = self.dequeue_next() {
            // The device just freed takes the next waiting item immediately.
            let completes_at = now + self.service.sample();
            self.devices[device_index].acquire(next, completes_at);
        }

        match finished {
            Some(item) => {
                trace!(server = %self.name, item = item.id, "service completed");
                outbox.depart(item);
            }
            None => debug!(server = %self.name, "completion fired on an empty device"),
        }

        if let Some(peer) = self.balance_peer {
            outbox.rebalance(peer);
        }
    }
}

impl Entity for Server {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_event_time(&self) -> Option<SimTime> {
        self.devices.iter().filter_map(Device::completion).min()
    }

    fn advance_to(&mut self, now: SimTime) {
        self.t_curr = now;
    }

    fn fire_due_timers(&mut self, now: SimTime, outbox: &mut Outbox) {
        // Every device completing at this instant fires; ties between
        // devices all resolve within this one tick.
        for index in 0..self.devices.len() {
            if self.devices[index].due_at(now) {
                self.complete_one(index, now, outbox);
            }
        }
    }

    fn accept_arrival(&mut self, item: Item, now: SimTime) -> Result<(), SimError> {
        if let Some(index) = self.free_device_index() {
            let completes_at = now + self.service.sample();
            self.devices[index].acquire(item, completes_at);
            trace!(server = %self.name, item = item.id, device = index, "arrival in service");
        } else if self.queue_has_room() {
            self.queue.push_back(item);
            trace!(server = %self.name, item = item.id, queue = self.queue.len(), "arrival queued");
        } else {
            self.stats.record_failure();
            trace!(server = %self.name, item = item.id, "arrival rejected");
        }
        self.check_occupancy();
        Ok(())
    }

    fn accepts_arrivals(&self) -> bool {
        true
    }

    fn can_accept(&self) -> bool {
        self.queue_has_room()
    }

    fn routing_priority(&self) -> Option<u32> {
        Some(self.priority)
    }

    fn set_downstream(&mut self, targets: Vec<EntityId>) {
        self.downstream = targets;
    }

    fn downstream(&self) -> &[EntityId] {
        &self.downstream
    }

    fn queue_len(&self) -> usize {
        self.queue.len()
    }

    fn steal_queued(&mut self) -> Option<Item> {
        self.queue.pop_back()
    }

    fn push_queued(&mut self, item: Item) {
        self.queue.push_back(item);
    }

    fn note_rebalanced(&mut self) {
        self.stats.record_rebalanced();
    }

    fn accumulate_statistics(&mut self, delta: Duration) {
        self.stats.observe(self.queue.len(), self.busy_devices(), delta);
    }

    fn snapshot(&self) -> Snapshot {
        self.stats
            .snapshot(self.queue.len(), self.busy_devices(), self.devices.len())
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

    fn server_with(capacity: usize, devices: usize) -> Server {
        Server::new("teller", Box::new(Constant::secs(1.0)))
            .with_devices(devices)
            .with_capacity(capacity)
    }

    #[test]
    fn arrival_acquires_a_free_device() {
        let mut server = server_with(0, 1);
        server.accept_arrival(Item::ordinary(1), SimTime::zero()).unwrap();
        assert_eq!(server.busy_devices(), 1);
        assert_eq!(server.next_event_time(), Some(SimTime::from_secs(1)));
    }

    #[test]
    fn second_simultaneous_arrival_on_zero_queue_fails_once() {
        let mut server = server_with(0, 1);
        server.accept_arrival(Item::ordinary(1), SimTime::zero()).unwrap();
        server.accept_arrival(Item::ordinary(2), SimTime::zero()).unwrap();
        assert_eq!(server.failures(), 1);
        assert_eq!(server.completed(), 0);

        let mut outbox = Outbox::default();
        server.advance_to(SimTime::from_secs(1));
        server.fire_due_timers(SimTime::from_secs(1), &mut outbox);
        assert_eq!(server.completed(), 1);
        assert_eq!(server.failures(), 1);
        assert_eq!(server.busy_devices(), 0);
    }

    #[test]
    fn full_queue_increments_failure_counter() {
        let mut server = server_with(1, 1);
        server.accept_arrival(Item::ordinary(1), SimTime::zero()).unwrap();
        server.accept_arrival(Item::ordinary(2), SimTime::zero()).unwrap();
        server.accept_arrival(Item::ordinary(3), SimTime::zero()).unwrap();
        assert_eq!(server.queue_len(), 1);
        assert_eq!(server.failures(), 1);
        assert!(!server.can_accept());
    }

    #[test]
    fn completion_pulls_the_next_queued_item() {
        let mut server = server_with(2, 1);
        server.accept_arrival(Item::ordinary(1), SimTime::zero()).unwrap();
        server.accept_arrival(Item::ordinary(2), SimTime::zero()).unwrap();

        let mut outbox = Outbox::default();
        server.advance_to(SimTime::from_secs(1));
        server.fire_due_timers(SimTime::from_secs(1), &mut outbox);

        // Item 1 departed, item 2 moved into the freed device.
        assert_eq!(server.queue_len(), 0);
        assert_eq!(server.busy_devices(), 1);
        assert_eq!(server.next_event_time(), Some(SimTime::from_secs(2)));
        let signals = outbox.drain();
        assert!(matches!(
            signals.as_slice(),
            [Signal::Departure { item }] if item.id == 1
        ));
    }

    #[test]
    fn simultaneous_completions_all_fire_in_one_tick() {
        let mut server = server_with(0, 2);
        server.accept_arrival(Item::ordinary(1), SimTime::zero()).unwrap();
        server.accept_arrival(Item::ordinary(2), SimTime::zero()).unwrap();
        assert_eq!(server.busy_devices(), 2);

        let mut outbox = Outbox::default();
        server.advance_to(SimTime::from_secs(1));
        server.fire_due_timers(SimTime::from_secs(1), &mut outbox);
        assert_eq!(server.completed(), 2);
        assert_eq!(server.busy_devices(), 0);
        assert_eq!(outbox.drain().len(), 2);
    }

    #[test]
    fn priority_first_discipline_jumps_the_queue() {
        let mut server = Server::new("triage", Box::new(Constant::secs(1.0)))
            .with_capacity(10)
            .with_discipline(QueueDiscipline::PriorityFirst);
        server.accept_arrival(Item::ordinary(1), SimTime::zero()).unwrap();
        server.accept_arrival(Item::ordinary(2), SimTime::zero()).unwrap();
        server
            .accept_arrival(Item::priority(3), SimTime::zero())
            .unwrap();

        // Completion at t=1 pulls the priority item ahead of item 2.
        let mut outbox = Outbox::default();
        server.advance_to(SimTime::from_secs(1));
        server.fire_due_timers(SimTime::from_secs(1), &mut outbox);
        assert_eq!(server.queue_len(), 1);

        let mut outbox = Outbox::default();
        server.advance_to(SimTime::from_secs(2));
        server.fire_due_timers(SimTime::from_secs(2), &mut outbox);
        let signals = outbox.drain();
        assert!(matches!(
            signals.as_slice(),
            [Signal::Departure { item }] if item.id == 3
        ));
    }

    #[test]
    fn completion_emits_rebalance_request_when_paired() {
        let mut server = server_with(3, 1);
        server.set_balance_peer(EntityId(7));
        server.accept_arrival(Item::ordinary(1), SimTime::zero()).unwrap();

        let mut outbox = Outbox::default();
        server.advance_to(SimTime::from_secs(1));
        server.fire_due_timers(SimTime::from_secs(1), &mut outbox);
        let signals = outbox.drain();
        assert!(matches!(signals.last(), Some(Signal::Rebalance { with: EntityId(7) })));
    }
}
