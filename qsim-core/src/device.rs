//! A unit of service capacity owned by a server

use crate::item::Item;
use crate::time::SimTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Free,
    Busy,
}

/// One unit of service capacity. A device belongs to exactly one server, is
/// created with it and reused across arrivals for the whole run.
///
/// A busy device holds the item in service and the simulation time its
/// service completes; a free device holds neither.
#[derive(Debug, Clone)]
pub struct Device {
    index: usize,
    state: DeviceState,
    completion: Option<SimTime>,
    in_service: Option<Item>,
}

impl Device {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            state: DeviceState::Free,
            completion: None,
            in_service: None,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn is_free(&self) -> bool {
        self.state == DeviceState::Free
    }

    /// Pending completion time, `None` while free.
    pub fn completion(&self) -> Option<SimTime> {
        self.completion
    }

    /// Whether this device's completion is due at `now`.
    pub fn due_at(&self, now: SimTime) -> bool {
        self.completion == Some(now)
    }

    /// Take the item into service until `completes_at`.
    pub fn acquire(&mut self, item: Item, completes_at: SimTime) {
        debug_assert!(self.is_free(), "acquire on a busy device");
        self.state = DeviceState::Busy;
        self.completion = Some(completes_at);
        self.in_service = Some(item);
    }

    /// Free the device, returning the item that was in service.
    pub fn release(&mut self) -> Option<Item> {
        self.state = DeviceState::Free;
        self.completion = None;
        self.in_service.take()
    }
}
