//! The unit of work routed through the network

use serde::Serialize;

/// Classification used by priority-ordered queues.
///
/// The ordering is deliberately binary: a triage-style queue distinguishes
/// one urgent class against everything else, while all other semantics stay
/// FIFO. Scenarios needing strict multi-class ordering should extend this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ItemClass {
    Ordinary,
    Priority,
}

/// A routed item: an arrival manufactured by a source, carried through
/// servers until it leaves the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Item {
    /// Sequence number within the producing source. Diagnostic only.
    pub id: u64,
    pub class: ItemClass,
}

impl Item {
    pub fn new(id: u64, class: ItemClass) -> Self {
        Self { id, class }
    }

    pub fn ordinary(id: u64) -> Self {
        Self::new(id, ItemClass::Ordinary)
    }

    pub fn priority(id: u64) -> Self {
        Self::new(id, ItemClass::Priority)
    }

    pub fn is_priority(&self) -> bool {
        self.class == ItemClass::Priority
    }
}
