//! Per-entity statistics accumulation
//!
//! Every entity embeds a [`StatsAccumulator`]. The event loop drives the
//! time-weighted integrals through a single entry point (`observe`), always
//! from pre-tick state, so every entity sees a consistent elapsed-time
//! snapshot. Outcome counters are mirrored to the `metrics` facade for any
//! external recorder; the accumulator itself stays authoritative for the
//! simulation results.

use crate::SimTime;
use metrics::{counter, gauge};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Time-weighted integrals and outcome counters for one entity.
#[derive(Debug, Clone)]
pub struct StatsAccumulator {
    name: String,
    /// Item-seconds spent waiting in the queue.
    queue_integral: f64,
    /// Device-seconds spent busy, for utilization.
    busy_integral: f64,
    /// Total simulated time observed.
    observed: Duration,
    produced: u64,
    completed: u64,
    failures: u64,
    rebalanced: u64,
}

impl StatsAccumulator {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            queue_integral: 0.0,
            busy_integral: 0.0,
            observed: Duration::ZERO,
            produced: 0,
            completed: 0,
            failures: 0,
            rebalanced: 0,
        }
    }

    /// Integrate pre-tick state over the elapsed interval.
    ///
    /// Called by the event loop exactly once per tick, before any entity
    /// mutates state for that tick.
    pub fn observe(&mut self, queue_len: usize, busy_devices: usize, delta: Duration) {
        let secs = delta.as_secs_f64();
        self.queue_integral += queue_len as f64 * secs;
        self.busy_integral += busy_devices as f64 * secs;
        self.observed += delta;
        gauge!("qsim_queue_len", "entity" => self.name.clone()).set(queue_len as f64);
    }

    pub fn record_produced(&mut self) {
        self.produced += 1;
        counter!("qsim_items_produced", "entity" => self.name.clone()).increment(1);
    }

    pub fn record_completed(&mut self) {
        self.completed += 1;
        counter!("qsim_items_completed", "entity" => self.name.clone()).increment(1);
    }

    /// An arrival was rejected: queue at capacity and no free device.
    pub fn record_failure(&mut self) {
        self.failures += 1;
        counter!("qsim_items_rejected", "entity" => self.name.clone()).increment(1);
    }

    pub fn record_rebalanced(&mut self) {
        self.rebalanced += 1;
        counter!("qsim_items_rebalanced", "entity" => self.name.clone()).increment(1);
    }

    pub fn produced(&self) -> u64 {
        self.produced
    }

    pub fn completed(&self) -> u64 {
        self.completed
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// Mean queue length over the observed interval; 0 before any time has
    /// elapsed.
    pub fn mean_queue_len(&self) -> f64 {
        let t = self.observed.as_secs_f64();
        if t == 0.0 {
            0.0
        } else {
            self.queue_integral / t
        }
    }

    /// `failures / (completed + failures)`; 0 when nothing has finished or
    /// failed yet.
    pub fn failure_probability(&self) -> f64 {
        let denominator = self.completed + self.failures;
        if denominator == 0 {
            0.0
        } else {
            self.failures as f64 / denominator as f64
        }
    }

    /// Fraction of device capacity kept busy; 0 before any time has elapsed.
    pub fn utilization(&self, device_count: usize) -> f64 {
        let capacity_seconds = device_count as f64 * self.observed.as_secs_f64();
        if capacity_seconds == 0.0 {
            0.0
        } else {
            self.busy_integral / capacity_seconds
        }
    }

    /// Build the reportable snapshot, pure and side-effect free.
    pub fn snapshot(&self, queue_len: usize, busy_devices: usize, device_count: usize) -> Snapshot {
        Snapshot {
            name: self.name.clone(),
            time: SimTime::from_duration(self.observed),
            produced: self.produced,
            completed: self.completed,
            failures: self.failures,
            rebalanced: self.rebalanced,
            queue_len,
            busy_devices,
            mean_queue_len: self.mean_queue_len(),
            failure_probability: self.failure_probability(),
            utilization: self.utilization(device_count),
        }
    }
}

/// Point-in-time view of one entity's statistics.
///
/// Two snapshots taken with no tick in between are identical.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub name: String,
    /// Simulated time the statistics cover.
    pub time: SimTime,
    pub produced: u64,
    pub completed: u64,
    pub failures: u64,
    pub rebalanced: u64,
    pub queue_len: usize,
    pub busy_devices: usize,
    pub mean_queue_len: f64,
    pub failure_probability: f64,
    pub utilization: f64,
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: produced={} completed={} failures={} queue={} mean_queue={:.3} p_fail={:.3} utilization={:.3}",
            self.name,
            self.produced,
            self.completed,
            self.failures,
            self.queue_len,
            self.mean_queue_len,
            self.failure_probability,
            self.utilization,
        )
    }
}
