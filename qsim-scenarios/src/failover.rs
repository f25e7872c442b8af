//! Primary/standby failover pair with a slowdown-aware generator
//!
//! A production-line generator feeds a primary processing unit that
//! periodically shuts down and recovers. While active, the primary emits a
//! heartbeat; a standby unit watches for the heartbeat, starts itself up
//! when it goes missing and takes the traffic until the heartbeat resumes.
//! The generator slows its own rate whenever its items stop being
//! acknowledged.
//!
//! Beyond being a useful capacity-planning scenario, this is the exercise of
//! the kernel's multi-timer entity contract: the primary owns three named
//! timers on top of its device completion, and exact tie handling between
//! them matters.

use qsim_core::dists::{Constant, Delay, Uniform};
use qsim_core::{
    Device, Entity, EntityId, Item, ItemClass, Model, Outbox, SimError, Snapshot,
    StatsAccumulator, SimTime,
};
use std::any::Any;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Generator pace; SLOW is entered whenever a completion acknowledgement has
/// not arrived since the previous emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorMode {
    Normal,
    Slow,
}

/// Arrival source whose inter-arrival range depends on whether downstream
/// units are keeping up. Requires exactly two downstream candidates:
/// the standby (router fallback) and the primary.
pub struct ModeSource {
    name: String,
    normal: Uniform,
    slow: Uniform,
    mode: GeneratorMode,
    acknowledged: bool,
    next_arrival: Option<SimTime>,
    next_item_id: u64,
    slow_time: Duration,
    downstream: Vec<EntityId>,
    t_curr: SimTime,
    stats: StatsAccumulator,
}

impl ModeSource {
    pub fn new(name: impl Into<String>, normal: Uniform, slow: Uniform) -> Self {
        let name = name.into();
        Self {
            stats: StatsAccumulator::new(name.clone()),
            name,
            normal,
            slow,
            mode: GeneratorMode::Normal,
            acknowledged: false,
            next_arrival: Some(SimTime::zero()),
            next_item_id: 0,
            slow_time: Duration::ZERO,
            downstream: Vec::new(),
            t_curr: SimTime::zero(),
        }
    }

    pub fn mode(&self) -> GeneratorMode {
        self.mode
    }

    pub fn produced(&self) -> u64 {
        self.stats.produced()
    }

    /// Total simulated time spent in SLOW mode.
    pub fn slow_time(&self) -> Duration {
        self.slow_time
    }
}

impl Entity for ModeSource {
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

        // The mode for the next interval depends on whether the previous
        // item was acknowledged in time.
        self.mode = if self.acknowledged {
            self.acknowledged = false;
            GeneratorMode::Normal
        } else {
            GeneratorMode::Slow
        };
        let delay = match self.mode {
            GeneratorMode::Normal => self.normal.sample(),
            GeneratorMode::Slow => self.slow.sample(),
        };
        self.next_arrival = Some(now + delay);

        let item = Item::new(self.next_item_id, ItemClass::Ordinary);
        self.next_item_id += 1;
        trace!(generator = %self.name, mode = ?self.mode, item = item.id, "item emitted");
        outbox.depart(item);
    }

    fn accept_arrival(&mut self, _item: Item, _now: SimTime) -> Result<(), SimError> {
        Err(SimError::Invariant(format!(
            "generator '{}' received an arrival; generators have no inbound side",
            self.name
        )))
    }

    fn set_downstream(&mut self, targets: Vec<EntityId>) {
        self.downstream = targets;
    }

    fn downstream(&self) -> &[EntityId] {
        &self.downstream
    }

    fn required_downstream(&self) -> Option<usize> {
        Some(2)
    }

    fn on_completion_notice(&mut self, _now: SimTime) {
        self.acknowledged = true;
    }

    fn accumulate_statistics(&mut self, delta: Duration) {
        if self.mode == GeneratorMode::Slow {
            self.slow_time += delta;
        }
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

/// The primary processing unit.
///
/// Owns one device plus three named timers: shutdown-due, recovery-due and
/// heartbeat-due. ACTIVE until the shutdown timer fires, DOWN until the
/// recovery timer fires; the heartbeat is armed only while ACTIVE. Work in
/// the device when the shutdown hits is lost, not completed.
pub struct PrimaryUnit {
    name: String,
    device: Device,
    service: Box<dyn Delay>,
    shutdown_delay: Box<dyn Delay>,
    recovery_delay: Duration,
    heartbeat_period: Duration,
    down: bool,
    down_time: Duration,
    t_shutdown: Option<SimTime>,
    t_recovery: Option<SimTime>,
    t_heartbeat: Option<SimTime>,
    standby: Option<EntityId>,
    controller: Option<EntityId>,
    downstream: Vec<EntityId>,
    t_curr: SimTime,
    stats: StatsAccumulator,
}

impl PrimaryUnit {
    pub fn new(
        name: impl Into<String>,
        service: Box<dyn Delay>,
        mut shutdown_delay: Box<dyn Delay>,
        recovery_delay: Duration,
        heartbeat_period: Duration,
    ) -> Self {
        let name = name.into();
        let first_shutdown = SimTime::zero() + shutdown_delay.sample();
        Self {
            stats: StatsAccumulator::new(name.clone()),
            name,
            device: Device::new(0),
            service,
            shutdown_delay,
            recovery_delay,
            heartbeat_period,
            down: false,
            down_time: Duration::ZERO,
            t_shutdown: Some(first_shutdown),
            t_recovery: None,
            t_heartbeat: Some(SimTime::zero() + heartbeat_period),
            standby: None,
            controller: None,
            downstream: Vec::new(),
            t_curr: SimTime::zero(),
        }
    }

    /// Wire the heartbeat target and the acknowledgement target.
    pub fn link(&mut self, standby: EntityId, controller: EntityId) {
        self.standby = Some(standby);
        self.controller = Some(controller);
    }

    pub fn is_down(&self) -> bool {
        self.down
    }

    /// Total simulated time spent DOWN.
    pub fn down_time(&self) -> Duration {
        self.down_time
    }

    pub fn completed(&self) -> u64 {
        self.stats.completed()
    }

    pub fn failures(&self) -> u64 {
        self.stats.failures()
    }

    pub fn device_free(&self) -> bool {
        self.device.is_free()
    }

    fn complete(&mut self, _now: SimTime, outbox: &mut Outbox) {
        self.stats.record_completed();
        let finished = self.device.release();
        if let Some(controller) = self.controller {
            outbox.completion_notice(controller);
        }
        if let Some(item) = finished {
            trace!(unit = %self.name, item = item.id, "service completed");
            outbox.depart(item);
        }
    }

    fn shut_down(&mut self, now: SimTime) {
        debug!(unit = %self.name, time = %now, "shutting down");
        self.down = true;
        self.t_shutdown = None;
        // Heartbeats stop while DOWN.
        self.t_heartbeat = None;
        self.t_recovery = Some(now + self.recovery_delay);
        if !self.device.is_free() {
            // The item in service is lost with the unit.
            let lost = self.device.release();
            debug!(unit = %self.name, item = ?lost.map(|i| i.id), "in-flight work lost");
        }
    }

    fn recover(&mut self, now: SimTime) {
        debug!(unit = %self.name, time = %now, "recovered");
        self.down = false;
        self.t_recovery = None;
        self.t_shutdown = Some(now + self.shutdown_delay.sample());
        self.t_heartbeat = Some(now + self.heartbeat_period);
    }

    fn beat(&mut self, now: SimTime, outbox: &mut Outbox) {
        match self.standby {
            Some(standby) => outbox.heartbeat(standby),
            None => warn!(unit = %self.name, "heartbeat fired with no standby linked"),
        }
        self.t_heartbeat = Some(now + self.heartbeat_period);
    }
}

impl Entity for PrimaryUnit {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_event_time(&self) -> Option<SimTime> {
        [
            self.device.completion(),
            self.t_shutdown,
            self.t_recovery,
            self.t_heartbeat,
        ]
        .into_iter()
        .flatten()
        .min()
    }

    fn advance_to(&mut self, now: SimTime) {
        self.t_curr = now;
    }

    fn fire_due_timers(&mut self, now: SimTime, outbox: &mut Outbox) {
        // Each check re-reads current state, so an earlier handler in the
        // same tick can disarm a later timer (shutdown suppresses the
        // heartbeat that would have coincided with it).
        if self.device.due_at(now) {
            self.complete(now, outbox);
        }
        if self.t_shutdown == Some(now) {
            self.shut_down(now);
        }
        if self.t_heartbeat == Some(now) {
            self.beat(now, outbox);
        }
        if self.t_recovery == Some(now) {
            self.recover(now);
        }
    }

    fn accept_arrival(&mut self, item: Item, now: SimTime) -> Result<(), SimError> {
        if !self.down && self.device.is_free() {
            let completes_at = now + self.service.sample();
            self.device.acquire(item, completes_at);
            trace!(unit = %self.name, item = item.id, "arrival in service");
        } else {
            self.stats.record_failure();
            trace!(unit = %self.name, item = item.id, down = self.down, "arrival rejected");
        }
        Ok(())
    }

    fn accepts_arrivals(&self) -> bool {
        true
    }

    fn can_accept(&self) -> bool {
        !self.down
    }

    fn routing_priority(&self) -> Option<u32> {
        Some(0)
    }

    fn set_downstream(&mut self, targets: Vec<EntityId>) {
        self.downstream = targets;
    }

    fn downstream(&self) -> &[EntityId] {
        &self.downstream
    }

    fn accumulate_statistics(&mut self, delta: Duration) {
        if self.down {
            self.down_time += delta;
        }
        let busy = usize::from(!self.device.is_free());
        self.stats.observe(0, busy, delta);
    }

    fn snapshot(&self) -> Snapshot {
        let busy = usize::from(!self.device.is_free());
        self.stats.snapshot(0, busy, 1)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Standby lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandbyState {
    /// Heartbeat healthy; arrivals are counted failures.
    Passive,
    /// Heartbeat missed; starting up, still rejecting arrivals.
    Starting,
    /// Started; accepting traffic until the heartbeat resumes.
    ActiveStandby,
}

/// The standby processing unit.
///
/// Watches the primary's heartbeat through a deadline timer that every beat
/// re-arms. A missed deadline starts the unit up; the start-up delay ends in
/// ACTIVE-STANDBY. The first heartbeat seen afterwards reverts it to
/// PASSIVE, cancelling a start-up still in progress.
pub struct StandbyUnit {
    name: String,
    device: Device,
    service: Box<dyn Delay>,
    state: StandbyState,
    miss_timeout: Duration,
    startup_delay: Duration,
    t_deadline: Option<SimTime>,
    t_startup: Option<SimTime>,
    controller: Option<EntityId>,
    downstream: Vec<EntityId>,
    t_curr: SimTime,
    stats: StatsAccumulator,
}

impl StandbyUnit {
    pub fn new(
        name: impl Into<String>,
        service: Box<dyn Delay>,
        miss_timeout: Duration,
        startup_delay: Duration,
    ) -> Self {
        let name = name.into();
        Self {
            stats: StatsAccumulator::new(name.clone()),
            name,
            device: Device::new(0),
            service,
            state: StandbyState::Passive,
            miss_timeout,
            startup_delay,
            t_deadline: Some(SimTime::zero() + miss_timeout),
            t_startup: None,
            controller: None,
            downstream: Vec::new(),
            t_curr: SimTime::zero(),
        }
    }

    pub fn set_controller(&mut self, controller: EntityId) {
        self.controller = Some(controller);
    }

    pub fn state(&self) -> StandbyState {
        self.state
    }

    pub fn completed(&self) -> u64 {
        self.stats.completed()
    }

    pub fn failures(&self) -> u64 {
        self.stats.failures()
    }
}

impl Entity for StandbyUnit {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_event_time(&self) -> Option<SimTime> {
        [self.device.completion(), self.t_deadline, self.t_startup]
            .into_iter()
            .flatten()
            .min()
    }

    fn advance_to(&mut self, now: SimTime) {
        self.t_curr = now;
    }

    fn fire_due_timers(&mut self, now: SimTime, outbox: &mut Outbox) {
        if self.device.due_at(now) {
            self.stats.record_completed();
            let finished = self.device.release();
            if let Some(controller) = self.controller {
                outbox.completion_notice(controller);
            }
            if let Some(item) = finished {
                trace!(unit = %self.name, item = item.id, "service completed");
                outbox.depart(item);
            }
        }
        if self.t_deadline == Some(now) {
            debug!(unit = %self.name, time = %now, "heartbeat missed; starting up");
            self.t_deadline = None;
            self.state = StandbyState::Starting;
            self.t_startup = Some(now + self.startup_delay);
        }
        if self.t_startup == Some(now) {
            debug!(unit = %self.name, time = %now, "start-up complete");
            self.t_startup = None;
            self.state = StandbyState::ActiveStandby;
        }
    }

    fn accept_arrival(&mut self, item: Item, now: SimTime) -> Result<(), SimError> {
        if self.state == StandbyState::ActiveStandby && self.device.is_free() {
            let completes_at = now + self.service.sample();
            self.device.acquire(item, completes_at);
            trace!(unit = %self.name, item = item.id, "arrival in service");
        } else {
            // Rejection while PASSIVE/STARTING is a counted failure, not a
            // silent drop.
            self.stats.record_failure();
            trace!(unit = %self.name, item = item.id, state = ?self.state, "arrival rejected");
        }
        Ok(())
    }

    fn accepts_arrivals(&self) -> bool {
        true
    }

    fn can_accept(&self) -> bool {
        self.state == StandbyState::ActiveStandby
    }

    fn routing_priority(&self) -> Option<u32> {
        Some(1)
    }

    fn set_downstream(&mut self, targets: Vec<EntityId>) {
        self.downstream = targets;
    }

    fn downstream(&self) -> &[EntityId] {
        &self.downstream
    }

    fn on_heartbeat(&mut self, now: SimTime) {
        self.t_deadline = Some(now + self.miss_timeout);
        if self.state != StandbyState::Passive {
            debug!(unit = %self.name, time = %now, "primary heartbeat resumed; reverting to passive");
            self.state = StandbyState::Passive;
            self.t_startup = None;
        }
    }

    fn accumulate_statistics(&mut self, delta: Duration) {
        let busy = usize::from(!self.device.is_free());
        self.stats.observe(0, busy, delta);
    }

    fn snapshot(&self) -> Snapshot {
        let busy = usize::from(!self.device.is_free());
        self.stats.snapshot(0, busy, 1)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Parameters of the failover scenario, in seconds. Defaults mirror the
/// classic generator/backup sizing exercise.
#[derive(Debug, Clone)]
pub struct FailoverConfig {
    pub normal_range: (f64, f64),
    pub slow_range: (f64, f64),
    pub service_time: f64,
    pub shutdown_range: (f64, f64),
    pub recovery_delay: f64,
    pub heartbeat_period: f64,
    /// Time without a heartbeat before the standby starts up.
    pub heartbeat_timeout: f64,
    pub startup_delay: f64,
    pub seed: Option<u64>,
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            normal_range: (8.0, 12.0),
            slow_range: (16.0, 24.0),
            service_time: 3.0,
            shutdown_range: (270.0, 330.0),
            recovery_delay: 100.0,
            heartbeat_period: 30.0,
            heartbeat_timeout: 60.0,
            startup_delay: 5.0,
            seed: None,
        }
    }
}

/// Handles into a built failover model.
#[derive(Debug, Clone, Copy)]
pub struct FailoverIds {
    pub generator: EntityId,
    pub primary: EntityId,
    pub standby: EntityId,
}

/// Build and wire the full scenario into `model`.
///
/// The generator's candidate list is `[standby, primary]`: the primary wins
/// on priority whenever it is up, and the standby is the designated default,
/// so traffic sent while neither unit is available is rejected (and counted)
/// by the standby rather than dropped silently.
pub fn build(model: &mut Model, cfg: FailoverConfig) -> Result<FailoverIds, SimError> {
    let uniform = |range: (f64, f64), salt: u64| match cfg.seed {
        Some(seed) => Uniform::seeded(range.0, range.1, seed.wrapping_add(salt)),
        None => Uniform::new(range.0, range.1),
    };

    let generator = model.add_entity(ModeSource::new(
        "generator",
        uniform(cfg.normal_range, 1),
        uniform(cfg.slow_range, 2),
    ));
    let primary = model.add_entity(PrimaryUnit::new(
        "primary",
        Box::new(Constant::secs(cfg.service_time)),
        Box::new(uniform(cfg.shutdown_range, 3)),
        Duration::from_secs_f64(cfg.recovery_delay),
        Duration::from_secs_f64(cfg.heartbeat_period),
    ));
    let standby = model.add_entity(StandbyUnit::new(
        "standby",
        Box::new(Constant::secs(cfg.service_time)),
        Duration::from_secs_f64(cfg.heartbeat_timeout),
        Duration::from_secs_f64(cfg.startup_delay),
    ));

    model
        .entity_mut::<PrimaryUnit>(primary)
        .ok_or_else(|| SimError::Configuration("primary unit missing after registration".into()))?
        .link(standby, generator);
    model
        .entity_mut::<StandbyUnit>(standby)
        .ok_or_else(|| SimError::Configuration("standby unit missing after registration".into()))?
        .set_controller(generator);

    model.route(generator, vec![standby, primary])?;

    Ok(FailoverIds {
        generator,
        primary,
        standby,
    })
}
