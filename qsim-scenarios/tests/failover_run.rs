//! Whole-model failover runs: the scenario wired through the public build
//! function, driven by the event loop over full shutdown/recovery cycles.

use qsim_core::{Model, SimTime};
use qsim_scenarios::{
    build_failover, FailoverConfig, GeneratorMode, ModeSource, PrimaryUnit, StandbyState,
    StandbyUnit,
};
use std::time::Duration;

fn seeded(seed: u64) -> FailoverConfig {
    FailoverConfig {
        seed: Some(seed),
        ..FailoverConfig::default()
    }
}

#[test]
fn primary_handles_all_traffic_before_the_first_shutdown() {
    // The earliest shutdown is at 270s; at a 100s horizon the primary is
    // still up and the standby has never left passive.
    let mut model = Model::new();
    let ids = build_failover(&mut model, seeded(7)).unwrap();
    model.simulate(SimTime::from_secs(100)).unwrap();

    let standby = model.entity::<StandbyUnit>(ids.standby).unwrap();
    assert_eq!(standby.state(), StandbyState::Passive);
    assert_eq!(standby.completed(), 0);
    assert_eq!(standby.failures(), 0);

    let primary = model.entity::<PrimaryUnit>(ids.primary).unwrap();
    assert!(!primary.is_down());
    assert!(primary.completed() > 0);
    assert_eq!(primary.failures(), 0);
}

#[test]
fn first_emission_is_slow_then_acknowledgements_restore_normal_pace() {
    // Nothing has been acknowledged when the t=0 item goes out, so the
    // first interval runs slow; every later emission is acknowledged 3s
    // after it, well inside the normal 8..12s gap.
    let mut model = Model::new();
    let ids = build_failover(&mut model, seeded(7)).unwrap();
    model.simulate(SimTime::from_secs(100)).unwrap();

    let generator = model.entity::<ModeSource>(ids.generator).unwrap();
    assert_eq!(generator.mode(), GeneratorMode::Normal);
    assert!(generator.slow_time() > Duration::ZERO);
    assert!(generator.slow_time() < Duration::from_secs(30));
}

#[test]
fn standby_takes_over_and_counts_rejections_during_startup() {
    // 2000s covers several shutdown/recovery cycles. In each one the
    // standby's heartbeat deadline lapses, it starts up, rejects the
    // arrivals that land before start-up completes, then serves traffic
    // until the heartbeat resumes.
    let mut model = Model::new();
    let ids = build_failover(&mut model, seeded(7)).unwrap();
    model.simulate(SimTime::from_secs(2000)).unwrap();

    let primary = model.entity::<PrimaryUnit>(ids.primary).unwrap();
    assert!(primary.down_time() > Duration::ZERO);
    assert!(primary.completed() > 0);

    let standby = model.entity::<StandbyUnit>(ids.standby).unwrap();
    assert!(standby.completed() > 0, "standby never served traffic");
    assert!(
        standby.failures() > 0,
        "arrivals during start-up must be counted rejections"
    );

    // The generator slows while its items go unacknowledged.
    let generator = model.entity::<ModeSource>(ids.generator).unwrap();
    assert!(generator.slow_time() > Duration::from_secs(30));
}

#[test]
fn every_emitted_item_is_accounted_for() {
    let mut model = Model::new();
    let ids = build_failover(&mut model, seeded(21)).unwrap();
    model.simulate(SimTime::from_secs(2000)).unwrap();

    let generator = model.entity::<ModeSource>(ids.generator).unwrap();
    let produced = generator.produced();
    let primary = model.entity::<PrimaryUnit>(ids.primary).unwrap();
    let standby = model.entity::<StandbyUnit>(ids.standby).unwrap();

    let completed = primary.completed() + standby.completed();
    let failed = primary.failures() + standby.failures();
    // Items still in service, or lost with a primary shutdown, make the
    // accounted total fall short of production but never exceed it.
    assert!(completed + failed <= produced);
    assert!(completed + failed > 0);
}

#[test]
fn seeded_failover_runs_are_reproducible() {
    let run = |seed| {
        let mut model = Model::new();
        build_failover(&mut model, seeded(seed)).unwrap();
        model.simulate(SimTime::from_secs(2000)).unwrap();
        model.snapshots()
    };
    assert_eq!(run(3), run(3));
    assert_ne!(run(3), run(4));
}

#[test]
fn wrong_candidate_count_is_a_configuration_error() {
    use qsim_core::dists::Constant;
    use qsim_core::{Server, SimError};

    let mut model = Model::new();
    let ids = build_failover(&mut model, seeded(7)).unwrap();
    let extra = model.add_entity(Server::new("extra", Box::new(Constant::secs(1.0))));
    assert!(matches!(
        model.route(ids.generator, vec![ids.standby, ids.primary, extra]),
        Err(SimError::Configuration(_))
    ));
}
