//! Scenario tests running the full `RailSimPlugin` schedule through the
//! `TestRailway` harness.

mod coupling_tests;

use bevy::math::{DVec3, IVec3};

use crate::events::FleetEvent;
use crate::systems::FleetStats;
use crate::test_harness::TestRailway;
use crate::track::Face;

// ===========================================================================
// Harness bootstrap
// ===========================================================================

#[test]
fn empty_railway_has_no_trains() {
    let mut railway = TestRailway::new();
    railway.tick(5);
    assert_eq!(railway.fleet().train_count(), 0);
    assert_eq!(railway.ticks_run(), 5);
    assert!(railway.fleet_events().is_empty());
}

#[test]
fn with_train_spawns_named_coupled_train() {
    let railway = TestRailway::new()
        .with_straight_track(IVec3::ZERO, Face::East, 12)
        .with_train(
            "express",
            &[DVec3::new(6.5, 0.0, 0.5), DVec3::new(5.0, 0.0, 0.5)],
            0.0,
        );
    let key = railway.train("express").expect("named train");
    assert_eq!(railway.fleet().train(key).expect("train").len(), 2);
    assert_eq!(railway.fleet().cart_count(), 2);
}

#[test]
fn launched_train_moves_along_track() {
    let mut railway = TestRailway::new()
        .with_straight_track(IVec3::ZERO, Face::East, 40)
        .with_train(
            "local",
            &[DVec3::new(4.0, 0.0, 0.5), DVec3::new(2.5, 0.0, 0.5)],
            0.3,
        );
    railway.tick(20);
    let ps = railway.positions("local");
    assert_eq!(ps.len(), 2);
    assert!(ps[0].x > 8.0, "head moved east: {ps:?}");
    assert!(ps[0].x > ps[1].x);
}

#[test]
fn stats_follow_the_fleet() {
    let mut railway = TestRailway::new()
        .with_straight_track(IVec3::ZERO, Face::East, 20)
        .with_train("a", &[DVec3::new(2.5, 0.0, 0.5)], 0.0)
        .with_train(
            "b",
            &[DVec3::new(12.5, 0.0, 0.5), DVec3::new(11.0, 0.0, 0.5)],
            0.0,
        );
    railway.tick(1);
    let stats = railway.resource::<FleetStats>();
    assert_eq!(stats.trains, 2);
    assert_eq!(stats.carts, 3);
    assert_eq!(stats.derailed_carts, 0);
}

#[test]
fn notifications_are_forwarded_as_events() {
    let mut railway = TestRailway::new()
        .with_straight_track(IVec3::ZERO, Face::East, 8)
        .with_train("doomed", &[DVec3::new(2.5, 0.0, 0.5)], 0.0);
    let train = railway.train("doomed").expect("train");
    let cart = railway.fleet().train(train).expect("train").carts()[0];
    railway.fleet_mut().mark_dead(cart).expect("cart");
    railway.tick(1);

    assert_eq!(
        railway.count_events(|e| matches!(e, FleetEvent::CartRemoved { .. })),
        1
    );
    assert_eq!(
        railway.count_events(|e| matches!(e, FleetEvent::TrainDestroyed { train: t } if *t == train)),
        1
    );
}
