use bevy::math::{DVec3, IVec3};

use crate::events::{FleetEvent, TriggerKind};
use crate::fleet::ParkedTrains;
use crate::math;
use crate::systems::FleetStats;
use crate::test_harness::TestRailway;
use crate::track::{Face, TrackMarker};

fn line(len: u32) -> TestRailway {
    TestRailway::new().with_straight_track(IVec3::ZERO, Face::East, len)
}

#[test]
fn straight_coupling_shares_average_force() {
    let mut railway = line(16)
        .with_train("a", &[DVec3::new(2.0, 0.0, 0.5)], 0.0)
        .with_train("b", &[DVec3::new(3.0, 0.0, 0.5)], 0.0);
    let a = railway.fleet().train(railway.train("a").expect("a")).expect("train").carts()[0];
    let b = railway.fleet().train(railway.train("b").expect("b")).expect("train").carts()[0];
    {
        let mut fleet = railway.fleet_mut();
        fleet.set_velocity(a, DVec3::new(0.2, 0.0, 0.0)).expect("cart");
        fleet.set_velocity(b, DVec3::new(0.1, 0.0, 0.0)).expect("cart");
    }

    let merged = railway
        .with_fleet(|fleet, grid, params, sink| fleet.link(a, b, grid, params, sink))
        .expect("link");
    railway.tick(1);

    let fleet = railway.fleet();
    let t = fleet.train(merged).expect("train");
    assert!((t.last_force() - 0.15).abs() < 1e-12, "force {}", t.last_force());
    assert_eq!(fleet.train_of(a), Some(merged));
    assert_eq!(fleet.train_of(b), Some(merged));
    assert_eq!(
        railway.count_events(|e| matches!(e, FleetEvent::Linked { .. })),
        1
    );
}

#[test]
fn forced_split_reports_leave_once() {
    let marker = IVec3::new(1, 0, 0);
    let mut railway = line(20)
        .with_marker(marker, TrackMarker::trigger("yard"))
        .with_train(
            "freight",
            &[
                DVec3::new(4.5, 0.0, 0.5),
                DVec3::new(3.0, 0.0, 0.5),
                DVec3::new(1.5, 0.0, 0.5),
            ],
            0.0,
        );
    railway.tick(1);
    let train = railway.train("freight").expect("train");
    let tail = railway.fleet().train(train).expect("train").carts()[2];

    railway
        .fleet_mut()
        .teleport(tail, DVec3::new(11.5, 0.0, 0.5))
        .expect("cart");
    railway.tick(1);

    assert_eq!(railway.fleet().train_count(), 2);
    let sizes: Vec<usize> = {
        let mut s: Vec<usize> = railway.fleet().trains().map(|(_, t)| t.len()).collect();
        s.sort();
        s
    };
    assert_eq!(sizes, vec![1, 2]);
    let train_leaves = railway.count_events(|e| {
        e.is_trigger(TriggerKind::Leave, marker) && matches!(e, FleetEvent::Trigger { cart: None, .. })
    });
    assert_eq!(train_leaves, 1);
    assert_eq!(
        railway.count_events(|e| matches!(e, FleetEvent::Split { .. })),
        1
    );
    assert_eq!(railway.resource::<FleetStats>().splits, 1);
}

#[test]
fn spacing_invariant_holds_around_a_loop() {
    let mut railway = TestRailway::new().with_loop(IVec3::ZERO, 10, 8).with_train(
        "circle",
        &[
            DVec3::new(6.5, 0.0, 0.5),
            DVec3::new(5.0, 0.0, 0.5),
            DVec3::new(3.5, 0.0, 0.5),
            DVec3::new(2.0, 0.0, 0.5),
        ],
        0.3,
    );

    for _ in 0..150 {
        railway.tick(1);
        let fleet = railway.fleet();
        for (_, t) in fleet.trains() {
            let carts: Vec<_> = t
                .carts()
                .iter()
                .map(|k| fleet.cart(*k).expect("cart"))
                .collect();
            for i in 0..carts.len().saturating_sub(2) {
                let (a, b, c) = (carts[i], carts[i + 1], carts[i + 2]);
                let near = math::distance_xz(a.position, b.position);
                let far = math::distance_xz(a.position, c.position);
                assert!(near < far || b.is_derailed(), "joint {i} broken: {near} >= {far}");
            }
        }
    }
    assert_eq!(railway.fleet().cart_count(), 4);
}

#[test]
fn parked_train_returns_under_its_name() {
    let mut railway = line(20).with_train(
        "sleeper",
        &[DVec3::new(6.5, 0.0, 0.5), DVec3::new(5.0, 0.0, 0.5)],
        0.0,
    );
    let train = railway.train("sleeper").expect("train");
    let uuids: Vec<_> = {
        let fleet = railway.fleet();
        fleet
            .train(train)
            .expect("train")
            .carts()
            .iter()
            .map(|k| fleet.cart(*k).expect("cart").uuid)
            .collect()
    };

    let mut parked = ParkedTrains::default();
    railway
        .with_fleet(|fleet, _, _, sink| fleet.park_train(train, &mut parked, sink))
        .expect("park");
    assert_eq!(railway.fleet().train_count(), 0);
    assert!(uuids.iter().all(|u| parked.is_cart_parked(*u)));

    let restored = railway
        .with_fleet(|fleet, _, _, sink| fleet.unpark("sleeper", &mut parked, sink))
        .expect("unpark");
    railway.tick(1);
    assert_eq!(railway.train("sleeper"), Some(restored));
    let fleet = railway.fleet();
    let back: Vec<_> = fleet
        .train(restored)
        .expect("train")
        .carts()
        .iter()
        .map(|k| fleet.cart(*k).expect("cart").uuid)
        .collect();
    assert_eq!(back, uuids);
    assert_eq!(
        railway.count_events(|e| matches!(e, FleetEvent::TrainParked { .. })),
        1
    );
    assert_eq!(
        railway.count_events(|e| matches!(e, FleetEvent::TrainRestored { .. })),
        1
    );
}
