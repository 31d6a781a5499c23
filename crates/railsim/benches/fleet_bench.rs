//! Fleet tick benchmarks.
//!
//! Run with: cargo bench -p railsim --features bench

use bevy::math::{DVec3, IVec3};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use railsim::test_harness::TestRailway;
use railsim::track::Face;

/// `trains` parallel east-west lines, each carrying one train of `carts`.
fn yard(trains: usize, carts: usize) -> TestRailway {
    let len = (carts as u32) * 2 + 400;
    let mut railway = TestRailway::new();
    for i in 0..trains {
        let z = (i as i32) * 3;
        railway = railway.with_straight_track(IVec3::new(0, 0, z), Face::East, len);
        let positions: Vec<DVec3> = (0..carts)
            .map(|c| DVec3::new(2.0 + 1.5 * (carts - c) as f64, 0.0, z as f64 + 0.5))
            .collect();
        railway = railway.with_train(&format!("t{i}"), &positions, 0.3);
    }
    railway
}

fn bench_fleet_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("fleet_tick");
    for (trains, carts) in [(10, 4), (50, 8), (200, 4)] {
        group.bench_with_input(
            BenchmarkId::new("trains_x_carts", format!("{trains}x{carts}")),
            &(trains, carts),
            |b, &(trains, carts)| {
                let mut railway = yard(trains, carts);
                b.iter(|| railway.tick(1));
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_fleet_tick);
criterion_main!(benches);
