use bevy::math::{DVec3, IVec3};
use slotmap::SlotMap;

use super::*;
use crate::cart::ContactState;
use crate::ids::{CartKey, CartUuid, TrainKey};
use crate::track::{Face, RailShape, TrackGrid};

fn cart(x: f64, y: f64, z: f64) -> Cart {
    Cart::new(CartUuid(1), DVec3::new(x, y, z))
}

fn east_west(from: i32, len: u32) -> TrackGrid {
    let mut grid = TrackGrid::default();
    grid.lay_straight(IVec3::new(from, 0, 0), Face::East, len);
    grid
}

fn run(mut c: Cart, grid: &TrackGrid, ticks: usize) -> Cart {
    let params = RailParams::default();
    for _ in 0..ticks {
        c = advance(&c, grid, &params);
    }
    c
}

// ---------------------------------------------------------------------------
// Pre-integration
// ---------------------------------------------------------------------------

#[test]
fn test_velocity_snaps_onto_rail_axis() {
    let grid = east_west(0, 1);
    let mut c = cart(0.5, 0.0, 0.7);
    c.velocity = DVec3::new(0.2, 0.0, 0.1);
    pre_integrate(&mut c, &grid, &RailParams::default().motion, TrainMotion::default());

    assert_eq!(c.contact(), ContactState::OnRail);
    assert!((c.velocity.x - 0.05f64.sqrt()).abs() < 1e-12, "{:?}", c.velocity);
    assert_eq!(c.velocity.z, 0.0);
    assert!((c.position.z - 0.5).abs() < 1e-12, "lateral position snapped");
}

#[test]
fn test_axis_reversal_keeps_direction_of_travel() {
    let grid = east_west(0, 1);
    let mut c = cart(0.5, 0.0, 0.5);
    c.velocity = DVec3::new(-0.3, 0.0, 0.0);
    pre_integrate(&mut c, &grid, &RailParams::default().motion, TrainMotion::default());
    assert!((c.velocity.x + 0.3).abs() < 1e-12);
}

#[test]
fn test_nan_velocity_is_reset() {
    let grid = east_west(0, 3);
    let mut c = cart(1.5, 0.0, 0.5);
    c.velocity = DVec3::new(f64::NAN, f64::NAN, f64::NAN);
    let c = run(c, &grid, 1);
    assert_eq!(c.velocity, DVec3::ZERO);
    assert!(c.position.is_finite());
    assert!((c.position.x - 1.5).abs() < 1e-12);
}

#[test]
fn test_no_rail_over_ground_is_derailed() {
    let mut grid = TrackGrid::default();
    grid.set_solid(IVec3::new(0, -1, 0));
    let mut c = cart(0.5, 0.0, 0.5);
    c.velocity = DVec3::new(0.4, 0.0, 0.0);
    pre_integrate(&mut c, &grid, &RailParams::default().motion, TrainMotion::default());

    assert_eq!(c.contact(), ContactState::Derailed);
    assert!((c.velocity.x - 0.2).abs() < 1e-12);
    assert_eq!(c.derailed_ticks(), 1);
    assert!(c.rail().is_none());
}

#[test]
fn test_no_rail_over_air_is_airborne() {
    let grid = TrackGrid::default();
    let mut c = cart(0.5, 3.0, 0.5);
    c.velocity = DVec3::new(0.4, 0.0, 0.0);
    pre_integrate(&mut c, &grid, &RailParams::default().motion, TrainMotion::default());

    assert_eq!(c.contact(), ContactState::Airborne);
    assert!((c.velocity.x - 0.38).abs() < 1e-12);
    assert!((c.velocity.y + 0.04).abs() < 1e-12);
}

#[test]
fn test_braking_rail() {
    let mut grid = TrackGrid::default();
    grid.set_powered_rail(IVec3::ZERO, RailShape::EastWest, false);
    let motion = RailParams::default().motion;

    let mut slow = cart(0.5, 0.0, 0.5);
    slow.velocity = DVec3::new(0.02, 0.0, 0.0);
    pre_integrate(&mut slow, &grid, &motion, TrainMotion::default());
    assert_eq!(slow.velocity, DVec3::ZERO, "slow carts stop outright");

    let mut fast = cart(0.5, 0.0, 0.5);
    fast.velocity = DVec3::new(0.3, 0.0, 0.0);
    pre_integrate(&mut fast, &grid, &motion, TrainMotion::default());
    assert!((fast.velocity.x - 0.15).abs() < 1e-12);
}

#[test]
fn test_powered_rail_boosts_moving_cart() {
    let mut grid = TrackGrid::default();
    grid.set_powered_rail(IVec3::ZERO, RailShape::EastWest, true);
    let mut c = cart(0.5, 0.0, 0.5);
    c.velocity = DVec3::new(0.2, 0.0, 0.0);
    pre_integrate(&mut c, &grid, &RailParams::default().motion, TrainMotion::default());
    assert!((c.velocity.x - 0.26).abs() < 1e-12, "{:?}", c.velocity);
}

#[test]
fn test_powered_rail_launches_away_from_wall() {
    let mut grid = TrackGrid::default();
    grid.set_powered_rail(IVec3::ZERO, RailShape::EastWest, true);
    grid.set_solid(IVec3::new(-1, 0, 0));
    let mut c = cart(0.5, 0.0, 0.5);
    pre_integrate(&mut c, &grid, &RailParams::default().motion, TrainMotion::default());
    assert!((c.velocity.x - 0.02).abs() < 1e-12, "{:?}", c.velocity);
}

#[test]
fn test_stationary_cart_rolls_downhill() {
    let mut grid = TrackGrid::default();
    grid.set_rail(IVec3::ZERO, RailShape::AscendingEast);
    let mut c = cart(0.5, 0.9, 0.5);
    pre_integrate(&mut c, &grid, &RailParams::default().motion, TrainMotion::default());

    assert_eq!(c.contact(), ContactState::Sloped);
    assert!((c.position.y - 0.5).abs() < 1e-12, "y snapped onto the slope");
    assert!(c.velocity.x < 0.0, "accelerates towards the low (west) end");
}

#[test]
fn test_moving_cart_slows_going_uphill() {
    let mut grid = TrackGrid::default();
    grid.set_rail(IVec3::ZERO, RailShape::AscendingEast);
    let mut c = cart(0.5, 0.5, 0.5);
    c.velocity = DVec3::new(0.1, 0.0, 0.0);
    let params = RailParams::default().motion;
    pre_integrate(&mut c, &grid, &params, TrainMotion::default());

    assert_eq!(params.slope_acceleration, 0.0078125);
    assert!((c.velocity.x - 0.0921875).abs() < 1e-12, "vx = {}", c.velocity.x);
}

#[test]
fn test_moving_cart_speeds_up_going_downhill() {
    let mut grid = TrackGrid::default();
    grid.set_rail(IVec3::ZERO, RailShape::AscendingEast);
    let mut c = cart(0.5, 0.5, 0.5);
    c.velocity = DVec3::new(-0.1, 0.0, 0.0);
    pre_integrate(&mut c, &grid, &RailParams::default().motion, TrainMotion::default());

    assert!((c.velocity.x + 0.1078125).abs() < 1e-12, "vx = {}", c.velocity.x);
}

#[test]
fn test_uphill_cart_stops_and_rolls_back() {
    let mut grid = TrackGrid::default();
    grid.set_rail(IVec3::ZERO, RailShape::AscendingEast);
    let mut c = cart(0.5, 0.5, 0.5);
    c.velocity = DVec3::new(0.02, 0.0, 0.0);
    let params = RailParams::default().motion;
    for _ in 0..4 {
        pre_integrate(&mut c, &grid, &params, TrainMotion::default());
    }
    assert!(c.velocity.x < 0.0, "vx = {}", c.velocity.x);
}

#[test]
fn test_force_suspended_disables_slope_acceleration() {
    let mut grid = TrackGrid::default();
    grid.set_rail(IVec3::ZERO, RailShape::AscendingEast);
    let mut c = cart(0.5, 0.5, 0.5);
    let motion = TrainMotion {
        force_suspended: true,
        ..TrainMotion::default()
    };
    pre_integrate(&mut c, &grid, &RailParams::default().motion, motion);
    assert_eq!(c.velocity, DVec3::ZERO);
}

// ---------------------------------------------------------------------------
// Post-integration
// ---------------------------------------------------------------------------

#[test]
fn test_cart_climbs_slope_onto_upper_track() {
    let mut grid = TrackGrid::default();
    grid.set_rail(IVec3::new(0, 0, 0), RailShape::EastWest);
    grid.set_rail(IVec3::new(1, 0, 0), RailShape::AscendingEast);
    grid.lay_straight(IVec3::new(2, 1, 0), Face::East, 5);

    let mut c = cart(0.5, 0.0, 0.5);
    c.velocity = DVec3::new(0.3, 0.0, 0.0);
    let c = run(c, &grid, 10);

    assert!(c.position.x > 2.5, "x = {}", c.position.x);
    assert!((c.position.y - 1.0).abs() < 1e-9, "y = {}", c.position.y);
    assert_eq!(c.contact(), ContactState::OnRail);
}

#[test]
fn test_cart_follows_curve() {
    let mut grid = TrackGrid::default();
    grid.lay_straight(IVec3::new(0, 0, 0), Face::East, 3);
    grid.set_rail(IVec3::new(3, 0, 0), RailShape::SouthWest);
    grid.lay_straight(IVec3::new(3, 0, 1), Face::South, 6);

    let mut c = cart(0.5, 0.0, 0.5);
    c.velocity = DVec3::new(0.3, 0.0, 0.0);
    let c = run(c, &grid, 20);

    assert!(c.position.z > 1.5, "turned south: {:?}", c.position);
    assert!((c.position.x - 3.5).abs() < 1e-9, "{:?}", c.position);
    assert!(c.velocity.z > 0.0);
    assert_eq!(c.velocity.x, 0.0);
}

#[test]
fn test_yaw_kept_when_rolling_backwards() {
    let grid = east_west(-5, 10);
    let mut c = cart(0.5, 0.0, 0.5);
    c.velocity = DVec3::new(0.3, 0.0, 0.0);
    let mut c = run(c, &grid, 1);
    assert!((c.yaw + 90.0).abs() < 1e-9, "facing east: {}", c.yaw);

    c.velocity = DVec3::new(-0.3, 0.0, 0.0);
    let c = run(c, &grid, 1);
    assert!(
        (c.yaw + 90.0).abs() < 1e-9,
        "reversing keeps the orientation: {}",
        c.yaw
    );
}

#[test]
fn test_speed_factor_is_capped() {
    let grid = east_west(0, 12);
    let params = RailParams::default();
    let mut c = cart(0.5, 0.0, 0.5);
    c.velocity = DVec3::new(0.3, 0.0, 0.0);
    c.max_speed = 0.4;
    pre_integrate(&mut c, &grid, &params.motion, TrainMotion::default());
    post_integrate(&mut c, &grid, &params.motion, TrainMotion::default(), 100.0, None);
    assert!((c.position.x - 3.5).abs() < 1e-9, "x = {}", c.position.x);

    let mut c = cart(0.5, 0.0, 0.5);
    c.velocity = DVec3::new(0.3, 0.0, 0.0);
    c.max_speed = 0.4;
    pre_integrate(&mut c, &grid, &params.motion, TrainMotion::default());
    post_integrate(&mut c, &grid, &params.motion, TrainMotion::default(), f64::NAN, None);
    assert!((c.position.x - 0.8).abs() < 1e-9, "NaN factor counts as 1");
}

#[test]
fn test_horizontal_speed_clamped_to_max() {
    let grid = east_west(0, 4);
    let params = RailParams::default();
    let mut c = cart(0.5, 0.0, 0.5);
    c.velocity = DVec3::new(2.0, 0.0, 0.0);
    c.max_speed = 0.25;
    pre_integrate(&mut c, &grid, &params.motion, TrainMotion::default());
    post_integrate(&mut c, &grid, &params.motion, TrainMotion::default(), 1.0, None);
    assert!((c.position.x - 0.75).abs() < 1e-9);
}

#[test]
fn test_derailed_cart_cannot_enter_solid_block() {
    let mut grid = TrackGrid::default();
    for x in 0..4 {
        grid.set_solid(IVec3::new(x, -1, 0));
    }
    grid.set_solid(IVec3::new(2, 0, 0));

    let mut c = cart(1.9, 0.0, 0.5);
    c.velocity = DVec3::new(0.6, 0.0, 0.0);
    let c = run(c, &grid, 1);

    assert_eq!(c.contact(), ContactState::Derailed);
    assert!((c.position.x - 1.9).abs() < 1e-12);
    assert_eq!(c.velocity.x, 0.0);
}

#[test]
fn test_falling_cart_lands_on_ground() {
    let mut grid = TrackGrid::default();
    grid.set_solid(IVec3::ZERO);
    let c = run(cart(0.5, 2.5, 0.5), &grid, 30);

    assert!((c.position.y - 1.0).abs() < 1e-12, "y = {}", c.position.y);
    assert_eq!(c.contact(), ContactState::Derailed);
}

// ---------------------------------------------------------------------------
// Collision snapshot
// ---------------------------------------------------------------------------

struct Pair {
    a: CartKey,
    b: CartKey,
    train_a: TrainKey,
    train_b: TrainKey,
}

fn pair() -> Pair {
    let mut carts: SlotMap<CartKey, ()> = SlotMap::with_key();
    let mut trains: SlotMap<TrainKey, ()> = SlotMap::with_key();
    Pair {
        a: carts.insert(()),
        b: carts.insert(()),
        train_a: trains.insert(()),
        train_b: trains.insert(()),
    }
}

fn approaching(p: &Pair) -> Cart {
    let mut c = cart(0.5, 0.0, 0.5);
    c.velocity = DVec3::new(0.3, 0.0, 0.0);
    c.train = Some(p.train_a);
    c
}

#[test]
fn test_colliding_trains_block_each_other() {
    let p = pair();
    let mut snapshot = CollisionSnapshot::new(0.98);
    snapshot.push(CollisionBody {
        key: p.b,
        train: Some(p.train_b),
        position: DVec3::new(1.3, 0.0, 0.5),
        collides: true,
    });

    let mut c = approaching(&p);
    let mut disp = DVec3::new(0.3, 0.0, 0.0);
    snapshot.resolve(p.a, &mut c, true, &mut disp);
    assert!(disp.x.abs() < 1e-12, "approach removed: {disp:?}");
    assert!(c.velocity.x.abs() < 1e-12);
}

#[test]
fn test_ignore_mode_passes_through() {
    let p = pair();
    let mut snapshot = CollisionSnapshot::new(0.98);
    snapshot.push(CollisionBody {
        key: p.b,
        train: Some(p.train_b),
        position: DVec3::new(1.3, 0.0, 0.5),
        collides: false,
    });

    let mut c = approaching(&p);
    let mut disp = DVec3::new(0.3, 0.0, 0.0);
    snapshot.resolve(p.a, &mut c, true, &mut disp);
    assert_eq!(disp.x, 0.3);
}

#[test]
fn test_grace_timer_skips_collision() {
    let p = pair();
    let mut snapshot = CollisionSnapshot::new(0.98);
    snapshot.push(CollisionBody {
        key: p.b,
        train: Some(p.train_b),
        position: DVec3::new(1.3, 0.0, 0.5),
        collides: true,
    });

    let mut c = approaching(&p);
    c.ignore_collision(p.b, 5);
    let mut disp = DVec3::new(0.3, 0.0, 0.0);
    snapshot.resolve(p.a, &mut c, true, &mut disp);
    assert_eq!(disp.x, 0.3);
}

#[test]
fn test_same_train_only_collides_when_overlapping() {
    let p = pair();
    let mut snapshot = CollisionSnapshot::new(0.98);
    snapshot.push(CollisionBody {
        key: p.b,
        train: Some(p.train_a),
        position: DVec3::new(1.3, 0.0, 0.5),
        collides: true,
    });

    let mut c = approaching(&p);
    let mut disp = DVec3::new(0.2, 0.0, 0.0);
    snapshot.resolve(p.a, &mut c, true, &mut disp);
    assert_eq!(disp.x, 0.2, "0.6 apart afterwards: no contact");

    let mut disp = DVec3::new(0.5, 0.0, 0.0);
    snapshot.resolve(p.a, &mut c, true, &mut disp);
    assert!(disp.x.abs() < 1e-12, "overlap blocked");
}
