use bevy::math::{DVec3, IVec3};

use crate::cart::{Cart, ContactState};
use crate::math::{horizontal, sanitize};
use crate::rail_params::MotionParams;
use crate::track::{RailInfo, RailSampler};

use super::TrainMotion;

/// Rail detection and axis snap.
///
/// Recomputes the cart's contact state from the rail at (or one cell below)
/// its position, then constrains the velocity to the rail axis and applies
/// slope, powered and braking effects. Off the rails the velocity decays
/// instead.
pub fn pre_integrate<S: RailSampler + ?Sized>(
    cart: &mut Cart,
    sampler: &S,
    params: &MotionParams,
    train: TrainMotion,
) {
    cart.velocity = sanitize(cart.velocity);

    match sampler.detect(cart.position) {
        Some(rail) => on_rail(cart, sampler, params, train, rail),
        None => off_rail(cart, sampler, params),
    }
}

fn on_rail<S: RailSampler + ?Sized>(
    cart: &mut Cart,
    sampler: &S,
    params: &MotionParams,
    train: TrainMotion,
    rail: RailInfo,
) {
    cart.derailed_ticks = 0;
    cart.contact = if rail.is_sloped() {
        ContactState::Sloped
    } else {
        ContactState::OnRail
    };

    // Project onto the rail axis, keeping the direction of travel.
    let planar = horizontal(cart.velocity);
    let mut axis = rail.shape.axis();
    if planar.dot(axis) < 0.0 {
        axis = -axis;
    }
    let along = axis * planar.length();
    cart.velocity = DVec3::new(along.x, 0.0, along.z);

    let snapped = rail.shape.snap_to_line(rail.pos, cart.position);
    cart.position.x = snapped.x;
    cart.position.z = snapped.z;
    cart.position.y = rail.surface_y(cart.position);

    if let Some(high) = rail.shape.ascending() {
        if !train.force_suspended && train.slowdown {
            cart.velocity -= high.vector() * params.slope_acceleration;
        }
    }

    if rail.is_powered() {
        let speed = horizontal(cart.velocity).length();
        if speed > 0.01 {
            let boost = 1.0 + params.powered_boost / speed;
            cart.velocity.x *= boost;
            cart.velocity.z *= boost;
        } else {
            // Launch away from an adjacent wall.
            let (a, b) = rail.shape.ends();
            if sampler.is_solid(rail.pos + a.offset()) {
                cart.velocity = b.vector() * params.launch_kick;
            } else if sampler.is_solid(rail.pos + b.offset()) {
                cart.velocity = a.vector() * params.launch_kick;
            }
        }
    } else if rail.is_braking() {
        if horizontal(cart.velocity).length_squared() < params.brake_stop_speed_sq {
            cart.velocity = DVec3::ZERO;
        } else {
            cart.velocity.x *= params.brake_decay;
            cart.velocity.z *= params.brake_decay;
        }
    }

    cart.rail = Some(rail);
}

fn off_rail<S: RailSampler + ?Sized>(cart: &mut Cart, sampler: &S, params: &MotionParams) {
    cart.rail = None;
    cart.derailed_ticks = cart.derailed_ticks.saturating_add(1);

    let cell = cart.position.floor().as_ivec3();
    let resting = sampler.is_solid(cell - IVec3::Y) && cart.position.y - (cell.y as f64) < 1e-3;
    if resting {
        cart.contact = ContactState::Derailed;
        cart.velocity.x *= params.derailed_ground_decay;
        cart.velocity.z *= params.derailed_ground_decay;
        cart.velocity.y = cart.velocity.y.max(0.0);
    } else {
        cart.contact = ContactState::Airborne;
        cart.velocity *= params.airborne_decay;
        cart.velocity.y -= params.gravity;
    }
}
