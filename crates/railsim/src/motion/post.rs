use bevy::math::{DVec3, IVec3};

use crate::cart::{Cart, ContactState};
use crate::config::{MIN_ORIENT_MOVEMENT_SQ, PITCH_LIMIT, SPEED_FACTOR_CAP, YAW_FLIP_THRESHOLD};
use crate::ids::CartKey;
use crate::math::{self, horizontal, sanitize};
use crate::rail_params::MotionParams;
use crate::track::RailSampler;

use super::collision::CollisionSnapshot;
use super::TrainMotion;

/// Movement, re-snap and orientation.
///
/// `speed_factor` scales the displacement of this tick (spacing correction,
/// realtime playback). It is capped at [`SPEED_FACTOR_CAP`]; NaN counts as 1.
pub fn post_integrate<S: RailSampler + ?Sized>(
    cart: &mut Cart,
    sampler: &S,
    params: &MotionParams,
    train: TrainMotion,
    speed_factor: f64,
    collisions: Option<(CartKey, &CollisionSnapshot)>,
) {
    cart.velocity = sanitize(cart.velocity);
    let factor = if speed_factor.is_nan() {
        1.0
    } else {
        speed_factor.clamp(0.0, SPEED_FACTOR_CAP)
    };

    let planar = horizontal(cart.velocity);
    let speed = planar.length();
    if speed > cart.max_speed {
        let clamped = planar * (cart.max_speed / speed);
        cart.velocity.x = clamped.x;
        cart.velocity.z = clamped.z;
    }

    let railed = cart.contact.is_railed();
    let rail_before = cart.rail;
    let old_pos = cart.position;

    let mut displacement = horizontal(cart.velocity) * factor;
    if !railed {
        displacement.y = cart.velocity.y * factor;
    }

    if let Some((key, snapshot)) = collisions {
        snapshot.resolve(key, cart, train.collides, &mut displacement);
    }
    if !railed {
        block_collision(cart, sampler, &mut displacement);
    }
    cart.position += displacement;

    let mut slope_transition = false;
    if let Some(before) = rail_before {
        // Carry the height profile of the old rail over the cell edge so a
        // cart leaving the top of a slope is found on the cell above.
        cart.position.y = before.surface_y(cart.position);
        if let Some(after) = sampler.detect(cart.position) {
            cart.position.y = after.surface_y(cart.position);
            slope_transition = after.is_sloped() != before.is_sloped();

            let delta = after.pos - before.pos;
            if delta.x != 0 || delta.z != 0 {
                let speed = horizontal(cart.velocity).length();
                let dir = DVec3::new(delta.x as f64, 0.0, delta.z as f64).normalize();
                cart.velocity.x = dir.x * speed;
                cart.velocity.z = dir.z * speed;
            }
            cart.rail = Some(after);
        }

        if train.slowdown {
            let friction = if train.slow_mode {
                params.slow_friction
            } else {
                params.friction
            };
            cart.velocity.x *= friction;
            cart.velocity.z *= friction;
        }

        let speed = horizontal(cart.velocity).length();
        if train.slowdown && !train.force_suspended && speed > 0.0 {
            let slope = ((old_pos.y - cart.position.y) * params.slope_slowdown / speed + 1.0).max(0.0);
            cart.velocity.x *= slope;
            cart.velocity.z *= slope;
        }
    }

    orient(cart, cart.position - old_pos, slope_transition);
}

/// A derailed cart never enters a solid cell; a falling cart lands on top.
fn block_collision<S: RailSampler + ?Sized>(cart: &mut Cart, sampler: &S, displacement: &mut DVec3) {
    let pos = cart.position;

    let mut y = pos.y + displacement.y;
    if displacement.y < 0.0 {
        let below = DVec3::new(pos.x, y, pos.z).floor().as_ivec3();
        if sampler.is_solid(below) {
            y = below.y as f64 + 1.0;
            cart.velocity.y = 0.0;
        }
    }
    displacement.y = y - pos.y;

    let feet = y.floor() as i32;
    let x_cell = IVec3::new((pos.x + displacement.x).floor() as i32, feet, pos.z.floor() as i32);
    if sampler.is_solid(x_cell) {
        displacement.x = 0.0;
        cart.velocity.x = 0.0;
    }
    let z_cell = IVec3::new(
        (pos.x + displacement.x).floor() as i32,
        feet,
        (pos.z + displacement.z).floor() as i32,
    );
    if sampler.is_solid(z_cell) {
        displacement.z = 0.0;
        cart.velocity.z = 0.0;
    }
}

fn orient(cart: &mut Cart, moved: DVec3, slope_transition: bool) {
    if slope_transition {
        cart.pitch = 0.0;
        return;
    }
    if horizontal(moved).length_squared() > MIN_ORIENT_MOVEMENT_SQ {
        let pitch = math::look_at_pitch(moved.x, moved.y, moved.z);
        cart.pitch = match cart.contact {
            ContactState::OnRail | ContactState::Sloped => -0.8 * pitch,
            ContactState::Airborne => 0.7 * pitch,
            ContactState::Derailed => 0.0,
        }
        .clamp(-PITCH_LIMIT, PITCH_LIMIT);

        let yaw = math::look_at_yaw(moved.x, moved.z);
        cart.yaw = if math::angle_difference(cart.yaw, yaw) > YAW_FLIP_THRESHOLD {
            math::wrap_angle(yaw + 180.0)
        } else {
            yaw
        };
    } else {
        cart.pitch *= 0.1;
        if cart.pitch.abs() <= 0.1 {
            cart.pitch = 0.0;
        }
    }
}
