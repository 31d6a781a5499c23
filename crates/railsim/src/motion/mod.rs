//! Constrained motion engine.
//!
//! A tick of one cart is two passes: [`pre_integrate`] detects the rail and
//! snaps velocity onto its axis, [`post_integrate`] moves the cart, re-snaps
//! it to the rail and re-derives its orientation. The coupling manager runs
//! force sharing between the two passes; [`advance`] runs both back to back
//! for a cart that is not part of any train.

pub mod collision;
mod post;
mod pre;

#[cfg(test)]
mod tests;

pub use collision::{CollisionBody, CollisionSnapshot};
pub use post::post_integrate;
pub use pre::pre_integrate;

use crate::cart::Cart;
use crate::rail_params::RailParams;
use crate::track::RailSampler;
use crate::train::{CollisionMode, TrainFlags};

/// The train-level switches integration needs to know about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainMotion {
    pub force_suspended: bool,
    pub slowdown: bool,
    pub slow_mode: bool,
    /// Collides with carts of other trains.
    pub collides: bool,
}

impl TrainMotion {
    pub fn from_flags(flags: &TrainFlags, targeting: bool) -> Self {
        Self {
            force_suspended: flags.force_suspended,
            slowdown: flags.slowdown,
            slow_mode: flags.slow_mode,
            collides: flags.collision == CollisionMode::Collide && !targeting,
        }
    }
}

impl Default for TrainMotion {
    fn default() -> Self {
        Self::from_flags(&TrainFlags::default(), false)
    }
}

/// One full tick of a lone cart, returning the advanced cart.
///
/// Uses the default train properties from `params` and ignores other carts.
pub fn advance<S: RailSampler + ?Sized>(cart: &Cart, sampler: &S, params: &RailParams) -> Cart {
    let mut next = cart.clone();
    let motion = TrainMotion::from_flags(&TrainFlags::from_defaults(&params.train), false);
    pre_integrate(&mut next, sampler, &params.motion, motion);
    next.max_speed = params.train.speed_limit;
    post_integrate(&mut next, sampler, &params.motion, motion, 1.0, None);
    next
}
