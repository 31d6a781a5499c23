//! Trains: ordered groups of coupled carts sharing one driving force.
//!
//! A `Train` only stores cart handles. The carts themselves live in the
//! fleet's cart arena and point back at their train through a generation
//! checked [`TrainKey`](crate::ids::TrainKey).

use bevy::math::IVec3;
use bitcode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::ids::CartKey;
use crate::rail_params::TrainDefaults;
use crate::velocity_target::VelocityTargetQueue;

/// Collision policy of a train towards carts of other trains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Encode, Decode)]
pub enum CollisionMode {
    #[default]
    Collide,
    Ignore,
}

/// Train-level switches and properties. Inherited by both halves of a split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct TrainFlags {
    /// Force sharing is off: no slope acceleration, no force redistribution.
    pub force_suspended: bool,
    /// Spacing correction is skipped (every cart gets a neutral factor).
    pub spacing_ignore: bool,
    /// Rolling friction applies.
    pub slowdown: bool,
    /// Use the stronger friction multiplier.
    pub slow_mode: bool,
    pub allow_linking: bool,
    pub collision: CollisionMode,
    pub speed_limit: f64,
    /// Label of the destination marker this train is routed towards.
    pub destination: Option<String>,
}

impl TrainFlags {
    pub fn from_defaults(defaults: &TrainDefaults) -> Self {
        Self {
            force_suspended: false,
            spacing_ignore: false,
            slowdown: defaults.slowdown,
            slow_mode: false,
            allow_linking: defaults.allow_linking,
            collision: defaults.collision,
            speed_limit: defaults.speed_limit,
            destination: None,
        }
    }
}

impl Default for TrainFlags {
    fn default() -> Self {
        Self::from_defaults(&TrainDefaults::default())
    }
}

#[derive(Debug, Clone)]
pub struct Train {
    pub name: String,
    /// Head first. Adjacent entries are physically coupled neighbours.
    pub(crate) carts: Vec<CartKey>,
    /// Trigger locations currently beneath at least one cart of this train.
    pub(crate) active_triggers: Vec<IVec3>,
    pub targets: VelocityTargetQueue,
    pub flags: TrainFlags,
    /// Shared force applied on the last tick.
    pub(crate) last_force: f64,
}

impl Train {
    pub(crate) fn new(name: String, carts: Vec<CartKey>, flags: TrainFlags) -> Self {
        Self {
            name,
            carts,
            active_triggers: Vec::new(),
            targets: VelocityTargetQueue::default(),
            flags,
            last_force: 0.0,
        }
    }

    pub fn carts(&self) -> &[CartKey] {
        &self.carts
    }

    pub fn head(&self) -> Option<CartKey> {
        self.carts.first().copied()
    }

    pub fn tail(&self) -> Option<CartKey> {
        self.carts.last().copied()
    }

    pub fn len(&self) -> usize {
        self.carts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.carts.is_empty()
    }

    pub fn index_of(&self, cart: CartKey) -> Option<usize> {
        self.carts.iter().position(|&c| c == cart)
    }

    /// Whether `cart` is the head or the tail. A singleton is both.
    pub fn is_extremity(&self, cart: CartKey) -> bool {
        self.head() == Some(cart) || self.tail() == Some(cart)
    }

    pub fn active_triggers(&self) -> &[IVec3] {
        &self.active_triggers
    }

    pub fn last_force(&self) -> f64 {
        self.last_force
    }

    /// Nominal length of the train along the track.
    pub fn nominal_length(&self, cart_distance: f64) -> f64 {
        self.carts.len().saturating_sub(1) as f64 * cart_distance
    }

    /// Reverse the cart order so the head points the other way.
    pub(crate) fn reverse(&mut self) {
        self.carts.reverse();
    }
}
