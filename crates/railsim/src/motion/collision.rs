//! Cart-to-cart collision against a snapshot of the fleet.
//!
//! Positions are copied before a train moves so that integration never reads
//! the arena it is mutating.

use bevy::math::DVec3;

use crate::cart::Cart;
use crate::config::SAME_TRAIN_COLLIDE_DISTANCE;
use crate::ids::{CartKey, TrainKey};
use crate::math::{distance_xz, horizontal};

#[derive(Debug, Clone, Copy)]
pub struct CollisionBody {
    pub key: CartKey,
    pub train: Option<TrainKey>,
    pub position: DVec3,
    /// Whether this body takes part in collisions with other trains.
    pub collides: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CollisionSnapshot {
    bodies: Vec<CollisionBody>,
    contact_distance: f64,
}

impl CollisionSnapshot {
    pub fn new(contact_distance: f64) -> Self {
        Self {
            bodies: Vec::new(),
            contact_distance,
        }
    }

    pub fn push(&mut self, body: CollisionBody) {
        self.bodies.push(body);
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Clip `displacement` (and the cart's velocity) so the cart does not push
    /// into any body it collides with.
    ///
    /// Carts of the same train only collide when overlapping closer than
    /// [`SAME_TRAIN_COLLIDE_DISTANCE`]. Carts of different trains collide when
    /// both sides allow it and no grace timer is running between them.
    pub fn resolve(&self, key: CartKey, cart: &mut Cart, collides: bool, displacement: &mut DVec3) {
        for body in &self.bodies {
            if body.key == key || cart.ignores_collision_with(body.key) {
                continue;
            }
            let same_train = body.train.is_some() && body.train == cart.train;
            let limit = if same_train {
                SAME_TRAIN_COLLIDE_DISTANCE
            } else if collides && body.collides {
                self.contact_distance
            } else {
                continue;
            };

            if (body.position.y - cart.position.y).abs() >= 1.0 {
                continue;
            }
            let next = cart.position + *displacement;
            if distance_xz(next, body.position) >= limit {
                continue;
            }

            let normal = horizontal(body.position - cart.position).normalize_or_zero();
            if normal == DVec3::ZERO {
                continue;
            }
            let approach = displacement.dot(normal);
            if approach > 0.0 {
                *displacement -= normal * approach;
            }
            let closing = cart.velocity.dot(normal);
            if closing > 0.0 {
                cart.velocity -= normal * closing;
            }
        }
    }
}
