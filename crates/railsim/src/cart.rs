use bevy::math::{DVec3, IVec3};
use bitcode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::ids::{CartKey, CartUuid, TrainKey};
use crate::math;
use crate::track::RailInfo;

/// How a cart touches the world this tick. Recomputed once per tick by
/// pre-integration and never set from outside the motion engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Encode, Decode)]
pub enum ContactState {
    #[default]
    OnRail,
    Sloped,
    /// Off the rails, resting on or sliding along the ground.
    Derailed,
    /// Off the rails over empty space.
    Airborne,
}

impl ContactState {
    pub fn is_railed(self) -> bool {
        matches!(self, ContactState::OnRail | ContactState::Sloped)
    }

    pub fn is_derailed(self) -> bool {
        !self.is_railed()
    }
}

/// One rail-bound vehicle.
#[derive(Debug, Clone)]
pub struct Cart {
    pub uuid: CartUuid,
    pub position: DVec3,
    pub velocity: DVec3,
    pub yaw: f64,
    pub pitch: f64,
    /// Horizontal unit vector the shared train force pushes along.
    pub heading: DVec3,
    /// Weak back-reference; resolved through the fleet's train arena.
    pub train: Option<TrainKey>,
    /// Set when the cart was removed from the world. Dead carts are skipped
    /// by integration and dropped by the next validation pass.
    pub dead: bool,
    pub(crate) contact: ContactState,
    pub(crate) rail: Option<RailInfo>,
    pub(crate) derailed_ticks: u32,
    pub(crate) max_speed: f64,
    /// Trigger locations currently beneath this cart.
    pub(crate) triggers: Vec<IVec3>,
    /// Carts this one ignores for collision, with remaining ticks.
    pub(crate) collision_grace: Vec<(CartKey, u32)>,
    /// Restored from a parked train and not yet simulated.
    pub(crate) recently_parked: bool,
}

impl Cart {
    pub fn new(uuid: CartUuid, position: DVec3) -> Self {
        Self {
            uuid,
            position,
            velocity: DVec3::ZERO,
            yaw: 0.0,
            pitch: 0.0,
            heading: math::yaw_heading(0.0),
            train: None,
            dead: false,
            contact: ContactState::OnRail,
            rail: None,
            derailed_ticks: 0,
            max_speed: f64::INFINITY,
            triggers: Vec::new(),
            collision_grace: Vec::new(),
            recently_parked: false,
        }
    }

    pub fn contact(&self) -> ContactState {
        self.contact
    }

    pub fn rail(&self) -> Option<&RailInfo> {
        self.rail.as_ref()
    }

    pub fn is_derailed(&self) -> bool {
        self.contact.is_derailed()
    }

    pub fn derailed_ticks(&self) -> u32 {
        self.derailed_ticks
    }

    pub fn triggers(&self) -> &[IVec3] {
        &self.triggers
    }

    /// Horizontal speed.
    pub fn speed(&self) -> f64 {
        math::horizontal(self.velocity).length()
    }

    pub fn is_moving(&self) -> bool {
        self.speed() > 0.001
    }

    /// Signed projection of the horizontal velocity onto the heading.
    pub fn forward_force(&self) -> f64 {
        math::horizontal(self.velocity).dot(self.heading)
    }

    /// Point the horizontal velocity along the heading with the given signed
    /// magnitude. Vertical velocity is left alone.
    pub fn set_forward_force(&mut self, force: f64) {
        let h = self.heading * force;
        self.velocity.x = h.x;
        self.velocity.z = h.z;
    }

    pub fn scale_velocity(&mut self, factor: f64) {
        self.velocity *= factor;
    }

    pub fn distance_xz(&self, other: &Cart) -> f64 {
        math::distance_xz(self.position, other.position)
    }

    /// Planar proximity used for coupling: within `max` horizontally and, when
    /// either cart is off the rails, within `max` vertically too.
    pub fn is_near(&self, other: &Cart, max: f64) -> bool {
        if self.distance_xz(other) > max {
            return false;
        }
        if self.is_derailed() || other.is_derailed() {
            return (self.position.y - other.position.y).abs() <= max;
        }
        true
    }

    pub(crate) fn ignores_collision_with(&self, other: CartKey) -> bool {
        self.collision_grace.iter().any(|(k, _)| *k == other)
    }

    pub(crate) fn ignore_collision(&mut self, other: CartKey, ticks: u32) {
        match self.collision_grace.iter_mut().find(|(k, _)| *k == other) {
            Some(entry) => entry.1 = entry.1.max(ticks),
            None => self.collision_grace.push((other, ticks)),
        }
    }

    pub(crate) fn tick_collision_grace(&mut self) {
        for entry in &mut self.collision_grace {
            entry.1 = entry.1.saturating_sub(1);
        }
        self.collision_grace.retain(|(_, t)| *t > 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cart_at(x: f64, z: f64) -> Cart {
        Cart::new(CartUuid(1), DVec3::new(x, 0.0, z))
    }

    #[test]
    fn test_forward_force_sign_follows_heading() {
        let mut cart = cart_at(0.0, 0.0);
        cart.heading = DVec3::X;
        cart.velocity = DVec3::new(0.3, 0.0, 0.0);
        assert!((cart.forward_force() - 0.3).abs() < 1e-12);
        cart.velocity = DVec3::new(-0.2, 0.0, 0.0);
        assert!((cart.forward_force() + 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_set_forward_force_keeps_vertical() {
        let mut cart = cart_at(0.0, 0.0);
        cart.heading = DVec3::Z;
        cart.velocity = DVec3::new(0.5, -0.1, 0.0);
        cart.set_forward_force(0.25);
        assert_eq!(cart.velocity, DVec3::new(0.0, -0.1, 0.25));
    }

    #[test]
    fn test_is_near_checks_height_when_derailed() {
        let a = cart_at(0.0, 0.0);
        let mut b = cart_at(1.0, 0.0);
        b.position.y = 10.0;
        assert!(a.is_near(&b, 4.0), "railed carts only compare planar distance");
        b.contact = ContactState::Airborne;
        assert!(!a.is_near(&b, 4.0));
    }

    #[test]
    fn test_collision_grace_expires() {
        let mut cart = cart_at(0.0, 0.0);
        let other = CartKey::default();
        cart.ignore_collision(other, 2);
        assert!(cart.ignores_collision_with(other));
        cart.tick_collision_grace();
        assert!(cart.ignores_collision_with(other));
        cart.tick_collision_grace();
        assert!(!cart.ignores_collision_with(other));
    }
}
