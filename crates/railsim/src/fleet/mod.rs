//! Coupling manager.
//!
//! The [`Fleet`] resource owns every live cart and train in two generational
//! arenas. Trains hold ordered cart handles; carts hold a weak train handle.
//! All structural operations (spawn, link, unlink, split, removal, parking)
//! go through `Fleet` so the two sides never disagree.
//!
//! ## Tick
//! [`Fleet::tick`] runs each train to completion, one at a time:
//! validate, pre-integrate, split-check, force sharing, spacing correction,
//! force hook, apply, post-integrate.

mod coupling;
mod link;
mod parking;
mod split;
mod triggers;


pub use link::LinkRejection;
pub use parking::{ParkedCart, ParkedTrain, ParkedTrains};

use std::fmt;

use bevy::log::info;
use bevy::math::{DVec3, IVec3};
use bevy::prelude::Resource;
use slotmap::SlotMap;

use crate::cart::Cart;
use crate::events::{EventSink, FleetEvent, TriggerKind};
use crate::ids::{CartKey, CartUuid, TrainKey};
use crate::math;
use crate::rail_params::RailParams;
use crate::track::RailSampler;
use crate::train::{Train, TrainFlags};
use crate::velocity_target::VelocityTarget;

// =============================================================================
// Errors
// =============================================================================

/// Misuse of the fleet API. Physics never produces these.
#[derive(Debug, Clone, PartialEq)]
pub enum FleetError {
    UnknownCart(CartKey),
    UnknownTrain(TrainKey),
    /// No rail at or below the requested spawn position.
    NoRail(IVec3),
    /// A live cart already carries this identity.
    DuplicateCart(CartUuid),
    NotParked(String),
    EmptyTrain,
    LinkRejected(LinkRejection),
}

impl fmt::Display for FleetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FleetError::UnknownCart(key) => write!(f, "unknown cart {key:?}"),
            FleetError::UnknownTrain(key) => write!(f, "unknown train {key:?}"),
            FleetError::NoRail(pos) => write!(f, "no rail at {pos}"),
            FleetError::DuplicateCart(uuid) => write!(f, "cart {uuid} already exists"),
            FleetError::NotParked(name) => write!(f, "no parked train named '{name}'"),
            FleetError::EmptyTrain => write!(f, "a train needs at least one cart"),
            FleetError::LinkRejected(reason) => write!(f, "link rejected: {reason}"),
        }
    }
}

impl std::error::Error for FleetError {}

impl From<LinkRejection> for FleetError {
    fn from(reason: LinkRejection) -> Self {
        FleetError::LinkRejected(reason)
    }
}

// =============================================================================
// Fleet
// =============================================================================

#[derive(Resource, Debug, Default)]
pub struct Fleet {
    pub(crate) carts: SlotMap<CartKey, Cart>,
    pub(crate) trains: SlotMap<TrainKey, Train>,
    next_train_number: u64,
    splits: u64,
    links: u64,
}

impl Fleet {
    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    pub fn cart(&self, key: CartKey) -> Option<&Cart> {
        self.carts.get(key)
    }

    pub fn train(&self, key: TrainKey) -> Option<&Train> {
        self.trains.get(key)
    }

    /// Mutable access to train properties and the velocity target queue.
    pub fn train_mut(&mut self, key: TrainKey) -> Option<&mut Train> {
        self.trains.get_mut(key)
    }

    pub fn train_of(&self, cart: CartKey) -> Option<TrainKey> {
        self.carts
            .get(cart)
            .and_then(|c| c.train)
            .filter(|t| self.trains.contains_key(*t))
    }

    pub fn carts(&self) -> impl Iterator<Item = (CartKey, &Cart)> {
        self.carts.iter()
    }

    pub fn trains(&self) -> impl Iterator<Item = (TrainKey, &Train)> {
        self.trains.iter()
    }

    pub fn cart_count(&self) -> usize {
        self.carts.len()
    }

    pub fn train_count(&self) -> usize {
        self.trains.len()
    }

    pub fn find_cart(&self, uuid: CartUuid) -> Option<CartKey> {
        self.carts
            .iter()
            .find(|(_, c)| c.uuid == uuid)
            .map(|(k, _)| k)
    }

    pub fn find_train(&self, name: &str) -> Option<TrainKey> {
        self.trains
            .iter()
            .find(|(_, t)| t.name == name)
            .map(|(k, _)| k)
    }

    /// Cart positions of a train, head first.
    pub fn positions(&self, train: TrainKey) -> Vec<DVec3> {
        self.trains
            .get(train)
            .map(|t| {
                t.carts
                    .iter()
                    .filter_map(|k| self.carts.get(*k))
                    .map(|c| c.position)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Splits performed since the fleet was created.
    pub fn split_count(&self) -> u64 {
        self.splits
    }

    /// Successful links since the fleet was created.
    pub fn link_count(&self) -> u64 {
        self.links
    }

    pub(crate) fn train_counter(&self) -> u64 {
        self.next_train_number
    }

    pub(crate) fn set_train_counter(&mut self, value: u64) {
        self.next_train_number = self.next_train_number.max(value);
    }

    // -------------------------------------------------------------------------
    // Spawning
    // -------------------------------------------------------------------------

    /// Create a cart on the rail at `position` as a new singleton train.
    pub fn spawn_cart<S: RailSampler + ?Sized>(
        &mut self,
        uuid: CartUuid,
        position: DVec3,
        sampler: &S,
        params: &RailParams,
    ) -> Result<CartKey, FleetError> {
        let cart = self.placed_cart(uuid, position, sampler)?;
        let key = self.carts.insert(cart);
        self.new_train(vec![key], TrainFlags::from_defaults(&params.train));
        Ok(key)
    }

    /// Spawn several carts, head first, already coupled into one train.
    pub fn spawn_train<S: RailSampler + ?Sized>(
        &mut self,
        carts: &[(CartUuid, DVec3)],
        sampler: &S,
        params: &RailParams,
    ) -> Result<TrainKey, FleetError> {
        if carts.is_empty() {
            return Err(FleetError::EmptyTrain);
        }
        let placed = carts
            .iter()
            .map(|(uuid, pos)| self.placed_cart(*uuid, *pos, sampler))
            .collect::<Result<Vec<_>, _>>()?;
        let keys = placed.into_iter().map(|c| self.carts.insert(c)).collect();
        let train = self.new_train(keys, TrainFlags::from_defaults(&params.train));
        self.refresh_headings(train);
        Ok(train)
    }

    fn placed_cart<S: RailSampler + ?Sized>(
        &self,
        uuid: CartUuid,
        position: DVec3,
        sampler: &S,
    ) -> Result<Cart, FleetError> {
        if self.find_cart(uuid).is_some() {
            return Err(FleetError::DuplicateCart(uuid));
        }
        let rail = sampler
            .detect(position)
            .ok_or(FleetError::NoRail(position.floor().as_ivec3()))?;
        let mut cart = Cart::new(uuid, position);
        cart.position = rail.shape.snap_to_line(rail.pos, position);
        cart.position.y = rail.surface_y(cart.position);
        cart.heading = rail.shape.axis();
        cart.yaw = math::look_at_yaw(cart.heading.x, cart.heading.z);
        cart.rail = Some(rail);
        Ok(cart)
    }

    /// Insert a fully formed cart (restores, tests) as a singleton train.
    pub fn insert_cart(&mut self, cart: Cart, flags: TrainFlags) -> (CartKey, TrainKey) {
        let key = self.carts.insert(cart);
        let train = self.new_train(vec![key], flags);
        (key, train)
    }

    // -------------------------------------------------------------------------
    // Direct manipulation
    // -------------------------------------------------------------------------

    pub fn set_velocity(&mut self, cart: CartKey, velocity: DVec3) -> Result<(), FleetError> {
        let c = self.carts.get_mut(cart).ok_or(FleetError::UnknownCart(cart))?;
        c.velocity = velocity;
        Ok(())
    }

    /// Move a cart without physics. Used by hosts that teleport vehicles.
    pub fn teleport(&mut self, cart: CartKey, position: DVec3) -> Result<(), FleetError> {
        let c = self.carts.get_mut(cart).ok_or(FleetError::UnknownCart(cart))?;
        c.position = position;
        Ok(())
    }

    /// Give every cart of a train the same speed along its heading.
    pub fn launch(&mut self, train: TrainKey, speed: f64) -> Result<(), FleetError> {
        let keys = self
            .trains
            .get(train)
            .ok_or(FleetError::UnknownTrain(train))?
            .carts
            .clone();
        self.refresh_headings(train);
        for key in keys {
            if let Some(c) = self.carts.get_mut(key) {
                c.set_forward_force(speed);
            }
        }
        Ok(())
    }

    /// Flag a cart as destroyed. It is removed by the next validation pass.
    pub fn mark_dead(&mut self, cart: CartKey) -> Result<(), FleetError> {
        let c = self.carts.get_mut(cart).ok_or(FleetError::UnknownCart(cart))?;
        c.dead = true;
        Ok(())
    }

    pub fn push_target(&mut self, train: TrainKey, target: VelocityTarget) -> Result<(), FleetError> {
        let t = self.trains.get_mut(train).ok_or(FleetError::UnknownTrain(train))?;
        t.targets.push(target);
        Ok(())
    }

    pub fn set_destination(
        &mut self,
        train: TrainKey,
        destination: Option<String>,
    ) -> Result<(), FleetError> {
        let t = self.trains.get_mut(train).ok_or(FleetError::UnknownTrain(train))?;
        t.flags.destination = destination;
        Ok(())
    }

    /// Destroy a cart immediately. Trigger locations only it covered fire
    /// their leave notifications; an interior cart splits the remainder.
    pub fn remove_cart(&mut self, cart: CartKey, sink: &mut dyn EventSink) -> Result<Cart, FleetError> {
        let train = self.train_of(cart);
        let idx = train.and_then(|t| self.trains.get(t)).and_then(|t| t.index_of(cart));
        let removed = self.detach_cart(cart, sink)?;

        if let Some(train) = train {
            self.sync_train_triggers(train, sink);
            let len = self.trains.get(train).map_or(0, |t| t.len());
            match idx {
                _ if len == 0 => self.destroy_train(train, sink),
                Some(idx) if idx > 0 && idx < len => {
                    self.split_at(train, idx, 0, sink);
                }
                _ => {}
            }
        }
        Ok(removed)
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    /// Take a cart out of the arena and its train's cart list without
    /// touching the train's trigger set or structure.
    pub(crate) fn detach_cart(&mut self, cart: CartKey, sink: &mut dyn EventSink) -> Result<Cart, FleetError> {
        if !self.carts.contains_key(cart) {
            return Err(FleetError::UnknownCart(cart));
        }
        self.leave_all_triggers(cart, sink);
        if let Some(t) = self.train_of(cart).and_then(|t| self.trains.get_mut(t)) {
            t.carts.retain(|&k| k != cart);
        }
        let removed = self.carts.remove(cart).ok_or(FleetError::UnknownCart(cart))?;
        sink.fire(FleetEvent::CartRemoved {
            cart,
            uuid: removed.uuid,
        });
        Ok(removed)
    }

    pub(crate) fn new_train(&mut self, carts: Vec<CartKey>, flags: TrainFlags) -> TrainKey {
        self.next_train_number += 1;
        let name = format!("train{}", self.next_train_number);
        self.new_named_train(name, carts, flags)
    }

    pub(crate) fn new_named_train(
        &mut self,
        name: String,
        carts: Vec<CartKey>,
        flags: TrainFlags,
    ) -> TrainKey {
        let key = self.trains.insert(Train::new(name, carts, flags));
        for cart in self.trains[key].carts.clone() {
            if let Some(c) = self.carts.get_mut(cart) {
                c.train = Some(key);
            }
        }
        key
    }

    pub(crate) fn destroy_train(&mut self, train: TrainKey, sink: &mut dyn EventSink) {
        if let Some(t) = self.trains.remove(train) {
            for location in t.active_triggers {
                sink.fire(FleetEvent::Trigger {
                    kind: TriggerKind::Leave,
                    location,
                    train,
                    cart: None,
                });
            }
            sink.fire(FleetEvent::TrainDestroyed { train });
            info!("train '{}' destroyed", t.name);
        }
    }

    /// Recompute cart headings: a singleton faces along its velocity, a cart
    /// in a train faces its head-side neighbour and the head faces away from
    /// its follower.
    pub(crate) fn refresh_headings(&mut self, train: TrainKey) {
        let Some(t) = self.trains.get(train) else {
            return;
        };
        let keys = t.carts.clone();
        if keys.len() == 1 {
            if let Some(c) = self.carts.get_mut(keys[0]) {
                let dir = math::horizontal(c.velocity).normalize_or_zero();
                if dir != DVec3::ZERO {
                    c.heading = dir;
                }
            }
            return;
        }

        let positions: Vec<DVec3> = keys
            .iter()
            .map(|k| self.carts.get(*k).map_or(DVec3::ZERO, |c| c.position))
            .collect();
        for (i, key) in keys.iter().enumerate() {
            let dir = if i == 0 {
                positions[0] - positions[1]
            } else {
                positions[i - 1] - positions[i]
            };
            let dir = math::horizontal(dir).normalize_or_zero();
            if dir == DVec3::ZERO {
                continue;
            }
            if let Some(c) = self.carts.get_mut(*key) {
                c.heading = dir;
            }
        }
    }
}
