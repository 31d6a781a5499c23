//! Parked trains: trains taken out of the live simulation (their region
//! stopped simulating) and buffered by cart identity until restored.

use bevy::log::{info, warn};
use bevy::math::DVec3;
use bevy::prelude::Resource;
use bitcode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::cart::Cart;
use crate::events::{EventSink, FleetEvent, TriggerKind};
use crate::ids::{CartUuid, TrainKey};
use crate::math;
use crate::train::TrainFlags;

use super::{Fleet, FleetError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct ParkedCart {
    pub uuid: CartUuid,
    pub position: [f64; 3],
    pub velocity: [f64; 3],
    pub yaw: f64,
    pub pitch: f64,
}

impl ParkedCart {
    fn from_cart(cart: &Cart) -> Self {
        Self {
            uuid: cart.uuid,
            position: cart.position.to_array(),
            velocity: cart.velocity.to_array(),
            yaw: cart.yaw,
            pitch: cart.pitch,
        }
    }

    pub fn position(&self) -> DVec3 {
        DVec3::from_array(self.position)
    }

    pub(crate) fn to_cart(&self) -> Cart {
        let mut cart = Cart::new(self.uuid, self.position());
        cart.velocity = math::sanitize(DVec3::from_array(self.velocity));
        cart.yaw = self.yaw;
        cart.pitch = self.pitch;
        cart.heading = math::yaw_heading(self.yaw);
        cart
    }
}

/// A train buffered by cart identity, head first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct ParkedTrain {
    pub name: String,
    pub flags: TrainFlags,
    pub carts: Vec<ParkedCart>,
}

impl ParkedTrain {
    /// Whether any cart lies inside the box spanned by `min` and `max`.
    pub fn intersects(&self, min: DVec3, max: DVec3) -> bool {
        self.carts.iter().any(|c| {
            let p = c.position();
            p.cmpge(min).all() && p.cmple(max).all()
        })
    }
}

#[derive(Resource, Debug, Clone, Default, PartialEq, Encode, Decode)]
pub struct ParkedTrains {
    trains: Vec<ParkedTrain>,
}

impl ParkedTrains {
    pub fn len(&self) -> usize {
        self.trains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trains.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ParkedTrain> {
        self.trains.iter().find(|t| t.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.trains.iter().map(|t| t.name.as_str())
    }

    /// Whether a cart identity is waiting in a parked train.
    pub fn is_cart_parked(&self, uuid: CartUuid) -> bool {
        self.trains
            .iter()
            .any(|t| t.carts.iter().any(|c| c.uuid == uuid))
    }

    fn take(&mut self, name: &str) -> Option<ParkedTrain> {
        let idx = self.trains.iter().position(|t| t.name == name)?;
        Some(self.trains.remove(idx))
    }
}

impl crate::Saveable for ParkedTrains {
    const SAVE_KEY: &'static str = "parked_trains";

    fn save_to_bytes(&self) -> Option<Vec<u8>> {
        if self.trains.is_empty() {
            return None;
        }
        Some(bitcode::encode(self))
    }

    fn load_from_bytes(bytes: &[u8]) -> Self {
        crate::decode_or_warn(Self::SAVE_KEY, bytes)
    }
}

impl Fleet {
    /// Identity record of a live train.
    pub fn park_record(&self, train: TrainKey) -> Option<ParkedTrain> {
        let t = self.trains.get(train)?;
        Some(ParkedTrain {
            name: t.name.clone(),
            flags: t.flags.clone(),
            carts: t
                .carts
                .iter()
                .filter_map(|k| self.carts.get(*k))
                .map(ParkedCart::from_cart)
                .collect(),
        })
    }

    /// Take a train out of the simulation and remember it by cart identity.
    ///
    /// Its trigger locations are left as if the carts drove off.
    pub fn park_train(
        &mut self,
        train: TrainKey,
        parked: &mut ParkedTrains,
        sink: &mut dyn EventSink,
    ) -> Result<(), FleetError> {
        let record = self.park_record(train).ok_or(FleetError::UnknownTrain(train))?;
        let Some(t) = self.trains.get(train) else {
            return Err(FleetError::UnknownTrain(train));
        };
        for key in t.carts.clone() {
            self.leave_all_triggers(key, sink);
            self.carts.remove(key);
        }
        if let Some(t) = self.trains.remove(train) {
            for location in t.active_triggers {
                sink.fire(FleetEvent::Trigger {
                    kind: TriggerKind::Leave,
                    location,
                    train,
                    cart: None,
                });
            }
        }

        info!("parked train '{}' ({} carts)", record.name, record.carts.len());
        sink.fire(FleetEvent::TrainParked {
            name: record.name.clone(),
        });
        parked.trains.retain(|p| p.name != record.name);
        parked.trains.push(record);
        Ok(())
    }

    /// Bring a parked train back under its old name.
    pub fn unpark(
        &mut self,
        name: &str,
        parked: &mut ParkedTrains,
        sink: &mut dyn EventSink,
    ) -> Result<TrainKey, FleetError> {
        let record = parked
            .get(name)
            .ok_or_else(|| FleetError::NotParked(name.to_string()))?;
        if let Some(dup) = record.carts.iter().find(|c| self.find_cart(c.uuid).is_some()) {
            return Err(FleetError::DuplicateCart(dup.uuid));
        }
        if record.carts.is_empty() {
            parked.take(name);
            return Err(FleetError::EmptyTrain);
        }
        let Some(record) = parked.take(name) else {
            return Err(FleetError::NotParked(name.to_string()));
        };

        let keys = record
            .carts
            .iter()
            .map(|pc| {
                let mut cart = pc.to_cart();
                cart.recently_parked = true;
                self.carts.insert(cart)
            })
            .collect();
        let train = if self.find_train(&record.name).is_some() {
            self.new_train(keys, record.flags)
        } else {
            self.new_named_train(record.name.clone(), keys, record.flags)
        };

        info!("restored parked train '{}'", record.name);
        sink.fire(FleetEvent::TrainRestored {
            train,
            name: record.name,
        });
        Ok(train)
    }

    /// Restore every parked train with a cart inside the box. Trains that
    /// cannot be restored stay parked.
    pub fn unpark_in_region(
        &mut self,
        min: DVec3,
        max: DVec3,
        parked: &mut ParkedTrains,
        sink: &mut dyn EventSink,
    ) -> Vec<TrainKey> {
        let names: Vec<String> = parked
            .trains
            .iter()
            .filter(|t| t.intersects(min, max))
            .map(|t| t.name.clone())
            .collect();

        let mut restored = Vec::with_capacity(names.len());
        for name in names {
            match self.unpark(&name, parked, sink) {
                Ok(train) => restored.push(train),
                Err(e) => warn!("could not restore parked train '{}': {}", name, e),
            }
        }
        restored
    }
}
