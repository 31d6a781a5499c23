use bevy::log::info;

use crate::events::{EventSink, FleetEvent};
use crate::ids::{CartKey, TrainKey};
use crate::math::distance_xz;
use crate::rail_params::{CollisionParams, CouplingParams, RailParams};

use super::{Fleet, FleetError};

/// Collision grace given to the two halves of a split: slow trains need
/// longer to drift apart.
pub(crate) fn grace_ticks(force: f64, params: &CollisionParams) -> u32 {
    let min = params.split_ignore_min_ticks as f64;
    let max = params.split_ignore_max_ticks as f64;
    let ticks = (2.0 / force.abs()).clamp(min, max);
    if ticks.is_nan() {
        params.split_ignore_max_ticks
    } else {
        ticks as u32
    }
}

impl Fleet {
    /// First broken joint of a train, walking from the tail to the head.
    ///
    /// A joint between cart `i` and its head-side neighbour `i - 1` is broken
    /// when their planar distance exceeds the maximum coupling distance, or
    /// is not strictly smaller than the distance from `i` to `i - 2`. Joints
    /// touching a derailed cart are exempt. Returns `i`.
    pub(crate) fn find_break(&self, train: TrainKey, params: &CouplingParams) -> Option<usize> {
        let t = self.trains.get(train)?;
        let carts: Vec<_> = t.carts.iter().filter_map(|k| self.carts.get(*k)).collect();
        if carts.len() != t.carts.len() {
            return None;
        }

        for i in (1..carts.len()).rev() {
            let a = carts[i];
            let b = carts[i - 1];
            if a.is_derailed() || b.is_derailed() {
                continue;
            }
            let near = distance_xz(a.position, b.position);
            if near > params.max_cart_distance {
                return Some(i);
            }
            if i >= 2 && near >= distance_xz(a.position, carts[i - 2].position) {
                return Some(i);
            }
        }
        None
    }

    /// Move `carts[..at]` into a new train inheriting the flags. The rest
    /// keeps the original handle.
    pub(crate) fn split_at(
        &mut self,
        train: TrainKey,
        at: usize,
        grace: u32,
        sink: &mut dyn EventSink,
    ) -> Option<TrainKey> {
        let t = self.trains.get_mut(train)?;
        if at == 0 || at >= t.carts.len() {
            return None;
        }
        let moved: Vec<CartKey> = t.carts.drain(..at).collect();
        let flags = t.flags.clone();
        let force = t.last_force;
        let old_name = t.name.clone();
        let remaining = t.carts.clone();

        let new_train = self.new_train(moved.clone(), flags);
        if let Some(nt) = self.trains.get_mut(new_train) {
            nt.last_force = force;
        }
        if grace > 0 {
            for &a in &moved {
                for &b in &remaining {
                    if let Some(c) = self.carts.get_mut(a) {
                        c.ignore_collision(b, grace);
                    }
                    if let Some(c) = self.carts.get_mut(b) {
                        c.ignore_collision(a, grace);
                    }
                }
            }
        }

        self.sync_train_triggers(train, sink);
        self.sync_train_triggers(new_train, sink);
        self.splits += 1;
        sink.fire(FleetEvent::Split {
            from: train,
            new_train,
        });
        info!("train '{}' split at cart {}", old_name, at);
        Some(new_train)
    }

    /// Detach one cart into its own singleton train. Unlinking an interior
    /// cart leaves two trains behind.
    pub fn unlink(
        &mut self,
        cart: CartKey,
        params: &RailParams,
        sink: &mut dyn EventSink,
    ) -> Result<TrainKey, FleetError> {
        let train = self.train_of(cart).ok_or(FleetError::UnknownCart(cart))?;
        let t = self.trains.get(train).ok_or(FleetError::UnknownTrain(train))?;
        if t.len() == 1 {
            return Ok(train);
        }
        let idx = t.index_of(cart).ok_or(FleetError::UnknownCart(cart))?;
        let grace = grace_ticks(t.last_force, &params.collision);

        if idx > 0 {
            self.split_at(train, idx, grace, sink);
        }
        // The cart now heads `train`.
        let single = if self.trains.get(train).is_some_and(|t| t.len() > 1) {
            self.split_at(train, 1, grace, sink).unwrap_or(train)
        } else {
            train
        };
        sink.fire(FleetEvent::Unlinked { cart, from: train });
        Ok(single)
    }

    /// Break a train into singletons. The head stays in the original train.
    pub fn disband(&mut self, train: TrainKey, sink: &mut dyn EventSink) -> Result<Vec<TrainKey>, FleetError> {
        let t = self.trains.get_mut(train).ok_or(FleetError::UnknownTrain(train))?;
        if t.carts.len() <= 1 {
            return Ok(vec![train]);
        }
        let flags = t.flags.clone();
        let rest = t.carts.split_off(1);

        let mut out = vec![train];
        for cart in rest {
            let single = self.new_train(vec![cart], flags.clone());
            out.push(single);
            sink.fire(FleetEvent::Unlinked { cart, from: train });
        }
        for key in &out {
            self.sync_train_triggers(*key, sink);
        }
        Ok(out)
    }
}
