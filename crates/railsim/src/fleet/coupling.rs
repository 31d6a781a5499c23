//! The per-tick coupling pipeline.

use bevy::log::debug;

use crate::cart::Cart;
use crate::config::SUBSTEP_SPEED;
use crate::events::{EventSink, FleetEvent, ForceHook};
use crate::ids::{CartKey, TrainKey};
use crate::math::{self, angle_difference};
use crate::motion::{self, CollisionBody, CollisionSnapshot, TrainMotion};
use crate::rail_params::{CouplingParams, RailParams};
use crate::track::RailSampler;
use crate::train::CollisionMode;
use crate::velocity_target::TargetStep;

use super::split::grace_ticks;
use super::Fleet;

impl Fleet {
    /// Advance every train by one tick.
    pub fn tick<S: RailSampler + ?Sized>(
        &mut self,
        sampler: &S,
        params: &RailParams,
        hook: &mut dyn ForceHook,
        sink: &mut dyn EventSink,
    ) {
        self.tick_scaled(sampler, params, hook, sink, 1.0);
    }

    /// Advance every train by one tick with the displacement scaled by
    /// `speed_factor` (realtime catch-up).
    pub fn tick_scaled<S: RailSampler + ?Sized>(
        &mut self,
        sampler: &S,
        params: &RailParams,
        hook: &mut dyn ForceHook,
        sink: &mut dyn EventSink,
        speed_factor: f64,
    ) {
        let keys: Vec<TrainKey> = self.trains.keys().collect();
        for train in keys {
            // Earlier trains may have merged into or destroyed this one.
            if self.trains.contains_key(train) {
                self.tick_train(train, sampler, params, hook, sink, speed_factor);
            }
        }
    }

    fn tick_train<S: RailSampler + ?Sized>(
        &mut self,
        train: TrainKey,
        sampler: &S,
        params: &RailParams,
        hook: &mut dyn ForceHook,
        sink: &mut dyn EventSink,
        speed_factor: f64,
    ) {
        if !self.validate(train, params, sink) {
            return;
        }
        self.pre_integrate_train(train, sampler, params, sink);
        for part in self.split_check(train, params, sink) {
            self.drive(part, sampler, params, hook, sink, speed_factor);
        }
    }

    /// Drop dead and long-derailed carts. Returns false if the train is gone.
    fn validate(&mut self, train: TrainKey, params: &RailParams, sink: &mut dyn EventSink) -> bool {
        let Some(t) = self.trains.get(train) else {
            return false;
        };
        let max_derailed = params.motion.max_derailed_ticks;
        let doomed: Vec<CartKey> = t
            .carts
            .iter()
            .copied()
            .filter(|k| {
                self.carts
                    .get(*k)
                    .is_none_or(|c| c.dead || c.derailed_ticks > max_derailed)
            })
            .collect();

        for key in doomed {
            debug!("removing cart {:?} from train {:?}", key, train);
            if self.detach_cart(key, sink).is_err() {
                if let Some(t) = self.trains.get_mut(train) {
                    t.carts.retain(|&k| k != key);
                }
            }
        }

        if let Some(t) = self.trains.get(train) {
            for key in t.carts.clone() {
                if let Some(c) = self.carts.get_mut(key) {
                    c.train = Some(train);
                }
            }
        }
        self.sync_train_triggers(train, sink);
        if self.trains.get(train).is_none_or(|t| t.is_empty()) {
            self.destroy_train(train, sink);
            return false;
        }
        true
    }

    fn pre_integrate_train<S: RailSampler + ?Sized>(
        &mut self,
        train: TrainKey,
        sampler: &S,
        params: &RailParams,
        sink: &mut dyn EventSink,
    ) {
        let Some(t) = self.trains.get(train) else {
            return;
        };
        let motion = TrainMotion::from_flags(&t.flags, t.targets.is_active());
        for key in t.carts.clone() {
            if let Some(c) = self.carts.get_mut(key) {
                c.tick_collision_grace();
                motion::pre_integrate(c, sampler, &params.motion, motion);
            }
            self.refresh_cart_triggers(key, sampler, sink);
        }
        self.sync_train_triggers(train, sink);
    }

    /// Split at broken joints until none remain. Returns every resulting
    /// train, the original handle included.
    fn split_check(&mut self, train: TrainKey, params: &RailParams, sink: &mut dyn EventSink) -> Vec<TrainKey> {
        let mut work = vec![train];
        let mut done = Vec::new();
        while let Some(current) = work.pop() {
            let Some(at) = self.find_break(current, &params.coupling) else {
                done.push(current);
                continue;
            };
            let force = self.trains.get(current).map_or(0.0, |t| t.last_force);
            match self.split_at(current, at, grace_ticks(force, &params.collision), sink) {
                Some(new_train) => {
                    work.push(current);
                    work.push(new_train);
                }
                None => done.push(current),
            }
        }
        done
    }

    /// Share the force, correct spacing and move every cart of the train.
    fn drive<S: RailSampler + ?Sized>(
        &mut self,
        train: TrainKey,
        sampler: &S,
        params: &RailParams,
        hook: &mut dyn ForceHook,
        sink: &mut dyn EventSink,
        speed_factor: f64,
    ) {
        self.refresh_headings(train);
        let Some(t) = self.trains.get(train) else {
            return;
        };
        let flags = t.flags.clone();
        let motion = TrainMotion::from_flags(&flags, t.targets.is_active());
        let mut keys = t.carts.clone();
        let n = keys.len();

        let mut shared = keys
            .first()
            .and_then(|k| self.carts.get(*k))
            .map_or(0.0, Cart::forward_force);
        let mut factors = vec![1.0; n];

        if !flags.force_suspended {
            let (magnitude, total_force) = keys
                .iter()
                .filter_map(|k| self.carts.get(*k))
                .map(Cart::forward_force)
                .fold((0.0, 0.0), |(m, f), force| (m + force.abs(), f + force));
            shared = magnitude / n as f64;

            // Keep the head pointing in the net direction of travel. The
            // shared force is unsigned, so it follows the new headings.
            if total_force < 0.0 && n > 1 {
                if let Some(t) = self.trains.get_mut(train) {
                    t.reverse();
                    keys.reverse();
                }
                self.refresh_headings(train);
            }

            if !flags.spacing_ignore && n > 1 {
                factors = self.spacing_factors(&keys, &params.coupling);
            }

            shared = hook.override_force(train, shared);

            let head_pos = keys.first().and_then(|k| self.carts.get(*k)).map(|c| c.position);
            let mut head_velocity = None;
            if let (Some(pos), Some(t)) = (head_pos, self.trains.get_mut(train)) {
                match t.targets.update(pos) {
                    Some(TargetStep::Steer { velocity, speed }) => {
                        shared = speed;
                        head_velocity = Some(velocity);
                    }
                    Some(TargetStep::Reached {
                        target,
                        velocity,
                        speed,
                    }) => {
                        shared = speed;
                        head_velocity = Some(velocity);
                        sink.fire(FleetEvent::VelocityTargetReached { train, target });
                    }
                    Some(TargetStep::Waiting) | None => {}
                }
            }

            for key in &keys {
                if let Some(c) = self.carts.get_mut(*key) {
                    c.set_forward_force(shared);
                }
            }
            if let Some(v) = head_velocity {
                if let Some(c) = keys.first().and_then(|k| self.carts.get_mut(*k)) {
                    // A target on the head's own position has no approach line.
                    let v = if math::horizontal(v).length_squared() > 1e-12 {
                        v
                    } else {
                        c.heading * shared
                    };
                    c.velocity.x = v.x;
                    c.velocity.z = v.z;
                }
            }
        }

        let limit = params.clamp_speed_limit(flags.speed_limit);
        let substeps = if shared.abs() > SUBSTEP_SPEED && limit > SUBSTEP_SPEED {
            (limit / SUBSTEP_SPEED).ceil() as u32
        } else {
            1
        };
        let max_speed = limit / substeps as f64;
        let scale = 1.0 / substeps as f64;

        for key in &keys {
            if let Some(c) = self.carts.get_mut(*key) {
                c.max_speed = max_speed;
                c.scale_velocity(scale);
            }
        }
        for _ in 0..substeps {
            let snapshot = self.collision_snapshot(params);
            for (key, factor) in keys.iter().zip(&factors) {
                if let Some(c) = self.carts.get_mut(*key) {
                    if c.dead {
                        continue;
                    }
                    motion::post_integrate(
                        c,
                        sampler,
                        &params.motion,
                        motion,
                        factor * speed_factor,
                        Some((*key, &snapshot)),
                    );
                }
            }
            // Markers are re-read after every substep so fast trains see each one.
            for key in &keys {
                self.refresh_cart_triggers(*key, sampler, sink);
            }
            self.sync_train_triggers(train, sink);
        }
        for key in &keys {
            if let Some(c) = self.carts.get_mut(*key) {
                c.scale_velocity(substeps as f64);
                c.recently_parked = false;
            }
        }

        if let Some(t) = self.trains.get_mut(train) {
            t.last_force = shared;
        }
    }

    /// Per-cart speed factors that pull coupled carts towards their nominal
    /// gap. Cart `i` is measured against its follower `i + 1`; the tail keeps
    /// a neutral factor.
    pub(super) fn spacing_factors(&self, keys: &[CartKey], params: &CouplingParams) -> Vec<f64> {
        let mut factors = vec![1.0; keys.len()];
        for i in 0..keys.len().saturating_sub(1) {
            let (Some(a), Some(b)) = (self.carts.get(keys[i]), self.carts.get(keys[i + 1])) else {
                continue;
            };
            let turned = angle_difference(a.yaw, b.yaw) >= params.turned_yaw_threshold
                || (a.pitch - b.pitch).abs() > params.turned_pitch_threshold;
            let (threshold, mut forcer) = if turned {
                (params.turned_cart_distance, params.turned_cart_distance_forcer)
            } else {
                (params.cart_distance, params.cart_distance_forcer)
            };

            let distance = math::distance_xz(a.position, b.position);
            if distance < threshold {
                forcer *= params.near_cart_distance_factor;
            }
            factors[i] = (1.0 + forcer * (threshold - distance)).max(0.0);
        }
        factors
    }

    fn collision_snapshot(&self, params: &RailParams) -> CollisionSnapshot {
        let mut snapshot = CollisionSnapshot::new(params.collision.contact_distance);
        for (key, c) in self.carts.iter().filter(|(_, c)| !c.dead) {
            let collides = c.train.and_then(|t| self.trains.get(t)).is_none_or(|t| {
                t.flags.collision == CollisionMode::Collide && !t.targets.is_active()
            });
            snapshot.push(CollisionBody {
                key,
                train: c.train,
                position: c.position,
                collides,
            });
        }
        snapshot
    }
}
