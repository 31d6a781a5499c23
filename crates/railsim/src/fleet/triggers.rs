//! Trigger location bookkeeping.
//!
//! A trigger location is a rail cell carrying a marker. Each cart tracks the
//! locations beneath it; each train tracks the union over its carts.

use bevy::math::IVec3;

use crate::events::{EventSink, FleetEvent, TriggerKind};
use crate::ids::{CartKey, TrainKey};
use crate::track::RailSampler;

use super::Fleet;

impl Fleet {
    /// Re-read the marker beneath a cart and fire member enter/leave events.
    pub(crate) fn refresh_cart_triggers<S: RailSampler + ?Sized>(
        &mut self,
        cart: CartKey,
        sampler: &S,
        sink: &mut dyn EventSink,
    ) {
        let Some(c) = self.carts.get_mut(cart) else {
            return;
        };
        let Some(train) = c.train else {
            return;
        };
        let current: Vec<IVec3> = c
            .rail
            .map(|r| r.pos)
            .filter(|pos| sampler.marker_at(*pos).is_some())
            .into_iter()
            .collect();

        for &location in c.triggers.iter().filter(|l| !current.contains(l)) {
            sink.fire(FleetEvent::Trigger {
                kind: TriggerKind::Leave,
                location,
                train,
                cart: Some(cart),
            });
        }
        for &location in current.iter().filter(|l| !c.triggers.contains(l)) {
            sink.fire(FleetEvent::Trigger {
                kind: TriggerKind::Enter,
                location,
                train,
                cart: Some(cart),
            });
        }
        c.triggers = current;
    }

    /// The cart leaves every location beneath it (removal, parking).
    pub(crate) fn leave_all_triggers(&mut self, cart: CartKey, sink: &mut dyn EventSink) {
        let Some(c) = self.carts.get_mut(cart) else {
            return;
        };
        let Some(train) = c.train else {
            c.triggers.clear();
            return;
        };
        for location in c.triggers.drain(..) {
            sink.fire(FleetEvent::Trigger {
                kind: TriggerKind::Leave,
                location,
                train,
                cart: Some(cart),
            });
        }
    }

    /// Bring a train's active locations in line with its carts. Locations no
    /// cart covers any more fire a train-level leave, newly covered ones a
    /// train-level enter.
    pub(crate) fn sync_train_triggers(&mut self, train: TrainKey, sink: &mut dyn EventSink) {
        let Some(t) = self.trains.get(train) else {
            return;
        };
        let mut covered: Vec<IVec3> = Vec::new();
        for key in &t.carts {
            if let Some(c) = self.carts.get(*key) {
                for location in &c.triggers {
                    if !covered.contains(location) {
                        covered.push(*location);
                    }
                }
            }
        }

        let Some(t) = self.trains.get_mut(train) else {
            return;
        };
        t.active_triggers.retain(|&location| {
            let keep = covered.contains(&location);
            if !keep {
                sink.fire(FleetEvent::Trigger {
                    kind: TriggerKind::Leave,
                    location,
                    train,
                    cart: None,
                });
            }
            keep
        });
        for location in covered {
            if !t.active_triggers.contains(&location) {
                sink.fire(FleetEvent::Trigger {
                    kind: TriggerKind::Enter,
                    location,
                    train,
                    cart: None,
                });
                t.active_triggers.push(location);
            }
        }
    }
}
