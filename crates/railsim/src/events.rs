use std::collections::HashMap;

use bevy::math::{DVec3, IVec3};
use bevy::prelude::{Event, Resource};

use crate::ids::{CartKey, CartUuid, TrainKey};
use crate::track::Face;

// =============================================================================
// Notifications
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerKind {
    Enter,
    Leave,
}

/// Fire-and-forget notifications produced by the fleet.
///
/// Trigger notifications come in two flavours: member events carry the cart
/// that entered or left a location, train events (`cart: None`) fire when
/// the first cart of a train enters a location or the last one leaves it.
#[derive(Event, Debug, Clone, PartialEq)]
pub enum FleetEvent {
    Trigger {
        kind: TriggerKind,
        location: IVec3,
        train: TrainKey,
        cart: Option<CartKey>,
    },
    Linked {
        train: TrainKey,
        join_point: DVec3,
    },
    Unlinked {
        cart: CartKey,
        from: TrainKey,
    },
    Split {
        from: TrainKey,
        new_train: TrainKey,
    },
    CartRemoved {
        cart: CartKey,
        uuid: CartUuid,
    },
    TrainDestroyed {
        train: TrainKey,
    },
    VelocityTargetReached {
        train: TrainKey,
        target: DVec3,
    },
    JunctionSwitched {
        train: TrainKey,
        node: String,
        rail: IVec3,
        exit: Face,
    },
    DestinationReached {
        train: TrainKey,
        destination: String,
    },
    TrainParked {
        name: String,
    },
    TrainRestored {
        train: TrainKey,
        name: String,
    },
}

impl FleetEvent {
    pub fn is_trigger(&self, kind: TriggerKind, location: IVec3) -> bool {
        matches!(self, FleetEvent::Trigger { kind: k, location: l, .. } if *k == kind && *l == location)
    }
}

/// Receiver of fleet notifications.
pub trait EventSink {
    fn fire(&mut self, event: FleetEvent);
}

impl EventSink for Vec<FleetEvent> {
    fn fire(&mut self, event: FleetEvent) {
        self.push(event);
    }
}

// =============================================================================
// Force override hook
// =============================================================================

/// Last chance to scale or replace a train's shared force before it is
/// applied to the carts.
pub trait ForceHook {
    fn override_force(&mut self, train: TrainKey, force: f64) -> f64;
}

/// Hook that leaves every force unchanged.
pub struct NoForceHook;

impl ForceHook for NoForceHook {
    fn override_force(&mut self, _train: TrainKey, force: f64) -> f64 {
        force
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ForceOverride {
    Scale(f64),
    Replace(f64),
}

impl ForceOverride {
    fn apply(self, force: f64) -> f64 {
        match self {
            ForceOverride::Scale(factor) => force * factor,
            ForceOverride::Replace(value) => value,
        }
    }
}

/// One-shot force overrides (braking stations, launchers). An override
/// applies to the next coupling tick of its train only.
#[derive(Resource, Debug, Default)]
pub struct ForceOverrides {
    entries: HashMap<TrainKey, (ForceOverride, bool)>,
}

impl ForceOverrides {
    pub fn set(&mut self, train: TrainKey, value: ForceOverride) {
        self.entries.insert(train, (value, false));
    }

    pub fn get(&self, train: TrainKey) -> Option<ForceOverride> {
        self.entries.get(&train).map(|(o, _)| *o)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every override that was consumed by a tick.
    pub fn expire_used(&mut self) {
        self.entries.retain(|_, (_, used)| !*used);
    }
}

impl ForceHook for ForceOverrides {
    fn override_force(&mut self, train: TrainKey, force: f64) -> f64 {
        match self.entries.get_mut(&train) {
            Some((value, used)) => {
                *used = true;
                value.apply(force)
            }
            None => force,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_is_one_shot() {
        let train = TrainKey::default();
        let mut overrides = ForceOverrides::default();
        overrides.set(train, ForceOverride::Scale(0.5));

        assert_eq!(overrides.override_force(train, 0.4), 0.2);
        overrides.expire_used();
        assert!(overrides.is_empty());
        assert_eq!(overrides.override_force(train, 0.4), 0.4);
    }

    #[test]
    fn test_unused_override_survives_expiry() {
        let train = TrainKey::default();
        let mut overrides = ForceOverrides::default();
        overrides.set(train, ForceOverride::Replace(0.0));
        overrides.expire_used();
        assert_eq!(overrides.get(train), Some(ForceOverride::Replace(0.0)));
    }

    #[test]
    fn test_vec_sink_collects() {
        let mut sink: Vec<FleetEvent> = Vec::new();
        sink.fire(FleetEvent::TrainParked { name: "a".into() });
        assert_eq!(sink.len(), 1);
    }
}
