//! Query methods for `TestRailway`.

use bevy::ecs::event::Events;
use bevy::math::DVec3;
use bevy::prelude::*;

use crate::events::FleetEvent;
use crate::fleet::Fleet;
use crate::ids::TrainKey;
use crate::TickCounter;

use super::TestRailway;

impl TestRailway {
    pub fn resource<T: Resource>(&self) -> &T {
        self.world().resource::<T>()
    }

    pub fn fleet(&self) -> &Fleet {
        self.resource::<Fleet>()
    }

    pub fn ticks_run(&self) -> u64 {
        self.resource::<TickCounter>().0
    }

    pub fn train(&self, name: &str) -> Option<TrainKey> {
        self.fleet().find_train(name)
    }

    /// Cart positions of a named train, head first. Empty if it is gone.
    pub fn positions(&self, name: &str) -> Vec<DVec3> {
        self.train(name)
            .map(|t| self.fleet().positions(t))
            .unwrap_or_default()
    }

    /// Every notification forwarded since the harness was created, or since
    /// the last [`TestRailway::update`].
    pub fn fleet_events(&self) -> Vec<FleetEvent> {
        // Only `App::update` swaps the event buffers; `tick` never does.
        self.resource::<Events<FleetEvent>>()
            .iter_current_update_events()
            .cloned()
            .collect()
    }

    pub fn count_events(&self, pred: impl Fn(&FleetEvent) -> bool) -> usize {
        self.fleet_events().iter().filter(|e| pred(e)).count()
    }
}
