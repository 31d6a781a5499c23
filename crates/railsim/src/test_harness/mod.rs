//! # TestRailway: headless harness for rail simulation tests
//!
//! Wraps a `bevy::app::App` running [`RailSimPlugin`] without a window or
//! renderer. Build the track and trains with the `with_*` methods, advance
//! with [`TestRailway::tick`], then inspect resources and the notifications
//! forwarded as `FleetEvent`s.

mod queries;
mod setup;

use bevy::app::App;
use bevy::prelude::*;

use crate::events::FleetEvent;
use crate::fleet::Fleet;
use crate::rail_params::RailParams;
use crate::systems::PendingFleetEvents;
use crate::track::TrackGrid;
use crate::RailSimPlugin;

pub struct TestRailway {
    app: App,
}

impl Default for TestRailway {
    fn default() -> Self {
        Self::new()
    }
}

impl TestRailway {
    /// An empty world: no track, no trains, default parameters.
    pub fn new() -> Self {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins);
        app.add_plugins(RailSimPlugin);
        Self { app }
    }

    /// Run `n` fixed ticks by executing the `FixedUpdate` schedule directly,
    /// independent of wall-clock time.
    pub fn tick(&mut self, n: u32) {
        for _ in 0..n {
            self.app.world_mut().run_schedule(FixedUpdate);
        }
    }

    /// Run a host-side fleet operation (link, park, remove...) between
    /// ticks. Its notifications are forwarded with the next tick's.
    pub fn with_fleet<R>(
        &mut self,
        f: impl FnOnce(&mut Fleet, &TrackGrid, &RailParams, &mut Vec<FleetEvent>) -> R,
    ) -> R {
        let mut sink = Vec::new();
        let result = self
            .app
            .world_mut()
            .resource_scope(|world, mut fleet: Mut<Fleet>| {
                let grid = world.resource::<TrackGrid>();
                let params = world.resource::<RailParams>();
                f(&mut *fleet, grid, params, &mut sink)
            });
        self.app
            .world_mut()
            .resource_mut::<PendingFleetEvents>()
            .0
            .extend(sink);
        result
    }

    /// Run one full app update (`Update` and friends). Hosted plugins react
    /// to their request events here; `FixedUpdate` may also run if enough
    /// virtual time has passed.
    pub fn update(&mut self) {
        self.app.update();
    }

    pub fn world_mut(&mut self) -> &mut World {
        self.app.world_mut()
    }

    pub fn world(&self) -> &World {
        self.app.world()
    }
}
