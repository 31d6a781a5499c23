//! Builder methods for track and train setup.

use bevy::app::Plugins;
use bevy::math::{DVec3, IVec3};
use bevy::prelude::Mut;

use crate::fleet::Fleet;
use crate::ids::CartUuid;
use crate::rail_params::RailParams;
use crate::sim_rng::SimRng;
use crate::track::{Face, RailShape, TrackGrid, TrackMarker};

use super::TestRailway;

impl TestRailway {
    // -----------------------------------------------------------------------
    // Track
    // -----------------------------------------------------------------------

    /// Straight flat rails on a solid bed.
    pub fn with_straight_track(mut self, start: IVec3, dir: Face, len: u32) -> Self {
        self.grid_mut().lay_straight(start, dir, len);
        self
    }

    /// A rectangular loop with curved corners at `corner` and
    /// `corner + (w, 0, h)`.
    pub fn with_loop(mut self, corner: IVec3, w: i32, h: i32) -> Self {
        {
            let mut grid = self.grid_mut();
            grid.lay_straight(corner + IVec3::X, Face::East, (w - 1) as u32);
            grid.lay_straight(corner + IVec3::new(1, 0, h), Face::East, (w - 1) as u32);
            grid.lay_straight(corner + IVec3::Z, Face::South, (h - 1) as u32);
            grid.lay_straight(corner + IVec3::new(w, 0, 1), Face::South, (h - 1) as u32);
            for (offset, shape) in [
                (IVec3::ZERO, RailShape::SouthEast),
                (IVec3::new(w, 0, 0), RailShape::SouthWest),
                (IVec3::new(w, 0, h), RailShape::NorthWest),
                (IVec3::new(0, 0, h), RailShape::NorthEast),
            ] {
                grid.set_rail(corner + offset, shape);
                grid.set_solid(corner + offset - IVec3::Y);
            }
        }
        self
    }

    pub fn with_rail(mut self, pos: IVec3, shape: RailShape) -> Self {
        self.grid_mut().set_rail(pos, shape);
        self
    }

    pub fn with_marker(mut self, pos: IVec3, marker: TrackMarker) -> Self {
        self.grid_mut().set_marker(pos, marker);
        self
    }

    pub fn with_params(mut self, params: RailParams) -> Self {
        self.world_mut().insert_resource(params);
        self
    }

    /// Host extra plugins next to the simulation.
    pub fn with_plugins<M>(mut self, plugins: impl Plugins<M>) -> Self {
        self.app.add_plugins(plugins);
        self
    }

    // -----------------------------------------------------------------------
    // Trains
    // -----------------------------------------------------------------------

    /// Spawn a coupled train, head first, under `name`, moving at `speed`
    /// along the head's heading.
    pub fn with_train(mut self, name: &str, positions: &[DVec3], speed: f64) -> Self {
        let world = self.world_mut();
        let uuids: Vec<CartUuid> = {
            let mut rng = world.resource_mut::<SimRng>();
            positions.iter().map(|_| rng.next_uuid()).collect()
        };
        let carts: Vec<(CartUuid, DVec3)> = uuids.into_iter().zip(positions.iter().copied()).collect();

        world.resource_scope(|world, mut fleet: Mut<Fleet>| {
            let grid = world.resource::<TrackGrid>();
            let params = world.resource::<RailParams>();
            let train = fleet
                .spawn_train(&carts, grid, params)
                .expect("train positions must be on rail");
            if let Some(t) = fleet.train_mut(train) {
                t.name = name.to_string();
            }
            if speed != 0.0 {
                fleet.launch(train, speed).expect("train just spawned");
            }
        });
        self
    }

    /// Route a named train towards a destination label.
    pub fn with_destination(mut self, train: &str, destination: &str) -> Self {
        {
            let mut fleet = self.fleet_mut();
            let key = fleet.find_train(train).expect("train exists");
            fleet
                .set_destination(key, Some(destination.to_string()))
                .expect("train exists");
        }
        self
    }

    // -----------------------------------------------------------------------
    // Direct access
    // -----------------------------------------------------------------------

    pub fn grid_mut(&mut self) -> Mut<'_, TrackGrid> {
        self.world_mut().resource_mut::<TrackGrid>()
    }

    pub fn fleet_mut(&mut self) -> Mut<'_, Fleet> {
        self.world_mut().resource_mut::<Fleet>()
    }
}
