//! Rail vehicle simulation: carts constrained to voxel track, coupled into
//! trains that share one driving force, routed through junctions towards
//! named destinations.
//!
//! The cores ([`fleet::Fleet`], [`routing::RoutingGraph`], [`motion`]) are
//! plain data and functions over a [`track::RailSampler`]. [`RailSimPlugin`]
//! hosts them in a Bevy app on the `FixedUpdate` schedule.

use std::collections::BTreeMap;

use bevy::prelude::*;

pub mod cart;
pub mod config;
pub mod events;
pub mod fleet;
pub mod ids;
pub mod math;
pub mod motion;
pub mod persistence;
pub mod rail_params;
pub mod routing;
pub mod sim_rng;
pub mod sim_sets;
pub mod systems;
pub mod track;
pub mod train;
pub mod velocity_target;

#[cfg(test)]
mod integration_tests;
#[cfg(any(test, feature = "bench"))]
pub mod test_harness;

use events::{FleetEvent, ForceOverrides};
use fleet::{Fleet, ParkedTrains};
use routing::RoutingGraph;
use sim_rng::SimRng;
use sim_sets::RailSimSet;
use track::TrackGrid;

// ---------------------------------------------------------------------------
// Saveable trait + registry
// ---------------------------------------------------------------------------

/// A resource persisted under a stable key in the save file's extension map.
pub trait Saveable: Resource + Default + Send + Sync + 'static {
    /// Unique key in the extension map. Must stay stable across versions.
    const SAVE_KEY: &'static str;

    /// Serialize the resource. `None` skips it (nothing worth saving).
    fn save_to_bytes(&self) -> Option<Vec<u8>>;

    fn load_from_bytes(bytes: &[u8]) -> Self;
}

/// Decode bytes via `bitcode::decode`, logging a warning and returning
/// `Default` on failure.
pub fn decode_or_warn<T: bitcode::DecodeOwned + Default>(key: &str, bytes: &[u8]) -> T {
    match bitcode::decode(bytes) {
        Ok(v) => v,
        Err(e) => {
            warn!(
                "Saveable {}: failed to decode {} bytes, falling back to default: {}",
                key,
                bytes.len(),
                e
            );
            T::default()
        }
    }
}

pub type SaveFn = Box<dyn Fn(&World) -> Option<Vec<u8>> + Send + Sync>;
pub type LoadFn = Box<dyn Fn(&mut World, &[u8]) + Send + Sync>;
pub type ResetFn = Box<dyn Fn(&mut World) + Send + Sync>;

/// Type-erased save/load/reset operations for one registered resource.
pub struct SaveableEntry {
    pub key: String,
    pub save_fn: SaveFn,
    pub load_fn: LoadFn,
    pub reset_fn: ResetFn,
}

/// Every saveable resource, populated during plugin setup. The save crate
/// walks this registry without knowing the concrete types.
#[derive(Resource, Default)]
pub struct SaveableRegistry {
    pub entries: Vec<SaveableEntry>,
}

impl SaveableRegistry {
    /// Register a resource type. A second registration of the same key is
    /// ignored with a warning.
    pub fn register<T: Saveable>(&mut self) {
        let key = T::SAVE_KEY.to_string();
        if self.entries.iter().any(|e| e.key == key) {
            warn!("SaveableRegistry: duplicate key '{}', ignoring second registration", key);
            return;
        }
        self.entries.push(SaveableEntry {
            key,
            save_fn: Box::new(|world: &World| {
                world.get_resource::<T>().and_then(|r| r.save_to_bytes())
            }),
            load_fn: Box::new(|world: &mut World, bytes: &[u8]| {
                world.insert_resource(T::load_from_bytes(bytes));
            }),
            reset_fn: Box::new(|world: &mut World| {
                world.insert_resource(T::default());
            }),
        });
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.key.as_str())
    }

    pub fn save_all(&self, world: &World) -> BTreeMap<String, Vec<u8>> {
        let mut extensions = BTreeMap::new();
        for entry in &self.entries {
            if let Some(bytes) = (entry.save_fn)(world) {
                extensions.insert(entry.key.clone(), bytes);
            }
        }
        extensions
    }

    /// Load registered resources from an extension map. Entries whose key is
    /// absent keep their current value.
    pub fn load_all(&self, world: &mut World, extensions: &BTreeMap<String, Vec<u8>>) {
        for entry in &self.entries {
            if let Some(bytes) = extensions.get(&entry.key) {
                (entry.load_fn)(world, bytes);
            }
        }
    }

    pub fn reset_all(&self, world: &mut World) {
        for entry in &self.entries {
            (entry.reset_fn)(world);
        }
    }
}

// ---------------------------------------------------------------------------
// Core resources
// ---------------------------------------------------------------------------

/// Fixed ticks simulated since startup.
#[derive(Resource, Default)]
pub struct TickCounter(pub u64);

pub struct RailSimPlugin;

impl Plugin for RailSimPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(rail_params::RailParamsPlugin);

        app.init_resource::<TickCounter>()
            .init_resource::<TrackGrid>()
            .init_resource::<Fleet>()
            .init_resource::<ParkedTrains>()
            .init_resource::<RoutingGraph>()
            .init_resource::<ForceOverrides>()
            .init_resource::<SimRng>()
            .init_resource::<systems::PendingFleetEvents>()
            .init_resource::<systems::FleetStats>()
            .add_event::<FleetEvent>();

        app.configure_sets(
            FixedUpdate,
            (
                RailSimSet::Prepare,
                RailSimSet::Coupling,
                RailSimSet::Routing,
                RailSimSet::Report,
            )
                .chain(),
        );

        app.add_systems(
            FixedUpdate,
            (
                systems::advance_tick,
                systems::expire_force_overrides,
                systems::invalidate_routes,
            )
                .in_set(RailSimSet::Prepare),
        )
        .add_systems(FixedUpdate, systems::tick_fleet.in_set(RailSimSet::Coupling))
        .add_systems(
            FixedUpdate,
            systems::route_at_junctions.in_set(RailSimSet::Routing),
        )
        .add_systems(
            FixedUpdate,
            (systems::forward_fleet_events, systems::update_fleet_stats)
                .in_set(RailSimSet::Report),
        );

        let mut registry = app
            .world_mut()
            .get_resource_or_insert_with(SaveableRegistry::default);
        registry.register::<Fleet>();
        registry.register::<ParkedTrains>();
        registry.register::<RoutingGraph>();
        registry.register::<SimRng>();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Resource, Default, Debug, PartialEq, bitcode::Encode, bitcode::Decode)]
    struct Odometer {
        metres: u64,
    }

    impl Saveable for Odometer {
        const SAVE_KEY: &'static str = "odometer";

        fn save_to_bytes(&self) -> Option<Vec<u8>> {
            if self.metres == 0 {
                return None;
            }
            Some(bitcode::encode(self))
        }

        fn load_from_bytes(bytes: &[u8]) -> Self {
            decode_or_warn(Self::SAVE_KEY, bytes)
        }
    }

    #[test]
    fn test_registry_roundtrip() {
        let mut registry = SaveableRegistry::default();
        registry.register::<Odometer>();

        let mut world = World::new();
        world.insert_resource(Odometer { metres: 42 });
        let saved = registry.save_all(&world);
        assert!(saved.contains_key("odometer"));

        let mut other = World::new();
        registry.load_all(&mut other, &saved);
        assert_eq!(other.resource::<Odometer>(), &Odometer { metres: 42 });
    }

    #[test]
    fn test_default_state_is_skipped() {
        let mut registry = SaveableRegistry::default();
        registry.register::<Odometer>();
        let mut world = World::new();
        world.insert_resource(Odometer::default());
        assert!(registry.save_all(&world).is_empty());
    }

    #[test]
    fn test_duplicate_registration_ignored() {
        let mut registry = SaveableRegistry::default();
        registry.register::<Odometer>();
        registry.register::<Odometer>();
        assert_eq!(registry.entries.len(), 1);
    }

    #[test]
    fn test_reset_all_restores_defaults() {
        let mut registry = SaveableRegistry::default();
        registry.register::<Odometer>();
        let mut world = World::new();
        world.insert_resource(Odometer { metres: 9 });
        registry.reset_all(&mut world);
        assert_eq!(world.resource::<Odometer>().metres, 0);
    }

    #[test]
    fn test_decode_failure_falls_back() {
        let value: Odometer = decode_or_warn("odometer", &[]);
        assert_eq!(value, Odometer::default());
    }

    #[test]
    fn test_plugin_registers_all_saveables() {
        let mut app = App::new();
        app.add_plugins(RailSimPlugin);
        let keys: Vec<String> = app
            .world()
            .resource::<SaveableRegistry>()
            .keys()
            .map(str::to_string)
            .collect();
        for key in ["rail_params", "fleet", "parked_trains", "routing_graph", "sim_rng"] {
            assert!(keys.iter().any(|k| k == key), "missing {key}");
        }
    }
}
