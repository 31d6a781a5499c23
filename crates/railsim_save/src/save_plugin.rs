use std::path::{Path, PathBuf};

use bevy::prelude::*;
use railsim::events::ForceOverrides;
use railsim::systems::PendingFleetEvents;
use railsim::{SaveableRegistry, TickCounter};

use crate::atomic_write::atomic_write;
use crate::codec::RailwaySave;
use crate::save_error::SaveError;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Resource, Debug, Clone, PartialEq)]
pub struct SaveSettings {
    pub path: PathBuf,
    /// LZ4-compress the payload.
    pub compress: bool,
}

impl Default for SaveSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("railway_save.bin"),
            compress: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Event)]
pub struct SaveRailwayEvent;

#[derive(Event)]
pub struct LoadRailwayEvent;

/// Result of a save or load request, for hosts that surface it.
#[derive(Event, Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    Saved { path: PathBuf, bytes: usize },
    Loaded { path: PathBuf, tick: u64 },
    Failed(String),
}

// ---------------------------------------------------------------------------
// Plugin
// ---------------------------------------------------------------------------

pub struct RailSavePlugin;

impl Plugin for RailSavePlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<SaveRailwayEvent>()
            .add_event::<LoadRailwayEvent>()
            .add_event::<SaveOutcome>()
            .init_resource::<SaveSettings>()
            .init_resource::<SaveableRegistry>();

        // Saves before loads, so "save then load" in one frame reads back
        // what was just written.
        app.add_systems(Update, (exclusive_save, exclusive_load).chain());
    }
}

/// Consume all pending events of type `E`, returning whether any were sent.
fn take_requests<E: Event>(world: &mut World) -> bool {
    world
        .get_resource_mut::<Events<E>>()
        .is_some_and(|mut events| events.drain().count() > 0)
}

fn exclusive_save(world: &mut World) {
    if !take_requests::<SaveRailwayEvent>(world) {
        return;
    }
    let path = world.resource::<SaveSettings>().path.clone();
    let outcome = match save_railway(world) {
        Ok(bytes) => {
            info!("Saved railway to {} ({} bytes)", path.display(), bytes);
            SaveOutcome::Saved { path, bytes }
        }
        Err(e) => {
            let msg = format!("Save failed: {e}");
            error!("{msg}");
            SaveOutcome::Failed(msg)
        }
    };
    world.send_event(outcome);
}

fn exclusive_load(world: &mut World) {
    if !take_requests::<LoadRailwayEvent>(world) {
        return;
    }
    let path = world.resource::<SaveSettings>().path.clone();
    let outcome = match load_railway(world, &path) {
        Ok(tick) => {
            info!("Loaded railway from {} at tick {}", path.display(), tick);
            SaveOutcome::Loaded { path, tick }
        }
        Err(e) => {
            let msg = format!("Load failed: {e}");
            error!("{msg}");
            SaveOutcome::Failed(msg)
        }
    };
    world.send_event(outcome);
}

// ---------------------------------------------------------------------------
// Save / load
// ---------------------------------------------------------------------------

/// Encode every registered saveable into file bytes.
pub fn encode_railway(world: &World, compress: bool) -> Vec<u8> {
    let tick = world.get_resource::<TickCounter>().map_or(0, |t| t.0);
    let extensions = world
        .get_resource::<SaveableRegistry>()
        .map(|registry| registry.save_all(world))
        .unwrap_or_default();
    RailwaySave::new(tick, extensions).to_file_bytes(compress)
}

/// Write the railway to the configured path. Returns the file size.
pub fn save_railway(world: &World) -> Result<usize, SaveError> {
    let settings = world
        .get_resource::<SaveSettings>()
        .cloned()
        .unwrap_or_default();
    let bytes = encode_railway(world, settings.compress);
    atomic_write(&settings.path, &bytes)?;
    Ok(bytes.len())
}

pub fn load_railway(world: &mut World, path: &Path) -> Result<u64, SaveError> {
    let bytes = std::fs::read(path)?;
    apply_railway_bytes(world, &bytes)
}

/// Replace the registered resources with the contents of `bytes`.
///
/// Resources missing from the file (skipped at save time because they were
/// empty) come back as their defaults. Nothing is touched unless the whole
/// file validates. Returns the tick the save was taken at.
pub fn apply_railway_bytes(world: &mut World, bytes: &[u8]) -> Result<u64, SaveError> {
    let save = RailwaySave::from_file_bytes(bytes)?;

    let registry = world
        .remove_resource::<SaveableRegistry>()
        .unwrap_or_default();
    registry.reset_all(world);
    registry.load_all(world, &save.extensions);
    world.insert_resource(registry);

    // Transient per-tick state belongs to the world being replaced.
    world.insert_resource(ForceOverrides::default());
    world.insert_resource(PendingFleetEvents::default());
    world.insert_resource(TickCounter(save.tick));

    Ok(save.tick)
}
