//! Data-driven rail physics parameters.
//!
//! Every tuned constant the motion engine and the coupling manager read lives
//! in the [`RailParams`] resource so it can be overridden at runtime (or from
//! a JSON file) without recompilation. The resource is saveable, so overrides
//! persist across save/load cycles.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::train::CollisionMode;

// ---------------------------------------------------------------------------
// Motion
// ---------------------------------------------------------------------------

/// Tunables for single-cart integration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, bitcode::Encode, bitcode::Decode)]
pub struct MotionParams {
    /// Downhill acceleration per tick on sloped rail.
    pub slope_acceleration: f64,
    /// Relative boost per tick on an active powered rail.
    pub powered_boost: f64,
    /// Speed given to a stationary cart on a powered rail next to a wall.
    pub launch_kick: f64,
    /// Below this squared speed a braking rail stops the cart outright.
    pub brake_stop_speed_sq: f64,
    /// Velocity multiplier on a braking rail.
    pub brake_decay: f64,
    /// Per-tick rolling friction multiplier.
    pub friction: f64,
    /// Friction multiplier used when a train runs in slow mode.
    pub slow_friction: f64,
    /// Velocity multiplier for a derailed cart resting on the ground.
    pub derailed_ground_decay: f64,
    /// Velocity multiplier for a derailed cart in the air.
    pub airborne_decay: f64,
    /// Downward acceleration for airborne carts.
    pub gravity: f64,
    /// Speed change per block of height lost (or gained) on a slope.
    pub slope_slowdown: f64,
    /// Ticks a cart may stay derailed before validation removes it.
    pub max_derailed_ticks: u32,
}

impl Default for MotionParams {
    fn default() -> Self {
        Self {
            slope_acceleration: 0.0078125,
            powered_boost: 0.06,
            launch_kick: 0.02,
            brake_stop_speed_sq: 0.0009,
            brake_decay: 0.5,
            friction: 0.997,
            slow_friction: 0.96,
            derailed_ground_decay: 0.5,
            airborne_decay: 0.95,
            gravity: 0.04,
            slope_slowdown: 0.05,
            max_derailed_ticks: 200,
        }
    }
}

// ---------------------------------------------------------------------------
// Coupling
// ---------------------------------------------------------------------------

/// Tunables for inter-cart spacing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, bitcode::Encode, bitcode::Decode)]
pub struct CouplingParams {
    /// Nominal gap between coupled carts on straight track.
    pub cart_distance: f64,
    pub cart_distance_forcer: f64,
    /// Nominal gap when the two carts face different directions.
    pub turned_cart_distance: f64,
    pub turned_cart_distance_forcer: f64,
    /// Forcer amplification when carts are closer than nominal.
    pub near_cart_distance_factor: f64,
    /// Coupling breaks beyond this planar distance.
    pub max_cart_distance: f64,
    /// Heading difference (degrees) from which a pair counts as turned.
    pub turned_yaw_threshold: f64,
    /// Pitch difference (degrees) above which a pair counts as turned.
    pub turned_pitch_threshold: f64,
}

impl Default for CouplingParams {
    fn default() -> Self {
        Self {
            cart_distance: 1.5,
            cart_distance_forcer: 0.1,
            turned_cart_distance: 1.6,
            turned_cart_distance_forcer: 0.2,
            near_cart_distance_factor: 1.2,
            max_cart_distance: 4.0,
            turned_yaw_threshold: 45.0,
            turned_pitch_threshold: 10.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Collision
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, bitcode::Encode, bitcode::Decode)]
pub struct CollisionParams {
    /// Centre-to-centre distance at which two carts touch.
    pub contact_distance: f64,
    /// Bounds of the collision grace period given to the halves of a split.
    pub split_ignore_min_ticks: u32,
    pub split_ignore_max_ticks: u32,
}

impl Default for CollisionParams {
    fn default() -> Self {
        Self {
            contact_distance: 0.98,
            split_ignore_min_ticks: 20,
            split_ignore_max_ticks: 40,
        }
    }
}

// ---------------------------------------------------------------------------
// Train defaults
// ---------------------------------------------------------------------------

/// Properties a freshly created train starts with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, bitcode::Encode, bitcode::Decode)]
pub struct TrainDefaults {
    pub speed_limit: f64,
    /// Hard ceiling for any configured speed limit.
    pub max_velocity: f64,
    pub collision: CollisionMode,
    pub slowdown: bool,
    pub allow_linking: bool,
}

impl Default for TrainDefaults {
    fn default() -> Self {
        Self {
            speed_limit: 0.4,
            max_velocity: 5.0,
            collision: CollisionMode::Collide,
            slowdown: true,
            allow_linking: true,
        }
    }
}

// ---------------------------------------------------------------------------
// RailParams resource
// ---------------------------------------------------------------------------

/// All rail simulation tunables.
#[derive(
    Resource,
    Debug,
    Clone,
    PartialEq,
    Default,
    Serialize,
    Deserialize,
    bitcode::Encode,
    bitcode::Decode,
)]
pub struct RailParams {
    pub motion: MotionParams,
    pub coupling: CouplingParams,
    pub collision: CollisionParams,
    pub train: TrainDefaults,
}

impl RailParams {
    /// Parse parameter overrides from JSON.
    pub fn from_json(json: &str) -> Result<Self, String> {
        serde_json::from_str(json).map_err(|e| format!("rail params JSON error: {e}"))
    }

    /// Pretty JSON dump, handy as a starting point for an overrides file.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    }

    /// A speed limit clamped to the configured maximum velocity.
    pub fn clamp_speed_limit(&self, limit: f64) -> f64 {
        limit.clamp(0.0, self.train.max_velocity)
    }
}

impl crate::Saveable for RailParams {
    const SAVE_KEY: &'static str = "rail_params";

    fn save_to_bytes(&self) -> Option<Vec<u8>> {
        // Always saved so a world built with custom params reloads with them.
        Some(bitcode::encode(self))
    }

    fn load_from_bytes(bytes: &[u8]) -> Self {
        crate::decode_or_warn(Self::SAVE_KEY, bytes)
    }
}

pub struct RailParamsPlugin;

impl Plugin for RailParamsPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<RailParams>();

        let mut registry = app
            .world_mut()
            .get_resource_or_insert_with(crate::SaveableRegistry::default);
        registry.register::<RailParams>();
    }
}
