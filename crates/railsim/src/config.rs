/// Maximum number of rail cells a routing node walks in one direction before
/// giving up. Loops of track without any marker terminate here.
pub const MAX_EXPLORE_STEPS: u32 = 500;

/// Distance reported for a destination that cannot be reached. Never wins a
/// relaxation.
pub const ROUTE_UNKNOWN_DISTANCE: u32 = 100_000;

/// Upper bound of the externally supplied speed factor in post-integration.
pub const SPEED_FACTOR_CAP: f64 = 10.0;

/// A new yaw within this many degrees of the reversed old yaw keeps the old
/// orientation (the cart is rolling backwards, not turning around).
pub const YAW_FLIP_THRESHOLD: f64 = 170.0;

/// Pitch limit in degrees.
pub const PITCH_LIMIT: f64 = 60.0;

/// Per-substep velocity ceiling. Trains faster than this are integrated in
/// `ceil(limit / SUBSTEP_SPEED)` substeps.
pub const SUBSTEP_SPEED: f64 = 0.4;

/// Squared horizontal movement below which yaw/pitch are not re-derived.
pub const MIN_ORIENT_MOVEMENT_SQ: f64 = 0.001;

/// Same-train carts only collide when closer than this.
pub const SAME_TRAIN_COLLIDE_DISTANCE: f64 = 0.5;

/// World name used for switcher node names when none is configured.
pub const DEFAULT_WORLD_NAME: &str = "world";

/// BFS radius (in rail cells) used when checking whether two carts share
/// connected track.
pub const CONNECTED_SEARCH_LIMIT: u32 = 8;
