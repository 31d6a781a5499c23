//! Rail sampler: rail geometry, the voxel track store and track walking.
//!
//! Everything the motion engine and the routing graph know about the world
//! goes through the [`RailSampler`] trait. [`TrackGrid`] is the in-crate
//! implementation used by the plugin and by tests; hosts with their own world
//! representation implement the trait directly.

pub mod face;
pub mod grid;
pub mod shape;
pub mod walker;

pub use face::Face;
pub use grid::{Block, MarkerKind, RailSampler, TrackGrid, TrackMarker};
pub use shape::{RailInfo, RailKind, RailShape};
pub use walker::{rails_connected, step, TrackWalker};
