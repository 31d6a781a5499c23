//! Voxel track storage and the read-only sampler contract the simulation
//! consumes.

use std::collections::HashMap;

use bevy::math::{DVec3, IVec3};
use bevy::prelude::Resource;

use crate::config::DEFAULT_WORLD_NAME;

use super::face::Face;
use super::shape::{RailInfo, RailKind, RailShape};

/// What a track marker (a sign beneath a rail) does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerKind {
    /// Plain trigger location: only enter/leave notifications.
    Trigger,
    /// A routing junction. Its routing node is named after its location.
    Switcher,
    /// A routing destination. Its routing node is named after its label.
    Destination,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackMarker {
    pub kind: MarkerKind,
    pub label: String,
}

impl TrackMarker {
    pub fn trigger(label: impl Into<String>) -> Self {
        Self {
            kind: MarkerKind::Trigger,
            label: label.into(),
        }
    }

    pub fn switcher() -> Self {
        Self {
            kind: MarkerKind::Switcher,
            label: String::new(),
        }
    }

    pub fn destination(label: impl Into<String>) -> Self {
        Self {
            kind: MarkerKind::Destination,
            label: label.into(),
        }
    }

    pub fn is_routing_node(&self) -> bool {
        matches!(self.kind, MarkerKind::Switcher | MarkerKind::Destination)
    }
}

/// Read-only world queries used by motion, coupling and routing.
pub trait RailSampler {
    /// The rail occupying exactly this cell.
    fn rail_at(&self, pos: IVec3) -> Option<RailInfo>;

    /// Whether the cell blocks movement.
    fn is_solid(&self, pos: IVec3) -> bool;

    /// The marker attached to the rail at this cell.
    fn marker_at(&self, pos: IVec3) -> Option<&TrackMarker>;

    fn world_name(&self) -> &str;

    /// Rail under a world position: the cell containing it, else the cell
    /// below.
    fn detect(&self, pos: DVec3) -> Option<RailInfo> {
        let cell = pos.floor().as_ivec3();
        self.rail_at(cell)
            .or_else(|| self.rail_at(cell - IVec3::Y))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Block {
    Solid,
    Rail { shape: RailShape, kind: RailKind },
}

/// Sparse voxel world holding rails, solid blocks and markers. Cells that are
/// not stored are air.
#[derive(Resource, Debug, Clone)]
pub struct TrackGrid {
    blocks: HashMap<IVec3, Block>,
    markers: HashMap<IVec3, TrackMarker>,
    world_name: String,
    /// Cells edited since the last drain; consumed by routing invalidation.
    changed: Vec<IVec3>,
}

impl Default for TrackGrid {
    fn default() -> Self {
        Self::new(DEFAULT_WORLD_NAME)
    }
}

impl TrackGrid {
    pub fn new(world_name: impl Into<String>) -> Self {
        Self {
            blocks: HashMap::new(),
            markers: HashMap::new(),
            world_name: world_name.into(),
            changed: Vec::new(),
        }
    }

    pub fn set_rail(&mut self, pos: IVec3, shape: RailShape) {
        self.set_block(pos, Block::Rail {
            shape,
            kind: RailKind::Plain,
        });
    }

    pub fn set_powered_rail(&mut self, pos: IVec3, shape: RailShape, active: bool) {
        self.set_block(pos, Block::Rail {
            shape,
            kind: RailKind::Powered { active },
        });
    }

    pub fn set_solid(&mut self, pos: IVec3) {
        self.set_block(pos, Block::Solid);
    }

    pub fn set_block(&mut self, pos: IVec3, block: Block) {
        self.blocks.insert(pos, block);
        self.changed.push(pos);
    }

    /// Turn a cell back into air. Any marker on it is removed with it.
    pub fn clear(&mut self, pos: IVec3) {
        let had_block = self.blocks.remove(&pos).is_some();
        let had_marker = self.markers.remove(&pos).is_some();
        if had_block || had_marker {
            self.changed.push(pos);
        }
    }

    /// Reshape an existing rail (junction switching). Returns false if the
    /// cell is not a rail.
    pub fn set_shape(&mut self, pos: IVec3, new_shape: RailShape) -> bool {
        match self.blocks.get_mut(&pos) {
            Some(Block::Rail { shape, .. }) => {
                *shape = new_shape;
                true
            }
            _ => false,
        }
    }

    pub fn set_marker(&mut self, pos: IVec3, marker: TrackMarker) {
        self.markers.insert(pos, marker);
        self.changed.push(pos);
    }

    pub fn remove_marker(&mut self, pos: IVec3) -> Option<TrackMarker> {
        let removed = self.markers.remove(&pos);
        if removed.is_some() {
            self.changed.push(pos);
        }
        removed
    }

    pub fn block(&self, pos: IVec3) -> Option<Block> {
        self.blocks.get(&pos).copied()
    }

    pub fn markers(&self) -> impl Iterator<Item = (&IVec3, &TrackMarker)> {
        self.markers.iter()
    }

    /// Lay `len` straight flat rails starting at `start` towards `dir`, with a
    /// solid bed underneath.
    pub fn lay_straight(&mut self, start: IVec3, dir: Face, len: u32) {
        let shape = match dir {
            Face::North | Face::South => RailShape::NorthSouth,
            _ => RailShape::EastWest,
        };
        for i in 0..len as i32 {
            let pos = start + dir.offset() * i;
            self.set_rail(pos, shape);
            self.set_solid(pos - IVec3::Y);
        }
    }

    pub fn drain_changes(&mut self) -> Vec<IVec3> {
        std::mem::take(&mut self.changed)
    }
}

impl RailSampler for TrackGrid {
    fn rail_at(&self, pos: IVec3) -> Option<RailInfo> {
        match self.blocks.get(&pos) {
            Some(Block::Rail { shape, kind }) => Some(RailInfo {
                pos,
                shape: *shape,
                kind: *kind,
            }),
            _ => None,
        }
    }

    fn is_solid(&self, pos: IVec3) -> bool {
        matches!(self.blocks.get(&pos), Some(Block::Solid))
    }

    fn marker_at(&self, pos: IVec3) -> Option<&TrackMarker> {
        self.markers.get(&pos)
    }

    fn world_name(&self) -> &str {
        &self.world_name
    }
}
