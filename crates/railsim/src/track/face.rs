use bevy::math::{DVec3, IVec3};
use bitcode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// One of the six block faces. The four horizontal faces double as travel
/// directions; `Up`/`Down` are used by routing as sentinels.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Encode, Decode,
)]
pub enum Face {
    North,
    East,
    South,
    West,
    Up,
    Down,
}

impl Face {
    /// The four horizontal faces in exploration order.
    pub const CARDINALS: [Face; 4] = [Face::North, Face::East, Face::South, Face::West];

    pub fn offset(self) -> IVec3 {
        match self {
            Face::North => IVec3::new(0, 0, -1),
            Face::East => IVec3::new(1, 0, 0),
            Face::South => IVec3::new(0, 0, 1),
            Face::West => IVec3::new(-1, 0, 0),
            Face::Up => IVec3::new(0, 1, 0),
            Face::Down => IVec3::new(0, -1, 0),
        }
    }

    pub fn opposite(self) -> Face {
        match self {
            Face::North => Face::South,
            Face::East => Face::West,
            Face::South => Face::North,
            Face::West => Face::East,
            Face::Up => Face::Down,
            Face::Down => Face::Up,
        }
    }

    pub fn is_horizontal(self) -> bool {
        !matches!(self, Face::Up | Face::Down)
    }

    /// Unit vector of this face.
    pub fn vector(self) -> DVec3 {
        self.offset().as_dvec3()
    }

    /// The horizontal face closest to a direction; `None` for a vertical or
    /// zero vector.
    pub fn from_horizontal(v: DVec3) -> Option<Face> {
        if v.x.abs() < 1e-9 && v.z.abs() < 1e-9 {
            return None;
        }
        Some(if v.x.abs() > v.z.abs() {
            if v.x > 0.0 {
                Face::East
            } else {
                Face::West
            }
        } else if v.z > 0.0 {
            Face::South
        } else {
            Face::North
        })
    }
}
