use bevy::math::{DVec3, IVec3};
use bitcode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use super::face::Face;

/// The ten canonical rail geometries.
///
/// Each shape permits travel between exactly two horizontal ends. Sloped
/// shapes rise by one block towards the face they are named after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Encode, Decode)]
pub enum RailShape {
    NorthSouth,
    EastWest,
    AscendingEast,
    AscendingWest,
    AscendingNorth,
    AscendingSouth,
    SouthEast,
    SouthWest,
    NorthWest,
    NorthEast,
}

impl RailShape {
    pub const ALL: [RailShape; 10] = [
        RailShape::NorthSouth,
        RailShape::EastWest,
        RailShape::AscendingEast,
        RailShape::AscendingWest,
        RailShape::AscendingNorth,
        RailShape::AscendingSouth,
        RailShape::SouthEast,
        RailShape::SouthWest,
        RailShape::NorthWest,
        RailShape::NorthEast,
    ];

    /// Half-block direction pair `(from, to)` of this shape, as `[x, y, z]`.
    ///
    /// The y component marks the lower end of a slope with -1.
    pub fn direction_pair(self) -> ([i32; 3], [i32; 3]) {
        match self {
            RailShape::NorthSouth => ([0, 0, -1], [0, 0, 1]),
            RailShape::EastWest => ([-1, 0, 0], [1, 0, 0]),
            RailShape::AscendingEast => ([-1, -1, 0], [1, 0, 0]),
            RailShape::AscendingWest => ([-1, 0, 0], [1, -1, 0]),
            RailShape::AscendingNorth => ([0, 0, -1], [0, -1, 1]),
            RailShape::AscendingSouth => ([0, -1, -1], [0, 0, 1]),
            RailShape::SouthEast => ([0, 0, 1], [1, 0, 0]),
            RailShape::SouthWest => ([0, 0, 1], [-1, 0, 0]),
            RailShape::NorthWest => ([0, 0, -1], [-1, 0, 0]),
            RailShape::NorthEast => ([0, 0, -1], [1, 0, 0]),
        }
    }

    /// The two faces through which a cart may enter or leave.
    pub fn ends(self) -> (Face, Face) {
        match self {
            RailShape::NorthSouth | RailShape::AscendingNorth | RailShape::AscendingSouth => {
                (Face::North, Face::South)
            }
            RailShape::EastWest | RailShape::AscendingEast | RailShape::AscendingWest => {
                (Face::West, Face::East)
            }
            RailShape::SouthEast => (Face::South, Face::East),
            RailShape::SouthWest => (Face::South, Face::West),
            RailShape::NorthWest => (Face::North, Face::West),
            RailShape::NorthEast => (Face::North, Face::East),
        }
    }

    pub fn has_end(self, face: Face) -> bool {
        let (a, b) = self.ends();
        a == face || b == face
    }

    /// The end a cart leaves through after entering through `entry`.
    pub fn other_end(self, entry: Face) -> Option<Face> {
        let (a, b) = self.ends();
        if entry == a {
            Some(b)
        } else if entry == b {
            Some(a)
        } else {
            None
        }
    }

    /// The high end of a slope.
    pub fn ascending(self) -> Option<Face> {
        match self {
            RailShape::AscendingEast => Some(Face::East),
            RailShape::AscendingWest => Some(Face::West),
            RailShape::AscendingNorth => Some(Face::North),
            RailShape::AscendingSouth => Some(Face::South),
            _ => None,
        }
    }

    pub fn is_sloped(self) -> bool {
        self.ascending().is_some()
    }

    pub fn is_curve(self) -> bool {
        matches!(
            self,
            RailShape::SouthEast | RailShape::SouthWest | RailShape::NorthWest | RailShape::NorthEast
        )
    }

    /// Normalized horizontal travel axis, pointing from `from` to `to`.
    pub fn axis(self) -> DVec3 {
        let (from, to) = self.direction_pair();
        DVec3::new((to[0] - from[0]) as f64, 0.0, (to[2] - from[2]) as f64).normalize()
    }

    /// The shape joining two horizontal faces, if any.
    pub fn connecting(a: Face, b: Face) -> Option<RailShape> {
        if a == b || !a.is_horizontal() || !b.is_horizontal() {
            return None;
        }
        RailShape::ALL
            .into_iter()
            .filter(|s| !s.is_sloped())
            .find(|s| s.has_end(a) && s.has_end(b))
    }

    /// Rail surface height above the cell floor at a position inside the cell.
    pub fn height_at(self, local: DVec3) -> f64 {
        let fx = local.x.clamp(0.0, 1.0);
        let fz = local.z.clamp(0.0, 1.0);
        match self {
            RailShape::AscendingEast => fx,
            RailShape::AscendingWest => 1.0 - fx,
            RailShape::AscendingSouth => fz,
            RailShape::AscendingNorth => 1.0 - fz,
            _ => 0.0,
        }
    }

    /// Horizontal end points of the rail line in cell-local coordinates.
    pub fn line_points(self) -> (DVec3, DVec3) {
        let (from, to) = self.direction_pair();
        let center = DVec3::new(0.5, 0.0, 0.5);
        (
            center + DVec3::new(from[0] as f64, 0.0, from[2] as f64) * 0.5,
            center + DVec3::new(to[0] as f64, 0.0, to[2] as f64) * 0.5,
        )
    }

    /// Project a world position onto the rail line of the cell at `cell`,
    /// keeping the original y.
    pub fn snap_to_line(self, cell: IVec3, pos: DVec3) -> DVec3 {
        let origin = cell.as_dvec3();
        let (a, b) = self.line_points();
        let (a, b) = (origin + a, origin + b);
        let ab = b - a;
        let t = ((pos - a).dot(ab) / ab.length_squared()).clamp(0.0, 1.0);
        let p = a + ab * t;
        DVec3::new(p.x, pos.y, p.z)
    }
}

/// Electrical behaviour of a rail cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub enum RailKind {
    Plain,
    /// Active powered rails boost; inactive ones brake.
    Powered { active: bool },
}

/// Result of sampling one rail cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RailInfo {
    pub pos: IVec3,
    pub shape: RailShape,
    pub kind: RailKind,
}

impl RailInfo {
    pub fn is_sloped(&self) -> bool {
        self.shape.is_sloped()
    }

    pub fn is_powered(&self) -> bool {
        matches!(self.kind, RailKind::Powered { active: true })
    }

    pub fn is_braking(&self) -> bool {
        matches!(self.kind, RailKind::Powered { active: false })
    }

    /// World-space height of the rail surface at `pos`.
    pub fn surface_y(&self, pos: DVec3) -> f64 {
        let local = pos - self.pos.as_dvec3();
        self.pos.y as f64 + self.shape.height_at(local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_pairs_match_ends() {
        for shape in RailShape::ALL {
            let (from, to) = shape.direction_pair();
            let (a, b) = shape.ends();
            let fa = Face::from_horizontal(DVec3::new(from[0] as f64, 0.0, from[2] as f64));
            let fb = Face::from_horizontal(DVec3::new(to[0] as f64, 0.0, to[2] as f64));
            assert_eq!(
                (fa, fb),
                (Some(a), Some(b)),
                "{shape:?} ends disagree with its direction pair"
            );
        }
    }

    #[test]
    fn test_slope_low_end_is_marked() {
        for shape in RailShape::ALL {
            let (from, to) = shape.direction_pair();
            match shape.ascending() {
                Some(high) => {
                    let low = high.opposite();
                    let low_y = if shape.ends().0 == low { from[1] } else { to[1] };
                    assert_eq!(low_y, -1, "{shape:?} low end should be marked");
                }
                None => assert_eq!((from[1], to[1]), (0, 0)),
            }
        }
    }

    #[test]
    fn test_connecting_faces() {
        assert_eq!(
            RailShape::connecting(Face::North, Face::South),
            Some(RailShape::NorthSouth)
        );
        assert_eq!(
            RailShape::connecting(Face::East, Face::South),
            Some(RailShape::SouthEast)
        );
        assert_eq!(RailShape::connecting(Face::East, Face::East), None);
        assert_eq!(RailShape::connecting(Face::Up, Face::East), None);
    }

    #[test]
    fn test_slope_height_profile() {
        let shape = RailShape::AscendingEast;
        assert_eq!(shape.height_at(DVec3::new(0.0, 0.0, 0.5)), 0.0);
        assert_eq!(shape.height_at(DVec3::new(0.25, 0.0, 0.5)), 0.25);
        assert_eq!(shape.height_at(DVec3::new(1.0, 0.0, 0.5)), 1.0);
        assert_eq!(RailShape::NorthSouth.height_at(DVec3::new(0.3, 0.0, 0.3)), 0.0);
    }

    #[test]
    fn test_snap_to_curve_line() {
        let cell = IVec3::new(4, 0, 4);
        let snapped = RailShape::SouthEast.snap_to_line(cell, DVec3::new(4.9, 0.0, 4.9));
        // The south-east chord runs from (4.5, 5.0) to (5.0, 4.5).
        assert!((snapped.x + snapped.z - 9.5).abs() < 1e-9, "{snapped:?}");
    }

    #[test]
    fn test_rail_kind_flags() {
        let powered = RailInfo {
            pos: IVec3::ZERO,
            shape: RailShape::EastWest,
            kind: RailKind::Powered { active: true },
        };
        let brake = RailInfo {
            kind: RailKind::Powered { active: false },
            ..powered
        };
        assert!(powered.is_powered() && !powered.is_braking());
        assert!(brake.is_braking() && !brake.is_powered());
    }
}
