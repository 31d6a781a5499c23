use std::collections::BTreeMap;

use bevy::math::IVec3;
use bitcode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::config::ROUTE_UNKNOWN_DISTANCE;
use crate::track::Face;

/// Direction to leave a node in, and the distance to the destination that
/// way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct Route {
    pub direction: Face,
    pub distance: u32,
}

impl Route {
    /// The node is the destination.
    pub const SELF: Route = Route {
        direction: Face::Down,
        distance: 0,
    };

    /// No path is known. Never wins a relaxation.
    pub const UNKNOWN: Route = Route {
        direction: Face::Up,
        distance: ROUTE_UNKNOWN_DISTANCE,
    };

    pub fn new(direction: Face, distance: u32) -> Self {
        Self {
            direction,
            distance,
        }
    }

    /// A real direction to travel in (not a sentinel).
    pub fn is_known(&self) -> bool {
        self.direction.is_horizontal() && self.distance < ROUTE_UNKNOWN_DISTANCE
    }

    pub fn is_self(&self) -> bool {
        *self == Route::SELF
    }
}

/// A named junction or destination.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingNode {
    pub name: String,
    /// Rail cell carrying the node's marker.
    pub rail: IVec3,
    /// First node found along each explored direction, by name.
    pub(crate) neighbours: BTreeMap<String, Route>,
    /// Best known route per destination, derived through neighbours.
    pub(crate) routes: BTreeMap<String, Route>,
    /// Rail cells covered by the last exploration.
    pub(crate) walked: Vec<IVec3>,
}

impl RoutingNode {
    pub fn new(name: impl Into<String>, rail: IVec3) -> Self {
        Self {
            name: name.into(),
            rail,
            neighbours: BTreeMap::new(),
            routes: BTreeMap::new(),
            walked: Vec::new(),
        }
    }

    pub fn neighbours(&self) -> &BTreeMap<String, Route> {
        &self.neighbours
    }

    pub fn routes(&self) -> &BTreeMap<String, Route> {
        &self.routes
    }

    pub fn route_to(&self, destination: &str) -> Option<Route> {
        self.routes.get(destination).copied()
    }

    /// Record `candidate` if it is strictly shorter than what is known.
    /// Returns whether the table changed.
    pub(crate) fn relax(&mut self, destination: &str, candidate: Route) -> bool {
        if candidate.distance >= ROUTE_UNKNOWN_DISTANCE {
            return false;
        }
        match self.routes.get(destination) {
            Some(known) if known.distance <= candidate.distance => false,
            _ => {
                self.routes.insert(destination.to_string(), candidate);
                true
            }
        }
    }

    /// Forget everything learned, so the node explores again on the next
    /// query.
    pub(crate) fn reset(&mut self) {
        self.neighbours.clear();
        self.routes.clear();
        self.walked.clear();
    }
}
