//! Save snapshots of the live fleet and the routing tables.
//!
//! Live state is keyed by generational handles that mean nothing after a
//! reload, so both snapshots are written by identity instead: carts by
//! [`CartUuid`](crate::ids::CartUuid), routing nodes by name. Parked trains
//! and [`RailParams`](crate::rail_params::RailParams) carry their own
//! `Saveable` impls next to their types.

use bevy::math::IVec3;
use bitcode::{Decode, Encode};

use crate::fleet::{Fleet, ParkedTrain};
use crate::routing::{Route, RoutingGraph, RoutingNode};

// =============================================================================
// Fleet
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Encode, Decode)]
pub struct FleetSnapshot {
    /// Live trains, each head first.
    pub trains: Vec<ParkedTrain>,
    /// Counter behind generated train names, so new names stay unique.
    pub train_counter: u64,
}

impl FleetSnapshot {
    pub fn capture(fleet: &Fleet) -> Self {
        Self {
            trains: fleet
                .trains()
                .filter_map(|(key, _)| fleet.park_record(key))
                .filter(|t| !t.carts.is_empty())
                .collect(),
            train_counter: fleet.train_counter(),
        }
    }

    /// Rebuild a fleet. Trigger occupancy and velocity targets are not part
    /// of the snapshot; triggers are re-entered on the first tick.
    pub fn restore(&self) -> Fleet {
        let mut fleet = Fleet::default();
        for record in &self.trains {
            let keys = record
                .carts
                .iter()
                .map(|c| fleet.carts.insert(c.to_cart()))
                .collect();
            let train = fleet.new_named_train(record.name.clone(), keys, record.flags.clone());
            fleet.refresh_headings(train);
        }
        fleet.set_train_counter(self.train_counter);
        fleet
    }
}

impl crate::Saveable for Fleet {
    const SAVE_KEY: &'static str = "fleet";

    fn save_to_bytes(&self) -> Option<Vec<u8>> {
        if self.train_count() == 0 {
            return None;
        }
        Some(bitcode::encode(&FleetSnapshot::capture(self)))
    }

    fn load_from_bytes(bytes: &[u8]) -> Self {
        let snapshot: FleetSnapshot = crate::decode_or_warn(Self::SAVE_KEY, bytes);
        snapshot.restore()
    }
}

// =============================================================================
// Routing
// =============================================================================

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
struct NodeRecord {
    name: String,
    rail: [i32; 3],
    neighbours: Vec<(String, Route)>,
    routes: Vec<(String, Route)>,
    walked: Vec<[i32; 3]>,
}

#[derive(Debug, Clone, Default, PartialEq, Encode, Decode)]
struct RoutingSnapshot {
    nodes: Vec<NodeRecord>,
}

impl NodeRecord {
    fn from_node(node: &RoutingNode) -> Self {
        Self {
            name: node.name.clone(),
            rail: node.rail.to_array(),
            neighbours: node.neighbours.iter().map(|(k, r)| (k.clone(), *r)).collect(),
            routes: node.routes.iter().map(|(k, r)| (k.clone(), *r)).collect(),
            walked: node.walked.iter().map(|c| c.to_array()).collect(),
        }
    }

    fn into_node(self) -> RoutingNode {
        let mut node = RoutingNode::new(self.name, IVec3::from_array(self.rail));
        node.neighbours = self.neighbours.into_iter().collect();
        node.routes = self.routes.into_iter().collect();
        node.walked = self.walked.into_iter().map(IVec3::from_array).collect();
        node
    }
}

impl crate::Saveable for RoutingGraph {
    const SAVE_KEY: &'static str = "routing_graph";

    fn save_to_bytes(&self) -> Option<Vec<u8>> {
        if self.is_empty() {
            return None;
        }
        let snapshot = RoutingSnapshot {
            nodes: self.nodes().map(NodeRecord::from_node).collect(),
        };
        Some(bitcode::encode(&snapshot))
    }

    fn load_from_bytes(bytes: &[u8]) -> Self {
        let snapshot: RoutingSnapshot = crate::decode_or_warn(Self::SAVE_KEY, bytes);
        let mut graph = RoutingGraph::default();
        for record in snapshot.nodes {
            let node = record.into_node();
            graph.nodes.insert(node.name.clone(), node);
        }
        graph.reindex();
        graph
    }
}

#[cfg(test)]
mod tests {
    use bevy::math::DVec3;

    use super::*;
    use crate::ids::CartUuid;
    use crate::rail_params::RailParams;
    use crate::track::{Face, TrackGrid, TrackMarker};
    use crate::Saveable;

    fn grid() -> TrackGrid {
        let mut grid = TrackGrid::default();
        grid.lay_straight(IVec3::ZERO, Face::East, 12);
        grid
    }

    #[test]
    fn test_empty_fleet_is_not_saved() {
        assert!(Fleet::default().save_to_bytes().is_none());
    }

    #[test]
    fn test_fleet_roundtrip_keeps_identity_and_order() {
        let grid = grid();
        let params = RailParams::default();
        let mut fleet = Fleet::default();
        let train = fleet
            .spawn_train(
                &[
                    (CartUuid(1), DVec3::new(6.5, 0.0, 0.5)),
                    (CartUuid(2), DVec3::new(5.0, 0.0, 0.5)),
                    (CartUuid(3), DVec3::new(3.5, 0.0, 0.5)),
                ],
                &grid,
                &params,
            )
            .expect("spawn");
        fleet.train_mut(train).expect("train").flags.speed_limit = 0.7;
        fleet.spawn_cart(CartUuid(9), DVec3::new(10.5, 0.0, 0.5), &grid, &params).expect("spawn");

        let bytes = fleet.save_to_bytes().expect("saved");
        let restored = Fleet::load_from_bytes(&bytes);

        assert_eq!(restored.train_count(), 2);
        assert_eq!(restored.cart_count(), 4);
        let name = fleet.train(train).expect("train").name.clone();
        let key = restored.find_train(&name).expect("same name");
        let t = restored.train(key).expect("train");
        let uuids: Vec<CartUuid> = t
            .carts()
            .iter()
            .map(|k| restored.cart(*k).expect("cart").uuid)
            .collect();
        assert_eq!(uuids, vec![CartUuid(1), CartUuid(2), CartUuid(3)]);
        assert_eq!(t.flags.speed_limit, 0.7);
        for k in t.carts() {
            assert_eq!(restored.cart(*k).expect("cart").train, Some(key));
        }
    }

    #[test]
    fn test_restored_fleet_names_new_trains_uniquely() {
        let grid = grid();
        let params = RailParams::default();
        let mut fleet = Fleet::default();
        fleet.spawn_cart(CartUuid(1), DVec3::new(1.5, 0.0, 0.5), &grid, &params).expect("spawn");
        fleet.spawn_cart(CartUuid(2), DVec3::new(4.5, 0.0, 0.5), &grid, &params).expect("spawn");

        let mut restored = Fleet::load_from_bytes(&fleet.save_to_bytes().expect("saved"));
        restored.spawn_cart(CartUuid(3), DVec3::new(8.5, 0.0, 0.5), &grid, &params).expect("spawn");
        let mut names: Vec<String> = restored.trains().map(|(_, t)| t.name.clone()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 3);
    }

    #[test]
    fn test_garbage_fleet_bytes_fall_back_to_empty() {
        let restored = Fleet::load_from_bytes(&[0xff, 0x01, 0x02]);
        assert_eq!(restored.train_count(), 0);
    }

    #[test]
    fn test_routing_tables_survive_roundtrip() {
        let mut grid = grid();
        grid.set_marker(IVec3::ZERO, TrackMarker::switcher());
        grid.set_marker(IVec3::new(11, 0, 0), TrackMarker::destination("yard"));
        let mut graph = RoutingGraph::default();
        let route = graph.lookup_at(IVec3::ZERO, "yard", &grid).expect("node");
        assert_eq!(route, Route::new(Face::East, 12));

        let bytes = graph.save_to_bytes().expect("saved");
        let mut restored = RoutingGraph::load_from_bytes(&bytes);
        let junction = RoutingGraph::node_name(&grid, IVec3::ZERO).expect("switcher");
        assert_eq!(restored.node(&junction), graph.node(&junction));
        assert_eq!(restored.node_at(IVec3::ZERO).map(|n| n.name.as_str()), Some(junction.as_str()));

        // The walked-cell index is rebuilt, so edits still invalidate.
        assert!(restored.on_track_changed(IVec3::new(5, 0, 0), &grid) > 0);
        assert!(restored.node(&junction).expect("node").neighbours().is_empty());
    }

    #[test]
    fn test_empty_routing_graph_is_not_saved() {
        assert!(RoutingGraph::default().save_to_bytes().is_none());
    }
}
