use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use bevy::log::debug;
use bevy::math::IVec3;
use bevy::prelude::Resource;

use crate::config::{MAX_EXPLORE_STEPS, ROUTE_UNKNOWN_DISTANCE};
use crate::track::{Face, MarkerKind, RailSampler, TrackWalker};

use super::node::{Route, RoutingNode};

/// Incremental shortest-path tables over the junction and destination
/// markers of one world.
#[derive(Resource, Debug, Clone, Default)]
pub struct RoutingGraph {
    pub(crate) nodes: BTreeMap<String, RoutingNode>,
    by_rail: HashMap<IVec3, String>,
    /// Rail cell -> nodes whose last exploration walked over it.
    walked: HashMap<IVec3, BTreeSet<String>>,
}

impl RoutingGraph {
    /// Name of the routing node a marker at `rail` stands for.
    ///
    /// Switchers are named after their location, destinations after their
    /// label. Plain triggers are not routing nodes.
    pub fn node_name<S: RailSampler + ?Sized>(sampler: &S, rail: IVec3) -> Option<String> {
        let marker = sampler.marker_at(rail)?;
        match marker.kind {
            MarkerKind::Switcher => Some(format!(
                "{}_{}_{}_{}",
                sampler.world_name(),
                rail.x,
                rail.y,
                rail.z
            )),
            MarkerKind::Destination => Some(marker.label.clone()),
            MarkerKind::Trigger => None,
        }
    }

    /// Make sure the node for the marker at `rail` exists.
    pub fn register<S: RailSampler + ?Sized>(&mut self, sampler: &S, rail: IVec3) -> Option<String> {
        let name = Self::node_name(sampler, rail)?;
        self.insert_node(&name, rail);
        Some(name)
    }

    fn insert_node(&mut self, name: &str, rail: IVec3) {
        self.nodes
            .entry(name.to_string())
            .or_insert_with(|| RoutingNode::new(name, rail));
        self.by_rail.entry(rail).or_insert_with(|| name.to_string());
    }

    pub fn node(&self, name: &str) -> Option<&RoutingNode> {
        self.nodes.get(name)
    }

    pub fn node_at(&self, rail: IVec3) -> Option<&RoutingNode> {
        self.by_rail.get(&rail).and_then(|n| self.nodes.get(n))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &RoutingNode> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Walk the four cardinal directions from the node's rail and record the
    /// first other node found along each. Returns the number of neighbours.
    pub fn explore<S: RailSampler + ?Sized>(&mut self, name: &str, sampler: &S) -> usize {
        let Some(rail) = self.nodes.get(name).map(|n| n.rail) else {
            return 0;
        };

        let mut found: BTreeMap<String, (Route, IVec3)> = BTreeMap::new();
        let mut walked = vec![rail];
        for face in Face::CARDINALS {
            let mut walker = TrackWalker::new(sampler, rail, face, MAX_EXPLORE_STEPS);
            let mut hit = None;
            for cell in walker.by_ref() {
                walked.push(cell);
                match Self::node_name(sampler, cell) {
                    Some(other) if other != name => {
                        hit = Some((other, cell));
                        break;
                    }
                    _ => {}
                }
            }
            match hit {
                Some((other, cell)) => {
                    let route = Route::new(face, walker.steps());
                    let shorter = found
                        .get(&other)
                        .is_none_or(|(known, _)| route.distance < known.distance);
                    if shorter {
                        found.insert(other, (route, cell));
                    }
                }
                None if walker.exhausted() => {
                    debug!("routing node '{}' gave up exploring {:?}", name, face);
                }
                None => {}
            }
        }

        for (other, (_, cell)) in &found {
            self.insert_node(other, *cell);
        }
        self.unindex(name);
        for cell in &walked {
            self.walked.entry(*cell).or_default().insert(name.to_string());
        }
        let count = found.len();
        if let Some(node) = self.nodes.get_mut(name) {
            node.neighbours = found.into_iter().map(|(k, (r, _))| (k, r)).collect();
            node.walked = walked;
        }
        count
    }

    /// Direction from `from` towards `destination`.
    ///
    /// Returns [`Route::SELF`] when `from` is the destination and
    /// [`Route::UNKNOWN`] when no path is known; callers treat both as
    /// "continue straight".
    pub fn lookup<S: RailSampler + ?Sized>(&mut self, from: &str, destination: &str, sampler: &S) -> Route {
        let mut visited = HashSet::new();
        self.resolve(from, destination, sampler, &mut visited)
    }

    /// [`lookup`](Self::lookup) from the node whose marker sits at `rail`.
    pub fn lookup_at<S: RailSampler + ?Sized>(
        &mut self,
        rail: IVec3,
        destination: &str,
        sampler: &S,
    ) -> Option<Route> {
        let from = self.register(sampler, rail)?;
        Some(self.lookup(&from, destination, sampler))
    }

    /// One relaxation round from `name`. `visited` holds every node already
    /// asked during this lookup; such a node answers with what it knows.
    pub(crate) fn resolve<S: RailSampler + ?Sized>(
        &mut self,
        name: &str,
        destination: &str,
        sampler: &S,
        visited: &mut HashSet<String>,
    ) -> Route {
        if name == destination {
            return Route::SELF;
        }
        let Some(node) = self.nodes.get(name) else {
            return Route::UNKNOWN;
        };
        if !visited.insert(name.to_string()) {
            return node.route_to(destination).unwrap_or(Route::UNKNOWN);
        }

        if node.neighbours.is_empty() {
            self.explore(name, sampler);
        }
        let neighbours: Vec<(String, Route)> = self
            .nodes
            .get(name)
            .map(|n| n.neighbours.iter().map(|(k, r)| (k.clone(), *r)).collect())
            .unwrap_or_default();

        for (other, edge) in neighbours {
            let onward = self.resolve(&other, destination, sampler, visited);
            if onward.distance >= ROUTE_UNKNOWN_DISTANCE {
                continue;
            }
            let distance = onward
                .distance
                .saturating_add(edge.distance)
                .saturating_add(1);
            if let Some(node) = self.nodes.get_mut(name) {
                node.relax(destination, Route::new(edge.direction, distance));
            }
        }

        self.nodes
            .get(name)
            .and_then(|n| n.route_to(destination))
            .unwrap_or(Route::UNKNOWN)
    }

    /// Forget a node's tables; it explores again on the next query.
    pub fn invalidate(&mut self, name: &str) {
        self.unindex(name);
        if let Some(node) = self.nodes.get_mut(name) {
            node.reset();
        }
    }

    /// Delete a node and every edge and route pointing at it.
    pub fn remove(&mut self, name: &str) -> Option<RoutingNode> {
        self.unindex(name);
        let removed = self.nodes.remove(name)?;
        self.by_rail.retain(|_, n| n.as_str() != name);
        for node in self.nodes.values_mut() {
            node.neighbours.remove(name);
            node.routes.remove(name);
        }
        Some(removed)
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.by_rail.clear();
        self.walked.clear();
    }

    /// React to a rail or marker edit at `pos`.
    ///
    /// A node whose marker disappeared (or changed name) is removed. Nodes
    /// whose exploration walked over or next to `pos` are invalidated, and
    /// since their old distances may have fed other nodes, every derived
    /// route is dropped. Returns the number of nodes touched.
    pub fn on_track_changed<S: RailSampler + ?Sized>(&mut self, pos: IVec3, sampler: &S) -> usize {
        let mut touched = 0;
        if let Some(name) = self.by_rail.get(&pos).cloned() {
            if Self::node_name(sampler, pos).as_deref() != Some(name.as_str()) {
                self.remove(&name);
                touched += 1;
            }
        }

        let mut affected = BTreeSet::new();
        for dy in -1..=1 {
            let base = pos + IVec3::new(0, dy, 0);
            for cell in std::iter::once(base).chain(Face::CARDINALS.iter().map(|f| base + f.offset())) {
                if let Some(names) = self.walked.get(&cell) {
                    affected.extend(names.iter().cloned());
                }
            }
        }
        if affected.is_empty() {
            return touched;
        }

        for name in &affected {
            self.invalidate(name);
        }
        for node in self.nodes.values_mut() {
            node.routes.clear();
        }
        touched + affected.len()
    }

    fn unindex(&mut self, name: &str) {
        let Some(node) = self.nodes.get(name) else {
            return;
        };
        for cell in &node.walked {
            if let Some(names) = self.walked.get_mut(cell) {
                names.remove(name);
                if names.is_empty() {
                    self.walked.remove(cell);
                }
            }
        }
    }

    /// Rebuild lookup indexes from the node tables (after loading).
    pub(crate) fn reindex(&mut self) {
        self.by_rail.clear();
        self.walked.clear();
        for (name, node) in &self.nodes {
            self.by_rail.entry(node.rail).or_insert_with(|| name.clone());
            for cell in &node.walked {
                self.walked.entry(*cell).or_default().insert(name.clone());
            }
        }
    }
}
