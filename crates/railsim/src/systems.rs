//! Bevy systems wrapping the fleet and routing cores.
//!
//! Systems stay thin: they borrow resources, call into [`Fleet`] and
//! [`RoutingGraph`], and move notifications between the per-tick buffer and
//! `Events<FleetEvent>`.

use bevy::log::debug;
use bevy::math::{DVec3, IVec3};
use bevy::prelude::*;

use crate::events::{EventSink, FleetEvent, ForceOverrides, TriggerKind};
use crate::fleet::{Fleet, ParkedTrains};
use crate::ids::TrainKey;
use crate::rail_params::RailParams;
use crate::routing::RoutingGraph;
use crate::track::{Face, MarkerKind, RailSampler, RailShape, TrackGrid};
use crate::TickCounter;

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

/// Notifications produced during the current tick, forwarded in Report.
#[derive(Resource, Debug, Default)]
pub struct PendingFleetEvents(pub Vec<FleetEvent>);

impl EventSink for PendingFleetEvents {
    fn fire(&mut self, event: FleetEvent) {
        self.0.push(event);
    }
}

#[derive(Resource, Debug, Default, Clone, PartialEq)]
pub struct FleetStats {
    pub trains: usize,
    pub carts: usize,
    pub derailed_carts: usize,
    pub parked_trains: usize,
    pub splits: u64,
    pub links: u64,
    pub routing_nodes: usize,
}

// ---------------------------------------------------------------------------
// Prepare
// ---------------------------------------------------------------------------

pub fn advance_tick(mut tick: ResMut<TickCounter>) {
    tick.0 = tick.0.wrapping_add(1);
}

/// Drop one-shot overrides consumed by the previous tick.
pub fn expire_force_overrides(mut overrides: ResMut<ForceOverrides>) {
    overrides.expire_used();
}

/// Feed track edits made since the last tick into the routing graph.
pub fn invalidate_routes(mut grid: ResMut<TrackGrid>, mut graph: ResMut<RoutingGraph>) {
    let changes = grid.drain_changes();
    if changes.is_empty() {
        return;
    }
    let touched: usize = changes
        .into_iter()
        .map(|pos| graph.on_track_changed(pos, &*grid))
        .sum();
    if touched > 0 {
        debug!("track edits invalidated {} routing nodes", touched);
    }
}

// ---------------------------------------------------------------------------
// Coupling
// ---------------------------------------------------------------------------

pub fn tick_fleet(
    grid: Res<TrackGrid>,
    params: Res<RailParams>,
    mut fleet: ResMut<Fleet>,
    mut overrides: ResMut<ForceOverrides>,
    mut pending: ResMut<PendingFleetEvents>,
) {
    fleet.tick(&*grid, &params, &mut *overrides, &mut *pending);
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

/// Switch junctions in front of routed trains and report arrivals.
///
/// Reacts to train-level enter notifications, which fire when the leading
/// cart of a train reaches a marker.
pub fn route_at_junctions(
    mut grid: ResMut<TrackGrid>,
    mut graph: ResMut<RoutingGraph>,
    fleet: Res<Fleet>,
    mut pending: ResMut<PendingFleetEvents>,
) {
    let arrivals: Vec<(TrainKey, IVec3)> = pending
        .0
        .iter()
        .filter_map(|e| match e {
            FleetEvent::Trigger {
                kind: TriggerKind::Enter,
                location,
                train,
                cart: None,
            } => Some((*train, *location)),
            _ => None,
        })
        .collect();

    for (train, rail) in arrivals {
        let Some(destination) = fleet
            .train(train)
            .and_then(|t| t.flags.destination.clone())
        else {
            continue;
        };
        let Some(marker) = grid.marker_at(rail).cloned() else {
            continue;
        };
        match marker.kind {
            MarkerKind::Destination if marker.label == destination => {
                pending.fire(FleetEvent::DestinationReached { train, destination });
            }
            MarkerKind::Switcher => {
                if let Some(event) = switch_junction(&mut grid, &mut graph, &fleet, train, rail, &destination) {
                    pending.fire(event);
                }
            }
            _ => {}
        }
    }
}

fn switch_junction(
    grid: &mut TrackGrid,
    graph: &mut RoutingGraph,
    fleet: &Fleet,
    train: TrainKey,
    rail: IVec3,
    destination: &str,
) -> Option<FleetEvent> {
    let travel = arrival_direction(fleet, train, rail)?;
    let entry = Face::from_horizontal(travel)?.opposite();
    let route = graph.lookup_at(rail, destination, &*grid)?;
    if !route.is_known() {
        debug!("no route from {} to '{}', continuing straight", rail, destination);
        return None;
    }
    let shape = RailShape::connecting(entry, route.direction)?;
    if grid.rail_at(rail).is_some_and(|r| r.shape == shape) {
        return None;
    }
    if !grid.set_shape(rail, shape) {
        return None;
    }
    let node = RoutingGraph::node_name(&*grid, rail)?;
    Some(FleetEvent::JunctionSwitched {
        train,
        node,
        rail,
        exit: route.direction,
    })
}

/// Horizontal travel direction of the train's cart standing on `rail`.
///
/// A fast train may already have left the cell by the end of the tick; the
/// head cart stands in for it then.
fn arrival_direction(fleet: &Fleet, train: TrainKey, rail: IVec3) -> Option<DVec3> {
    let t = fleet.train(train)?;
    let mut carts = t.carts().iter().filter_map(|k| fleet.cart(*k));
    let cart = match carts.clone().find(|c| c.triggers().contains(&rail)) {
        Some(cart) => cart,
        None => carts.next()?,
    };
    let moving = DVec3::new(cart.velocity.x, 0.0, cart.velocity.z);
    if moving.length_squared() > 1e-9 {
        Some(moving)
    } else {
        Some(cart.heading)
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

pub fn forward_fleet_events(
    mut pending: ResMut<PendingFleetEvents>,
    mut events: EventWriter<FleetEvent>,
) {
    events.send_batch(pending.0.drain(..));
}

pub fn update_fleet_stats(
    fleet: Res<Fleet>,
    parked: Res<ParkedTrains>,
    graph: Res<RoutingGraph>,
    mut stats: ResMut<FleetStats>,
) {
    stats.trains = fleet.train_count();
    stats.carts = fleet.cart_count();
    stats.derailed_carts = fleet.carts().filter(|(_, c)| c.is_derailed()).count();
    stats.parked_trains = parked.len();
    stats.splits = fleet.split_count();
    stats.links = fleet.link_count();
    stats.routing_nodes = graph.len();
}
