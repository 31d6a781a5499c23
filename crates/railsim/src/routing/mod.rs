//! Destination routing.
//!
//! Switcher and destination markers form the vertices of a graph that is
//! discovered lazily: a node walks the track in its four cardinal
//! directions the first time it is asked for a route, and routes to a
//! destination are relaxed through neighbours on every lookup. Track edits
//! invalidate the nodes that walked over them; nothing is precomputed.

mod graph;
mod node;


pub use graph::RoutingGraph;
pub use node::{Route, RoutingNode};
