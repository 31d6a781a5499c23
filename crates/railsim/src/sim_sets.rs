//! Ordering of the rail simulation inside `FixedUpdate`.
//!
//! ```text
//! Prepare  →  Coupling  →  Routing  →  Report
//! ```
//!
//! * **Prepare** – tick counter, expiry of force overrides consumed by the
//!   previous tick, routing invalidation for track edits.
//! * **Coupling** – the per-train tick for every live train.
//! * **Routing** – junction decisions for trains that entered switcher or
//!   destination markers during Coupling.
//! * **Report** – forwarding buffered notifications as Bevy events, stats.
//!   Report systems only read simulation state.

use bevy::prelude::*;

#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum RailSimSet {
    Prepare,
    Coupling,
    Routing,
    Report,
}
