//! Cell-by-cell traversal of connected track.

use bevy::math::IVec3;
use pathfinding::prelude::bfs;

use super::face::Face;
use super::grid::RailSampler;

/// The rail cell reached by leaving the rail at `pos` through `exit`.
///
/// Leaving through the high end of a slope steps up one block; arriving at an
/// empty cell falls back to a slope one block lower that rises towards us.
/// The destination must have an end facing back, unless it carries a marker
/// (junction cells accept entry from any side).
pub fn step<S: RailSampler + ?Sized>(sampler: &S, pos: IVec3, exit: Face) -> Option<IVec3> {
    let mut next = pos + exit.offset();
    if sampler
        .rail_at(pos)
        .is_some_and(|r| r.shape.ascending() == Some(exit))
    {
        next.y += 1;
    }
    let back = exit.opposite();

    if let Some(rail) = sampler.rail_at(next) {
        if rail.shape.has_end(back) || sampler.marker_at(next).is_some() {
            return Some(next);
        }
        return None;
    }

    let below = next - IVec3::Y;
    match sampler.rail_at(below) {
        Some(rail) if rail.shape.ascending() == Some(back) => Some(below),
        _ => None,
    }
}

/// Walks track outward from a cell, yielding each rail cell entered.
///
/// The first step leaves the start cell through `travel` regardless of the
/// start cell's own shape, which is how junctions are explored. Every later
/// step follows the rail geometry.
pub struct TrackWalker<'a, S: RailSampler + ?Sized> {
    sampler: &'a S,
    pos: IVec3,
    travel: Face,
    steps: u32,
    max_steps: u32,
}

impl<'a, S: RailSampler + ?Sized> TrackWalker<'a, S> {
    pub fn new(sampler: &'a S, start: IVec3, travel: Face, max_steps: u32) -> Self {
        Self {
            sampler,
            pos: start,
            travel,
            steps: 0,
            max_steps,
        }
    }

    /// Number of cells entered so far.
    pub fn steps(&self) -> u32 {
        self.steps
    }

    pub fn exhausted(&self) -> bool {
        self.steps >= self.max_steps
    }
}

impl<S: RailSampler + ?Sized> Iterator for TrackWalker<'_, S> {
    type Item = IVec3;

    fn next(&mut self) -> Option<IVec3> {
        if self.exhausted() {
            return None;
        }
        let exit = if self.steps == 0 {
            self.travel
        } else {
            let rail = self.sampler.rail_at(self.pos)?;
            rail.shape
                .other_end(self.travel.opposite())
                .or_else(|| rail.shape.has_end(self.travel).then_some(self.travel))?
        };
        let next = step(self.sampler, self.pos, exit)?;
        self.pos = next;
        self.travel = exit;
        self.steps += 1;
        Some(next)
    }
}

/// Whether two rail cells are joined by track within `limit` blocks of `from`
/// (horizontal Manhattan distance).
pub fn rails_connected<S: RailSampler + ?Sized>(
    sampler: &S,
    from: IVec3,
    to: IVec3,
    limit: u32,
) -> bool {
    if from == to {
        return true;
    }
    let limit = limit as i32;
    bfs(
        &from,
        |&p| {
            let mut out = Vec::with_capacity(2);
            if let Some(rail) = sampler.rail_at(p) {
                let (a, b) = rail.shape.ends();
                for end in [a, b] {
                    if let Some(n) = step(sampler, p, end) {
                        let d = n - from;
                        if d.x.abs() + d.z.abs() <= limit {
                            out.push(n);
                        }
                    }
                }
            }
            out
        },
        |&p| p == to,
    )
    .is_some()
}
