//! Per-train FIFO of "ease towards this point at this speed" directives.
//!
//! Only the queue head is evaluated, once per tick, after its activation
//! delay has elapsed. Progress is measured along the distance actually
//! travelled rather than straight-line, so curved approaches still finish.

use std::collections::VecDeque;

use bevy::math::DVec3;

use crate::math;

const EPSILON: f64 = 1e-6;

/// A one-shot approach directive.
#[derive(Debug, Clone, PartialEq)]
pub struct VelocityTarget {
    pub target: DVec3,
    pub start_speed: f64,
    pub goal_speed: f64,
    /// Ticks to wait before the directive becomes active.
    pub delay_ticks: u32,
    progress: Option<Progress>,
}

#[derive(Debug, Clone, PartialEq)]
struct Progress {
    origin: DVec3,
    goal_distance: f64,
    traveled: f64,
    last_position: DVec3,
    last_distance: f64,
}

impl VelocityTarget {
    pub fn new(target: DVec3, start_speed: f64, goal_speed: f64) -> Self {
        Self {
            target,
            start_speed,
            goal_speed,
            delay_ticks: 0,
            progress: None,
        }
    }

    pub fn with_delay(mut self, ticks: u32) -> Self {
        self.delay_ticks = ticks;
        self
    }

    /// Distance travelled since activation, if active.
    pub fn traveled(&self) -> Option<f64> {
        self.progress.as_ref().map(|p| p.traveled)
    }
}

/// Outcome of evaluating the queue head for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TargetStep {
    /// The head is still in its activation delay.
    Waiting,
    /// Head steered towards the target point.
    Steer { velocity: DVec3, speed: f64 },
    /// Target reached and popped; velocity continues the approach line.
    Reached {
        target: DVec3,
        velocity: DVec3,
        speed: f64,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VelocityTargetQueue {
    queue: VecDeque<VelocityTarget>,
}

impl VelocityTargetQueue {
    pub fn push(&mut self, target: VelocityTarget) {
        self.queue.push_back(target);
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn front(&self) -> Option<&VelocityTarget> {
        self.queue.front()
    }

    /// Whether the head directive is past its delay and steering the train.
    pub fn is_active(&self) -> bool {
        self.queue.front().is_some_and(|t| t.delay_ticks == 0)
    }

    /// Evaluate the head directive for a measuring cart at `position`.
    ///
    /// Returns `None` when the queue is empty.
    pub fn update(&mut self, position: DVec3) -> Option<TargetStep> {
        let head = self.queue.front_mut()?;
        if head.delay_ticks > 0 {
            head.delay_ticks -= 1;
            return Some(TargetStep::Waiting);
        }

        let target = head.target;
        let progress = head.progress.get_or_insert_with(|| {
            let goal_distance = (target - position).length();
            Progress {
                origin: position,
                goal_distance,
                traveled: 0.0,
                last_position: position,
                last_distance: goal_distance,
            }
        });

        progress.traveled += (position - progress.last_position).length();
        progress.last_position = position;
        let distance = (target - position).length();
        let departing = distance > progress.last_distance + EPSILON;
        progress.last_distance = distance;

        let t = if progress.goal_distance <= EPSILON {
            1.0
        } else {
            (progress.traveled / progress.goal_distance).clamp(0.0, 1.0)
        };
        let speed = head.start_speed + (head.goal_speed - head.start_speed) * t;
        let reached = progress.goal_distance <= EPSILON
            || progress.traveled >= progress.goal_distance
            || departing;

        if reached {
            let line = math::horizontal(target - progress.origin).normalize_or_zero();
            self.queue.pop_front();
            Some(TargetStep::Reached {
                target,
                velocity: line * speed,
                speed,
            })
        } else {
            let dir = math::horizontal(target - position).normalize_or_zero();
            Some(TargetStep::Steer {
                velocity: dir * speed,
                speed,
            })
        }
    }
}
