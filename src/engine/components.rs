// ECS components and resources for navigating agents.

use bevy_ecs::prelude::*;
use glam::Vec3;
use rand::SeedableRng;
use rand::rngs::StdRng;

use super::agent::{Brain, Style};
use super::config::NavConfig;
use super::navigation::VoxelGrid;
use super::steering::SteeringState;
use super::world::WorldProbe;

// ============================================================================
// COMPONENTS
// ============================================================================

/// Feet position and horizontal facing of an entity.
#[derive(Component, Debug, Clone, Copy)]
pub struct Transform {
    pub position: Vec3,
    /// Horizontal unit vector.
    pub facing: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            facing: Vec3::Z,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }
}

/// Velocity of an entity (units per second).
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Velocity {
    pub linear: Vec3,
}

/// The entity agents chase. Exactly one is expected.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Target;

/// Everything one agent owns: its brain, its path and repath bookkeeping.
#[derive(Component, Debug, Clone, Default)]
pub struct NavAgent {
    pub brain: Brain,
    pub steering: SteeringState,
    /// Seconds until the next throttled repath.
    pub repath_timer: f32,
    /// Goal the current path was searched for.
    pub last_goal: Option<Vec3>,
    /// The last search found no path or faulted.
    pub search_failed: bool,
}

impl NavAgent {
    pub fn new(brain: Brain) -> Self {
        Self {
            brain,
            ..Self::default()
        }
    }

    pub fn patrolling() -> Self {
        Self::new(Brain::new(true))
    }

    /// Closes in, then strafes or backs off before trying again.
    pub fn skirmisher() -> Self {
        Self::new(Brain::new(false).with_style(Style::Skirmish))
    }
}

/// Pack membership. Members stalk and charge instead of pathing straight
/// in; agents sharing an id flock together.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pack {
    pub id: u32,
}

/// Looping list of points walked while patrolling.
#[derive(Component, Debug, Clone)]
pub struct PatrolRoute {
    points: Vec<Vec3>,
    next: usize,
}

impl PatrolRoute {
    pub fn new(points: Vec<Vec3>) -> Self {
        Self { points, next: 0 }
    }

    pub fn current(&self) -> Option<Vec3> {
        self.points.get(self.next).copied()
    }

    pub fn advance(&mut self) {
        if !self.points.is_empty() {
            self.next = (self.next + 1) % self.points.len();
        }
    }
}

// ============================================================================
// RESOURCES
// ============================================================================

/// The navigation grid, read-only while the schedule runs.
#[derive(Resource)]
pub struct NavGrid(pub VoxelGrid);

/// World queries for steering and ground snapping.
#[derive(Resource)]
pub struct Probe(pub Box<dyn WorldProbe + Send + Sync>);

#[derive(Resource, Debug, Clone, Copy)]
pub struct FixedTime {
    pub dt: f32,
}

#[derive(Resource, Debug, Clone, Default)]
pub struct Settings(pub NavConfig);

/// Seeded randomness for attack decisions.
#[derive(Resource)]
pub struct SimRng(pub StdRng);

impl SimRng {
    pub fn seeded(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}
