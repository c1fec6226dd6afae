//! Navigation configuration
//!
//! Centralized tuning for grid construction, path search, steering and the
//! agent state machine. `Default` returns the values the game was tuned
//! with; a JSON file only needs to name the fields it overrides.

use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::error::Result;

/// Top-level configuration, one section per subsystem.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct NavConfig {
    pub grid: GridConfig,
    pub pathfinding: PathfindingConfig,
    pub steering: SteeringConfig,
    pub agent: AgentConfig,
    /// Fixed simulation step (seconds).
    pub fixed_dt: f32,
}

impl NavConfig {
    /// Parse a (possibly partial) JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let mut config: NavConfig = serde_json::from_str(json)?;
        if config.fixed_dt <= 0.0 {
            config.fixed_dt = DEFAULT_FIXED_DT;
        }
        Ok(config)
    }

    /// Read and parse a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

const DEFAULT_FIXED_DT: f32 = 0.02;

// ============================================================================
// GRID
// ============================================================================

/// Bounding volume and sampling parameters for `VoxelGrid::build`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// World-space center of the bounding volume.
    pub center: Vec3,
    /// World-space extent of the bounding volume.
    pub size: Vec3,
    /// Uniform edge length of one cell.
    pub cell_diameter: f32,
    /// Height above the volume top the ground probes start from.
    pub probe_height: f32,
    /// Length of the downward ground probe.
    pub probe_distance: f32,
    /// Vertical step of the stair re-scan, as a fraction of `cell_diameter`.
    pub stair_scan_step: f32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            center: Vec3::new(0.0, 4.0, 0.0),
            size: Vec3::new(20.0, 8.0, 20.0),
            cell_diameter: 1.0,
            probe_height: 50.0,
            probe_distance: 100.0,
            stair_scan_step: 0.25,
        }
    }
}

// ============================================================================
// PATHFINDING
// ============================================================================

/// Multipliers for the A* distance estimate.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicWeights {
    /// Per horizontal (x + z) cell of separation.
    pub horizontal: f32,
    /// Per vertical cell when neither end is a stair.
    pub vertical: f32,
    /// Per vertical cell when either end is a stair.
    pub vertical_stair: f32,
}

impl Default for HeuristicWeights {
    fn default() -> Self {
        Self {
            horizontal: 10.0,
            vertical: 1000.0,
            vertical_stair: 5.0,
        }
    }
}

impl HeuristicWeights {
    /// Weights that never overestimate on a 26-connected grid whose cheapest
    /// cell costs `min_cell_cost`: one move shrinks each of |dx|, |dy|, |dz|
    /// by at most one, so (|dx| + |dy| + |dz|) / 3 moves is a lower bound.
    pub fn admissible(min_cell_cost: f32) -> Self {
        let w = min_cell_cost / 3.0;
        Self {
            horizontal: w,
            vertical: w,
            vertical_stair: w,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PathfindingConfig {
    pub heuristic: HeuristicWeights,
    /// Stair cost used while the target stands on a stair.
    pub stair_bias_cost: f32,
    /// Vertical tolerance (fraction of a cell) when splicing stair cells.
    pub stair_level_tolerance: f32,
    /// Same-level points closer than this many cells are redundant.
    pub redundancy_radius: f32,
    /// Reconstruction cap; `None` uses the grid's cell count.
    pub max_reconstruction_steps: Option<usize>,
}

impl Default for PathfindingConfig {
    fn default() -> Self {
        Self {
            heuristic: HeuristicWeights::default(),
            stair_bias_cost: 1.0,
            stair_level_tolerance: 0.5,
            redundancy_radius: 1.5,
            max_reconstruction_steps: None,
        }
    }
}

// ============================================================================
// STEERING
// ============================================================================

/// Boid weights for pack agents.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FlockingConfig {
    pub neighbor_radius: f32,
    pub separation_distance: f32,
    pub separation_weight: f32,
    pub alignment_weight: f32,
    pub cohesion_weight: f32,
}

impl Default for FlockingConfig {
    fn default() -> Self {
        Self {
            neighbor_radius: 3.0,
            separation_distance: 1.5,
            separation_weight: 1.0,
            alignment_weight: 0.5,
            cohesion_weight: 0.5,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SteeringConfig {
    /// Path-following speed (units/sec).
    pub approach_speed: f32,
    /// Horizontal distance at which the current waypoint counts as reached.
    pub waypoint_threshold: f32,
    /// Height above the feet that obstacle and gap probes start from.
    pub body_height: f32,
    /// Tallest ledge the ground snap steps up onto.
    pub step_height: f32,

    // Ledge avoidance
    pub ledge_probe_distance: f32,
    pub ledge_probe_angle_deg: f32,
    pub ledge_probe_depth: f32,
    pub ledge_strength: f32,

    // Forward ledge detection
    pub forward_ledge_samples: usize,
    pub forward_ledge_lookahead: f32,
    pub ledge_reversal_strength: f32,

    // Obstacles
    pub obstacle_lookahead: f32,
    pub obstacle_probe_radius: f32,
    pub obstacle_strength: f32,

    // Narrow gaps
    pub gap_probe_distance: f32,
    pub gap_strength: f32,

    // Separation
    pub separation_radius: f32,
    pub separation_strength: f32,

    // Blend
    pub path_weight: f32,
    pub avoidance_weight: f32,
    /// Weight of the previous tick's output in the exponential smoothing.
    pub smoothing: f32,
    /// Avoidance magnitude at which the forward slowdown saturates.
    pub avoidance_saturation: f32,
    /// Fraction of forward speed removed at full avoidance.
    pub max_slowdown: f32,
    /// Share of the final output taken by the smoothed blend.
    pub override_fraction: f32,

    pub flocking: FlockingConfig,
}

impl Default for SteeringConfig {
    fn default() -> Self {
        Self {
            approach_speed: 1.5,
            waypoint_threshold: 0.6,
            body_height: 0.5,
            step_height: 0.6,

            ledge_probe_distance: 1.0,
            ledge_probe_angle_deg: 60.0,
            ledge_probe_depth: 1.5,
            ledge_strength: 4.0,

            forward_ledge_samples: 5,
            forward_ledge_lookahead: 2.0,
            ledge_reversal_strength: 12.0,

            obstacle_lookahead: 2.0,
            obstacle_probe_radius: 0.3,
            obstacle_strength: 3.0,

            gap_probe_distance: 1.5,
            gap_strength: 2.0,

            separation_radius: 1.5,
            separation_strength: 1.0,

            path_weight: 0.8,
            avoidance_weight: 0.2,
            smoothing: 0.9,
            avoidance_saturation: 4.0,
            max_slowdown: 0.75,
            override_fraction: 0.5,

            flocking: FlockingConfig::default(),
        }
    }
}

// ============================================================================
// AGENT
// ============================================================================

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub aggro_range: f32,
    /// Tracking stops beyond `aggro_range * leash`.
    pub leash: f32,
    pub attack_distance: f32,
    /// Inside this radius an attack starts regardless of cooldown.
    pub force_attack_radius: f32,
    pub attack_duration: f32,
    pub attack_cooldown: f32,
    pub attack_decision_interval: f32,
    /// Probability an attack decision roll succeeds.
    pub attack_chance: f64,
    pub max_concurrent_attackers: usize,
    pub stun_duration: f32,
    pub repath_interval: f32,
    /// Target movement that makes a throttled repath worthwhile.
    pub repath_target_drift: f32,
    /// Patrol speed as a fraction of `approach_speed`.
    pub patrol_speed_factor: f32,
    /// Facing turn rate (per second).
    pub rotation_speed: f32,
    pub tactics: TacticsConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            aggro_range: 15.0,
            leash: 1.5,
            attack_distance: 1.5,
            force_attack_radius: 0.75,
            attack_duration: 1.0,
            attack_cooldown: 3.0,
            attack_decision_interval: 3.0,
            attack_chance: 0.5,
            max_concurrent_attackers: 2,
            stun_duration: 2.0,
            repath_interval: 1.0,
            repath_target_drift: 0.5,
            patrol_speed_factor: 0.5,
            rotation_speed: 5.0,
            tactics: TacticsConfig::default(),
        }
    }
}

/// Movement while engaged but not following a path: skirmisher strafing
/// and retreating, pack stalking and charging.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TacticsConfig {
    /// Skirmishers close in this long before breaking off.
    pub approach_duration: f32,
    pub strafe_time: f32,
    pub strafe_speed: f32,
    pub retreat_time: f32,
    pub retreat_speed: f32,

    /// Distance pack members hold while stalking.
    pub desired_range: f32,
    /// Pull toward `desired_range`, per unit of range error.
    pub approach_weight: f32,
    pub circle_weight: f32,
    pub walk_speed: f32,
    /// Charge speed; stalking never exceeds it either.
    pub run_speed: f32,
    /// Share of the boid force kept while charging.
    pub charge_flock_weight: f32,
}

impl Default for TacticsConfig {
    fn default() -> Self {
        Self {
            approach_duration: 2.0,
            strafe_time: 1.0,
            strafe_speed: 0.75,
            retreat_time: 1.5,
            retreat_speed: 0.75,

            desired_range: 7.0,
            approach_weight: 0.5,
            circle_weight: 1.0,
            walk_speed: 1.5,
            run_speed: 3.0,
            charge_flock_weight: 0.3,
        }
    }
}

impl Default for NavConfig {
    fn default() -> Self {
        Self {
            grid: GridConfig::default(),
            pathfinding: PathfindingConfig::default(),
            steering: SteeringConfig::default(),
            agent: AgentConfig::default(),
            fixed_dt: DEFAULT_FIXED_DT,
        }
    }
}
