// Per-tick steering: follow the current path waypoint and blend in local
// avoidance (ledges, obstacles, narrow gaps, nearby agents).
//
// All vectors are horizontal. The blender is stateless; everything that
// carries over between ticks lives in `SteeringState`.

use glam::{Quat, Vec3};

use super::config::SteeringConfig;
use super::pathfinder::Path;
use super::world::{SurfaceMask, WorldProbe};

// ============================================================================
// STATE
// ============================================================================

/// Path-following state owned by one agent.
#[derive(Debug, Clone, Default)]
pub struct SteeringState {
    path: Option<Path>,
    index: usize,
    /// Smoothed blend from the previous tick.
    smoothed: Vec3,
}

impl SteeringState {
    /// Replace the current path wholesale and restart from its first cell.
    pub fn set_path(&mut self, path: Path) {
        self.path = Some(path);
        self.index = 0;
    }

    pub fn clear_path(&mut self) {
        self.path = None;
        self.index = 0;
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_ref()
    }

    pub fn has_path(&self) -> bool {
        self.path.is_some()
    }

    pub fn waypoint_index(&self) -> usize {
        self.index
    }

    pub fn current_waypoint(&self) -> Option<Vec3> {
        self.path
            .as_ref()
            .and_then(|p| p.get(self.index))
            .map(|c| c.world_position)
    }

    /// Forget the smoothing history, e.g. after a stun.
    pub fn reset_smoothing(&mut self) {
        self.smoothed = Vec3::ZERO;
    }
}

/// Result of one steering tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SteeringOutput {
    /// Velocity to apply this tick.
    pub velocity: Vec3,
    /// Intended direction after obstacle bending.
    pub direction: Vec3,
    /// Summed avoidance before weighting.
    pub avoidance: Vec3,
}

// ============================================================================
// BLENDER
// ============================================================================

pub struct SteeringBlender<'a> {
    config: &'a SteeringConfig,
    probe: &'a dyn WorldProbe,
}

impl<'a> SteeringBlender<'a> {
    pub fn new(config: &'a SteeringConfig, probe: &'a dyn WorldProbe) -> Self {
        Self { config, probe }
    }

    /// Advance along the path and produce this tick's velocity.
    ///
    /// `neighbors` are positions of nearby agents (self excluded);
    /// `extra` is added to the avoidance sum as-is (pack boid force).
    pub fn compute(
        &self,
        state: &mut SteeringState,
        position: Vec3,
        neighbors: &[Vec3],
        extra: Vec3,
    ) -> SteeringOutput {
        let Some(waypoint) = self.advance(state, position) else {
            state.smoothed = Vec3::ZERO;
            return SteeringOutput::default();
        };
        let direction = horizontal(waypoint - position).normalize_or_zero();
        self.steer(state, position, direction, self.config.approach_speed, neighbors, extra)
    }

    /// Move along `direction` at `speed` with local avoidance blended in.
    /// Leaves the path untouched.
    pub fn steer(
        &self,
        state: &mut SteeringState,
        position: Vec3,
        direction: Vec3,
        speed: f32,
        neighbors: &[Vec3],
        extra: Vec3,
    ) -> SteeringOutput {
        let mut direction = horizontal(direction).normalize_or_zero();
        let mut avoidance = Vec3::ZERO;

        avoidance += self.ledge_avoidance(position, direction);
        let reversal = self.forward_ledge(position, direction);
        avoidance += reversal;
        if let Some(avoid) = self.obstacle_avoidance(position, direction) {
            avoidance += avoid * self.config.obstacle_strength;
            direction = (direction + avoid).normalize_or(direction);
        }
        avoidance += self.gap_steering(position, direction);
        avoidance += self.separation(position, neighbors);
        avoidance += horizontal(extra);

        // Nothing ahead to stand on: back off now, without the forward term
        // or the smoothing history still pointing over the drop.
        if reversal != Vec3::ZERO {
            let velocity = (avoidance * self.config.avoidance_weight).clamp_length_max(speed);
            state.smoothed = velocity;
            return SteeringOutput {
                velocity,
                direction,
                avoidance,
            };
        }

        let (velocity, smoothed) = self.blend_at(direction, speed, avoidance, state.smoothed);
        state.smoothed = smoothed;
        SteeringOutput {
            velocity,
            direction,
            avoidance,
        }
    }

    /// Skip waypoints already within reach. Clears the path past its end.
    fn advance(&self, state: &mut SteeringState, position: Vec3) -> Option<Vec3> {
        let path = state.path.as_ref()?;
        while let Some(cell) = path.get(state.index) {
            if horizontal(cell.world_position - position).length() > self.config.waypoint_threshold {
                return Some(cell.world_position);
            }
            state.index += 1;
        }
        state.clear_path();
        None
    }

    /// Lateral probes at +-angle around `direction`. An unsupported probe
    /// pushes back along itself, scaled by how far off-axis it points.
    pub fn ledge_avoidance(&self, position: Vec3, direction: Vec3) -> Vec3 {
        if direction == Vec3::ZERO {
            return Vec3::ZERO;
        }
        let angle = self.config.ledge_probe_angle_deg.to_radians();
        let mut push = Vec3::ZERO;
        for a in [0.0, angle, -angle] {
            let probe_dir = Quat::from_rotation_y(a) * direction;
            let point = position + probe_dir * self.config.ledge_probe_distance;
            if !self.grounded(point, self.config.ledge_probe_depth) {
                let off_axis = 1.0 - probe_dir.dot(direction).abs();
                push -= probe_dir * off_axis * self.config.ledge_strength;
            }
        }
        push
    }

    /// Sample ground along `direction`; reverse hard when too many samples
    /// have nothing underneath.
    pub fn forward_ledge(&self, position: Vec3, direction: Vec3) -> Vec3 {
        let samples = self.config.forward_ledge_samples;
        if direction == Vec3::ZERO || samples == 0 {
            return Vec3::ZERO;
        }
        let missing = (1..=samples)
            .filter(|&i| {
                let reach = self.config.forward_ledge_lookahead * i as f32 / samples as f32;
                !self.grounded(position + direction * reach, self.config.ledge_probe_depth)
            })
            .count();
        if missing * 3 > samples {
            -direction * self.config.ledge_reversal_strength
        } else {
            Vec3::ZERO
        }
    }

    /// Sphere cast ahead for obstacles. Returns the sidestep direction
    /// (perpendicular to the hit normal, on the side of `direction`)
    /// weighted by proximity.
    pub fn obstacle_avoidance(&self, position: Vec3, direction: Vec3) -> Option<Vec3> {
        if direction == Vec3::ZERO {
            return None;
        }
        let hit = self.probe.sphere_cast(
            self.body(position),
            direction,
            self.config.obstacle_probe_radius,
            self.config.obstacle_lookahead,
            SurfaceMask::OBSTACLE,
        )?;
        let mut side = horizontal(hit.normal.cross(Vec3::Y)).normalize_or_zero();
        if side.dot(direction) < 0.0 {
            side = -side;
        }
        let weight = 1.0 - hit.distance / self.config.obstacle_lookahead;
        Some(side * weight.max(0.0))
    }

    /// When obstacles close in on both sides, steer toward the middle.
    pub fn gap_steering(&self, position: Vec3, direction: Vec3) -> Vec3 {
        if direction == Vec3::ZERO {
            return Vec3::ZERO;
        }
        let origin = self.body(position);
        let left = Vec3::Y.cross(direction);
        let cast = |dir: Vec3| {
            self.probe
                .raycast(origin, dir, self.config.gap_probe_distance, SurfaceMask::OBSTACLE)
        };
        match (cast(left), cast(-left)) {
            (Some(l), Some(r)) => {
                let midpoint = (l.point + r.point) * 0.5;
                horizontal(midpoint - origin) * self.config.gap_strength
            }
            _ => Vec3::ZERO,
        }
    }

    /// Push away from agents inside the separation radius, harder when closer.
    pub fn separation(&self, position: Vec3, neighbors: &[Vec3]) -> Vec3 {
        let mut push = Vec3::ZERO;
        for other in neighbors {
            let away = horizontal(position - *other);
            let dist = away.length();
            if dist > 0.0 && dist < self.config.separation_radius {
                push += away / dist / dist;
            }
        }
        push * self.config.separation_strength
    }

    /// Blend path velocity with avoidance. Returns (velocity, smoothed).
    pub fn blend(&self, direction: Vec3, avoidance: Vec3, previous: Vec3) -> (Vec3, Vec3) {
        self.blend_at(direction, self.config.approach_speed, avoidance, previous)
    }

    fn blend_at(&self, direction: Vec3, speed: f32, avoidance: Vec3, previous: Vec3) -> (Vec3, Vec3) {
        let c = self.config;
        let path_velocity = direction * speed;
        let raw = path_velocity * c.path_weight + avoidance * c.avoidance_weight;
        let smoothed = previous.lerp(raw, 1.0 - c.smoothing);

        let influence = if c.avoidance_saturation > 0.0 {
            (avoidance.length() / c.avoidance_saturation).min(1.0)
        } else {
            0.0
        };
        let slowed = path_velocity * (1.0 - c.max_slowdown * influence);
        (slowed.lerp(smoothed, c.override_fraction), smoothed)
    }

    fn grounded(&self, point: Vec3, depth: f32) -> bool {
        self.probe
            .has_ground_below(self.body(point), depth + self.config.body_height)
    }

    #[inline]
    fn body(&self, feet: Vec3) -> Vec3 {
        feet + Vec3::Y * self.config.body_height
    }
}

#[inline]
fn horizontal(v: Vec3) -> Vec3 {
    Vec3::new(v.x, 0.0, v.z)
}
