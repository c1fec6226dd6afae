// Boid force for pack agents: separation, alignment and cohesion over the
// pack mates inside `neighbor_radius`. The result is horizontal; it feeds
// the steering avoidance sum.

use glam::Vec3;

use super::config::FlockingConfig;

/// Position and velocity of one pack mate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Boid {
    pub position: Vec3,
    pub velocity: Vec3,
}

/// Weighted boid force for an agent at `position`.
///
/// Mates outside `neighbor_radius` are ignored. Only mates closer than
/// `separation_distance` push away, each by `1 / distance`.
pub fn boid_force(
    position: Vec3,
    mates: impl IntoIterator<Item = Boid>,
    config: &FlockingConfig,
) -> Vec3 {
    let mut separation = Vec3::ZERO;
    let mut alignment = Vec3::ZERO;
    let mut center = Vec3::ZERO;
    let mut count = 0u32;

    for mate in mates {
        let away = position - mate.position;
        let dist = away.length();
        if dist > config.neighbor_radius {
            continue;
        }
        count += 1;
        if dist > 0.0 && dist < config.separation_distance {
            separation += away / dist / dist;
        }
        alignment += mate.velocity;
        center += mate.position;
    }

    if count == 0 {
        return Vec3::ZERO;
    }
    let n = count as f32;
    let cohesion = center / n - position;
    let force = config.separation_weight * (separation / n)
        + config.alignment_weight * (alignment / n)
        + config.cohesion_weight * cohesion;
    Vec3::new(force.x, 0.0, force.z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn still(x: f32, z: f32) -> Boid {
        Boid {
            position: Vec3::new(x, 0.0, z),
            velocity: Vec3::ZERO,
        }
    }

    #[test]
    fn lone_agent_feels_nothing() {
        let config = FlockingConfig::default();
        assert_eq!(boid_force(Vec3::ZERO, Vec::<Boid>::new(), &config), Vec3::ZERO);
        assert_eq!(boid_force(Vec3::ZERO, [still(50.0, 0.0)], &config), Vec3::ZERO);
    }

    #[test]
    fn distant_mate_pulls_in() {
        let config = FlockingConfig::default();
        // 2.5 away: inside the neighbour radius, outside separation.
        let force = boid_force(Vec3::ZERO, [still(2.5, 0.0)], &config);
        assert_relative_eq!(force.x, 0.5 * 2.5);
        assert_relative_eq!(force.z, 0.0);
    }

    #[test]
    fn close_mate_pushes_away() {
        let config = FlockingConfig {
            cohesion_weight: 0.0,
            ..FlockingConfig::default()
        };
        let force = boid_force(Vec3::ZERO, [still(0.5, 0.0)], &config);
        assert!(force.x < 0.0);
        assert_relative_eq!(force.x, -1.0 / 0.5);
    }

    #[test]
    fn alignment_matches_mates_heading() {
        let config = FlockingConfig {
            separation_weight: 0.0,
            cohesion_weight: 0.0,
            ..FlockingConfig::default()
        };
        let mate = Boid {
            position: Vec3::new(1.0, 0.0, 1.0),
            velocity: Vec3::new(0.0, 3.0, 2.0),
        };
        let force = boid_force(Vec3::ZERO, [mate], &config);
        assert_relative_eq!(force.z, 1.0);
        assert_relative_eq!(force.y, 0.0);
    }
}
