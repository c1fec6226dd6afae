// World query port consumed by grid construction and steering.
//
// The host engine answers these queries from its physics scene. `BlockWorld`
// is a small in-process answerer built from boxes and ramps; tests, the
// bench and the demo binary use it in place of an engine.

use glam::Vec3;

const EPSILON: f32 = 1e-6;

// ============================================================================
// SURFACE CLASSIFICATION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceKind {
    Ground,
    Stair,
    Obstacle,
}

/// Which surface kinds a probe reports. Plays the role of a layer mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceMask(u8);

impl SurfaceMask {
    pub const GROUND: Self = Self(1);
    pub const STAIR: Self = Self(1 << 1);
    pub const OBSTACLE: Self = Self(1 << 2);
    /// Anything an agent can stand on.
    pub const WALKABLE: Self = Self(Self::GROUND.0 | Self::STAIR.0);
    pub const ALL: Self = Self(Self::WALKABLE.0 | Self::OBSTACLE.0);

    #[inline]
    pub fn contains(self, kind: SurfaceKind) -> bool {
        let bit = match kind {
            SurfaceKind::Ground => Self::GROUND.0,
            SurfaceKind::Stair => Self::STAIR.0,
            SurfaceKind::Obstacle => Self::OBSTACLE.0,
        };
        self.0 & bit != 0
    }
}

impl std::ops::BitOr for SurfaceMask {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Nearest surface hit by a probe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub point: Vec3,
    /// Unit surface normal, facing back along the probe.
    pub normal: Vec3,
    pub distance: f32,
    pub kind: SurfaceKind,
}

// ============================================================================
// QUERY PORT
// ============================================================================

/// Read-only physics queries against the level geometry.
pub trait WorldProbe {
    /// Cast a ray from `origin` along unit `direction`, returning the nearest
    /// surface within `max_distance` whose kind is in `mask`.
    fn raycast(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        mask: SurfaceMask,
    ) -> Option<RayHit>;

    /// Sweep a sphere of `radius` along the ray. Defaults to a plain ray.
    fn sphere_cast(
        &self,
        origin: Vec3,
        direction: Vec3,
        _radius: f32,
        max_distance: f32,
        mask: SurfaceMask,
    ) -> Option<RayHit> {
        self.raycast(origin, direction, max_distance, mask)
    }

    /// True if something walkable lies within `depth` below `point`.
    fn has_ground_below(&self, point: Vec3, depth: f32) -> bool {
        self.raycast(point, Vec3::NEG_Y, depth, SurfaceMask::WALKABLE)
            .is_some()
    }
}

// ============================================================================
// BLOCK WORLD
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum Shape {
    /// Axis-aligned box.
    Cuboid { min: Vec3, max: Vec3 },
    /// Sloped top surface over an XZ footprint, rising along +X from
    /// `min.y` at `min.x` to `max.y` at `max.x`. Only the top is solid.
    Ramp { min: Vec3, max: Vec3 },
}

#[derive(Debug, Clone, Copy)]
struct Solid {
    shape: Shape,
    kind: SurfaceKind,
}

/// Level geometry made of tagged boxes and ramps.
#[derive(Debug, Clone, Default)]
pub struct BlockWorld {
    solids: Vec<Solid>,
}

impl BlockWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_box(mut self, min: Vec3, max: Vec3, kind: SurfaceKind) -> Self {
        self.add_box(min, max, kind);
        self
    }

    pub fn add_box(&mut self, min: Vec3, max: Vec3, kind: SurfaceKind) {
        self.solids.push(Solid {
            shape: Shape::Cuboid {
                min: min.min(max),
                max: min.max(max),
            },
            kind,
        });
    }

    pub fn with_ramp(mut self, min: Vec3, max: Vec3, kind: SurfaceKind) -> Self {
        self.solids.push(Solid {
            shape: Shape::Ramp { min, max },
            kind,
        });
        self
    }

    /// A staircase climbing along +X. Step `i` covers
    /// `[start.x + i*depth, start.x + (i+1)*depth]` and tops out at
    /// `start.y + (i+1)*rise`; every step is solid down to `start.y`.
    pub fn with_staircase(
        mut self,
        start: Vec3,
        width: f32,
        depth: f32,
        rise: f32,
        steps: usize,
    ) -> Self {
        for i in 0..steps {
            let x0 = start.x + i as f32 * depth;
            self.add_box(
                Vec3::new(x0, start.y, start.z),
                Vec3::new(x0 + depth, start.y + (i + 1) as f32 * rise, start.z + width),
                SurfaceKind::Stair,
            );
        }
        self
    }

    pub fn solid_count(&self) -> usize {
        self.solids.len()
    }
}

impl WorldProbe for BlockWorld {
    fn raycast(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        mask: SurfaceMask,
    ) -> Option<RayHit> {
        self.nearest(origin, direction, 0.0, max_distance, mask)
    }

    fn sphere_cast(
        &self,
        origin: Vec3,
        direction: Vec3,
        radius: f32,
        max_distance: f32,
        mask: SurfaceMask,
    ) -> Option<RayHit> {
        self.nearest(origin, direction, radius.max(0.0), max_distance, mask)
    }
}

impl BlockWorld {
    fn nearest(
        &self,
        origin: Vec3,
        direction: Vec3,
        radius: f32,
        max_distance: f32,
        mask: SurfaceMask,
    ) -> Option<RayHit> {
        let dir = direction.normalize_or_zero();
        if dir == Vec3::ZERO {
            return None;
        }
        let mut best: Option<RayHit> = None;
        for solid in self.solids.iter().filter(|s| mask.contains(s.kind)) {
            let hit = match solid.shape {
                // Minkowski-inflated box approximates the swept sphere.
                Shape::Cuboid { min, max } => ray_aabb(origin, dir, min - radius, max + radius),
                Shape::Ramp { min, max } => ray_ramp(origin, dir, min, max),
            };
            let Some((t, normal)) = hit else { continue };
            if t > max_distance {
                continue;
            }
            if best.is_none_or(|b| t < b.distance) {
                best = Some(RayHit {
                    point: origin + dir * t,
                    normal,
                    distance: t,
                    kind: solid.kind,
                });
            }
        }
        best
    }
}

/// Slab test. Returns entry distance and entry-face normal; rays starting
/// inside the box do not hit it.
fn ray_aabb(origin: Vec3, dir: Vec3, min: Vec3, max: Vec3) -> Option<(f32, Vec3)> {
    let mut t_enter = f32::NEG_INFINITY;
    let mut t_exit = f32::INFINITY;
    let mut normal = Vec3::ZERO;

    for axis in 0..3 {
        let o = origin[axis];
        let d = dir[axis];
        if d.abs() < EPSILON {
            if o < min[axis] || o > max[axis] {
                return None;
            }
            continue;
        }
        let inv = 1.0 / d;
        let (t0, t1) = {
            let a = (min[axis] - o) * inv;
            let b = (max[axis] - o) * inv;
            if a <= b { (a, b) } else { (b, a) }
        };
        if t0 > t_enter {
            t_enter = t0;
            normal = Vec3::ZERO;
            normal[axis] = -d.signum();
        }
        t_exit = t_exit.min(t1);
        if t_enter > t_exit {
            return None;
        }
    }

    if t_enter < 0.0 {
        return None;
    }
    Some((t_enter, normal))
}

fn ray_ramp(origin: Vec3, dir: Vec3, min: Vec3, max: Vec3) -> Option<(f32, Vec3)> {
    let run = max.x - min.x;
    if run.abs() < EPSILON {
        return None;
    }
    let slope = (max.y - min.y) / run;
    let n = Vec3::new(-slope, 1.0, 0.0).normalize();
    let denom = n.dot(dir);
    if denom.abs() < EPSILON {
        return None;
    }
    let t = n.dot(min - origin) / denom;
    if t < 0.0 {
        return None;
    }
    let p = origin + dir * t;
    let (x0, x1) = (min.x.min(max.x), min.x.max(max.x));
    let (z0, z1) = (min.z.min(max.z), min.z.max(max.z));
    if p.x < x0 || p.x > x1 || p.z < z0 || p.z > z1 {
        return None;
    }
    Some((t, if denom > 0.0 { -n } else { n }))
}
