// ECS systems for the navigation tick.
//
// One fixed tick runs, in order: brain -> path -> steering -> movement.
// Systems only touch the agent they are iterating; cross-agent reads go
// through a snapshot taken at the start of the steering pass.

use std::collections::HashMap;

use bevy_ecs::prelude::*;
use glam::Vec3;
use log::{debug, error, info, warn};

use super::agent::{AgentState, AttackCoordinator, Motion, Sighting, Style};
use super::components::*;
use super::config::NavConfig;
use super::flocking::{Boid, boid_force};
use super::navigation::VoxelGrid;
use super::pathfinder::{CostWeighting, PathFinder};
use super::spatial::SpatialGrid;
use super::steering::SteeringBlender;
use super::world::{SurfaceMask, WorldProbe};

// ============================================================================
// SETUP
// ============================================================================

/// The fixed-tick schedule. Run it once per `FixedTime::dt`.
pub fn build_schedule() -> Schedule {
    let mut schedule = Schedule::default();
    schedule.add_systems((brain_system, path_system, steering_system, movement_system).chain());
    schedule
}

/// Insert every resource the schedule reads.
pub fn insert_resources(
    world: &mut World,
    config: NavConfig,
    grid: VoxelGrid,
    probe: impl WorldProbe + Send + Sync + 'static,
    seed: u64,
) {
    world.insert_resource(FixedTime { dt: config.fixed_dt });
    world.insert_resource(AttackCoordinator::new(config.agent.max_concurrent_attackers));
    world.insert_resource(NavGrid(grid));
    world.insert_resource(Probe(Box::new(probe)));
    world.insert_resource(SimRng::seeded(seed));
    world.insert_resource(Settings(config));
}

/// Stun `entity` for the configured duration. False if it is not an agent.
pub fn stun_agent(world: &mut World, entity: Entity) -> bool {
    if !world.contains_resource::<AttackCoordinator>() {
        warn!("cannot stun {entity}: no attack coordinator");
        return false;
    }
    let duration = world
        .get_resource::<Settings>()
        .map(|s| s.0.agent.stun_duration)
        .unwrap_or_default();
    world.resource_scope(|world, mut coordinator: Mut<AttackCoordinator>| {
        let Some(mut agent) = world.get_mut::<NavAgent>(entity) else {
            return false;
        };
        agent.brain.stun(entity, duration, &mut coordinator);
        agent.steering.reset_smoothing();
        info!("agent {entity} stunned for {duration:.1}s");
        true
    })
}

// ============================================================================
// SYSTEMS
// ============================================================================

/// Run each agent's state machine against the target.
pub fn brain_system(
    mut agents: Query<(Entity, &Transform, &mut NavAgent, Option<&Pack>), Without<Target>>,
    targets: Query<&Transform, With<Target>>,
    settings: Res<Settings>,
    time: Res<FixedTime>,
    coordinator: Option<ResMut<AttackCoordinator>>,
    rng: Option<ResMut<SimRng>>,
    mut warned: Local<bool>,
) {
    let (Some(mut coordinator), Some(mut rng)) = (coordinator, rng) else {
        if !*warned {
            warn!("no attack coordinator or rng; agents will idle");
            *warned = true;
        }
        for (entity, _, mut agent, _) in agents.iter_mut() {
            agent.brain.halt(entity, None);
            agent.steering.clear_path();
            agent.last_goal = None;
        }
        return;
    };
    let target = targets.get_single().ok().map(|t| t.position);
    let config = &settings.0.agent;

    for (entity, transform, mut agent, pack) in agents.iter_mut() {
        if pack.is_some() && agent.brain.style() != Style::Pack {
            agent.brain.set_style(Style::Pack);
        }
        let sighting = target.map(|t| Sighting::between(transform.position, t));
        let Some(before) = agent.brain.tick(
            entity,
            sighting,
            time.dt,
            config,
            &mut coordinator,
            &mut rng.0,
        ) else {
            continue;
        };

        let after = agent.brain.state();
        if target.is_none() {
            warn!("agent {entity}: no target, going idle");
        } else {
            info!("agent {entity}: {} -> {}", before.name(), after.name());
        }
        if after == AgentState::Idle {
            agent.steering.clear_path();
            agent.last_goal = None;
        }
    }
}

/// Recompute paths, throttled per agent.
pub fn path_system(
    mut agents: Query<(Entity, &Transform, &mut NavAgent, Option<&mut PatrolRoute>)>,
    targets: Query<&Transform, With<Target>>,
    grid: Option<Res<NavGrid>>,
    settings: Res<Settings>,
    time: Res<FixedTime>,
    mut warned: Local<bool>,
) {
    let Some(grid) = grid else {
        if !*warned {
            warn!("no navigation grid; agents will not path");
            *warned = true;
        }
        return;
    };
    let target = targets.get_single().ok().map(|t| t.position);
    let config = &settings.0;

    for (entity, transform, mut agent, route) in agents.iter_mut() {
        agent.repath_timer -= time.dt;
        let position = transform.position;

        let goal = match agent.brain.state() {
            _ if agent.brain.chases_target() => target,
            AgentState::Patrol => route.and_then(|mut route| {
                let point = route.current()?;
                if flat_distance(point, position) <= config.steering.waypoint_threshold {
                    route.advance();
                }
                route.current()
            }),
            _ => None,
        };
        let Some(goal) = goal else { continue };

        let stale = agent
            .last_goal
            .is_none_or(|g| g.distance(goal) >= config.agent.repath_target_drift);
        let due = agent.repath_timer <= 0.0;
        // After a failed search only the interval triggers a retry.
        let needed = if agent.steering.has_path() {
            due && stale
        } else if agent.search_failed {
            due
        } else {
            due || stale
        };
        if !needed {
            continue;
        }

        agent.repath_timer = config.agent.repath_interval;
        agent.last_goal = Some(goal);

        let weighting = CostWeighting::for_target(&grid.0, goal, &config.pathfinding);
        let finder = PathFinder::new(&grid.0, &config.pathfinding).with_weighting(weighting);
        match finder.find_route(position, goal) {
            Ok(Some(path)) => {
                debug!("agent {entity}: new path, {} points", path.len());
                agent.steering.set_path(path);
                agent.search_failed = false;
            }
            Ok(None) => {
                debug!("agent {entity}: goal unreachable");
                agent.steering.clear_path();
                agent.search_failed = true;
            }
            Err(err) => {
                error!("agent {entity}: path search failed: {err}");
                agent.steering.clear_path();
                agent.search_failed = true;
            }
        }
    }
}

/// Turn paths and tactics into velocities.
pub fn steering_system(
    mut agents: Query<(Entity, &Transform, &mut Velocity, &mut NavAgent, Option<&Pack>)>,
    targets: Query<&Transform, (With<Target>, Without<NavAgent>)>,
    probe: Option<Res<Probe>>,
    settings: Res<Settings>,
    mut warned: Local<bool>,
) {
    let Some(probe) = probe else {
        if !*warned {
            warn!("no world probe; agents will stand still");
            *warned = true;
        }
        for (_, _, mut velocity, _, _) in agents.iter_mut() {
            velocity.linear = Vec3::ZERO;
        }
        return;
    };

    let config = &settings.0.steering;
    let target = targets.get_single().ok().map(|t| t.position);
    let snapshot: Vec<(Entity, Vec3, Vec3, Option<u32>)> = agents
        .iter()
        .map(|(e, t, v, _, pack)| (e, t.position, v.linear, pack.map(|p| p.id)))
        .collect();
    let positions: Vec<Vec3> = snapshot.iter().map(|s| s.1).collect();
    let slots: HashMap<Entity, usize> = snapshot
        .iter()
        .enumerate()
        .map(|(i, s)| (s.0, i))
        .collect();
    let radius = config.separation_radius.max(config.flocking.neighbor_radius);
    let spatial = SpatialGrid::covering(&positions, radius);
    let blender = SteeringBlender::new(config, &*probe.0);

    for (entity, transform, mut velocity, mut agent, pack) in agents.iter_mut() {
        let state = agent.brain.state();
        if !state.is_mobile() {
            velocity.linear = Vec3::ZERO;
            if matches!(state, AgentState::Stunned { .. }) {
                agent.steering.reset_smoothing();
            }
            continue;
        }

        let sighting = target.map(|t| Sighting::between(transform.position, t));
        let motion = agent.brain.motion(sighting, &settings.0.agent);
        if motion == Motion::Still {
            velocity.linear = Vec3::ZERO;
            continue;
        }

        let Some(&me) = slots.get(&entity) else { continue };
        let nearby = spatial.neighbors_within(&positions, transform.position, radius, me);
        let neighbors: Vec<Vec3> = nearby.iter().map(|&i| positions[i]).collect();

        let flock = match pack {
            Some(pack) => boid_force(
                transform.position,
                nearby
                    .iter()
                    .filter(|&&i| snapshot[i].3 == Some(pack.id))
                    .map(|&i| Boid {
                        position: snapshot[i].1,
                        velocity: snapshot[i].2,
                    }),
                &config.flocking,
            ),
            None => Vec3::ZERO,
        };
        let flock = match state {
            AgentState::Charge => flock * settings.0.agent.tactics.charge_flock_weight,
            _ => flock,
        };

        velocity.linear = match motion {
            Motion::FollowPath { speed_scale } => {
                blender
                    .compute(&mut agent.steering, transform.position, &neighbors, flock)
                    .velocity
                    * speed_scale
            }
            Motion::Direct(wanted) => {
                blender
                    .steer(
                        &mut agent.steering,
                        transform.position,
                        wanted,
                        wanted.length(),
                        &neighbors,
                        flock,
                    )
                    .velocity
            }
            Motion::Still => Vec3::ZERO,
        };
    }
}

/// Integrate velocity, turn toward the motion and keep feet on the ground.
pub fn movement_system(
    mut query: Query<(&mut Transform, &Velocity, Option<&NavAgent>)>,
    probe: Option<Res<Probe>>,
    settings: Res<Settings>,
    time: Res<FixedTime>,
) {
    let dt = time.dt;
    let steering = &settings.0.steering;
    let turn = (settings.0.agent.rotation_speed * dt).min(1.0);

    for (mut transform, velocity, agent) in query.iter_mut() {
        transform.position += velocity.linear * dt;

        let locked = agent.and_then(|a| match a.brain.state() {
            AgentState::Attack { facing, .. } => Some(facing),
            _ => None,
        });
        let heading = Vec3::new(velocity.linear.x, 0.0, velocity.linear.z);
        if let Some(facing) = locked.filter(|f| *f != Vec3::ZERO) {
            transform.facing = facing;
        } else if heading.length_squared() > 1e-6 {
            let wanted = heading.normalize();
            transform.facing = transform.facing.lerp(wanted, turn).normalize_or(wanted);
        }

        if let Some(probe) = &probe {
            let lift = steering.body_height + steering.step_height;
            let origin = transform.position + Vec3::Y * lift;
            let reach = lift + steering.ledge_probe_depth;
            if let Some(hit) = probe.0.raycast(origin, Vec3::NEG_Y, reach, SurfaceMask::WALKABLE) {
                transform.position.y = hit.point.y;
            }
        }
    }
}

#[inline]
fn flat_distance(a: Vec3, b: Vec3) -> f32 {
    Vec3::new(a.x - b.x, 0.0, a.z - b.z).length()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::world::{BlockWorld, SurfaceKind};
    use glam::UVec3;

    fn floor() -> BlockWorld {
        BlockWorld::new().with_box(
            Vec3::new(0.0, -1.0, 0.0),
            Vec3::new(12.0, 0.0, 12.0),
            SurfaceKind::Ground,
        )
    }

    fn world_with(config: NavConfig) -> World {
        let mut world = World::new();
        let grid = VoxelGrid::flat(UVec3::new(12, 1, 12), 1.0, Vec3::new(0.0, -0.5, 0.0)).unwrap();
        insert_resources(&mut world, config, grid, floor(), 3);
        world
    }

    #[test]
    fn agent_acquires_a_path_and_closes_in() {
        let mut world = world_with(NavConfig::default());
        world.spawn((Transform::from_position(Vec3::new(10.5, 0.0, 10.5)), Target));
        let agent = world
            .spawn((
                Transform::from_position(Vec3::new(1.5, 0.0, 1.5)),
                Velocity::default(),
                NavAgent::default(),
            ))
            .id();

        let mut schedule = build_schedule();
        schedule.run(&mut world);
        let nav = world.get::<NavAgent>(agent).unwrap();
        assert_eq!(nav.brain.state(), AgentState::Approach);
        assert!(nav.steering.has_path());

        let start = Vec3::new(10.5, 0.0, 10.5).distance(Vec3::new(1.5, 0.0, 1.5));
        for _ in 0..200 {
            schedule.run(&mut world);
        }
        let pos = world.get::<Transform>(agent).unwrap().position;
        assert!(pos.distance(Vec3::new(10.5, 0.0, 10.5)) < start - 3.0);
        assert!(pos.y.abs() < 1e-4, "agent left the floor: {pos}");
    }

    #[test]
    fn idle_agents_stay_put() {
        let mut world = world_with(NavConfig::default());
        let agent = world
            .spawn((
                Transform::from_position(Vec3::new(1.5, 0.0, 1.5)),
                Velocity::default(),
                NavAgent::default(),
            ))
            .id();
        let mut schedule = build_schedule();
        for _ in 0..10 {
            schedule.run(&mut world);
        }
        assert_eq!(world.get::<Velocity>(agent).unwrap().linear, Vec3::ZERO);
        assert_eq!(
            world.get::<NavAgent>(agent).unwrap().brain.state(),
            AgentState::Idle
        );
    }

    #[test]
    fn stunned_agents_stop_and_release_their_slot() {
        let mut world = world_with(NavConfig::default());
        world.spawn((Transform::from_position(Vec3::new(2.0, 0.0, 1.5)), Target));
        let agent = world
            .spawn((
                Transform::from_position(Vec3::new(1.5, 0.0, 1.5)),
                Velocity::default(),
                NavAgent::default(),
            ))
            .id();
        let mut schedule = build_schedule();
        schedule.run(&mut world);
        schedule.run(&mut world);
        // Inside the forced-attack radius after entering approach.
        assert!(world.resource::<AttackCoordinator>().holds(agent));

        assert!(stun_agent(&mut world, agent));
        assert!(!world.resource::<AttackCoordinator>().holds(agent));
        schedule.run(&mut world);
        assert!(matches!(
            world.get::<NavAgent>(agent).unwrap().brain.state(),
            AgentState::Stunned { .. }
        ));
        assert_eq!(world.get::<Velocity>(agent).unwrap().linear, Vec3::ZERO);
    }

    #[test]
    fn patrol_walks_the_route_at_reduced_speed() {
        let mut world = world_with(NavConfig::default());
        world.spawn((Transform::from_position(Vec3::new(100.0, 0.0, 100.0)), Target));
        let agent = world
            .spawn((
                Transform::from_position(Vec3::new(1.5, 0.0, 1.5)),
                Velocity::default(),
                NavAgent::patrolling(),
                PatrolRoute::new(vec![Vec3::new(8.5, 0.0, 1.5), Vec3::new(1.5, 0.0, 1.5)]),
            ))
            .id();
        let mut schedule = build_schedule();
        for _ in 0..20 {
            schedule.run(&mut world);
        }
        let speed = world.get::<Velocity>(agent).unwrap().linear.length();
        let config = NavConfig::default();
        assert!(speed > 0.0);
        assert!(speed <= config.steering.approach_speed * config.agent.patrol_speed_factor + 1e-4);
        assert!(world.get::<Transform>(agent).unwrap().position.x > 1.5);
    }

    #[test]
    fn missing_probe_freezes_agents() {
        let mut world = world_with(NavConfig::default());
        world.remove_resource::<Probe>();
        world.spawn((Transform::from_position(Vec3::new(5.5, 0.0, 5.5)), Target));
        let agent = world
            .spawn((
                Transform::from_position(Vec3::new(1.5, 0.0, 1.5)),
                Velocity {
                    linear: Vec3::X,
                },
                NavAgent::default(),
            ))
            .id();
        build_schedule().run(&mut world);
        assert_eq!(world.get::<Velocity>(agent).unwrap().linear, Vec3::ZERO);
    }

    #[test]
    fn unreachable_moving_target_is_searched_once_per_interval() {
        let config = NavConfig::default();
        let interval_ticks = (config.agent.repath_interval / config.fixed_dt).round() as u32;
        let mut grid =
            VoxelGrid::flat(UVec3::new(12, 1, 12), 1.0, Vec3::new(0.0, -0.5, 0.0)).unwrap();
        for z in 0..12 {
            grid.set_walkable(UVec3::new(6, 0, z), false).unwrap();
        }
        let mut world = World::new();
        insert_resources(&mut world, config, grid, floor(), 3);

        let target_at = |tick: u32| Vec3::new(9.5, 0.0, 1.5 + (tick % 40) as f32 * 0.25);
        let target = world.spawn((Transform::from_position(target_at(0)), Target)).id();
        let agent = world
            .spawn((
                Transform::from_position(Vec3::new(1.5, 0.0, 5.5)),
                Velocity::default(),
                NavAgent::default(),
            ))
            .id();

        let mut schedule = build_schedule();
        let mut searches = 0;
        let mut last_goal = None;
        for tick in 0..interval_ticks {
            world.get_mut::<Transform>(target).unwrap().position = target_at(tick);
            schedule.run(&mut world);
            let nav = world.get::<NavAgent>(agent).unwrap();
            if nav.last_goal != last_goal {
                searches += 1;
                last_goal = nav.last_goal;
            }
        }

        let nav = world.get::<NavAgent>(agent).unwrap();
        assert_eq!(nav.brain.state(), AgentState::Approach);
        assert!(nav.search_failed);
        assert!(!nav.steering.has_path());
        assert!(
            (1..=2).contains(&searches),
            "{searches} searches in one repath interval"
        );
    }

    #[test]
    fn missing_coordinator_idles_agents() {
        let mut world = world_with(NavConfig::default());
        world.remove_resource::<AttackCoordinator>();
        world.spawn((Transform::from_position(Vec3::new(2.0, 0.0, 1.5)), Target));
        let agent = world
            .spawn((
                Transform::from_position(Vec3::new(1.5, 0.0, 1.5)),
                Velocity::default(),
                NavAgent::default(),
            ))
            .id();
        let mut schedule = build_schedule();
        for _ in 0..10 {
            schedule.run(&mut world);
        }
        let nav = world.get::<NavAgent>(agent).unwrap();
        assert_eq!(nav.brain.state(), AgentState::Idle);
        assert!(!nav.steering.has_path());
        assert_eq!(world.get::<Velocity>(agent).unwrap().linear, Vec3::ZERO);
        assert!(!stun_agent(&mut world, agent));
    }

    #[test]
    fn missing_rng_idles_agents() {
        let mut world = world_with(NavConfig::default());
        world.remove_resource::<SimRng>();
        world.spawn((Transform::from_position(Vec3::new(8.5, 0.0, 1.5)), Target));
        let agent = world
            .spawn((
                Transform::from_position(Vec3::new(1.5, 0.0, 1.5)),
                Velocity::default(),
                NavAgent::default(),
            ))
            .id();
        build_schedule().run(&mut world);
        let nav = world.get::<NavAgent>(agent).unwrap();
        assert_eq!(nav.brain.state(), AgentState::Idle);
        assert_eq!(world.get::<Velocity>(agent).unwrap().linear, Vec3::ZERO);
    }

    #[test]
    fn skirmisher_breaks_off_without_a_path() {
        let mut world = world_with(NavConfig::default());
        let target = Vec3::new(9.5, 0.0, 5.5);
        world.spawn((Transform::from_position(target), Target));
        let agent = world
            .spawn((
                Transform::from_position(Vec3::new(1.5, 0.0, 5.5)),
                Velocity::default(),
                NavAgent::skirmisher(),
            ))
            .id();

        let mut schedule = build_schedule();
        let broke_off = |world: &World| {
            matches!(
                world.get::<NavAgent>(agent).unwrap().brain.state(),
                AgentState::Strafe { .. } | AgentState::Retreat { .. }
            )
        };
        for _ in 0..200 {
            schedule.run(&mut world);
            if broke_off(&world) {
                break;
            }
        }
        assert!(broke_off(&world));

        // Let the smoothing settle into the new heading.
        for _ in 0..25 {
            schedule.run(&mut world);
        }
        assert!(broke_off(&world));
        let state = world.get::<NavAgent>(agent).unwrap().brain.state();
        let position = world.get::<Transform>(agent).unwrap().position;
        let velocity = world.get::<Velocity>(agent).unwrap().linear;
        let toward = Sighting::between(position, target).direction;
        assert!(velocity.length() > 0.1);
        match state {
            AgentState::Retreat { .. } => assert!(velocity.dot(toward) < 0.0),
            _ => assert!(velocity.dot(toward).abs() < velocity.length() * 0.5),
        }
    }
}
