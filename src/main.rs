// Headless navigation demo.
//
// Builds a small level (floor, raised platform reached by a staircase,
// a few pillars), voxelizes it, spawns a target and a mix of chasers, a
// skirmisher, a wolf pack and a patroller, then runs the fixed-tick
// schedule and logs what the agents do. Run with RUST_LOG=info (or debug) to see output.
//
//     nav_demo [config.json]

use bevy_ecs::prelude::*;
use glam::Vec3;
use log::{error, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use voxel_nav::engine::agent::AttackCoordinator;
use voxel_nav::engine::systems::{build_schedule, insert_resources, stun_agent};
use voxel_nav::engine::*;

const SEED: u64 = 0x5EED;
const TICKS: u32 = 1500;
const REPORT_EVERY: u32 = 250;
const STUN_AT: u32 = 600;

// ============================================================================
// LEVEL
// ============================================================================

fn build_level() -> BlockWorld {
    BlockWorld::new()
        // Floor
        .with_box(
            Vec3::new(-10.0, -1.0, -10.0),
            Vec3::new(10.0, 0.0, 10.0),
            SurfaceKind::Ground,
        )
        // Raised platform, two units up
        .with_box(
            Vec3::new(4.0, 0.0, -4.0),
            Vec3::new(9.0, 2.0, 4.0),
            SurfaceKind::Ground,
        )
        // Stairs up to the platform along +X
        .with_staircase(Vec3::new(0.0, 0.0, -1.0), 2.0, 1.0, 0.5, 4)
        // Pillars
        .with_box(
            Vec3::new(-4.0, 0.0, 2.0),
            Vec3::new(-3.0, 3.0, 3.0),
            SurfaceKind::Obstacle,
        )
        .with_box(
            Vec3::new(-2.0, 0.0, -5.0),
            Vec3::new(-1.0, 3.0, -4.0),
            SurfaceKind::Obstacle,
        )
}

/// Target position at `tick`: a slow loop around the platform top.
fn target_position(tick: u32, dt: f32) -> Vec3 {
    let angle = tick as f32 * dt * 0.2;
    Vec3::new(6.5 + 1.5 * angle.cos(), 2.0, 2.0 * angle.sin())
}

// ============================================================================
// ENTITY SPAWNING
// ============================================================================

fn spawn_agents(world: &mut World, rng: &mut StdRng) {
    for i in 0..3 {
        let position = Vec3::new(rng.gen_range(-9.0..-6.0), 0.0, rng.gen_range(-9.0..9.0));
        let agent = if i == 0 {
            NavAgent::skirmisher()
        } else {
            NavAgent::default()
        };
        world.spawn((Transform::from_position(position), Velocity::default(), agent));
    }

    for _ in 0..4 {
        let position = Vec3::new(rng.gen_range(-3.0..0.0), 0.0, rng.gen_range(6.0..9.0));
        world.spawn((
            Transform::from_position(position),
            Velocity::default(),
            NavAgent::default(),
            Pack { id: 1 },
        ));
    }

    world.spawn((
        Transform::from_position(Vec3::new(-8.0, 0.0, -8.0)),
        Velocity::default(),
        NavAgent::patrolling(),
        PatrolRoute::new(vec![
            Vec3::new(-8.0, 0.0, -8.0),
            Vec3::new(-8.0, 0.0, 8.0),
            Vec3::new(2.0, 0.0, 8.0),
        ]),
    ));

    let count = world.query::<&NavAgent>().iter(world).count();
    info!("spawned {count} agents");
}

fn report(world: &mut World, tick: u32) {
    let target = world
        .query_filtered::<&Transform, With<Target>>()
        .iter(world)
        .next()
        .map(|t| t.position);
    let mut agents = world.query::<(Entity, &Transform, &NavAgent)>();
    for (entity, transform, agent) in agents.iter(world) {
        let p = transform.position;
        let distance = target.map_or(f32::NAN, |t| t.distance(p));
        info!(
            "tick {tick:>5} | {entity} {:<8} at ({:>5.1}, {:>4.1}, {:>5.1}) | target {distance:>5.1} | path {}",
            agent.brain.state().name(),
            p.x,
            p.y,
            p.z,
            agent.steering.path().map_or(0, Path::len),
        );
    }
    let coordinator = world.resource::<AttackCoordinator>();
    info!(
        "tick {tick:>5} | attackers {}/{}",
        coordinator.active(),
        coordinator.max_concurrent()
    );
}

// ============================================================================
// MAIN
// ============================================================================

fn run() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => {
            info!("loading config from {path}");
            NavConfig::load(path)?
        }
        None => NavConfig::default(),
    };
    let dt = config.fixed_dt;

    let level = build_level();
    let grid = VoxelGrid::build(&level, &config.grid)?;

    let mut world = World::new();
    insert_resources(&mut world, config, grid, level, SEED);

    let target = world
        .spawn((Transform::from_position(target_position(0, dt)), Target))
        .id();
    let mut rng = StdRng::seed_from_u64(SEED);
    spawn_agents(&mut world, &mut rng);

    let mut schedule = build_schedule();
    for tick in 0..TICKS {
        if let Some(mut transform) = world.get_mut::<Transform>(target) {
            transform.position = target_position(tick, dt);
        }
        if tick == STUN_AT {
            let first = world
                .query_filtered::<Entity, With<NavAgent>>()
                .iter(&world)
                .next();
            if let Some(agent) = first {
                stun_agent(&mut world, agent);
            }
        }

        schedule.run(&mut world);

        if tick % REPORT_EVERY == 0 {
            report(&mut world, tick);
        }
    }

    report(&mut world, TICKS);
    Ok(())
}

fn main() {
    env_logger::init();

    if let Err(err) = run() {
        error!("{err}");
        std::process::exit(1);
    }
}
