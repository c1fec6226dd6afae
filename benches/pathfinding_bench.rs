//! Benchmark grid construction, path search and steering.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use glam::{UVec3, Vec3};
use voxel_nav::engine::config::{GridConfig, PathfindingConfig, SteeringConfig};
use voxel_nav::engine::{BlockWorld, PathFinder, SteeringBlender, SteeringState, SurfaceKind, VoxelGrid};

/// Floor, raised platform and a staircase between them.
fn split_level(half: f32) -> BlockWorld {
    BlockWorld::new()
        .with_box(
            Vec3::new(-half, -1.0, -half),
            Vec3::new(half, 0.0, half),
            SurfaceKind::Ground,
        )
        .with_box(
            Vec3::new(4.0, 0.0, -4.0),
            Vec3::new(half - 1.0, 2.0, 4.0),
            SurfaceKind::Ground,
        )
        .with_staircase(Vec3::new(0.0, 0.0, -1.0), 2.0, 1.0, 0.5, 4)
}

fn grid_config(half: f32) -> GridConfig {
    GridConfig {
        center: Vec3::new(0.0, 4.0, 0.0),
        size: Vec3::new(half * 2.0, 8.0, half * 2.0),
        ..GridConfig::default()
    }
}

fn bench_grid_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("grid_build");
    for half in [10.0f32, 20.0] {
        let level = split_level(half);
        let config = grid_config(half);
        group.bench_with_input(BenchmarkId::from_parameter(half * 2.0), &half, |b, _| {
            b.iter(|| VoxelGrid::build(black_box(&level), black_box(&config)))
        });
    }
    group.finish();
}

fn bench_find_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_path");
    let config = PathfindingConfig::default();

    for side in [16u32, 32, 64] {
        let grid = VoxelGrid::flat(UVec3::new(side, 1, side), 1.0, Vec3::ZERO).unwrap();
        let finder = PathFinder::new(&grid, &config);
        let start = grid.voxel_center(UVec3::ZERO);
        let goal = grid.voxel_center(UVec3::new(side - 1, 0, side - 1));
        group.bench_with_input(BenchmarkId::new("flat", side), &side, |b, _| {
            b.iter(|| finder.find_path(black_box(start), black_box(goal)))
        });
    }

    let level = split_level(20.0);
    let grid = VoxelGrid::build(&level, &grid_config(20.0)).unwrap();
    let finder = PathFinder::new(&grid, &config);
    let (start, goal) = (Vec3::new(-15.0, 0.0, -15.0), Vec3::new(10.0, 2.0, 2.0));
    group.bench_function("route_across_levels", |b| {
        b.iter(|| finder.find_route(black_box(start), black_box(goal)))
    });
    group.finish();
}

fn bench_steering(c: &mut Criterion) {
    let level = split_level(20.0);
    let grid = VoxelGrid::build(&level, &grid_config(20.0)).unwrap();
    let path = PathFinder::new(&grid, &PathfindingConfig::default())
        .find_path(Vec3::new(-15.0, 0.0, -15.0), Vec3::new(-2.0, 0.0, 12.0))
        .unwrap()
        .unwrap();
    let config = SteeringConfig::default();
    let blender = SteeringBlender::new(&config, &level);
    let neighbors = [Vec3::new(-14.0, 0.0, -15.5), Vec3::new(-15.8, 0.0, -14.2)];

    c.bench_function("steering_tick", |b| {
        b.iter(|| {
            let mut state = SteeringState::default();
            state.set_path(path.clone());
            blender.compute(
                &mut state,
                black_box(Vec3::new(-15.0, 0.0, -15.0)),
                black_box(&neighbors),
                Vec3::ZERO,
            )
        })
    });
}

criterion_group!(benches, bench_grid_build, bench_find_path, bench_steering);
criterion_main!(benches);
