// Navigation engine: voxel grid, A* search, steering and the ECS agent layer.

pub mod agent;
pub mod components;
pub mod config;
pub mod error;
pub mod flocking;
pub mod navigation;
pub mod pathfinder;
pub mod spatial;
pub mod steering;
pub mod systems;
pub mod world;

// Re-export commonly used items
pub use components::*;
pub use config::NavConfig;
pub use error::{NavError, Result};
pub use navigation::{Cell, CellKind, VoxelGrid};
pub use pathfinder::{CostWeighting, Path, PathFinder, find_path};
pub use steering::{SteeringBlender, SteeringOutput, SteeringState};
pub use world::{BlockWorld, RayHit, SurfaceKind, SurfaceMask, WorldProbe};
