// Error types for grid construction, path search and configuration.
//
// "No path" is not an error: `find_path` reports it as `Ok(None)`.
// Everything here is a fault the caller should log and abort on.

use glam::UVec3;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NavError {
    #[error("invalid grid: {0}")]
    InvalidGrid(String),

    #[error("cell ({}, {}, {}) is outside a {}x{}x{} grid", .coord.x, .coord.y, .coord.z, .size.x, .size.y, .size.z)]
    CellOutOfBounds { coord: UVec3, size: UVec3 },

    #[error("path reconstruction exceeded {limit} steps; parent chain is corrupt")]
    CorruptParentChain { limit: usize },

    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl NavError {
    /// True for faults that mean the grid itself is malformed.
    pub fn is_malformed_grid(&self) -> bool {
        matches!(
            self,
            NavError::InvalidGrid(_)
                | NavError::CellOutOfBounds { .. }
                | NavError::CorruptParentChain { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, NavError>;
