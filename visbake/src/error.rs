use std::{error::Error, fmt};

use glam::Vec3;

#[derive(Debug)]
pub enum BakeError {
    /// A cell size component is too small to grid the world with.
    CellSizeTooSmall { cell_size: Vec3 },
    /// The visibility table can't be sized from these counts.
    InvalidCounts { objects: usize, cells: usize },
    /// No static geometry to enclose, or nothing tagged for baking.
    EmptyScene,
    /// The progress sink asked to stop.
    CancelledByUser,
    /// Acceleration structure build or dispatch failed. Retrying a smaller
    /// object range may succeed.
    ResourceExhaustion(String),
    /// A batch was requested before the grid and store were set up.
    NotInitialized,
    Io(std::io::Error),
    /// Persisted bake data is malformed or doesn't match the scene.
    Format(String),
}

impl BakeError {
    /// Bad input that no retry can fix. These abort before any work.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            BakeError::CellSizeTooSmall { .. }
                | BakeError::InvalidCounts { .. }
                | BakeError::EmptyScene
        )
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, BakeError::ResourceExhaustion(_))
    }
}

impl Error for BakeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            BakeError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for BakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BakeError::CellSizeTooSmall { cell_size } => write!(
                f,
                "cell size {cell_size} is too small, every axis must be at least 0.1"
            ),
            BakeError::InvalidCounts { objects, cells } => write!(
                f,
                "can't allocate visibility for {objects} objects over {cells} cells"
            ),
            BakeError::EmptyScene => write!(f, "scene has no static objects to bake"),
            BakeError::CancelledByUser => write!(f, "cancelled by user"),
            BakeError::ResourceExhaustion(m) => write!(f, "out of bake resources: {m}"),
            BakeError::NotInitialized => write!(f, "bake has not been initialised"),
            BakeError::Io(e) => write!(f, "{e}"),
            BakeError::Format(m) => write!(f, "invalid bake data: {m}"),
        }
    }
}

impl From<std::io::Error> for BakeError {
    fn from(e: std::io::Error) -> Self {
        BakeError::Io(e)
    }
}

impl From<bincode::Error> for BakeError {
    fn from(e: bincode::Error) -> Self {
        BakeError::Format(e.to_string())
    }
}
