//! Bake parameters.

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::{BakeError, grid::validate_cell_size};

/// Smallest ray sampling step on either face axis.
pub const MIN_RAY_STEP: f32 = 0.01;

/// Which occlusion query answers face pair visibility.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OcclusionBackend {
    /// Per sample pair bidirectional ray casts.
    Cpu,
    /// One dispatch + reduction per face pair.
    #[default]
    Gpu,
}

impl std::str::FromStr for OcclusionBackend {
    type Err = std::io::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" => Ok(Self::Cpu),
            "gpu" => Ok(Self::Gpu),
            _ => Err(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "Invalid occlusion backend",
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BakeConfig {
    /// World space size of one grid cell
    pub cell_size: Vec3,
    /// Distance between ray samples across a face
    pub ray_step: Vec2,
    pub backend: OcclusionBackend,
    /// Evaluate the cells of a sweep on the rayon pool
    pub parallel: bool,
    /// Objects per batch when baking in batches. `None` bakes the whole scene
    /// with one acceleration structure.
    pub batch_size: Option<usize>,
}

impl Default for BakeConfig {
    fn default() -> Self {
        Self {
            cell_size: Vec3::splat(10.0),
            ray_step: Vec2::splat(0.1),
            backend: OcclusionBackend::default(),
            parallel: true,
            batch_size: None,
        }
    }
}

impl BakeConfig {
    /// Checks the cell size and clamps the ray step so sampling terminates.
    pub fn validate(&mut self) -> Result<(), BakeError> {
        validate_cell_size(self.cell_size)?;
        self.ray_step = self.ray_step.max(Vec2::splat(MIN_RAY_STEP));
        if let Some(0) = self.batch_size {
            self.batch_size = Some(1);
        }
        Ok(())
    }
}
