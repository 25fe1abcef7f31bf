//! Potential visibility set baking.
//!
//! The world is cut into a uniform grid of cells and, for every tagged scene
//! object, every cell gets one bit saying whether any point inside it could
//! see some part of the object. Overlapping boxes are trivially visible,
//! everything else goes through a facing prune on the box faces and then a
//! sampled ray test against the static occluders.
//!
//! ```ignore
//! let mut baker = Baker::new(BakeConfig::default(), ColliderSetBuilder::new());
//! baker.bake(&scene, &mut NoProgress)?;
//! let baked = baker.into_baked()?;
//! baked.save_to_file("level.pvs")?;
//! ```

pub mod accel;
pub mod bake;
pub mod baked;
pub mod checkpoint;
pub mod config;
mod error;
pub mod grid;
pub mod occlusion;
pub mod progress;
pub mod scene;
pub mod store;

#[cfg(test)]
mod tests;

pub use accel::{AccelerationService, ColliderSet, ColliderSetBuilder, RayCaster, RayTracingDevice};
pub use bake::{BakeReport, BakeState, BakeStats, Baker, cell_visibility};
pub use baked::BakedVisibility;
pub use checkpoint::BakeCheckpoint;
pub use config::{BakeConfig, OcclusionBackend};
pub use error::BakeError;
pub use grid::SpatialGrid;
pub use occlusion::{Occlusion, OcclusionQuery};
pub use progress::{BakeProgress, CancelFlag, Control, NoProgress, ProgressSink};
pub use scene::{SceneObject, SceneSource, StaticScene};
pub use store::VisibilityStore;

pub use glam;
pub use log;
pub use math;
