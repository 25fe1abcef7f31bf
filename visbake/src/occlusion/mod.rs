//! Sampled line of sight between two faces.
//!
//! Both backends tile the faces with the same [`SampleGrid`] and apply the
//! same two way obstruction test, so they agree on every face pair and only
//! differ in how the work is scheduled.

mod cpu;
mod gpu;

pub use cpu::CpuOcclusion;
pub use gpu::GpuOcclusion;

use glam::{Vec2, Vec3};
use math::Face;

use crate::{
    BakeError,
    accel::{RayCaster, RayTracingDevice},
    config::{MIN_RAY_STEP, OcclusionBackend},
};

/// A face shorter than this along an axis has no tiles on it.
const SAMPLE_EPSILON: f32 = 1e-5;
/// Sample points closer than this are treated as the same point.
const MIN_SEGMENT_LENGTH: f32 = 1e-6;

pub trait OcclusionQuery: Sync {
    /// True as soon as one sample pair between `view` and `target` is
    /// unobstructed. Faces without samples answer false.
    fn any_unobstructed_sample(
        &self,
        view: &Face,
        target: &Face,
        step: Vec2,
    ) -> Result<bool, BakeError>;
}

/// Regular grid of sample points over a face, one at the centre of each
/// `step` sized tile.
#[derive(Debug, Clone, Copy)]
pub struct SampleGrid {
    origin: Vec3,
    right_step: Vec3,
    up_step: Vec3,
    tiles_x: u32,
    tiles_y: u32,
}

fn tile_count(size: f32, step: f32) -> u32 {
    let usable = size - SAMPLE_EPSILON;
    if usable <= 0.0 {
        0
    } else {
        (usable / step).ceil() as u32
    }
}

impl SampleGrid {
    pub fn new(face: &Face, step: Vec2) -> Self {
        let step = step.max(Vec2::splat(MIN_RAY_STEP));
        let right_step = face.right * step.x;
        let up_step = face.up * step.y;
        Self {
            origin: face.corner + 0.5 * (right_step + up_step),
            right_step,
            up_step,
            tiles_x: tile_count(face.size.x, step.x),
            tiles_y: tile_count(face.size.y, step.y),
        }
    }

    #[inline]
    pub fn tiles(&self) -> (u32, u32) {
        (self.tiles_x, self.tiles_y)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tiles_x == 0 || self.tiles_y == 0
    }

    #[inline]
    pub fn point(&self, x: u32, y: u32) -> Vec3 {
        self.origin + x as f32 * self.right_step + y as f32 * self.up_step
    }

    /// All sample points, x major.
    pub fn points(&self) -> impl Iterator<Item = Vec3> + '_ {
        (0..self.tiles_x).flat_map(move |x| (0..self.tiles_y).map(move |y| self.point(x, y)))
    }
}

/// Line of sight between two points. Rays are cast both ways because a ray
/// starting inside a collider doesn't see it.
pub fn segment_unobstructed<R: RayCaster + ?Sized>(caster: &R, start: Vec3, end: Vec3) -> bool {
    let delta = end - start;
    let length = delta.length();
    if length < MIN_SEGMENT_LENGTH {
        return true;
    }
    let dir = delta / length;
    !caster.raycast(start, dir, length) && !caster.raycast(end, -dir, length)
}

/// The configured backend over one acceleration structure.
pub enum Occlusion<'a, S> {
    Cpu(CpuOcclusion<'a, S>),
    Gpu(GpuOcclusion<'a, S>),
}

impl<'a, S: RayCaster + RayTracingDevice> Occlusion<'a, S> {
    pub fn new(backend: OcclusionBackend, structure: &'a S) -> Self {
        match backend {
            OcclusionBackend::Cpu => Occlusion::Cpu(CpuOcclusion::new(structure)),
            OcclusionBackend::Gpu => Occlusion::Gpu(GpuOcclusion::new(structure)),
        }
    }
}

impl<S: RayCaster + RayTracingDevice> OcclusionQuery for Occlusion<'_, S> {
    fn any_unobstructed_sample(
        &self,
        view: &Face,
        target: &Face,
        step: Vec2,
    ) -> Result<bool, BakeError> {
        match self {
            Occlusion::Cpu(q) => q.any_unobstructed_sample(view, target, step),
            Occlusion::Gpu(q) => q.any_unobstructed_sample(view, target, step),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use math::{Bounds, faces_of};

    #[test]
    fn tiles_follow_loop_bound() {
        assert_eq!(tile_count(1.0, 0.1), 10);
        assert_eq!(tile_count(1.0, 0.3), 4);
        assert_eq!(tile_count(1.0, 1.0), 1);
        assert_eq!(tile_count(10.0, 1.0), 10);
        assert_eq!(tile_count(0.0, 0.1), 0);
        assert_eq!(tile_count(5e-6, 0.1), 0);
    }

    #[test]
    fn samples_are_tile_centres() {
        let face = faces_of(&Bounds::new(Vec3::ZERO, Vec3::new(2.0, 1.0, 1.0)))[0];
        let grid = SampleGrid::new(&face, Vec2::new(1.0, 0.5));
        assert_eq!(grid.tiles(), (2, 2));
        let points: Vec<Vec3> = grid.points().collect();
        assert_eq!(
            points,
            vec![
                Vec3::new(0.5, 0.25, 0.0),
                Vec3::new(0.5, 0.75, 0.0),
                Vec3::new(1.5, 0.25, 0.0),
                Vec3::new(1.5, 0.75, 0.0),
            ]
        );
    }

    #[test]
    fn step_is_clamped() {
        let face = faces_of(&Bounds::new(Vec3::ZERO, Vec3::ONE))[0];
        let grid = SampleGrid::new(&face, Vec2::ZERO);
        assert_eq!(grid.tiles(), (100, 100));
    }

    #[test]
    fn degenerate_face_is_empty() {
        let flat = Bounds::new(Vec3::ZERO, Vec3::new(1.0, 0.0, 1.0));
        let grid = SampleGrid::new(&faces_of(&flat)[0], Vec2::splat(0.1));
        assert!(grid.is_empty());
        assert_eq!(grid.points().count(), 0);
    }
}
