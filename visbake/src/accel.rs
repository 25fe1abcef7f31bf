//! Ray intersection services the occlusion queries run against.
//!
//! Building and keeping acceleration structures is the host's business, the
//! bake only asks for one per run (or per batch) and hands it back when done.
//! [`ColliderSet`] is a plain reference implementation over collider boxes.

use std::ops::Deref;

#[cfg(feature = "hprof")]
use coarse_prof::profile;
use glam::{Vec2, Vec3};
use log::debug;
use math::{Bounds, Face, Ray, ray_box_entry};
use rayon::prelude::*;

use crate::{
    BakeError,
    occlusion::{SampleGrid, segment_unobstructed},
    scene::SceneObject,
};

/// Padding on the segment box used to cull colliders before the slab test.
const RAY_BBOX_PADDING: f32 = 1e-3;

/// CPU ray query against static geometry.
pub trait RayCaster: Sync {
    /// True if the ray enters any collider within `max_distance`. `direction`
    /// is unit length. Colliders containing `origin` are not reported.
    fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> bool;
}

/// Everything one ray tracing dispatch needs to know.
#[derive(Debug, Clone, Copy)]
pub struct DispatchParams {
    /// Rays start on this face, one per mask pixel
    pub view: Face,
    /// and end on every sample of this one.
    pub target: Face,
    pub step: Vec2,
}

/// One byte per view sample, non zero where some ray got through.
#[derive(Debug, Clone, PartialEq)]
pub struct HitMask {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl HitMask {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize],
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn clear(&mut self) {
        self.pixels.fill(0);
    }

    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    #[inline]
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }
}

/// GPU style visibility: fill a mask in one dispatch, then reduce it.
pub trait RayTracingDevice: Sync {
    /// Writes a miss (non zero) into `mask` for each view sample that sees
    /// any target sample. `mask` is sized to the view face's sample grid.
    fn dispatch(&self, params: &DispatchParams, mask: &mut HitMask) -> Result<(), BakeError>;

    /// True if any pixel of the mask is a miss.
    fn reduce_any_miss(&self, mask: &HitMask) -> Result<bool, BakeError>;
}

/// Builds and disposes acceleration structures.
pub trait AccelerationService {
    type Structure: RayCaster + RayTracingDevice;

    fn build_from(&mut self, colliders: &[SceneObject]) -> Result<Self::Structure, BakeError>;

    fn dispose(&mut self, structure: Self::Structure);
}

/// Owns a built structure and gives it back to the service when dropped, on
/// every way out of a bake.
pub struct StructureGuard<'a, S: AccelerationService> {
    service: &'a mut S,
    structure: Option<S::Structure>,
}

impl<'a, S: AccelerationService> StructureGuard<'a, S> {
    pub fn build(service: &'a mut S, colliders: &[SceneObject]) -> Result<Self, BakeError> {
        let structure = service.build_from(colliders)?;
        Ok(Self {
            service,
            structure: Some(structure),
        })
    }
}

impl<S: AccelerationService> Deref for StructureGuard<'_, S> {
    type Target = S::Structure;

    fn deref(&self) -> &Self::Target {
        self.structure
            .as_ref()
            .expect("structure is only taken on drop")
    }
}

impl<S: AccelerationService> Drop for StructureGuard<'_, S> {
    fn drop(&mut self) {
        if let Some(structure) = self.structure.take() {
            self.service.dispose(structure);
        }
    }
}

/// Collider boxes, tested one by one after a segment box cull.
#[derive(Debug, Clone, Default)]
pub struct ColliderSet {
    colliders: Vec<Bounds>,
}

impl ColliderSet {
    pub fn new(colliders: Vec<Bounds>) -> Self {
        Self { colliders }
    }

    pub fn len(&self) -> usize {
        self.colliders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colliders.is_empty()
    }
}

impl RayCaster for ColliderSet {
    fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> bool {
        #[cfg(feature = "hprof")]
        profile!("collider_set_raycast");
        let ray = Ray::new(origin, direction);
        let ray_box = Bounds::new(origin, ray.at(max_distance)).expand(RAY_BBOX_PADDING);
        self.colliders
            .iter()
            .filter(|collider| collider.intersects(&ray_box))
            .any(|collider| ray_box_entry(&ray, collider, max_distance).is_some())
    }
}

/// Software stand in for a ray generation shader plus a reduction kernel.
impl RayTracingDevice for ColliderSet {
    fn dispatch(&self, params: &DispatchParams, mask: &mut HitMask) -> Result<(), BakeError> {
        #[cfg(feature = "hprof")]
        profile!("collider_set_dispatch");
        let view = SampleGrid::new(&params.view, params.step);
        let target = SampleGrid::new(&params.target, params.step);
        if view.tiles() != (mask.width, mask.height) {
            return Err(BakeError::ResourceExhaustion(format!(
                "mask is {}x{} but the view face has {:?} samples",
                mask.width,
                mask.height,
                view.tiles()
            )));
        }
        if mask.width == 0 {
            return Ok(());
        }

        let width = mask.width as usize;
        mask.pixels
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(row, pixels)| {
                for (col, pixel) in pixels.iter_mut().enumerate() {
                    let start = view.point(col as u32, row as u32);
                    let reachable = target
                        .points()
                        .any(|end| segment_unobstructed(self, start, end));
                    *pixel = reachable as u8;
                }
            });
        Ok(())
    }

    fn reduce_any_miss(&self, mask: &HitMask) -> Result<bool, BakeError> {
        Ok(mask.pixels.par_iter().any(|&p| p != 0))
    }
}

/// Builds a [`ColliderSet`] from every occluder's bounds.
#[derive(Debug, Clone, Default)]
pub struct ColliderSetBuilder {
    /// Refuse to build structures with more colliders than this
    pub max_colliders: Option<usize>,
    live: usize,
}

impl ColliderSetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_budget(max_colliders: usize) -> Self {
        Self {
            max_colliders: Some(max_colliders),
            live: 0,
        }
    }

    /// Structures built and not yet disposed.
    pub fn live_structures(&self) -> usize {
        self.live
    }
}

impl AccelerationService for ColliderSetBuilder {
    type Structure = ColliderSet;

    fn build_from(&mut self, colliders: &[SceneObject]) -> Result<ColliderSet, BakeError> {
        if let Some(max) = self.max_colliders {
            if colliders.len() > max {
                return Err(BakeError::ResourceExhaustion(format!(
                    "{} colliders exceed the budget of {max}",
                    colliders.len()
                )));
            }
        }
        self.live += 1;
        debug!("Built collider set with {} colliders", colliders.len());
        Ok(ColliderSet::new(colliders.iter().map(|c| c.bounds).collect()))
    }

    fn dispose(&mut self, structure: ColliderSet) {
        self.live = self.live.saturating_sub(1);
        debug!("Released collider set with {} colliders", structure.len());
    }
}
