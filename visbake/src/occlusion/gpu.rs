use std::{collections::HashMap, sync::Mutex};

#[cfg(feature = "hprof")]
use coarse_prof::profile;
use glam::Vec2;
use log::debug;
use math::Face;

use super::{OcclusionQuery, SampleGrid};
use crate::{
    BakeError,
    accel::{DispatchParams, HitMask, RayTracingDevice},
    config::MIN_RAY_STEP,
};

/// Mask buffers kept between dispatches, keyed by size.
#[derive(Default)]
struct MaskPool {
    free: Mutex<HashMap<(u32, u32), Vec<HitMask>>>,
}

impl MaskPool {
    fn acquire(&self, width: u32, height: u32) -> HitMask {
        let mut free = self.free.lock().unwrap_or_else(|e| e.into_inner());
        match free.get_mut(&(width, height)).and_then(Vec::pop) {
            Some(mut mask) => {
                mask.clear();
                mask
            }
            None => HitMask::new(width, height),
        }
    }

    fn release(&self, mask: HitMask) {
        let mut free = self.free.lock().unwrap_or_else(|e| e.into_inner());
        free.entry((mask.width(), mask.height()))
            .or_default()
            .push(mask);
    }

    fn len(&self) -> usize {
        let free = self.free.lock().unwrap_or_else(|e| e.into_inner());
        free.values().map(Vec::len).sum()
    }
}

/// One dispatch renders the view face's samples into a mask, a reduction
/// turns the mask into the answer. The caller blocks on the readback.
pub struct GpuOcclusion<'a, D> {
    device: &'a D,
    masks: MaskPool,
}

impl<'a, D: RayTracingDevice> GpuOcclusion<'a, D> {
    pub fn new(device: &'a D) -> Self {
        Self {
            device,
            masks: MaskPool::default(),
        }
    }
}

impl<D> Drop for GpuOcclusion<'_, D> {
    fn drop(&mut self) {
        let count = self.masks.len();
        if count > 0 {
            debug!("Releasing {count} cached hit masks");
        }
    }
}

impl<D: RayTracingDevice> OcclusionQuery for GpuOcclusion<'_, D> {
    fn any_unobstructed_sample(
        &self,
        view: &Face,
        target: &Face,
        step: Vec2,
    ) -> Result<bool, BakeError> {
        #[cfg(feature = "hprof")]
        profile!("gpu_any_unobstructed_sample");
        let step = step.max(Vec2::splat(MIN_RAY_STEP));
        let from = SampleGrid::new(view, step);
        let to = SampleGrid::new(target, step);
        if from.is_empty() || to.is_empty() {
            return Ok(false);
        }

        let (width, height) = from.tiles();
        let mut mask = self.masks.acquire(width, height);
        let params = DispatchParams {
            view: *view,
            target: *target,
            step,
        };
        let result = self
            .device
            .dispatch(&params, &mut mask)
            .and_then(|_| self.device.reduce_any_miss(&mask));
        self.masks.release(mask);
        result
    }
}
