#[cfg(feature = "hprof")]
use coarse_prof::profile;
use glam::Vec2;
use math::Face;

use super::{OcclusionQuery, SampleGrid, segment_unobstructed};
use crate::{BakeError, accel::RayCaster};

/// Tests every sample pair with a two way ray cast until one gets through.
pub struct CpuOcclusion<'a, R> {
    caster: &'a R,
}

impl<'a, R: RayCaster> CpuOcclusion<'a, R> {
    pub fn new(caster: &'a R) -> Self {
        Self { caster }
    }
}

impl<R: RayCaster> OcclusionQuery for CpuOcclusion<'_, R> {
    fn any_unobstructed_sample(
        &self,
        view: &Face,
        target: &Face,
        step: Vec2,
    ) -> Result<bool, BakeError> {
        #[cfg(feature = "hprof")]
        profile!("cpu_any_unobstructed_sample");
        let from = SampleGrid::new(view, step);
        let to = SampleGrid::new(target, step);
        if from.is_empty() || to.is_empty() {
            return Ok(false);
        }
        for start in from.points() {
            for end in to.points() {
                if segment_unobstructed(self.caster, start, end) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}
