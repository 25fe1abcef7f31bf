//! Drives a bake: grid × object loop, bounding box shortcut, then facing
//! prune and sampled occlusion for everything that isn't trivially visible.

use std::{
    ops::{AddAssign, Range},
    time::{Duration, Instant},
};

#[cfg(feature = "hprof")]
use coarse_prof::profile;
use glam::{UVec3, Vec2};
use log::{debug, error, info, warn};
use math::{Bounds, Face, faces_of, facing};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    BakeError,
    accel::{AccelerationService, StructureGuard},
    baked::BakedVisibility,
    checkpoint::BakeCheckpoint,
    config::BakeConfig,
    grid::{SpatialGrid, expand_to_cells},
    occlusion::{Occlusion, OcclusionQuery},
    progress::{BakeProgress, Control, ProgressSink},
    scene::{SceneObject, SceneSource},
    store::VisibilityStore,
};

/// Size added to every target box before it is tested.
pub const TARGET_SKIN: f32 = 1e-5;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum BakeState {
    #[default]
    Idle,
    Initializing,
    Baking {
        object: usize,
        cell: usize,
    },
    Completed,
    Cancelled,
    Failed,
}

/// Counters for what the bake had to do to answer each cell.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BakeStats {
    pub cells: usize,
    /// Answered by the cell and target boxes overlapping
    pub shortcut_hits: usize,
    pub facing_tests: usize,
    pub facing_passed: usize,
    pub occlusion_queries: usize,
    pub visible: usize,
}

impl AddAssign for BakeStats {
    fn add_assign(&mut self, other: Self) {
        self.cells += other.cells;
        self.shortcut_hits += other.shortcut_hits;
        self.facing_tests += other.facing_tests;
        self.facing_passed += other.facing_passed;
        self.occlusion_queries += other.occlusion_queries;
        self.visible += other.visible;
    }
}

impl BakeStats {
    /// Queries that found a clear line of sight.
    pub fn clear_queries(&self) -> usize {
        self.visible - self.shortcut_hits
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BakeReport {
    pub state: BakeState,
    pub objects_baked: usize,
    pub stats: BakeStats,
    pub elapsed: Duration,
}

/// Can anything inside `cell` see `target`?
///
/// `target` should already carry the [`TARGET_SKIN`] and `target_faces` be
/// its faces. Stops at the first face pair with a clear sample.
pub fn cell_visibility<Q: OcclusionQuery + ?Sized>(
    cell: &Bounds,
    target: &Bounds,
    target_faces: &[Face; 6],
    query: &Q,
    step: Vec2,
    stats: &mut BakeStats,
) -> Result<bool, BakeError> {
    #[cfg(feature = "hprof")]
    profile!("cell_visibility");
    stats.cells += 1;
    if cell.intersects(target) {
        stats.shortcut_hits += 1;
        stats.visible += 1;
        return Ok(true);
    }

    for view in faces_of(cell) {
        for target_face in target_faces {
            stats.facing_tests += 1;
            if !facing(&view, target_face) {
                continue;
            }
            stats.facing_passed += 1;
            stats.occlusion_queries += 1;
            if query.any_unobstructed_sample(&view, target_face, step)? {
                stats.visible += 1;
                return Ok(true);
            }
        }
    }
    Ok(false)
}

/// Owns one bake at a time: the grid, the visibility store and the service
/// that builds acceleration structures for it.
pub struct Baker<S: AccelerationService> {
    config: BakeConfig,
    service: S,
    state: BakeState,
    targets: Vec<SceneObject>,
    occluders: Vec<SceneObject>,
    grid: Option<SpatialGrid>,
    store: Option<VisibilityStore>,
    baked: Vec<bool>,
    stats: BakeStats,
}

impl<S: AccelerationService> Baker<S> {
    pub fn new(config: BakeConfig, service: S) -> Self {
        Self {
            config,
            service,
            state: BakeState::Idle,
            targets: Vec::new(),
            occluders: Vec::new(),
            grid: None,
            store: None,
            baked: Vec::new(),
            stats: BakeStats::default(),
        }
    }

    pub fn config(&self) -> &BakeConfig {
        &self.config
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn state(&self) -> BakeState {
        self.state
    }

    pub fn grid(&self) -> Option<&SpatialGrid> {
        self.grid.as_ref()
    }

    /// Partially written until the state is [`BakeState::Completed`].
    pub fn store(&self) -> Option<&VisibilityStore> {
        self.store.as_ref()
    }

    pub fn targets(&self) -> &[SceneObject] {
        &self.targets
    }

    pub fn stats(&self) -> BakeStats {
        self.stats
    }

    /// First object not baked yet, where a resumed bake picks up.
    pub fn next_object(&self) -> Option<usize> {
        self.baked.iter().position(|done| !done)
    }

    pub fn is_complete(&self) -> bool {
        !self.baked.is_empty() && self.baked.iter().all(|&done| done)
    }

    /// Reads the scene, sizes the grid and allocates a blank store. Any
    /// earlier results are dropped.
    pub fn initialize(&mut self, scene: &impl SceneSource) -> Result<(), BakeError> {
        #[cfg(feature = "hprof")]
        profile!("baker_initialize");
        self.state = BakeState::Initializing;
        let result = self.try_initialize(scene);
        self.state = match result {
            Ok(_) => BakeState::Idle,
            Err(_) => BakeState::Failed,
        };
        result
    }

    fn try_initialize(&mut self, scene: &impl SceneSource) -> Result<(), BakeError> {
        self.grid = None;
        self.store = None;
        self.baked.clear();
        self.stats = BakeStats::default();

        self.config.validate()?;
        self.targets = scene.targets();
        self.occluders = scene.occluders();
        if self.targets.is_empty() {
            return Err(BakeError::EmptyScene);
        }

        let enclosed = Bounds::enclose(
            self.occluders
                .iter()
                .chain(self.targets.iter())
                .map(|o| o.bounds),
        )
        .ok_or(BakeError::EmptyScene)?;
        let world_bounds = expand_to_cells(enclosed, self.config.cell_size);
        let grid = SpatialGrid::new(world_bounds, self.config.cell_size)?;
        let store = VisibilityStore::allocate(self.targets.len(), grid.total_cells())?;

        let counts = grid.counts();
        info!(
            "Grid of {}x{}x{} cells over {:?}..{:?}",
            counts.x, counts.y, counts.z, world_bounds.min, world_bounds.max
        );
        info!(
            "{} bytes were allocated for visible flags ({} objects, {} occluders)",
            store.memory_usage(),
            self.targets.len(),
            self.occluders.len()
        );

        self.baked = vec![false; self.targets.len()];
        self.grid = Some(grid);
        self.store = Some(store);
        Ok(())
    }

    /// Initialises from `scene` and bakes every object, in batches if the
    /// config asks for them.
    pub fn bake(
        &mut self,
        scene: &impl SceneSource,
        sink: &mut impl ProgressSink,
    ) -> Result<BakeReport, BakeError> {
        let start = Instant::now();
        self.initialize(scene)?;
        let report = BakeReport {
            elapsed: start.elapsed(),
            ..self.bake_remaining(sink)?
        };
        info!("Used Time: {:.2}s", report.elapsed.as_secs_f32());
        Ok(report)
    }

    /// Bakes whatever isn't baked yet, e.g. after a cancel or after
    /// [`Baker::resume_from`].
    pub fn bake_remaining(
        &mut self,
        sink: &mut impl ProgressSink,
    ) -> Result<BakeReport, BakeError> {
        self.bake_remaining_with(sink, |_| {})
    }

    /// [`Baker::bake_remaining`], calling `on_batch` after every batch that
    /// finishes. Without a batch size the whole bake is one batch.
    pub fn bake_remaining_with(
        &mut self,
        sink: &mut impl ProgressSink,
        mut on_batch: impl FnMut(&Self),
    ) -> Result<BakeReport, BakeError> {
        match self.config.batch_size {
            Some(size) => self.bake_in_batches_with(size, sink, on_batch),
            None => {
                let report = self.bake_batch(0..self.targets.len(), sink)?;
                on_batch(self);
                self.log_stats();
                Ok(report)
            }
        }
    }

    /// Bakes the remaining objects `batch_size` at a time. A batch that runs
    /// out of resources is split in half and retried down to single objects.
    pub fn bake_in_batches(
        &mut self,
        batch_size: usize,
        sink: &mut impl ProgressSink,
    ) -> Result<BakeReport, BakeError> {
        self.bake_in_batches_with(batch_size, sink, |_| {})
    }

    /// [`Baker::bake_in_batches`], calling `on_batch` after every batch that
    /// finishes. That is the place to write a checkpoint.
    pub fn bake_in_batches_with(
        &mut self,
        batch_size: usize,
        sink: &mut impl ProgressSink,
        mut on_batch: impl FnMut(&Self),
    ) -> Result<BakeReport, BakeError> {
        let start = Instant::now();
        let batch_size = batch_size.max(1);
        let total = self.targets.len();
        if self.baked.is_empty() {
            return Err(BakeError::NotInitialized);
        }
        let mut first = self.next_object().unwrap_or(total);
        while first < total {
            let range = first..(first + batch_size).min(total);
            self.bake_with_retry(range.clone(), sink)?;
            on_batch(self);
            first = range.end;
        }
        if self.is_complete() {
            self.state = BakeState::Completed;
        }
        self.log_stats();
        Ok(self.report(start.elapsed()))
    }

    fn bake_with_retry(
        &mut self,
        range: Range<usize>,
        sink: &mut impl ProgressSink,
    ) -> Result<(), BakeError> {
        match self.bake_batch(range.clone(), sink) {
            Err(e) if e.is_retryable() && range.len() > 1 => {
                let mid = range.start + range.len() / 2;
                warn!(
                    "Batch {}..{} failed ({e}), retrying as {}..{mid} and {mid}..{}",
                    range.start, range.end, range.start, range.end
                );
                self.bake_with_retry(range.start..mid, sink)?;
                self.bake_with_retry(mid..range.end, sink)
            }
            other => other.map(|_| ()),
        }
    }

    /// Bakes the objects in `range` that aren't baked yet, with an
    /// acceleration structure built for this batch alone and released before
    /// returning.
    pub fn bake_batch(
        &mut self,
        range: Range<usize>,
        sink: &mut impl ProgressSink,
    ) -> Result<BakeReport, BakeError> {
        #[cfg(feature = "hprof")]
        profile!("baker_bake_batch");
        let start = Instant::now();
        let range = range.start..range.end.min(self.targets.len());
        debug!("Baking objects {}..{}", range.start, range.end);

        let result = self.run_batch(range, sink);
        self.state = match &result {
            Ok(_) if self.is_complete() => BakeState::Completed,
            Ok(_) => BakeState::Idle,
            Err(BakeError::CancelledByUser) => BakeState::Cancelled,
            Err(_) => BakeState::Failed,
        };
        match result {
            Ok(()) => Ok(self.report(start.elapsed())),
            Err(e) => {
                match &e {
                    BakeError::CancelledByUser => warn!("Cancelled by user."),
                    e => error!("Bake failed: {e}"),
                }
                Err(e)
            }
        }
    }

    fn run_batch(
        &mut self,
        range: Range<usize>,
        sink: &mut impl ProgressSink,
    ) -> Result<(), BakeError> {
        let Self {
            config,
            service,
            state,
            targets,
            occluders,
            grid,
            store,
            baked,
            stats,
        } = self;
        let (Some(grid), Some(store)) = (grid.as_ref(), store.as_mut()) else {
            return Err(BakeError::NotInitialized);
        };
        if range.clone().all(|object| baked[object]) {
            return Ok(());
        }

        let structure = StructureGuard::build(service, occluders)?;
        let query = Occlusion::new(config.backend, &*structure);
        for object in range {
            if baked[object] {
                continue;
            }
            let run = ObjectRun {
                grid,
                config,
                object,
                total_objects: targets.len(),
                target: targets[object].bounds.expand(TARGET_SKIN),
                prior: *stats,
            };
            *stats += run.bake(&query, store, state, sink)?;
            baked[object] = true;
        }
        Ok(())
    }

    fn log_stats(&self) {
        let stats = self.stats;
        info!(
            "{} cells: {} by overlap, {}/{} face pairs facing, {} queries, {} visible",
            stats.cells,
            stats.shortcut_hits,
            stats.facing_passed,
            stats.facing_tests,
            stats.occlusion_queries,
            stats.visible
        );
    }

    fn report(&self, elapsed: Duration) -> BakeReport {
        BakeReport {
            state: self.state,
            objects_baked: self.baked.iter().filter(|&&done| done).count(),
            stats: self.stats,
            elapsed,
        }
    }

    /// Snapshot of a bake in progress, to pick up later with
    /// [`Baker::resume_from`]. `fingerprint` identifies the scene it was
    /// taken from.
    pub fn checkpoint(&self, fingerprint: u32) -> Result<BakeCheckpoint, BakeError> {
        let (Some(grid), Some(store)) = (&self.grid, &self.store) else {
            return Err(BakeError::NotInitialized);
        };
        Ok(BakeCheckpoint {
            fingerprint,
            grid: grid.clone(),
            object_names: self.targets.iter().map(|o| o.name.clone()).collect(),
            store: store.clone(),
            baked: self.baked.clone(),
            stats: self.stats,
        })
    }

    /// Initialises from `scene` and restores the objects `checkpoint`
    /// already baked. The checkpoint must be for the same targets and grid.
    pub fn resume_from(
        &mut self,
        scene: &impl SceneSource,
        checkpoint: BakeCheckpoint,
    ) -> Result<(), BakeError> {
        self.initialize(scene)?;
        let names_match = checkpoint.object_names.len() == self.targets.len()
            && checkpoint
                .object_names
                .iter()
                .zip(&self.targets)
                .all(|(name, t)| *name == t.name);
        if !names_match || self.grid.as_ref() != Some(&checkpoint.grid) {
            return Err(BakeError::Format("checkpoint is for a different scene".into()));
        }

        self.store = Some(checkpoint.store);
        self.baked = checkpoint.baked;
        self.stats = checkpoint.stats;
        if self.is_complete() {
            self.state = BakeState::Completed;
        }
        info!(
            "Resuming at object {} of {}",
            self.next_object().unwrap_or(self.targets.len()),
            self.targets.len()
        );
        Ok(())
    }

    /// Packs a completed bake with the grid and object order it belongs to.
    pub fn into_baked(self) -> Result<BakedVisibility, BakeError> {
        if !self.is_complete() {
            return Err(BakeError::Format(
                "refusing to export an incomplete bake".into(),
            ));
        }
        let (Some(grid), Some(store)) = (self.grid, self.store) else {
            return Err(BakeError::NotInitialized);
        };
        Ok(BakedVisibility::new(
            grid,
            self.targets.into_iter().map(|o| o.name).collect(),
            store,
        ))
    }
}

/// One object against every cell of the grid.
struct ObjectRun<'a> {
    grid: &'a SpatialGrid,
    config: &'a BakeConfig,
    object: usize,
    total_objects: usize,
    target: Bounds,
    /// Counters from objects baked before this one
    prior: BakeStats,
}

impl ObjectRun<'_> {
    fn bake<Q: OcclusionQuery>(
        &self,
        query: &Q,
        store: &mut VisibilityStore,
        state: &mut BakeState,
        sink: &mut impl ProgressSink,
    ) -> Result<BakeStats, BakeError> {
        #[cfg(feature = "hprof")]
        profile!("object_run_bake");
        let counts = self.grid.counts();
        let sweep_len = counts.y as usize * counts.z as usize;
        let target_faces = faces_of(&self.target);
        let mut stats = BakeStats::default();

        for x in 0..counts.x {
            let done = x as usize * sweep_len;
            *state = BakeState::Baking {
                object: self.object,
                cell: done,
            };
            let mut seen = self.prior;
            seen += stats;
            let progress = BakeProgress {
                object: self.object,
                total_objects: self.total_objects,
                cell: done,
                total_cells: self.grid.total_cells(),
                stats: seen,
            };
            if sink.report(progress) == Control::Cancel {
                return Err(BakeError::CancelledByUser);
            }

            let evaluate = |i: usize| -> Result<(UVec3, bool, BakeStats), BakeError> {
                let (y, z) = (i / counts.z as usize, i % counts.z as usize);
                let cell = UVec3::new(x, y as u32, z as u32);
                let mut cell_stats = BakeStats::default();
                let visible = cell_visibility(
                    &self.grid.cell_bounds(cell),
                    &self.target,
                    &target_faces,
                    query,
                    self.config.ray_step,
                    &mut cell_stats,
                )?;
                Ok((cell, visible, cell_stats))
            };
            let sweep: Vec<_> = if self.config.parallel {
                (0..sweep_len)
                    .into_par_iter()
                    .map(evaluate)
                    .collect::<Result<_, _>>()?
            } else {
                (0..sweep_len).map(evaluate).collect::<Result<_, _>>()?
            };

            for (cell, visible, cell_stats) in sweep {
                store.set(self.object, self.grid.linear_index(cell), visible);
                stats += cell_stats;
            }
        }
        Ok(stats)
    }
}
