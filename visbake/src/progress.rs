//! Progress reporting and cooperative cancellation.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use crate::bake::BakeStats;

/// Where a bake is, handed to the [`ProgressSink`] after every X sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BakeProgress {
    pub object: usize,
    pub total_objects: usize,
    /// Linear index of the next unvisited cell for `object`
    pub cell: usize,
    pub total_cells: usize,
    /// Counters for everything evaluated so far in this bake
    pub stats: BakeStats,
}

impl BakeProgress {
    /// Fraction of all `(object, cell)` pairs done, `0.0..=1.0`.
    pub fn fraction(&self) -> f32 {
        let total = self.total_objects * self.total_cells;
        if total == 0 {
            return 1.0;
        }
        (self.object * self.total_cells + self.cell) as f32 / total as f32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Cancel,
}

pub trait ProgressSink {
    /// Polled at every checkpoint, the answer decides whether the bake goes on.
    fn report(&mut self, progress: BakeProgress) -> Control;
}

/// Never cancels, reports nowhere.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&mut self, _: BakeProgress) -> Control {
        Control::Continue
    }
}

/// Shared flag another thread can raise to stop a bake.
#[derive(Debug, Default, Clone)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

impl ProgressSink for CancelFlag {
    fn report(&mut self, _: BakeProgress) -> Control {
        if self.is_cancelled() {
            Control::Cancel
        } else {
            Control::Continue
        }
    }
}

impl<F: FnMut(BakeProgress) -> Control> ProgressSink for F {
    fn report(&mut self, progress: BakeProgress) -> Control {
        self(progress)
    }
}
