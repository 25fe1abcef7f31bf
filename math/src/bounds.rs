use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Axis aligned box. `min <= max` componentwise for anything built with
/// [`Bounds::new`] or [`Bounds::from_center_size`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    /// Builds a box from any two opposite corners.
    #[inline]
    pub fn new(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    #[inline]
    pub fn from_center_size(center: Vec3, size: Vec3) -> Self {
        let half = size.abs() * 0.5;
        Self {
            min: center - half,
            max: center + half,
        }
    }

    #[inline]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Grows the box so that its size increases by `amount` on every axis,
    /// keeping the centre in place.
    #[inline]
    #[must_use]
    pub fn expand(self, amount: f32) -> Self {
        let half = Vec3::splat(amount * 0.5);
        Self {
            min: self.min - half,
            max: self.max + half,
        }
    }

    /// Smallest box containing both.
    #[inline]
    #[must_use]
    pub fn union(self, other: Bounds) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Union of every box in the iterator, `None` when it is empty.
    pub fn enclose<I: IntoIterator<Item = Bounds>>(boxes: I) -> Option<Self> {
        boxes.into_iter().reduce(Bounds::union)
    }

    /// Boundary inclusive: boxes that only touch still intersect.
    #[inline]
    pub fn intersects(&self, other: &Bounds) -> bool {
        self.min.cmple(other.max).all() && other.min.cmple(self.max).all()
    }

    #[inline]
    pub fn contains(&self, point: Vec3) -> bool {
        self.min.cmple(point).all() && point.cmple(self.max).all()
    }
}
