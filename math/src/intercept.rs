use glam::Vec3;

use crate::Bounds;

/// A ray with a unit direction, used for obstruction traces.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    #[inline]
    pub const fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    #[inline]
    pub fn at(&self, distance: f32) -> Vec3 {
        self.origin + self.direction * distance
    }
}

/// Slab test. Returns `(enter, exit)` distances along the ray for the
/// infinite line through it, or `None` if the line misses the box.
#[inline]
pub fn ray_box_interval(ray: &Ray, bounds: &Bounds) -> Option<(f32, f32)> {
    let mut enter = f32::NEG_INFINITY;
    let mut exit = f32::INFINITY;
    for axis in 0..3 {
        let origin = ray.origin[axis];
        let dir = ray.direction[axis];
        let (lo, hi) = (bounds.min[axis], bounds.max[axis]);
        if dir.abs() < f32::EPSILON {
            // Parallel to this slab
            if origin < lo || origin > hi {
                return None;
            }
            continue;
        }
        let inv = 1.0 / dir;
        let mut t0 = (lo - origin) * inv;
        let mut t1 = (hi - origin) * inv;
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }
        enter = enter.max(t0);
        exit = exit.min(t1);
        if enter > exit {
            return None;
        }
    }
    Some((enter, exit))
}

/// Distance at which the ray enters the box from outside, if that happens
/// within `max_distance`.
///
/// A ray starting inside (or on the surface of) the box never reports it,
/// the same as a one-sided collider. Tracing both directions of a segment
/// covers that case.
#[inline]
pub fn ray_box_entry(ray: &Ray, bounds: &Bounds, max_distance: f32) -> Option<f32> {
    let (enter, exit) = ray_box_interval(ray, bounds)?;
    if enter > 0.0 && enter <= max_distance && exit >= enter {
        Some(enter)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box() -> Bounds {
        Bounds::new(Vec3::ZERO, Vec3::ONE)
    }

    #[test]
    fn hit_from_outside() {
        let ray = Ray::new(Vec3::new(-2.0, 0.5, 0.5), Vec3::X);
        assert_eq!(ray_box_entry(&ray, &unit_box(), 10.0), Some(2.0));
        assert_eq!(ray.at(2.0), Vec3::new(0.0, 0.5, 0.5));
    }

    #[test]
    fn too_short() {
        let ray = Ray::new(Vec3::new(-2.0, 0.5, 0.5), Vec3::X);
        assert_eq!(ray_box_entry(&ray, &unit_box(), 1.5), None);
    }

    #[test]
    fn origin_inside_is_ignored() {
        let ray = Ray::new(Vec3::splat(0.5), Vec3::X);
        assert!(ray_box_interval(&ray, &unit_box()).is_some());
        assert_eq!(ray_box_entry(&ray, &unit_box(), 10.0), None);
    }

    #[test]
    fn pointing_away() {
        let ray = Ray::new(Vec3::new(-2.0, 0.5, 0.5), Vec3::NEG_X);
        assert_eq!(ray_box_entry(&ray, &unit_box(), 10.0), None);
    }

    #[test]
    fn parallel_outside_slab() {
        let ray = Ray::new(Vec3::new(-2.0, 2.0, 0.5), Vec3::X);
        assert!(ray_box_interval(&ray, &unit_box()).is_none());
    }

    #[test]
    fn diagonal() {
        let dir = Vec3::new(1.0, 1.0, 0.0).normalize();
        let ray = Ray::new(Vec3::new(-1.0, -1.0, 0.5), dir);
        let t = ray_box_entry(&ray, &unit_box(), 10.0).unwrap();
        assert!((t - 2f32.sqrt()).abs() < 1e-5);
    }
}
