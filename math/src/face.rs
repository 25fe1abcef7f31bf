use glam::{Vec2, Vec3};

use crate::Bounds;

/// An oriented rectangle on the surface of a box.
///
/// `corner` is the "left bottom" corner, the rectangle spans `size.x` along
/// `right` and `size.y` along `up`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Face {
    pub corner: Vec3,
    pub size: Vec2,
    pub right: Vec3,
    pub up: Vec3,
}

impl Face {
    #[inline]
    pub fn right_bottom(&self) -> Vec3 {
        self.corner + self.size.x * self.right
    }

    #[inline]
    pub fn right_top(&self) -> Vec3 {
        self.corner + self.size.x * self.right + self.size.y * self.up
    }

    #[inline]
    pub fn left_top(&self) -> Vec3 {
        self.corner + self.size.y * self.up
    }

    /// Corners in winding order, starting at `corner`.
    #[inline]
    pub fn corners(&self) -> [Vec3; 4] {
        [
            self.corner,
            self.right_bottom(),
            self.right_top(),
            self.left_top(),
        ]
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        0.5 * (self.corner + self.right_top())
    }

    /// Outward normal. The `right`/`up` pairs produced by [`faces_of`] are
    /// wound so that `up × right` leaves the box.
    #[inline]
    pub fn normal(&self) -> Vec3 {
        self.up.cross(self.right)
    }
}

/// The six faces of `bounds` in fixed order: -Z, +Z, -Y, +Y, -X, +X.
///
/// Order and winding are part of the baked data contract, a different order
/// changes which face pair answers first.
pub fn faces_of(bounds: &Bounds) -> [Face; 6] {
    let min = bounds.min;
    let max = bounds.max;
    let size = bounds.size();
    [
        // -Z
        Face {
            corner: Vec3::new(min.x, min.y, min.z),
            size: Vec2::new(size.x, size.y),
            right: Vec3::X,
            up: Vec3::Y,
        },
        // +Z
        Face {
            corner: Vec3::new(max.x, min.y, max.z),
            size: Vec2::new(size.x, size.y),
            right: Vec3::NEG_X,
            up: Vec3::Y,
        },
        // -Y
        Face {
            corner: Vec3::new(min.x, min.y, max.z),
            size: Vec2::new(size.x, size.z),
            right: Vec3::X,
            up: Vec3::NEG_Z,
        },
        // +Y
        Face {
            corner: Vec3::new(min.x, max.y, min.z),
            size: Vec2::new(size.x, size.z),
            right: Vec3::X,
            up: Vec3::Z,
        },
        // -X
        Face {
            corner: Vec3::new(min.x, min.y, max.z),
            size: Vec2::new(size.z, size.y),
            right: Vec3::NEG_Z,
            up: Vec3::Y,
        },
        // +X
        Face {
            corner: Vec3::new(max.x, min.y, min.z),
            size: Vec2::new(size.z, size.y),
            right: Vec3::Z,
            up: Vec3::Y,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxes() -> Vec<Bounds> {
        vec![
            Bounds::new(Vec3::ZERO, Vec3::ONE),
            Bounds::new(Vec3::new(-4.0, 2.0, 7.5), Vec3::new(3.0, 2.5, 30.0)),
            Bounds::new(Vec3::splat(-100.0), Vec3::new(-99.0, 250.0, -42.0)),
        ]
    }

    #[test]
    fn normals_point_outward() {
        for b in boxes() {
            for face in faces_of(&b) {
                let n = face.normal();
                assert!((n.length() - 1.0).abs() < 1e-6);
                assert!(n.dot(b.center() - face.center()) <= 0.0, "{face:?} of {b:?}");
            }
        }
    }

    #[test]
    fn normals_are_distinct() {
        let faces = faces_of(&Bounds::new(Vec3::ZERO, Vec3::new(1.0, 2.0, 3.0)));
        let normals: Vec<Vec3> = faces.iter().map(Face::normal).collect();
        assert_eq!(
            normals,
            vec![
                Vec3::NEG_Z,
                Vec3::Z,
                Vec3::NEG_Y,
                Vec3::Y,
                Vec3::NEG_X,
                Vec3::X
            ]
        );
        for (i, a) in normals.iter().enumerate() {
            for b in &normals[i + 1..] {
                assert!(a.dot(*b) < 0.5);
            }
        }
    }

    #[test]
    fn faces_lie_on_box_surface() {
        for b in boxes() {
            for face in faces_of(&b) {
                for corner in face.corners() {
                    assert!(b.expand(1e-4).contains(corner), "{corner} off {b:?}");
                }
                // the face plane is a box side
                let n = face.normal();
                let on_side = face.center() + n * 1e-3;
                assert!(!b.contains(on_side));
            }
        }
    }

    #[test]
    fn face_area_matches_box() {
        let b = Bounds::new(Vec3::ZERO, Vec3::new(1.0, 2.0, 3.0));
        let areas: Vec<f32> = faces_of(&b).iter().map(|f| f.size.x * f.size.y).collect();
        assert_eq!(areas, vec![2.0, 2.0, 3.0, 3.0, 6.0, 6.0]);
    }
}
