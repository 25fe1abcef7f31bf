use crate::Face;

/// Minimum dot product for a corner pair to count as facing.
pub const FACING_EPSILON: f32 = 1e-5;

/// Coarse prune: can `a` see `b` at all?
///
/// Only the 4×4 corner pairs are tested. A pair passes when the direction
/// from the `a` corner to the `b` corner leaves `a` through its normal and
/// arrives at `b` from its front. This lets through some pairs that only
/// partially face each other; sampling decides those.
pub fn facing(a: &Face, b: &Face) -> bool {
    let a_normal = a.normal();
    let b_normal = b.normal();
    let b_corners = b.corners();
    for p1 in a.corners() {
        for p2 in b_corners {
            let dir = (p2 - p1).normalize_or_zero();
            if dir.dot(a_normal) > FACING_EPSILON && (-dir).dot(b_normal) > FACING_EPSILON {
                return true;
            }
        }
    }
    false
}
