//! Value types and the pure geometry used by the visibility bake.

mod bounds;
mod face;
mod facing;
mod intercept;

pub use bounds::*;
pub use face::*;
pub use facing::*;
pub use intercept::*;

pub use glam;
