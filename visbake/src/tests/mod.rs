
use glam::{Vec2, Vec3};
use math::Bounds;

use crate::{BakeConfig, OcclusionBackend, StaticScene};

/// Two unit cubes 10 apart along X, optionally with a wall between them that
/// spans the whole world in Y and Z.
pub(crate) fn two_cubes(with_wall: bool) -> StaticScene {
    let mut scene = StaticScene::default();
    scene.push_target("a", Bounds::new(Vec3::ZERO, Vec3::ONE));
    scene.push_target("b", Bounds::new(Vec3::new(11.0, 0.0, 0.0), Vec3::new(12.0, 1.0, 1.0)));
    if with_wall {
        scene.push_occluder(
            "wall",
            Bounds::new(Vec3::new(5.5, -4.5, -4.5), Vec3::new(6.5, 5.5, 5.5)),
        );
    }
    scene
}

pub(crate) fn coarse_config(backend: OcclusionBackend) -> BakeConfig {
    BakeConfig {
        cell_size: Vec3::splat(10.0),
        ray_step: Vec2::splat(1.0),
        backend,
        parallel: true,
        batch_size: None,
    }
}
