//! Where the bake gets its objects from.

use glam::Vec3;
use math::Bounds;
use serde::{Deserialize, Serialize};

/// Tag marking an entry whose visibility gets baked.
pub const PVS_TAG: &str = "PVS";

/// A static object as the bake sees it. Its index is its position in the
/// list it came in.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneObject {
    pub name: String,
    pub bounds: Bounds,
}

impl SceneObject {
    pub fn new(name: impl Into<String>, bounds: Bounds) -> Self {
        Self {
            name: name.into(),
            bounds,
        }
    }
}

/// Supplies the objects for one bake. Both lists must stay the same for the
/// whole run.
pub trait SceneSource {
    /// Objects to bake visibility for, in bake order.
    fn targets(&self) -> Vec<SceneObject>;
    /// All static geometry. Encloses the world bounds and blocks rays.
    fn occluders(&self) -> Vec<SceneObject>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneEntry {
    pub name: String,
    pub min: Vec3,
    pub max: Vec3,
    #[serde(default = "default_static")]
    pub is_static: bool,
    #[serde(default)]
    pub tag: Option<String>,
}

fn default_static() -> bool {
    true
}

impl SceneEntry {
    pub fn bounds(&self) -> Bounds {
        Bounds::new(self.min, self.max)
    }

    fn is_target(&self) -> bool {
        self.is_static && self.tag.as_deref() == Some(PVS_TAG)
    }
}

/// A flat scene description: every static entry occludes, static entries
/// tagged [`PVS_TAG`] are baked, everything else is ignored.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticScene {
    #[serde(default)]
    pub objects: Vec<SceneEntry>,
}

impl StaticScene {
    pub fn push(&mut self, name: &str, bounds: Bounds, is_static: bool, tag: Option<&str>) {
        self.objects.push(SceneEntry {
            name: name.to_owned(),
            min: bounds.min,
            max: bounds.max,
            is_static,
            tag: tag.map(str::to_owned),
        });
    }

    /// Adds a static, baked object.
    pub fn push_target(&mut self, name: &str, bounds: Bounds) {
        self.push(name, bounds, true, Some(PVS_TAG));
    }

    /// Adds static geometry that only blocks.
    pub fn push_occluder(&mut self, name: &str, bounds: Bounds) {
        self.push(name, bounds, true, None);
    }

    /// Checksum over everything that affects a bake of this scene.
    pub fn fingerprint(&self) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        for entry in &self.objects {
            hasher.update(entry.name.as_bytes());
            for v in entry.min.to_array().iter().chain(entry.max.to_array().iter()) {
                hasher.update(&v.to_le_bytes());
            }
            hasher.update(&[entry.is_static as u8]);
            hasher.update(entry.tag.as_deref().unwrap_or("").as_bytes());
        }
        hasher.finalize()
    }
}

impl SceneSource for StaticScene {
    fn targets(&self) -> Vec<SceneObject> {
        self.objects
            .iter()
            .filter(|e| e.is_target())
            .map(|e| SceneObject::new(e.name.clone(), e.bounds()))
            .collect()
    }

    fn occluders(&self) -> Vec<SceneObject> {
        self.objects
            .iter()
            .filter(|e| e.is_static)
            .map(|e| SceneObject::new(e.name.clone(), e.bounds()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene() -> StaticScene {
        let mut scene = StaticScene::default();
        scene.push_target("crate", Bounds::new(Vec3::ZERO, Vec3::ONE));
        scene.push_occluder("wall", Bounds::new(Vec3::X * 3.0, Vec3::new(4.0, 5.0, 5.0)));
        scene.push("door", Bounds::new(Vec3::ONE, Vec3::splat(2.0)), false, Some(PVS_TAG));
        scene.push("lamp", Bounds::new(Vec3::ZERO, Vec3::splat(0.5)), true, Some("Light"));
        scene
    }

    #[test]
    fn host_filter() {
        let scene = scene();
        let targets: Vec<_> = scene.targets().into_iter().map(|o| o.name).collect();
        let occluders: Vec<_> = scene.occluders().into_iter().map(|o| o.name).collect();
        assert_eq!(targets, vec!["crate"]);
        assert_eq!(occluders, vec!["crate", "wall", "lamp"]);
    }

    #[test]
    fn fingerprint_tracks_changes() {
        let a = scene();
        let mut b = scene();
        assert_eq!(a.fingerprint(), b.fingerprint());
        b.objects[1].max.y = 6.0;
        assert_ne!(a.fingerprint(), b.fingerprint());
    }
}
