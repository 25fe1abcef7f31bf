//! A finished bake on disk: grid, object order and the packed bits.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
};

#[cfg(feature = "hprof")]
use coarse_prof::profile;
use glam::Vec3;
use log::{info, warn};
use math::Bounds;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{BakeError, grid::SpatialGrid, scene::SceneObject, store::VisibilityStore};

const MAGIC: &[u8; 4] = b"PVSB";
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BakedVisibility {
    grid: SpatialGrid,
    object_names: Vec<String>,
    store: VisibilityStore,
}

impl BakedVisibility {
    pub fn new(grid: SpatialGrid, object_names: Vec<String>, store: VisibilityStore) -> Self {
        Self {
            grid,
            object_names,
            store,
        }
    }

    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    pub fn object_names(&self) -> &[String] {
        &self.object_names
    }

    pub fn store(&self) -> &VisibilityStore {
        &self.store
    }

    pub fn memory_usage(&self) -> usize {
        self.store.memory_usage()
    }

    /// Whether this data was baked for exactly these targets over this grid.
    pub fn is_valid_for(
        &self,
        targets: &[SceneObject],
        world_bounds: &Bounds,
        cell_size: Vec3,
    ) -> bool {
        self.grid.world_bounds() == world_bounds
            && self.grid.cell_size() == cell_size
            && self.object_names.len() == targets.len()
            && self.object_names.iter().zip(targets).all(|(name, t)| *name == t.name)
    }

    /// Linear index of the cell holding `point`.
    pub fn cell_containing(&self, point: Vec3) -> Option<usize> {
        self.grid
            .cell_containing(point)
            .map(|cell| self.grid.linear_index(cell))
    }

    /// Names of the objects visible from the cell holding `point`. Empty
    /// outside the grid.
    pub fn visible_from(&self, point: Vec3) -> Vec<&str> {
        let Some(cell) = self.cell_containing(point) else {
            return Vec::new();
        };
        self.store
            .visible_objects(cell)
            .into_iter()
            .map(|object| self.object_names[object].as_str())
            .collect()
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), BakeError> {
        #[cfg(feature = "hprof")]
        profile!("baked_save_to_file");
        write_framed(path.as_ref(), MAGIC, self)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, BakeError> {
        #[cfg(feature = "hprof")]
        profile!("baked_load_from_file");
        let baked: Self = read_framed(path.as_ref(), MAGIC, "baked visibility")?;
        check_store(&baked.store, baked.object_names.len(), &baked.grid)?;
        Ok(baked)
    }

    /// Cache file for a scene, creating the cache directory if needed.
    pub fn cache_path(scene_name: &str, fingerprint: u32) -> Result<PathBuf, BakeError> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| BakeError::Format("could not determine cache directory".into()))?
            .join("visbake")
            .join("pvs");
        std::fs::create_dir_all(&cache_dir)?;
        Ok(cache_dir.join(format!("{scene_name}_{fingerprint:08x}.pvs")))
    }

    /// Cached bake for the scene if there is one and it still matches,
    /// otherwise `None`.
    pub fn load_from_cache(
        scene_name: &str,
        fingerprint: u32,
        targets: &[SceneObject],
        world_bounds: &Bounds,
        cell_size: Vec3,
    ) -> Option<Self> {
        #[cfg(feature = "hprof")]
        profile!("baked_load_from_cache");
        let path = Self::cache_path(scene_name, fingerprint).ok()?;
        if !path.exists() {
            return None;
        }
        info!("Found PVS data at {path:?}");
        match Self::load_from_file(&path) {
            Ok(baked) if baked.is_valid_for(targets, world_bounds, cell_size) => Some(baked),
            Ok(_) => {
                warn!("Cached PVS data at {path:?} is for a different scene");
                None
            }
            Err(e) => {
                warn!("Could not load cached PVS data: {e}");
                None
            }
        }
    }
}

/// Writes `value` as magic, version, crc32 and length followed by the bincode
/// payload. The file is written next to `path` and renamed over it once
/// complete.
pub(crate) fn write_framed<T: Serialize>(
    path: &Path,
    magic: &[u8; 4],
    value: &T,
) -> Result<(), BakeError> {
    let payload = bincode::serialize(value)?;
    let mut partial = path.as_os_str().to_owned();
    partial.push(".tmp");
    let partial = PathBuf::from(partial);

    let mut file = BufWriter::new(File::create(&partial)?);
    file.write_all(magic)?;
    file.write_all(&FORMAT_VERSION.to_le_bytes())?;
    file.write_all(&crc32fast::hash(&payload).to_le_bytes())?;
    file.write_all(&(payload.len() as u64).to_le_bytes())?;
    file.write_all(&payload)?;
    file.flush()?;
    drop(file);
    std::fs::rename(&partial, path)?;
    Ok(())
}

pub(crate) fn read_framed<T: DeserializeOwned>(
    path: &Path,
    magic: &[u8; 4],
    what: &str,
) -> Result<T, BakeError> {
    let mut file = BufReader::new(File::open(path)?);

    let mut header = [0u8; 4];
    file.read_exact(&mut header)?;
    if &header != magic {
        return Err(BakeError::Format(format!("not a {what} file")));
    }

    let mut word = [0u8; 4];
    file.read_exact(&mut word)?;
    let version = u32::from_le_bytes(word);
    if version != FORMAT_VERSION {
        return Err(BakeError::Format(format!(
            "format version {version}, expected {FORMAT_VERSION}"
        )));
    }

    file.read_exact(&mut word)?;
    let checksum = u32::from_le_bytes(word);

    let mut len = [0u8; 8];
    file.read_exact(&mut len)?;
    let len = u64::from_le_bytes(len) as usize;

    let mut payload = Vec::new();
    file.take(len as u64).read_to_end(&mut payload)?;
    if payload.len() != len {
        return Err(BakeError::Format(format!(
            "payload is {} bytes, header says {len}",
            payload.len()
        )));
    }
    if crc32fast::hash(&payload) != checksum {
        return Err(BakeError::Format("checksum mismatch".into()));
    }
    Ok(bincode::deserialize(&payload)?)
}

/// The store must hold exactly one bit per object per grid cell.
pub(crate) fn check_store(
    store: &VisibilityStore,
    objects: usize,
    grid: &SpatialGrid,
) -> Result<(), BakeError> {
    let bits = store.object_count().saturating_mul(store.cell_count());
    if store.object_count() != objects
        || store.cell_count() != grid.total_cells()
        || store.words().len() != bits.div_ceil(32)
    {
        return Err(BakeError::Format("store doesn't match grid or objects".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use glam::UVec3;

    use super::*;

    fn sample() -> BakedVisibility {
        let world = Bounds::new(Vec3::ZERO, Vec3::new(20.0, 10.0, 10.0));
        let grid = SpatialGrid::new(world, Vec3::splat(10.0)).unwrap();
        let mut store = VisibilityStore::allocate(2, grid.total_cells()).unwrap();
        store.set(0, 0, true);
        store.set(1, 1, true);
        store.set(1, 0, true);
        BakedVisibility::new(grid, vec!["a".into(), "b".into()], store)
    }

    #[test]
    fn visible_from_points() {
        let baked = sample();
        assert_eq!(baked.visible_from(Vec3::splat(1.0)), vec!["a", "b"]);
        assert_eq!(baked.visible_from(Vec3::new(15.0, 5.0, 5.0)), vec!["b"]);
        assert!(baked.visible_from(Vec3::splat(-1.0)).is_empty());
        assert_eq!(
            baked.cell_containing(Vec3::new(15.0, 5.0, 5.0)),
            Some(baked.grid().linear_index(UVec3::X))
        );
    }

    #[test]
    fn validity_checks_names_and_grid() {
        let baked = sample();
        let targets = vec![
            SceneObject::new("a", Bounds::new(Vec3::ZERO, Vec3::ONE)),
            SceneObject::new("b", Bounds::new(Vec3::ZERO, Vec3::ONE)),
        ];
        let world = *baked.grid().world_bounds();
        assert!(baked.is_valid_for(&targets, &world, Vec3::splat(10.0)));
        assert!(!baked.is_valid_for(&targets[..1], &world, Vec3::splat(10.0)));
        assert!(!baked.is_valid_for(&targets, &world, Vec3::splat(5.0)));

        let renamed = vec![targets[1].clone(), targets[0].clone()];
        assert!(!baked.is_valid_for(&renamed, &world, Vec3::splat(10.0)));
    }
}
