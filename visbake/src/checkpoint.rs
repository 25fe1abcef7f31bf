//! A bake that hasn't finished yet, kept on disk next to its output so an
//! interrupted run can pick up where it stopped.

use std::path::{Path, PathBuf};

#[cfg(feature = "hprof")]
use coarse_prof::profile;
use serde::{Deserialize, Serialize};

use crate::{
    BakeError,
    bake::BakeStats,
    baked::{check_store, read_framed, write_framed},
    grid::SpatialGrid,
    store::VisibilityStore,
};

const MAGIC: &[u8; 4] = b"PVSC";

/// Taken with [`crate::Baker::checkpoint`], restored with
/// [`crate::Baker::resume_from`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BakeCheckpoint {
    pub(crate) fingerprint: u32,
    pub(crate) grid: SpatialGrid,
    pub(crate) object_names: Vec<String>,
    pub(crate) store: VisibilityStore,
    pub(crate) baked: Vec<bool>,
    pub(crate) stats: BakeStats,
}

impl BakeCheckpoint {
    /// Scene fingerprint the checkpoint was taken for.
    pub fn fingerprint(&self) -> u32 {
        self.fingerprint
    }

    pub fn objects_baked(&self) -> usize {
        self.baked.iter().filter(|&&done| done).count()
    }

    pub fn total_objects(&self) -> usize {
        self.baked.len()
    }

    /// `output` with `.part` appended.
    pub fn path_for(output: &Path) -> PathBuf {
        let mut path = output.as_os_str().to_owned();
        path.push(".part");
        PathBuf::from(path)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), BakeError> {
        #[cfg(feature = "hprof")]
        profile!("checkpoint_save_to_file");
        write_framed(path.as_ref(), MAGIC, self)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, BakeError> {
        #[cfg(feature = "hprof")]
        profile!("checkpoint_load_from_file");
        let checkpoint: Self = read_framed(path.as_ref(), MAGIC, "bake checkpoint")?;
        if checkpoint.baked.len() != checkpoint.object_names.len() {
            return Err(BakeError::Format(
                "checkpoint flags don't match its objects".into(),
            ));
        }
        check_store(
            &checkpoint.store,
            checkpoint.object_names.len(),
            &checkpoint.grid,
        )?;
        Ok(checkpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_file_sits_next_to_output() {
        let path = BakeCheckpoint::path_for(Path::new("/tmp/pvs/hall_0000abcd.pvs"));
        assert_eq!(path, PathBuf::from("/tmp/pvs/hall_0000abcd.pvs.part"));
    }
}
