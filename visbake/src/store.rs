#[cfg(feature = "hprof")]
use coarse_prof::profile;
use serde::{Deserialize, Serialize};

use crate::BakeError;

/// Bit packed visibility table keyed by `(object, cell)`.
///
/// Bit `object * cell_count + cell` is set when the object may be visible
/// from the cell. Everything starts out invisible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibilityStore {
    object_count: usize,
    cell_count: usize,
    data: Vec<u32>,
}

impl VisibilityStore {
    pub fn allocate(object_count: usize, cell_count: usize) -> Result<Self, BakeError> {
        #[cfg(feature = "hprof")]
        profile!("visibility_store_allocate");
        let bit_count = object_count
            .checked_mul(cell_count)
            .filter(|&bits| bits > 0)
            .ok_or(BakeError::InvalidCounts {
                objects: object_count,
                cells: cell_count,
            })?;
        let words_needed = bit_count.div_ceil(32);

        Ok(Self {
            object_count,
            cell_count,
            data: vec![0; words_needed],
        })
    }

    #[inline]
    pub fn object_count(&self) -> usize {
        self.object_count
    }

    #[inline]
    pub fn cell_count(&self) -> usize {
        self.cell_count
    }

    #[inline]
    fn bit(&self, object: usize, cell: usize) -> (usize, u32) {
        debug_assert!(object < self.object_count && cell < self.cell_count);
        let bit_index = object * self.cell_count + cell;
        (bit_index / 32, 1u32 << (bit_index % 32))
    }

    #[inline]
    pub fn set(&mut self, object: usize, cell: usize, visible: bool) {
        let (word, mask) = self.bit(object, cell);
        if visible {
            self.data[word] |= mask;
        } else {
            self.data[word] &= !mask;
        }
    }

    #[inline]
    pub fn get(&self, object: usize, cell: usize) -> bool {
        let (word, mask) = self.bit(object, cell);
        self.data[word] & mask != 0
    }

    /// Objects flagged visible from `cell`.
    pub fn visible_objects(&self, cell: usize) -> Vec<usize> {
        (0..self.object_count)
            .filter(|&object| self.get(object, cell))
            .collect()
    }

    /// Number of set bits, for stats.
    pub fn count_visible(&self) -> usize {
        self.data.iter().map(|w| w.count_ones() as usize).sum()
    }

    #[inline]
    pub fn words(&self) -> &[u32] {
        &self.data
    }

    /// Returns memory usage in bytes
    pub fn memory_usage(&self) -> usize {
        std::mem::size_of::<Self>() + self.data.len() * std::mem::size_of::<u32>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_in_words() {
        assert_eq!(VisibilityStore::allocate(1, 32).unwrap().words().len(), 1);
        assert_eq!(VisibilityStore::allocate(1, 33).unwrap().words().len(), 2);
        assert_eq!(VisibilityStore::allocate(3, 7).unwrap().words().len(), 1);
        assert_eq!(VisibilityStore::allocate(10, 100).unwrap().words().len(), 32);
    }

    #[test]
    fn refuses_empty() {
        assert!(matches!(
            VisibilityStore::allocate(0, 10),
            Err(BakeError::InvalidCounts { .. })
        ));
        assert!(VisibilityStore::allocate(10, 0).is_err());
        assert!(VisibilityStore::allocate(usize::MAX, 2).is_err());
    }

    #[test]
    fn set_get_every_key() {
        for (objects, cells) in [(1, 1), (3, 11), (5, 32), (7, 45)] {
            let mut store = VisibilityStore::allocate(objects, cells).unwrap();
            for o in 0..objects {
                for c in 0..cells {
                    assert!(!store.get(o, c));
                }
            }
            // every third key
            for o in 0..objects {
                for c in 0..cells {
                    if (o * cells + c) % 3 == 0 {
                        store.set(o, c, true);
                    }
                }
            }
            for o in 0..objects {
                for c in 0..cells {
                    assert_eq!(store.get(o, c), (o * cells + c) % 3 == 0);
                }
            }
        }
    }

    #[test]
    fn clearing_leaves_neighbours() {
        let mut store = VisibilityStore::allocate(2, 40).unwrap();
        for c in 0..40 {
            store.set(0, c, true);
            store.set(1, c, true);
        }
        store.set(0, 31, false);
        store.set(1, 0, false);
        assert_eq!(store.count_visible(), 78);
        assert!(!store.get(0, 31));
        assert!(!store.get(1, 0));
        assert!(store.get(0, 30) && store.get(0, 32) && store.get(0, 39) && store.get(1, 1));
        assert_eq!(store.visible_objects(0), vec![0]);
        assert_eq!(store.visible_objects(31), vec![1]);
    }
}
