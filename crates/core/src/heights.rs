//! The shared measured-height map.
//!
//! Several writers feed it: convergence loops for their own sections, and
//! out-of-band sources such as a grid height reported by the surface. Writes
//! are always keyed merges so no writer erases another's entries.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tabula_types::RegionKey;

#[derive(Debug, Clone, Default)]
pub struct MeasuredHeights {
    inner: Arc<RwLock<HashMap<RegionKey, f32>>>,
}

impl MeasuredHeights {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<RegionKey, f32>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<RegionKey, f32>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts or overwrites the given entries and leaves every other key
    /// untouched. Zero, negative and non-finite heights are not
    /// measurements and are ignored. Returns how many entries changed.
    pub fn merge<I>(&self, entries: I) -> usize
    where
        I: IntoIterator<Item = (RegionKey, f32)>,
    {
        let mut map = self.write();
        let mut changed = 0;
        for (key, height) in entries {
            if !(height.is_finite() && height > 0.0) {
                continue;
            }
            if map.insert(key, height) != Some(height) {
                changed += 1;
            }
        }
        changed
    }

    pub fn get(&self, key: &RegionKey) -> Option<f32> {
        self.read().get(key).copied()
    }

    /// Forgets the given keys so they fall back to estimates until measured again.
    pub fn invalidate<'a, I>(&self, keys: I)
    where
        I: IntoIterator<Item = &'a RegionKey>,
    {
        let mut map = self.write();
        for key in keys {
            map.remove(key);
        }
    }

    pub fn invalidate_section(&self, section: usize) {
        self.write().retain(|key, _| key.section() != Some(section));
    }

    /// A point-in-time copy for lock-free reads during layout.
    pub fn snapshot(&self) -> HashMap<RegionKey, f32> {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.write().clear();
    }
}
