use std::collections::HashMap;

use crate::{
    Partition, Result,
    mutex::{RwLock, read, write},
};

/// Per-partition state for the in-memory stores.
///
/// The map is only write-locked the first time a partition is seen; every
/// later access shares the read lock and synchronizes on the partition's own
/// state `C`, so partitions never contend with each other.
pub(crate) struct Partitions<C> {
    map: RwLock<HashMap<Partition, C>>,
}

impl<C: Default> Partitions<C> {
    pub(crate) fn new() -> Self {
        Self {
            map: RwLock::new(HashMap::new()),
        }
    }

    /// Runs `f` on the partition's state if it exists.
    pub(crate) fn peek<R>(&self, partition: &Partition, f: impl FnOnce(&C) -> R) -> Result<Option<R>> {
        Ok(read(&self.map)?.get(partition).map(f))
    }

    /// Runs `f` on the partition's state, creating it on first use.
    pub(crate) fn with<R>(&self, partition: &Partition, f: impl FnOnce(&C) -> R) -> Result<R> {
        {
            let map = read(&self.map)?;
            if let Some(state) = map.get(partition) {
                return Ok(f(state));
            }
        }
        let mut map = write(&self.map)?;
        Ok(f(map.entry(*partition).or_default()))
    }

    /// Returns every partition seen so far, sorted.
    pub(crate) fn keys(&self) -> Result<Vec<Partition>> {
        let mut keys: Vec<_> = read(&self.map)?.keys().copied().collect();
        keys.sort_unstable();
        Ok(keys)
    }
}
