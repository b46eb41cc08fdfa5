#[cfg(feature = "tracing")]
use tracing::instrument;

use super::atomic::check_highest;
use crate::{
    Partition, ReserveStatus, Result, SequenceRange, SequenceStore,
    mutex::{Mutex, lock},
    store::Partitions,
};

#[cfg(feature = "cache-padded")]
type State = crossbeam_utils::CachePadded<Mutex<u32>>;
#[cfg(not(feature = "cache-padded"))]
type State = Mutex<u32>;

/// A lock-based sequence store suitable for multi-threaded environments.
///
/// Each partition's counter sits behind its own [`Mutex`], so a reservation is
/// a plain read-increment-write inside the critical section and never reports
/// [`ReserveStatus::Contended`].
///
/// ## Features
/// - ✅ Thread-safe
/// - ✅ Fair access across threads (with `parking-lot`)
/// - ❌ Durable: state lives only as long as the process
///
/// ## Recommended When
/// - You're in a multi-threaded environment
/// - Many callers hammer the same partition and fairness matters
///
/// ## See Also
/// - [`AtomicSequenceStore`]
///
/// [`AtomicSequenceStore`]: crate::AtomicSequenceStore
pub struct LockSequenceStore {
    partitions: Partitions<State>,
}

impl LockSequenceStore {
    /// Creates an empty store; every partition starts at 0.
    pub fn new() -> Self {
        Self {
            partitions: Partitions::new(),
        }
    }

    /// Returns every partition that has been touched, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if a lock was poisoned.
    pub fn partitions(&self) -> Result<Vec<Partition>> {
        self.partitions.keys()
    }

    /// Returns the highest sequence reserved in `partition`, or 0.
    ///
    /// # Errors
    ///
    /// Returns an error if a lock was poisoned.
    pub fn peek_highest(&self, partition: &Partition) -> Result<u32> {
        let highest = self
            .partitions
            .peek(partition, |state| lock(state).map(|highest| *highest))?;
        Ok(highest.transpose()?.unwrap_or(0))
    }

    /// Reserves `count` numbers under the partition's lock.
    ///
    /// # Returns
    /// - `Ok(ReserveStatus::Reserved { range })`: always, on success
    ///
    /// # Errors
    /// - [`crate::Error::InvalidQuantity`] if `count` is zero
    /// - [`crate::Error::CapacityExceeded`] if the block would pass 99999
    /// - an error if the lock was poisoned
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn try_reserve_block(&self, partition: &Partition, count: u32) -> Result<ReserveStatus> {
        self.partitions.with(partition, |state| {
            let mut highest = lock(state)?;
            let range = SequenceRange::next_block(partition, *highest, count)?;
            *highest = range.last();
            Ok(ReserveStatus::Reserved { range })
        })?
    }

    /// Raises the counter to at least `highest`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidArgument`] if `highest` exceeds 99999,
    /// or an error if the lock was poisoned.
    pub fn raise_highest(&self, partition: &Partition, highest: u32) -> Result<u32> {
        check_highest(highest)?;
        self.partitions.with(partition, |state| {
            let mut current = lock(state)?;
            *current = (*current).max(highest);
            Ok(*current)
        })?
    }
}

impl Default for LockSequenceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceStore for LockSequenceStore {
    fn peek_highest(&self, partition: &Partition) -> Result<u32> {
        self.peek_highest(partition)
    }

    fn try_reserve_block(&self, partition: &Partition, count: u32) -> Result<ReserveStatus> {
        self.try_reserve_block(partition, count)
    }

    fn raise_highest(&self, partition: &Partition, highest: u32) -> Result<u32> {
        self.raise_highest(partition, highest)
    }
}
