use core::time::Duration;

use portable_atomic::{AtomicU32, Ordering};
#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    Error, MAX_SEQUENCE, Partition, ReserveStatus, Result, SequenceRange, SequenceStore,
    store::Partitions,
};

#[cfg(feature = "cache-padded")]
type Counter = crossbeam_utils::CachePadded<AtomicU32>;
#[cfg(not(feature = "cache-padded"))]
type Counter = AtomicU32;

/// A lock-free sequence store suitable for multi-threaded environments.
///
/// Each partition's highest reserved sequence lives in its own [`AtomicU32`].
/// A reservation loads the counter, plans the block, and commits it with a
/// single compare-and-swap; losing the swap means another thread reserved
/// first, and the attempt reports [`ReserveStatus::Contended`] without
/// touching the counter.
///
/// ## Features
/// - ✅ Thread-safe
/// - ✅ Lock-free on the reservation path
/// - ❌ Durable: state lives only as long as the process
///
/// ## Recommended When
/// - You're in a multi-threaded environment
/// - Throughput matters more than fair access
/// - Counters are rebuilt from a durable ledger on startup
///
/// ## See Also
/// - [`LockSequenceStore`]
///
/// [`LockSequenceStore`]: crate::LockSequenceStore
pub struct AtomicSequenceStore {
    partitions: Partitions<Counter>,
}

impl AtomicSequenceStore {
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
    /// Returns [`Error::LockPoisoned`] if the partition map was poisoned.
    pub fn partitions(&self) -> Result<Vec<Partition>> {
        self.partitions.keys()
    }

    /// Returns the highest sequence reserved in `partition`, or 0.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockPoisoned`] if the partition map was poisoned.
    pub fn peek_highest(&self, partition: &Partition) -> Result<u32> {
        Ok(self
            .partitions
            .peek(partition, |counter| counter.load(Ordering::Acquire))?
            .unwrap_or(0))
    }

    /// Makes one attempt at reserving `count` numbers.
    ///
    /// # Returns
    /// - `Ok(ReserveStatus::Reserved { range })`: the block is committed
    /// - `Ok(ReserveStatus::Contended { retry_after })`: the swap lost to a
    ///   concurrent reservation; `retry_after` is always zero
    ///
    /// # Errors
    /// - [`Error::InvalidQuantity`] if `count` is zero
    /// - [`Error::CapacityExceeded`] if the block would pass 99999
    ///
    /// # Example
    /// ```
    /// use serialid::{AtomicSequenceStore, Partition, Region, ReserveStatus};
    ///
    /// let store = AtomicSequenceStore::new();
    /// let pt = Partition::of_region(Region::new("PT")?);
    ///
    /// let range = loop {
    ///     match store.try_reserve_block(&pt, 3)? {
    ///         ReserveStatus::Reserved { range } => break range,
    ///         ReserveStatus::Contended { .. } => std::thread::yield_now(),
    ///     }
    /// };
    /// assert_eq!((range.first(), range.last()), (1, 3));
    /// # Ok::<(), serialid::Error>(())
    /// ```
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn try_reserve_block(&self, partition: &Partition, count: u32) -> Result<ReserveStatus> {
        self.partitions.with(partition, |counter| {
            let highest = counter.load(Ordering::Acquire);
            let range = SequenceRange::next_block(partition, highest, count)?;

            if counter
                .compare_exchange(highest, range.last(), Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                Ok(ReserveStatus::Reserved { range })
            } else {
                // CAS failed - another thread won the race. Yield 0 to retry
                // immediately.
                Ok(ReserveStatus::Contended {
                    retry_after: Duration::ZERO,
                })
            }
        })?
    }

    /// Raises the counter to at least `highest`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `highest` exceeds 99999.
    pub fn raise_highest(&self, partition: &Partition, highest: u32) -> Result<u32> {
        check_highest(highest)?;
        self.partitions.with(partition, |counter| {
            counter.fetch_max(highest, Ordering::AcqRel).max(highest)
        })
    }
}

impl Default for AtomicSequenceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceStore for AtomicSequenceStore {
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

pub(crate) fn check_highest(highest: u32) -> Result<()> {
    if highest > MAX_SEQUENCE {
        return Err(Error::invalid(format!(
            "highest sequence {highest} exceeds {MAX_SEQUENCE}"
        )));
    }
    Ok(())
}
