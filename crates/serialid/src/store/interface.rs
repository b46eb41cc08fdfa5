#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    Error, Partition, ReserveStatus, Result, RetryPolicy, SequenceRange,
    retry::{Outcome, run_blocking},
};

/// A durable, partition-keyed monotonic counter.
///
/// Implementations hold, for every [`Partition`], the highest sequence number
/// ever reserved. The counter starts at 0 the first time a partition is seen,
/// only ever moves up, and is the sole synchronization point of allocation.
///
/// # Contract
///
/// - Two reservations for the same partition never return overlapping ranges,
///   no matter how many clients race.
/// - Reservations for different partitions do not contend with each other.
/// - Once [`try_reserve_block`] returns [`ReserveStatus::Reserved`], the new
///   highest value is visible to every later call.
/// - A failed reservation (`Err` or [`ReserveStatus::Contended`]) leaves the
///   counter exactly as it was.
///
/// [`try_reserve_block`]: SequenceStore::try_reserve_block
pub trait SequenceStore {
    /// Returns the highest sequence reserved in `partition`, or 0 if none.
    /// Never creates state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreUnavailable`] if the backing store cannot be
    /// read, or [`Error::LockPoisoned`] with std mutexes.
    fn peek_highest(&self, partition: &Partition) -> Result<u32>;

    /// Makes one attempt at reserving the `count` numbers following the
    /// current highest.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidQuantity`] if `count` is zero.
    /// - [`Error::CapacityExceeded`] if the block would pass 99999.
    /// - [`Error::StoreUnavailable`] on backend failure.
    fn try_reserve_block(&self, partition: &Partition, count: u32) -> Result<ReserveStatus>;

    /// Raises the counter to `highest` if it is currently lower and returns
    /// the resulting value. Used to rebuild counters from the ledger.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `highest` is beyond 99999, or the
    /// same backend errors as [`SequenceStore::peek_highest`].
    fn raise_highest(&self, partition: &Partition, highest: u32) -> Result<u32>;

    /// Reserves `count` numbers, retrying lost races and transient failures
    /// according to `policy`.
    ///
    /// # Errors
    ///
    /// Everything [`SequenceStore::try_reserve_block`] returns, plus
    /// [`Error::ConflictRetryExhausted`] when every attempt lost a race.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self, policy)))]
    fn reserve_block(
        &self,
        partition: &Partition,
        count: u32,
        policy: &RetryPolicy,
    ) -> Result<SequenceRange> {
        run_blocking(
            policy,
            |attempts| Error::ConflictRetryExhausted {
                partition: *partition,
                attempts,
            },
            || self.try_reserve_block(partition, count).map(Outcome::from),
        )
    }
}

/// Extension trait for reserving blocks from async code.
///
/// Store operations themselves stay synchronous; only the waits between
/// retries go through the [`SleepProvider`], so a lost race never parks an
/// executor thread.
///
/// [`SleepProvider`]: crate::SleepProvider
#[cfg_attr(docsrs, doc(cfg(feature = "async")))]
#[cfg(feature = "async")]
pub trait SequenceStoreAsyncExt: SequenceStore {
    /// Async counterpart of [`SequenceStore::reserve_block`].
    ///
    /// # Errors
    ///
    /// Same as [`SequenceStore::reserve_block`].
    fn reserve_block_async<S>(
        &self,
        partition: &Partition,
        count: u32,
        policy: &RetryPolicy,
    ) -> impl core::future::Future<Output = Result<SequenceRange>>
    where
        S: crate::SleepProvider;
}

#[cfg(feature = "async")]
impl<T> SequenceStoreAsyncExt for T
where
    T: SequenceStore + ?Sized,
{
    fn reserve_block_async<S>(
        &self,
        partition: &Partition,
        count: u32,
        policy: &RetryPolicy,
    ) -> impl core::future::Future<Output = Result<SequenceRange>>
    where
        S: crate::SleepProvider,
    {
        crate::retry::run_async::<S, _>(
            policy,
            move |attempts| Error::ConflictRetryExhausted {
                partition: *partition,
                attempts,
            },
            move || self.try_reserve_block(partition, count).map(Outcome::from),
        )
    }
}
