use core::time::Duration;

use crate::{SequenceRange, retry::Outcome};

/// Represents the result of a single reservation attempt.
///
/// This type models the outcome of [`SequenceStore::try_reserve_block`]:
///
/// - [`ReserveStatus::Reserved`] indicates the block was committed and now
///   belongs to the caller.
/// - [`ReserveStatus::Contended`] means another client moved the counter
///   between the read and the conditioned write. Nothing was committed; try
///   again no sooner than `retry_after`.
///
/// [`SequenceStore::try_reserve_block`]: crate::SequenceStore::try_reserve_block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReserveStatus {
    /// The block was committed.
    Reserved {
        /// The reserved, inclusive range.
        range: SequenceRange,
    },
    /// A concurrent reservation won the race.
    Contended {
        /// Minimum wait before the next attempt. Zero means retry
        /// immediately.
        retry_after: Duration,
    },
}

impl From<ReserveStatus> for Outcome<SequenceRange> {
    fn from(status: ReserveStatus) -> Self {
        match status {
            ReserveStatus::Reserved { range } => Self::Done(range),
            ReserveStatus::Contended { retry_after } => Self::Wait(retry_after),
        }
    }
}
