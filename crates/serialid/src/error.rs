use crate::{Identifier, Partition, Region, Reservation};

/// A result type whose error is always [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All errors that `serialid` can produce.
///
/// Every variant except [`Error::StoreUnavailable`] is terminal: retrying the
/// same call cannot succeed. [`Error::is_transient`] is what the retry loops
/// consult.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An argument was outside its valid domain (bad region code, year beyond
    /// four digits, sequence beyond five digits).
    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },

    /// A string did not have the `YYYY` `RR` `NNNNN` shape.
    #[error("malformed identifier {input:?}: {reason}")]
    MalformedIdentifier { input: String, reason: &'static str },

    /// The requested batch size is zero or larger than allowed.
    #[error("invalid quantity {requested}: must be between 1 and {max}")]
    InvalidQuantity { requested: u32, max: u32 },

    /// The caller may not allocate for this region, or the region is not part
    /// of the catalog at all.
    #[error("region {region} is not authorized")]
    UnauthorizedRegion { region: Region },

    /// The block would push the partition past the last five-digit sequence.
    /// The counter is left untouched.
    #[error(
        "capacity exceeded for {partition}: highest is {highest}, {requested} more requested"
    )]
    CapacityExceeded {
        partition: Partition,
        highest: u32,
        requested: u32,
    },

    /// The backing store failed. This is the only transient error.
    ///
    /// When the failure happened after a block was already reserved,
    /// `reservation` carries it so the caller can reconcile the ledger instead
    /// of leaving the range unrecorded.
    #[error("store unavailable: {context}")]
    StoreUnavailable {
        context: String,
        reservation: Option<Reservation>,
    },

    /// Every compare-and-swap attempt lost to a concurrent reservation.
    #[error("reservation for {partition} not committed after {attempts} attempts")]
    ConflictRetryExhausted { partition: Partition, attempts: u32 },

    /// The ledger already holds this identifier for another principal.
    #[error("identifier {identifier} was already issued to {principal}")]
    DuplicateIdentifier {
        identifier: Identifier,
        principal: String,
    },

    /// A thread panicked while holding a store lock.
    ///
    /// `parking_lot` mutexes do not poison, so this variant only exists
    /// without the `parking-lot` feature.
    #[cfg_attr(docsrs, doc(cfg(not(feature = "parking-lot"))))]
    #[cfg(not(feature = "parking-lot"))]
    #[error("lock poisoned")]
    LockPoisoned,
}

impl Error {
    /// Builds a [`Error::StoreUnavailable`] with no reservation attached.
    pub fn unavailable(context: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            context: context.into(),
            reservation: None,
        }
    }

    /// Returns `true` if retrying the failed operation may succeed.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::StoreUnavailable { .. })
    }

    /// Returns the reservation left unrecorded by this failure, if any.
    pub const fn reservation(&self) -> Option<&Reservation> {
        match self {
            Self::StoreUnavailable { reservation, .. } => reservation.as_ref(),
            _ => None,
        }
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed(input: &str, reason: &'static str) -> Self {
        Self::MalformedIdentifier {
            input: input.to_owned(),
            reason,
        }
    }
}

#[cfg(not(feature = "parking-lot"))]
use std::sync::PoisonError;
#[cfg(not(feature = "parking-lot"))]
// Collapse every poisoned guard type to `LockPoisoned`
impl<G> From<PoisonError<G>> for Error {
    fn from(_: PoisonError<G>) -> Self {
        Self::LockPoisoned
    }
}
