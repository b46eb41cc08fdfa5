#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    AllocationContext, AllocatorConfig, Clock, Error, Identifier, IssuanceLedger, IssuanceRecord,
    MAX_YEAR, Partition, Region, RegionCatalog, Reservation, Result, SequenceStore, SystemClock,
    recover_all,
    retry::{Outcome, run_blocking},
};

/// Issues region-scoped serial numbers.
///
/// An allocation validates the request, reserves a contiguous block from the
/// [`SequenceStore`], renders each sequence as an [`Identifier`] and appends
/// one [`IssuanceRecord`] per identifier to the [`IssuanceLedger`]. The store
/// reservation is the only synchronization point, so any number of allocators
/// may share a store.
///
/// A reservation is never handed back. If the ledger cannot be written after
/// the block was reserved, the call fails with [`Error::StoreUnavailable`]
/// carrying the [`Reservation`]; pass it to [`Allocator::reconcile`] to finish
/// recording it. Dropping it instead leaves a permanent gap, never a
/// duplicate.
///
/// # Example
///
/// ```
/// use serialid::{
///     AllocationContext, Allocator, AtomicSequenceStore, AuthorizedRegions, MemoryLedger,
///     Principal, Region,
/// };
///
/// let allocator = Allocator::new(AtomicSequenceStore::new(), MemoryLedger::new());
/// let context = AllocationContext::new(Principal::new("ana")?, AuthorizedRegions::All);
/// let pt = Region::new("PT")?;
///
/// let ids = allocator.allocate(pt, 2024, 3, &context)?;
/// let ids: Vec<_> = ids.iter().map(ToString::to_string).collect();
/// assert_eq!(ids, ["2024PT00001", "2024PT00002", "2024PT00003"]);
///
/// let next = allocator.allocate(pt, 2024, 2, &context)?;
/// assert_eq!(next[0].to_string(), "2024PT00004");
/// # Ok::<(), serialid::Error>(())
/// ```
pub struct Allocator<S, L, C = SystemClock> {
    store: S,
    ledger: L,
    clock: C,
    catalog: RegionCatalog,
    config: AllocatorConfig,
}

impl<S, L> Allocator<S, L>
where
    S: SequenceStore,
    L: IssuanceLedger,
{
    /// Creates an allocator with the default configuration, the default
    /// region catalog and the system clock.
    pub fn new(store: S, ledger: L) -> Self {
        Self {
            store,
            ledger,
            clock: SystemClock,
            catalog: RegionCatalog::default(),
            config: AllocatorConfig::default(),
        }
    }
}

impl<S, L, C> Allocator<S, L, C>
where
    S: SequenceStore,
    L: IssuanceLedger,
    C: Clock,
{
    #[must_use]
    pub fn with_config(mut self, config: AllocatorConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_catalog(mut self, catalog: RegionCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Replaces the clock that stamps issuance records.
    pub fn with_clock<C2: Clock>(self, clock: C2) -> Allocator<S, L, C2> {
        Allocator {
            store: self.store,
            ledger: self.ledger,
            clock,
            catalog: self.catalog,
            config: self.config,
        }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn ledger(&self) -> &L {
        &self.ledger
    }

    pub const fn catalog(&self) -> &RegionCatalog {
        &self.catalog
    }

    pub const fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    pub fn into_parts(self) -> (S, L) {
        (self.store, self.ledger)
    }

    /// Returns the counter partition `(region, year)` allocates from.
    pub const fn partition(&self, region: Region, year: u16) -> Partition {
        self.config.scheme.partition(region, year)
    }

    /// Returns the highest sequence reserved so far for `(region, year)`.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn peek(&self, region: Region, year: u16) -> Result<u32> {
        self.store.peek_highest(&self.partition(region, year))
    }

    /// Issues `count` identifiers for `region` stamped with `year`.
    ///
    /// Returns them in ascending sequence order.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidQuantity`] unless `1 <= count <= max_batch`.
    /// - [`Error::UnauthorizedRegion`] if `region` is not in the catalog or
    ///   not permitted by `context`.
    /// - [`Error::InvalidArgument`] if `year` exceeds four digits.
    /// - [`Error::CapacityExceeded`] if the block would pass 99999.
    /// - [`Error::ConflictRetryExhausted`] if every reservation attempt lost a
    ///   race.
    /// - [`Error::StoreUnavailable`] if the store or the ledger failed; when
    ///   the block had already been reserved the error carries it.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, context), fields(principal = %context.principal()), err)
    )]
    pub fn allocate(
        &self,
        region: Region,
        year: u16,
        count: u32,
        context: &AllocationContext,
    ) -> Result<Vec<Identifier>> {
        self.check(region, year, count, context)?;
        let partition = self.partition(region, year);
        let range = self
            .store
            .reserve_block(&partition, count, &self.config.retry)?;
        let reservation = Reservation::new(partition, year, range)?;
        #[cfg(feature = "tracing")]
        tracing::debug!(%reservation, "reserved block");

        let records = self.records(&reservation, context);
        let written = run_blocking(&self.config.retry, ledger_exhausted, || {
            self.ledger.record_all(&records).map(Outcome::Done)
        });
        finish(reservation, written)
    }

    /// Finishes recording a block whose allocation failed after the
    /// reservation.
    ///
    /// Records are written idempotently, so calling this for a block that was
    /// partly or fully recorded by the same principal is safe. Returns the
    /// block's identifiers.
    ///
    /// # Errors
    ///
    /// - [`Error::UnauthorizedRegion`] if `context` may not issue for the
    ///   reservation's region.
    /// - [`Error::DuplicateIdentifier`] if part of the block was recorded for
    ///   another principal.
    /// - [`Error::StoreUnavailable`] carrying the reservation again if the
    ///   ledger is still failing.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, context), fields(%reservation), err)
    )]
    pub fn reconcile(
        &self,
        reservation: Reservation,
        context: &AllocationContext,
    ) -> Result<Vec<Identifier>> {
        self.authorize(reservation.region(), context)?;
        let records = self.records(&reservation, context);
        let written = run_blocking(&self.config.retry, ledger_exhausted, || {
            self.ledger.record_all(&records).map(Outcome::Done)
        });
        finish(reservation, written)
    }

    /// Raises every counter to what the ledger holds. See [`recover_all`].
    ///
    /// # Errors
    ///
    /// Propagates ledger and store errors.
    pub fn recover(&self) -> Result<Vec<(Partition, u32)>> {
        recover_all(&self.ledger, &self.store, &self.catalog, self.config.scheme)
    }

    /// Async counterpart of [`Allocator::allocate`]; waits between retries go
    /// through `Sl` instead of blocking the thread.
    ///
    /// # Errors
    ///
    /// Same as [`Allocator::allocate`].
    #[cfg_attr(docsrs, doc(cfg(feature = "async")))]
    #[cfg(feature = "async")]
    pub async fn allocate_async<Sl>(
        &self,
        region: Region,
        year: u16,
        count: u32,
        context: &AllocationContext,
    ) -> Result<Vec<Identifier>>
    where
        Sl: crate::SleepProvider,
    {
        use crate::SequenceStoreAsyncExt;

        self.check(region, year, count, context)?;
        let partition = self.partition(region, year);
        let range = self
            .store
            .reserve_block_async::<Sl>(&partition, count, &self.config.retry)
            .await?;
        let reservation = Reservation::new(partition, year, range)?;

        let records = self.records(&reservation, context);
        let written = crate::retry::run_async::<Sl, _>(&self.config.retry, ledger_exhausted, || {
            self.ledger.record_all(&records).map(Outcome::Done)
        })
        .await;
        finish(reservation, written)
    }

    fn check(&self, region: Region, year: u16, count: u32, context: &AllocationContext) -> Result<()> {
        if count == 0 || count > self.config.max_batch {
            return Err(Error::InvalidQuantity {
                requested: count,
                max: self.config.max_batch,
            });
        }
        self.authorize(region, context)?;
        if year > MAX_YEAR {
            return Err(Error::invalid(format!(
                "year {year} does not fit in four digits"
            )));
        }
        Ok(())
    }

    fn authorize(&self, region: Region, context: &AllocationContext) -> Result<()> {
        if self.catalog.contains(region) && context.permits(region) {
            Ok(())
        } else {
            Err(Error::UnauthorizedRegion { region })
        }
    }

    fn records(&self, reservation: &Reservation, context: &AllocationContext) -> Vec<IssuanceRecord> {
        let issued_at = self.clock.now();
        reservation
            .identifiers()
            .map(|identifier| IssuanceRecord::new(identifier, context.principal().clone(), issued_at))
            .collect()
    }
}

// Ledger writes never report a lost race, only success or an error.
fn ledger_exhausted(attempts: u32) -> Error {
    Error::unavailable(format!("ledger write not completed after {attempts} attempts"))
}

fn finish(reservation: Reservation, written: Result<()>) -> Result<Vec<Identifier>> {
    match written {
        Ok(()) => {
            #[cfg(feature = "tracing")]
            tracing::info!(%reservation, "issued block");
            Ok(reservation.identifiers().collect())
        }
        Err(Error::StoreUnavailable { context, .. }) => {
            #[cfg(feature = "tracing")]
            tracing::error!(%reservation, %context, "block reserved but not recorded");
            Err(Error::StoreUnavailable {
                context,
                reservation: Some(reservation),
            })
        }
        Err(err) => Err(err),
    }
}
