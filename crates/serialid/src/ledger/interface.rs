use crate::{IssuanceRecord, Partition, Region, Result};

/// An append-only log of every identifier ever issued.
///
/// The ledger is the audit trail and the source of truth sequence counters
/// are rebuilt from. Rows are never updated or deleted.
///
/// # Contract
///
/// - [`record`] is idempotent: writing a record whose identifier is already
///   present with the same principal succeeds without adding a row.
/// - Writing an identifier that is present with a different principal fails
///   with [`Error::DuplicateIdentifier`].
/// - [`list_by_region`] yields records ordered by sequence ascending, ties
///   broken by year.
///
/// [`record`]: IssuanceLedger::record
/// [`list_by_region`]: IssuanceLedger::list_by_region
/// [`Error::DuplicateIdentifier`]: crate::Error::DuplicateIdentifier
pub trait IssuanceLedger {
    /// Iterator returned by [`IssuanceLedger::list_by_region`].
    type Records: Iterator<Item = Result<IssuanceRecord>>;

    /// Appends one record.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::DuplicateIdentifier`] on a principal mismatch.
    /// - [`crate::Error::StoreUnavailable`] on backend failure.
    fn record(&self, record: &IssuanceRecord) -> Result<()>;

    /// Appends every record of a block. Backends that can write the block
    /// atomically should override this.
    ///
    /// # Errors
    ///
    /// Same as [`IssuanceLedger::record`]. Records before the failing one may
    /// already be written.
    fn record_all(&self, records: &[IssuanceRecord]) -> Result<()> {
        records.iter().try_for_each(|record| self.record(record))
    }

    /// Lists the records issued for `region`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::StoreUnavailable`] if the listing cannot be
    /// started; later failures surface as `Err` items.
    fn list_by_region(&self, region: Region) -> Result<Self::Records>;

    /// Returns the highest sequence recorded under `partition`, or 0.
    ///
    /// # Errors
    ///
    /// Propagates any listing error.
    fn highest_sequence(&self, partition: &Partition) -> Result<u32> {
        let mut highest = 0;
        for record in self.list_by_region(partition.region())? {
            let identifier = *record?.identifier();
            if partition.contains(&identifier) {
                highest = highest.max(identifier.sequence());
            }
        }
        Ok(highest)
    }
}
