use std::collections::BTreeMap;

use crate::{
    Error, Identifier, IssuanceLedger, IssuanceRecord, Region, Result,
    mutex::{Mutex, lock},
};

/// An in-process issuance ledger.
///
/// Useful for tests and for short-lived tools; nothing survives the process.
/// Listing takes a snapshot, so the returned iterator never blocks writers.
#[derive(Default)]
pub struct MemoryLedger {
    records: Mutex<BTreeMap<Identifier, IssuanceRecord>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock was poisoned.
    pub fn len(&self) -> Result<usize> {
        Ok(lock(&self.records)?.len())
    }

    /// # Errors
    ///
    /// Returns an error if the lock was poisoned.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(lock(&self.records)?.is_empty())
    }
}

impl IssuanceLedger for MemoryLedger {
    type Records = std::vec::IntoIter<Result<IssuanceRecord>>;

    fn record(&self, record: &IssuanceRecord) -> Result<()> {
        let mut records = lock(&self.records)?;
        match records.get(record.identifier()) {
            Some(existing) if existing.principal() == record.principal() => Ok(()),
            Some(existing) => Err(Error::DuplicateIdentifier {
                identifier: *existing.identifier(),
                principal: existing.principal().to_string(),
            }),
            None => {
                records.insert(*record.identifier(), record.clone());
                Ok(())
            }
        }
    }

    fn list_by_region(&self, region: Region) -> Result<Self::Records> {
        let mut matching: Vec<_> = lock(&self.records)?
            .values()
            .filter(|record| record.identifier().region() == region)
            .cloned()
            .collect();
        matching.sort_by_key(|record| (record.identifier().sequence(), record.identifier().year()));
        Ok(matching.into_iter().map(Ok).collect::<Vec<_>>().into_iter())
    }
}
