use std::collections::BTreeMap;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    IssuanceLedger, NumberingScheme, Partition, RegionCatalog, Result, SequenceStore,
};

/// Raises `partition`'s counter in `store` to the highest sequence the ledger
/// holds for it and returns the resulting counter value.
///
/// Raise-only: a store that is already ahead of the ledger (a reservation
/// whose records were never written) keeps its value, so the gap is preserved
/// and nothing is ever issued twice.
///
/// # Errors
///
/// Propagates ledger and store errors.
#[cfg_attr(feature = "tracing", instrument(level = "debug", skip(ledger, store)))]
pub fn recover_partition<L, S>(ledger: &L, store: &S, partition: &Partition) -> Result<u32>
where
    L: IssuanceLedger + ?Sized,
    S: SequenceStore + ?Sized,
{
    let recorded = ledger.highest_sequence(partition)?;
    let highest = store.raise_highest(partition, recorded)?;
    #[cfg(feature = "tracing")]
    if highest > recorded {
        tracing::warn!(%partition, recorded, highest, "counter is ahead of the ledger");
    }
    Ok(highest)
}

/// Recovers every counter the ledger knows about for the catalog's regions.
///
/// Under [`NumberingScheme::PerRegion`] that is one counter per catalog
/// region. Under [`NumberingScheme::PerRegionYear`] it is one counter per
/// (region, year) pair that appears in the ledger. Returns the recovered
/// partitions with their resulting counter values, sorted.
///
/// # Errors
///
/// Propagates ledger and store errors; partitions recovered before the error
/// keep their raised values.
#[cfg_attr(feature = "tracing", instrument(level = "info", skip_all, fields(%scheme)))]
pub fn recover_all<L, S>(
    ledger: &L,
    store: &S,
    catalog: &RegionCatalog,
    scheme: NumberingScheme,
) -> Result<Vec<(Partition, u32)>>
where
    L: IssuanceLedger + ?Sized,
    S: SequenceStore + ?Sized,
{
    let mut recovered = Vec::new();
    for region in catalog.regions() {
        let mut highest = BTreeMap::new();
        for record in ledger.list_by_region(region)? {
            let identifier = *record?.identifier();
            let partition = scheme.partition(region, identifier.year());
            let entry = highest.entry(partition).or_insert(0);
            *entry = identifier.sequence().max(*entry);
        }
        if scheme == NumberingScheme::PerRegion {
            highest.entry(Partition::of_region(region)).or_insert(0);
        }
        for (partition, recorded) in highest {
            recovered.push((partition, store.raise_highest(&partition, recorded)?));
        }
    }
    recovered.sort_unstable();
    Ok(recovered)
}
