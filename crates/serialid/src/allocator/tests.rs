use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread::scope;

use chrono::{DateTime, TimeZone, Utc};
use core::time::Duration;
use rand::Rng;

use crate::{
    AllocationContext, Allocator, AllocatorConfig, AtomicSequenceStore, AuthorizedRegions, Clock,
    Error, Identifier, IssuanceLedger, IssuanceRecord, LockSequenceStore, MAX_SEQUENCE,
    MemoryLedger, NumberingScheme, Partition, Principal, Region, Result, RetryPolicy,
    SequenceStore,
};

/// Fails the next `failures` writes with a transient error, then delegates.
struct FlakyLedger {
    inner: MemoryLedger,
    failures: AtomicU32,
}

impl FlakyLedger {
    fn failing(failures: u32) -> Self {
        Self {
            inner: MemoryLedger::new(),
            failures: AtomicU32::new(failures),
        }
    }
}

impl IssuanceLedger for FlakyLedger {
    type Records = <MemoryLedger as IssuanceLedger>::Records;

    fn record(&self, record: &IssuanceRecord) -> Result<()> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::unavailable("ledger offline"));
        }
        self.inner.record(record)
    }

    fn list_by_region(&self, region: Region) -> Result<Self::Records> {
        self.inner.list_by_region(region)
    }
}

struct FixedClock;

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 15, 9, 0, 0).unwrap()
    }
}

fn region(code: &str) -> Region {
    Region::new(code).unwrap()
}

fn context(principal: &str) -> AllocationContext {
    AllocationContext::new(Principal::new(principal).unwrap(), AuthorizedRegions::All)
}

fn fast_retry(max_attempts: u32) -> AllocatorConfig {
    AllocatorConfig {
        retry: RetryPolicy::new(max_attempts, Duration::ZERO, Duration::ZERO),
        ..AllocatorConfig::default()
    }
}

fn rendered(ids: &[Identifier]) -> Vec<String> {
    ids.iter().map(ToString::to_string).collect()
}

fn run_allocates_consecutive_blocks<S: SequenceStore>(store: S) {
    let allocator = Allocator::new(store, MemoryLedger::new());
    let ana = context("ana");

    let first = allocator.allocate(region("PT"), 2024, 3, &ana).unwrap();
    let second = allocator.allocate(region("PT"), 2024, 2, &ana).unwrap();

    assert_eq!(
        rendered(&first),
        ["2024PT00001", "2024PT00002", "2024PT00003"]
    );
    assert_eq!(rendered(&second), ["2024PT00004", "2024PT00005"]);
    assert_eq!(allocator.peek(region("PT"), 2024).unwrap(), 5);
    assert_eq!(allocator.ledger().len().unwrap(), 5);
}

fn run_rejects_bad_quantities<S: SequenceStore>(store: S) {
    let allocator = Allocator::new(store, MemoryLedger::new());
    let ana = context("ana");

    for count in [0, 21] {
        let err = allocator.allocate(region("PT"), 2024, count, &ana).unwrap_err();
        assert_eq!(
            err,
            Error::InvalidQuantity {
                requested: count,
                max: 20
            }
        );
    }
    assert_eq!(allocator.peek(region("PT"), 2024).unwrap(), 0);
    assert_eq!(allocator.allocate(region("PT"), 2024, 20, &ana).unwrap().len(), 20);
}

fn run_capacity_leaves_counter_unchanged<S: SequenceStore>(store: S) {
    let pt = Partition::of_region(region("PT"));
    store.raise_highest(&pt, MAX_SEQUENCE).unwrap();
    let allocator = Allocator::new(store, MemoryLedger::new());

    let err = allocator.allocate(region("PT"), 2024, 1, &context("ana")).unwrap_err();

    assert!(matches!(err, Error::CapacityExceeded { highest: MAX_SEQUENCE, requested: 1, .. }));
    assert_eq!(allocator.peek(region("PT"), 2024).unwrap(), MAX_SEQUENCE);
    assert!(allocator.ledger().is_empty().unwrap());
}

#[test]
fn atomic_store_allocates_consecutive_blocks() {
    run_allocates_consecutive_blocks(AtomicSequenceStore::new());
}

#[test]
fn lock_store_allocates_consecutive_blocks() {
    run_allocates_consecutive_blocks(LockSequenceStore::new());
}

#[test]
fn atomic_store_rejects_bad_quantities() {
    run_rejects_bad_quantities(AtomicSequenceStore::new());
}

#[test]
fn lock_store_rejects_bad_quantities() {
    run_rejects_bad_quantities(LockSequenceStore::new());
}

#[test]
fn atomic_store_capacity() {
    run_capacity_leaves_counter_unchanged(AtomicSequenceStore::new());
}

#[test]
fn lock_store_capacity() {
    run_capacity_leaves_counter_unchanged(LockSequenceStore::new());
}

#[test]
fn rejects_unauthorized_and_unknown_regions() {
    let allocator = Allocator::new(AtomicSequenceStore::new(), MemoryLedger::new());
    let only_gr = AllocationContext::new(
        Principal::new("bia").unwrap(),
        [region("GR")].into_iter().collect(),
    );

    assert_eq!(
        allocator.allocate(region("PT"), 2024, 1, &only_gr).unwrap_err(),
        Error::UnauthorizedRegion {
            region: region("PT")
        }
    );
    assert_eq!(
        allocator.allocate(region("XX"), 2024, 1, &context("ana")).unwrap_err(),
        Error::UnauthorizedRegion {
            region: region("XX")
        }
    );
    assert_eq!(allocator.allocate(region("GR"), 2024, 1, &only_gr).unwrap().len(), 1);
    assert_eq!(allocator.peek(region("PT"), 2024).unwrap(), 0);
}

#[test]
fn rejects_years_beyond_four_digits() {
    let allocator = Allocator::new(AtomicSequenceStore::new(), MemoryLedger::new());
    assert!(matches!(
        allocator.allocate(region("PT"), 10_000, 1, &context("ana")),
        Err(Error::InvalidArgument { .. })
    ));
    assert_eq!(allocator.peek(region("PT"), 2024).unwrap(), 0);
}

#[test]
fn records_carry_principal_and_clock() {
    let allocator =
        Allocator::new(AtomicSequenceStore::new(), MemoryLedger::new()).with_clock(FixedClock);
    allocator.allocate(region("RF"), 2024, 2, &context("ana")).unwrap();

    let records: Vec<_> = allocator
        .ledger()
        .list_by_region(region("RF"))
        .unwrap()
        .map(|r| r.unwrap())
        .collect();
    assert_eq!(records.len(), 2);
    for record in &records {
        assert_eq!(record.principal().as_str(), "ana");
        assert_eq!(record.issued_at(), FixedClock.now());
    }
}

#[test]
fn transient_ledger_failure_is_retried() {
    let allocator =
        Allocator::new(AtomicSequenceStore::new(), FlakyLedger::failing(1)).with_config(fast_retry(3));

    let ids = allocator.allocate(region("CR"), 2024, 2, &context("ana")).unwrap();

    assert_eq!(rendered(&ids), ["2024CR00001", "2024CR00002"]);
}

#[test]
fn failed_ledger_write_carries_reservation_for_reconcile() {
    let allocator =
        Allocator::new(AtomicSequenceStore::new(), FlakyLedger::failing(2)).with_config(fast_retry(2));
    let ana = context("ana");

    let err = allocator.allocate(region("PT"), 2024, 3, &ana).unwrap_err();
    assert!(err.is_transient());
    let reservation = *err.reservation().unwrap();
    assert_eq!(
        (reservation.range().first(), reservation.range().last()),
        (1, 3)
    );
    assert_eq!(allocator.ledger().inner.len().unwrap(), 0);

    // The block stays consumed: a fresh allocation starts after it.
    let next = allocator.allocate(region("PT"), 2024, 1, &ana).unwrap();
    assert_eq!(rendered(&next), ["2024PT00004"]);

    let reconciled = allocator.reconcile(reservation, &ana).unwrap();
    assert_eq!(
        rendered(&reconciled),
        ["2024PT00001", "2024PT00002", "2024PT00003"]
    );
    assert_eq!(allocator.reconcile(reservation, &ana).unwrap(), reconciled);
    assert_eq!(allocator.ledger().inner.len().unwrap(), 4);

    assert!(matches!(
        allocator.reconcile(reservation, &context("bia")),
        Err(Error::DuplicateIdentifier { .. })
    ));
}

#[test]
fn recovery_after_state_loss_matches_live_counter() {
    let allocator = Allocator::new(AtomicSequenceStore::new(), MemoryLedger::new());
    let ana = context("ana");
    for (code, count) in [("PT", 7), ("GR", 3), ("PT", 5), ("OC", 20)] {
        allocator.allocate(region(code), 2024, count, &ana).unwrap();
    }
    let live: Vec<_> = ["PT", "GR", "OC", "RF"]
        .iter()
        .map(|code| allocator.peek(region(code), 2024).unwrap())
        .collect();

    let (_, ledger) = allocator.into_parts();
    let rebuilt = Allocator::new(LockSequenceStore::new(), ledger);
    rebuilt.recover().unwrap();

    let recovered: Vec<_> = ["PT", "GR", "OC", "RF"]
        .iter()
        .map(|code| rebuilt.peek(region(code), 2024).unwrap())
        .collect();
    assert_eq!(recovered, live);
    assert_eq!(live, [12, 3, 20, 0]);

    let next = rebuilt.allocate(region("PT"), 2024, 1, &ana).unwrap();
    assert_eq!(rendered(&next), ["2024PT00013"]);
}

#[test]
fn stale_counter_hits_duplicate_until_recovered() {
    let ledger = MemoryLedger::new();
    ledger
        .record(&IssuanceRecord::new(
            "2024PT00001".parse().unwrap(),
            Principal::new("bia").unwrap(),
            Utc::now(),
        ))
        .unwrap();
    let allocator = Allocator::new(AtomicSequenceStore::new(), ledger);
    let ana = context("ana");

    assert!(matches!(
        allocator.allocate(region("PT"), 2024, 1, &ana),
        Err(Error::DuplicateIdentifier { .. })
    ));

    allocator.recover().unwrap();
    let ids = allocator.allocate(region("PT"), 2024, 1, &ana).unwrap();
    assert_eq!(rendered(&ids), ["2024PT00002"]);
}

#[test]
fn per_region_scheme_continues_across_years() {
    let allocator = Allocator::new(AtomicSequenceStore::new(), MemoryLedger::new());
    let ana = context("ana");

    allocator.allocate(region("AV"), 2024, 3, &ana).unwrap();
    let ids = allocator.allocate(region("AV"), 2025, 1, &ana).unwrap();

    assert_eq!(rendered(&ids), ["2025AV00004"]);
}

#[test]
fn per_region_year_scheme_restarts_each_year() {
    let config = AllocatorConfig {
        scheme: NumberingScheme::PerRegionYear,
        ..AllocatorConfig::default()
    };
    let allocator =
        Allocator::new(AtomicSequenceStore::new(), MemoryLedger::new()).with_config(config);
    let ana = context("ana");

    allocator.allocate(region("AV"), 2024, 3, &ana).unwrap();
    let ids = allocator.allocate(region("AV"), 2025, 1, &ana).unwrap();

    assert_eq!(rendered(&ids), ["2025AV00001"]);
    assert_eq!(allocator.peek(region("AV"), 2024).unwrap(), 3);
    assert_eq!(allocator.peek(region("AV"), 2025).unwrap(), 1);
}

fn run_allocate_threaded<S>(store: S)
where
    S: SequenceStore + Sync,
{
    const THREADS: usize = 8;
    const CALLS_PER_THREAD: usize = 50;

    let config = AllocatorConfig {
        retry: RetryPolicy::new(10_000, Duration::ZERO, Duration::from_micros(50)),
        ..AllocatorConfig::default()
    };
    let allocator = Allocator::new(store, MemoryLedger::new()).with_config(config);
    let ana = context("ana");
    let seen = Mutex::new(HashSet::new());
    let issued = AtomicU32::new(0);

    scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                let mut rng = rand::rng();
                for _ in 0..CALLS_PER_THREAD {
                    let count = rng.random_range(1..=20);
                    let ids = allocator.allocate(region("GR"), 2024, count, &ana).unwrap();
                    assert_eq!(ids.len(), count as usize);
                    assert!(ids.windows(2).all(|w| w[0] < w[1]));
                    issued.fetch_add(count, Ordering::Relaxed);
                    let mut seen = seen.lock().unwrap();
                    for id in ids {
                        assert!(seen.insert(id), "{id} issued twice");
                    }
                }
            });
        }
    });

    let issued = issued.into_inner();
    assert_eq!(allocator.peek(region("GR"), 2024).unwrap(), issued);
    assert_eq!(allocator.ledger().len().unwrap(), issued as usize);
}

#[test]
fn atomic_store_threaded_allocation() {
    run_allocate_threaded(AtomicSequenceStore::new());
}

#[test]
fn lock_store_threaded_allocation() {
    run_allocate_threaded(LockSequenceStore::new());
}

#[cfg(feature = "async-tokio")]
#[tokio::test]
async fn async_allocation_matches_blocking() {
    use crate::TokioSleep;

    let allocator =
        Allocator::new(AtomicSequenceStore::new(), FlakyLedger::failing(1)).with_config(fast_retry(3));
    let ana = context("ana");

    let first = allocator
        .allocate_async::<TokioSleep>(region("ST"), 2024, 2, &ana)
        .await
        .unwrap();
    let second = allocator.allocate(region("ST"), 2024, 1, &ana).unwrap();

    assert_eq!(rendered(&first), ["2024ST00001", "2024ST00002"]);
    assert_eq!(rendered(&second), ["2024ST00003"]);
}
