use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};

use serialid::{
    Error, Identifier, IssuanceLedger, IssuanceRecord, Partition, Principal, Region, Result,
};

use crate::{SqliteDatabase, error::SqliteResultExt};

/// Number of rows fetched per round trip while listing.
pub const DEFAULT_PAGE_SIZE: usize = 500;

/// An [`IssuanceLedger`] persisted in the `serial_numbers` table.
///
/// Each row keeps the rendered identifier as its primary key, the parsed
/// region, year and sequence for range queries, the issuing principal and an
/// RFC 3339 timestamp. [`IssuanceLedger::record_all`] writes a whole block in
/// one transaction.
#[derive(Clone, Debug)]
pub struct SqliteIssuanceLedger {
    database: SqliteDatabase,
    page_size: usize,
}

impl SqliteIssuanceLedger {
    pub const fn new(database: SqliteDatabase) -> Self {
        Self {
            database,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Sets how many rows [`IssuanceLedger::list_by_region`] fetches at a
    /// time. Values below 1 are treated as 1.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub const fn database(&self) -> &SqliteDatabase {
        &self.database
    }

    /// Total number of records.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreUnavailable`] on database failure.
    pub fn len(&self) -> Result<u64> {
        let conn = self.database.connect()?;
        conn.query_row("SELECT COUNT(*) FROM serial_numbers", [], |row| row.get(0))
            .or_unavailable("count records")
    }

    /// # Errors
    ///
    /// Returns [`Error::StoreUnavailable`] on database failure.
    pub fn is_empty(&self) -> Result<bool> {
        self.len().map(|len| len == 0)
    }
}

impl IssuanceLedger for SqliteIssuanceLedger {
    type Records = SqliteRecords;

    fn record(&self, record: &IssuanceRecord) -> Result<()> {
        let conn = self.database.connect()?;
        insert(&conn, record)
    }

    fn record_all(&self, records: &[IssuanceRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let mut conn = self.database.connect()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .or_unavailable("begin ledger write")?;
        for record in records {
            insert(&tx, record)?;
        }
        tx.commit().or_unavailable("commit ledger write")
    }

    fn list_by_region(&self, region: Region) -> Result<SqliteRecords> {
        let mut records = SqliteRecords {
            database: self.database.clone(),
            region,
            page_size: self.page_size,
            after: (-1, -1),
            page: VecDeque::new(),
            exhausted: false,
        };
        // Fetch eagerly so that an unreachable database fails the call itself.
        records.fetch_page()?;
        Ok(records)
    }

    fn highest_sequence(&self, partition: &Partition) -> Result<u32> {
        let conn = self.database.connect()?;
        let highest: Option<u32> = conn
            .query_row(
                "SELECT MAX(sequence) FROM serial_numbers
                 WHERE region = ?1 AND (?2 IS NULL OR year = ?2)",
                params![partition.region().as_str(), partition.year()],
                |row| row.get(0),
            )
            .or_unavailable("read highest recorded sequence")?;
        Ok(highest.unwrap_or(0))
    }
}

/// Inserts `record` unless its identifier is already present; an existing row
/// must belong to the same principal.
fn insert(conn: &Connection, record: &IssuanceRecord) -> Result<()> {
    let identifier = record.identifier();
    let serial_number = identifier.to_string();
    let inserted = conn
        .execute(
            "INSERT INTO serial_numbers
                (serial_number, region, year, sequence, user_id, issued_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(serial_number) DO NOTHING",
            params![
                serial_number,
                identifier.region().as_str(),
                identifier.year(),
                identifier.sequence(),
                record.principal().as_str(),
                record.issued_at().to_rfc3339(),
            ],
        )
        .or_unavailable("insert record")?;
    if inserted == 1 {
        return Ok(());
    }

    let owner: Option<String> = conn
        .query_row(
            "SELECT user_id FROM serial_numbers WHERE serial_number = ?1",
            [&serial_number],
            |row| row.get(0),
        )
        .optional()
        .or_unavailable("read existing record")?;
    match owner {
        Some(owner) if owner == record.principal().as_str() => Ok(()),
        Some(owner) => Err(Error::DuplicateIdentifier {
            identifier: *identifier,
            principal: owner,
        }),
        None => Err(Error::unavailable(format!(
            "record {serial_number} vanished after a conflicting insert"
        ))),
    }
}

/// Lazily pages through one region's records, ordered by sequence then year.
///
/// Pages are fetched with a keyset cursor on `(sequence, year)`, so records
/// appended while iterating are picked up if they sort after the cursor and
/// nothing is ever yielded twice.
#[derive(Debug)]
pub struct SqliteRecords {
    database: SqliteDatabase,
    region: Region,
    page_size: usize,
    after: (i64, i64),
    page: VecDeque<IssuanceRecord>,
    exhausted: bool,
}

impl SqliteRecords {
    fn fetch_page(&mut self) -> Result<()> {
        let conn = self.database.connect()?;
        let mut stmt = conn
            .prepare(
                "SELECT serial_number, user_id, issued_at, sequence, year FROM serial_numbers
                 WHERE region = ?1 AND (sequence, year) > (?2, ?3)
                 ORDER BY sequence, year
                 LIMIT ?4",
            )
            .or_unavailable("list records")?;
        let mut rows = stmt
            .query(params![
                self.region.as_str(),
                self.after.0,
                self.after.1,
                i64::try_from(self.page_size).unwrap_or(i64::MAX),
            ])
            .or_unavailable("list records")?;

        let mut fetched = 0;
        while let Some(row) = rows.next().or_unavailable("list records")? {
            let serial_number: String = row.get(0).or_unavailable("read record")?;
            let user_id: String = row.get(1).or_unavailable("read record")?;
            let issued_at: String = row.get(2).or_unavailable("read record")?;
            self.after = (
                row.get(3).or_unavailable("read record")?,
                row.get(4).or_unavailable("read record")?,
            );
            self.page
                .push_back(to_record(&serial_number, user_id, &issued_at)?);
            fetched += 1;
        }
        self.exhausted = fetched < self.page_size;
        Ok(())
    }
}

impl Iterator for SqliteRecords {
    type Item = Result<IssuanceRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.page.is_empty() && !self.exhausted {
            if let Err(err) = self.fetch_page() {
                self.exhausted = true;
                return Some(Err(err));
            }
        }
        self.page.pop_front().map(Ok)
    }
}

fn to_record(serial_number: &str, user_id: String, issued_at: &str) -> Result<IssuanceRecord> {
    let identifier: Identifier = serial_number.parse()?;
    let principal = Principal::new(user_id)?;
    let issued_at = DateTime::parse_from_rfc3339(issued_at)
        .map_err(|err| {
            Error::unavailable(format!(
                "invalid timestamp {issued_at} for {serial_number}: {err}"
            ))
        })?
        .with_timezone(&Utc);
    Ok(IssuanceRecord::new(identifier, principal, issued_at))
}
