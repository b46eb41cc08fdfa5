use std::time::Duration;

use rusqlite::{OptionalExtension, params};
#[cfg(feature = "tracing")]
use tracing::instrument;

use serialid::{
    Error, MAX_SEQUENCE, NumberingScheme, Partition, ReserveStatus, Result, SequenceRange,
    SequenceStore,
};

use crate::{SqliteDatabase, error::SqliteResultExt};

/// How long to back off after losing a conditioned update to another client.
pub const CONTENDED_RETRY_AFTER: Duration = Duration::from_millis(1);

/// A [`SequenceStore`] persisted in the `sequence_counters` table.
///
/// A reservation reads the partition's `highest`, plans the block and commits
/// it with `UPDATE ... WHERE highest = <value read>`. If another client moved
/// the counter in between, zero rows change and the attempt reports
/// [`ReserveStatus::Contended`]. No transaction is held across the read and
/// the write, so concurrent clients (threads or processes) never deadlock.
///
/// Partitions are keyed by their display form: `PT`, or `PT/2024` for a
/// per-year counter.
#[derive(Clone, Debug)]
pub struct SqliteSequenceStore {
    database: SqliteDatabase,
}

impl SqliteSequenceStore {
    pub const fn new(database: SqliteDatabase) -> Self {
        Self { database }
    }

    pub const fn database(&self) -> &SqliteDatabase {
        &self.database
    }

    /// Raises every counter to the highest sequence recorded in
    /// `serial_numbers`, keying partitions by `scheme`. Counters never go
    /// down, so a counter that is ahead of the ledger keeps its gap.
    ///
    /// Returns the number of counters created or raised.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreUnavailable`] on database failure.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip(self), err))]
    pub fn reconcile_with_ledger(&self, scheme: NumberingScheme) -> Result<usize> {
        let partition_key = match scheme {
            NumberingScheme::PerRegion => "region",
            NumberingScheme::PerRegionYear => "region || '/' || printf('%04d', year)",
        };
        // `WHERE true` keeps the upsert clause from parsing as a join
        // constraint.
        let sql = format!(
            "INSERT INTO sequence_counters (partition, highest)
             SELECT {partition_key}, MAX(sequence) FROM serial_numbers WHERE true
             GROUP BY {partition_key}
             ON CONFLICT(partition) DO UPDATE SET highest = excluded.highest
             WHERE excluded.highest > sequence_counters.highest"
        );
        let conn = self.database.connect()?;
        let changed = conn.execute(&sql, []).or_unavailable("reconcile counters")?;
        #[cfg(feature = "tracing")]
        tracing::info!(changed, "counters reconciled with ledger");
        Ok(changed)
    }

    /// Returns every persisted counter, sorted by partition key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreUnavailable`] on database failure.
    pub fn counters(&self) -> Result<Vec<(String, u32)>> {
        let conn = self.database.connect()?;
        let mut stmt = conn
            .prepare("SELECT partition, highest FROM sequence_counters ORDER BY partition")
            .or_unavailable("list counters")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?)))
            .or_unavailable("list counters")?;
        rows.map(|row| row.or_unavailable("read counter")).collect()
    }
}

impl SequenceStore for SqliteSequenceStore {
    fn peek_highest(&self, partition: &Partition) -> Result<u32> {
        let conn = self.database.connect()?;
        read_highest(&conn, &partition.to_string()).map(|highest| highest.unwrap_or(0))
    }

    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    fn try_reserve_block(&self, partition: &Partition, count: u32) -> Result<ReserveStatus> {
        let key = partition.to_string();
        let conn = self.database.connect()?;
        let current = read_highest(&conn, &key)?;
        let range = SequenceRange::next_block(partition, current.unwrap_or(0), count)?;

        let committed = match current {
            // First reservation for this partition: whoever inserts the row
            // wins.
            None => conn
                .execute(
                    "INSERT INTO sequence_counters (partition, highest) VALUES (?1, ?2)
                     ON CONFLICT(partition) DO NOTHING",
                    params![key, range.last()],
                )
                .or_unavailable("create counter")?,
            Some(highest) => conn
                .execute(
                    "UPDATE sequence_counters SET highest = ?2
                     WHERE partition = ?1 AND highest = ?3",
                    params![key, range.last(), highest],
                )
                .or_unavailable("advance counter")?,
        };

        if committed == 1 {
            Ok(ReserveStatus::Reserved { range })
        } else {
            Ok(ReserveStatus::Contended {
                retry_after: CONTENDED_RETRY_AFTER,
            })
        }
    }

    fn raise_highest(&self, partition: &Partition, highest: u32) -> Result<u32> {
        if highest > MAX_SEQUENCE {
            return Err(Error::InvalidArgument {
                reason: format!("highest sequence {highest} exceeds {MAX_SEQUENCE}"),
            });
        }
        let conn = self.database.connect()?;
        conn.query_row(
            "INSERT INTO sequence_counters (partition, highest) VALUES (?1, ?2)
             ON CONFLICT(partition) DO UPDATE SET highest = MAX(highest, excluded.highest)
             RETURNING highest",
            params![partition.to_string(), highest],
            |row| row.get(0),
        )
        .or_unavailable("raise counter")
    }
}

fn read_highest(conn: &rusqlite::Connection, key: &str) -> Result<Option<u32>> {
    conn.query_row(
        "SELECT highest FROM sequence_counters WHERE partition = ?1",
        [key],
        |row| row.get(0),
    )
    .optional()
    .or_unavailable("read counter")
}
