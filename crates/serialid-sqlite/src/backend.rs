use std::path::PathBuf;

#[cfg(feature = "tracing")]
use tracing::instrument;

use serialid::{NumberingScheme, Result};

use crate::{SqliteDatabase, SqliteIssuanceLedger, SqliteSequenceStore};

/// A sequence store and an issuance ledger sharing one database file.
///
/// Opening reconciles every counter with the ledger, so a database whose
/// `sequence_counters` table was lost or restored from an older backup
/// resumes after the highest recorded identifier.
///
/// # Example
///
/// ```no_run
/// use serialid::{Allocator, NumberingScheme};
/// use serialid_sqlite::SqliteBackend;
///
/// let backend = SqliteBackend::open("serials.db", NumberingScheme::PerRegion)?;
/// let (store, ledger) = backend.into_parts();
/// let allocator = Allocator::new(store, ledger);
/// # let _ = allocator;
/// # Ok::<(), serialid::Error>(())
/// ```
#[derive(Clone, Debug)]
pub struct SqliteBackend {
    store: SqliteSequenceStore,
    ledger: SqliteIssuanceLedger,
}

impl SqliteBackend {
    /// Opens the database at `path` and reconciles its counters using
    /// `scheme`.
    ///
    /// # Errors
    ///
    /// Returns [`serialid::Error::StoreUnavailable`] if the database cannot be
    /// opened or reconciled.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip_all, fields(%scheme), err))]
    pub fn open(path: impl Into<PathBuf>, scheme: NumberingScheme) -> Result<Self> {
        Self::from_database(SqliteDatabase::open(path)?, scheme)
    }

    /// Like [`SqliteBackend::open`] for an already opened database.
    ///
    /// # Errors
    ///
    /// Returns [`serialid::Error::StoreUnavailable`] if reconciliation fails.
    pub fn from_database(database: SqliteDatabase, scheme: NumberingScheme) -> Result<Self> {
        #[cfg(feature = "tracing")]
        tracing::info!(path = %database.path().display(), "opened serial number database");
        let store = SqliteSequenceStore::new(database.clone());
        store.reconcile_with_ledger(scheme)?;
        Ok(Self {
            store,
            ledger: SqliteIssuanceLedger::new(database),
        })
    }

    pub const fn store(&self) -> &SqliteSequenceStore {
        &self.store
    }

    pub const fn ledger(&self) -> &SqliteIssuanceLedger {
        &self.ledger
    }

    pub fn into_parts(self) -> (SqliteSequenceStore, SqliteIssuanceLedger) {
        (self.store, self.ledger)
    }
}
