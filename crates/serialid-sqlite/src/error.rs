use rusqlite::ErrorCode;
use serialid::{Error, Result};

/// Maps `rusqlite` failures into [`Error::StoreUnavailable`].
///
/// `serialid::Error` and `rusqlite::Error` are both foreign here, so this
/// takes the place of a `From` impl.
pub(crate) trait SqliteResultExt<T> {
    fn or_unavailable(self, action: &str) -> Result<T>;
}

impl<T> SqliteResultExt<T> for rusqlite::Result<T> {
    fn or_unavailable(self, action: &str) -> Result<T> {
        self.map_err(|err| {
            if is_contention(&err) {
                #[cfg(feature = "tracing")]
                tracing::debug!(action, error = %err, "database is busy");
                Error::unavailable(format!("{action}: locked by another client ({err})"))
            } else {
                #[cfg(feature = "tracing")]
                tracing::warn!(action, error = %err, "database operation failed");
                Error::unavailable(format!("{action}: {err}"))
            }
        })
    }
}

/// Returns `true` for `SQLITE_BUSY` and `SQLITE_LOCKED`, the errors another
/// connection holding a lock produces.
fn is_contention(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if matches!(failure.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
}
