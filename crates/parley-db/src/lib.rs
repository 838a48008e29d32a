pub mod migrations;
pub mod models;
pub mod queries;

use anyhow::Result;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

pub use queries::{is_foreign_key_violation, is_unique_violation};

/// Tuning knobs for per-request connections.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Upper bound on how long a transaction waits for the write lock.
    pub busy_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_secs(5),
        }
    }
}

/// Handle to the SQLite store.
///
/// Holds no open connection: every [`Database::read`] / [`Database::write`]
/// opens its own connection and transaction and closes both before
/// returning, so nothing is shared between requests except the file.
pub struct Database {
    path: PathBuf,
    options: StoreOptions,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with(path, StoreOptions::default())
    }

    pub fn open_with(path: &Path, options: StoreOptions) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads; persisted in the file header
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            options,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` inside a deferred (read) transaction.
    pub fn read<F, T, E>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&Transaction<'_>) -> std::result::Result<T, E>,
        E: From<rusqlite::Error>,
    {
        self.scoped(TransactionBehavior::Deferred, "read", f)
    }

    /// Run `f` inside an immediate (write) transaction.
    ///
    /// `BEGIN IMMEDIATE` takes the write lock up front, so writers commit in
    /// the order they acquired it and AUTOINCREMENT ids follow commit order.
    pub fn write<F, T, E>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&Transaction<'_>) -> std::result::Result<T, E>,
        E: From<rusqlite::Error>,
    {
        self.scoped(TransactionBehavior::Immediate, "write", f)
    }

    fn scoped<F, T, E>(
        &self,
        behavior: TransactionBehavior,
        kind: &str,
        f: F,
    ) -> std::result::Result<T, E>
    where
        F: FnOnce(&Transaction<'_>) -> std::result::Result<T, E>,
        E: From<rusqlite::Error>,
    {
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(behavior)?;

        // An Err drops `tx` here, which rolls it back.
        let value = f(&tx)?;
        tx.commit()?;

        debug!("Transaction committed ({})", kind);
        Ok(value)
    }

    fn connect(&self) -> rusqlite::Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(self.options.busy_timeout)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(conn)
    }
}
