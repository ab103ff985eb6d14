//! Transactional data-store seam for migrations.
//!
//! The engine has no schema of its own; it only needs to open a transaction,
//! run SQL inside it, and commit or roll back. SQLite hosts can pass their
//! `rusqlite::Connection` directly.

use crate::error::{Result, UpdateError};

/// A data store that can open transactions.
pub trait DataStore {
    /// Open a transaction. Dropping it without commit must roll back.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Database`] if the transaction cannot be opened.
    fn begin(&mut self) -> Result<Box<dyn StoreTransaction + '_>>;
}

/// An open transaction.
pub trait StoreTransaction {
    /// Execute one or more SQL statements.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Database`] if any statement fails.
    fn execute(&mut self, sql: &str) -> Result<()>;

    /// Make the changes durable.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Database`] if the commit fails.
    fn commit(self: Box<Self>) -> Result<()>;

    /// Discard the changes.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Database`] if the rollback fails.
    fn rollback(self: Box<Self>) -> Result<()>;
}

fn db_error(e: rusqlite::Error) -> UpdateError {
    UpdateError::Database(e.to_string())
}

impl DataStore for rusqlite::Connection {
    fn begin(&mut self) -> Result<Box<dyn StoreTransaction + '_>> {
        let tx = self.transaction().map_err(db_error)?;
        Ok(Box::new(tx))
    }
}

impl StoreTransaction for rusqlite::Transaction<'_> {
    fn execute(&mut self, sql: &str) -> Result<()> {
        self.execute_batch(sql).map_err(db_error)
    }

    fn commit(self: Box<Self>) -> Result<()> {
        let tx = *self;
        tx.commit().map_err(db_error)
    }

    fn rollback(self: Box<Self>) -> Result<()> {
        let tx = *self;
        tx.rollback().map_err(db_error)
    }
}
