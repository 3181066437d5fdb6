//! Persistence boundary.
//!
//! The vault never talks to a database directly. It issues statements
//! through [`RowStore`], and relies on [`RowStore::with_transaction`] to
//! persist a genuine row and its decoy batch together or not at all.

pub mod memory;

pub use memory::MemoryStore;

use std::sync::Arc;

use thiserror::Error;
use vault_common::{Record, VaultError};

/// Errors produced by a [`RowStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// A replace targeted a row that does not exist.
    #[error("no row {id} in table {table}")]
    UnknownRow { table: String, id: String },

    /// An insert reused the id of a row already in the table.
    #[error("duplicate id {id} in table {table}")]
    DuplicateId { table: String, id: String },

    /// A row was submitted without an `id` column.
    #[error("row in table {0} has no id")]
    MissingId(String),

    /// The transaction closure gave up; nothing was applied.
    #[error("transaction aborted: {0}")]
    Aborted(String),

    /// The backend is unusable (e.g. a poisoned lock or lost connection).
    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl From<StoreError> for VaultError {
    fn from(e: StoreError) -> Self {
        VaultError::Store(e.to_string())
    }
}

/// One buffered write.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Insert { table: String, row: Record },
    Replace { table: String, id: String, row: Record },
}

/// Statements collected inside [`RowStore::with_transaction`].
#[derive(Debug, Default)]
pub struct Transaction {
    statements: Vec<Statement>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_row(&mut self, table: &str, row: Record) {
        self.statements.push(Statement::Insert {
            table: table.to_owned(),
            row,
        });
    }

    /// Overwrite the row with primary key `id`.
    pub fn replace_row(&mut self, table: &str, id: &str, row: Record) {
        self.statements.push(Statement::Replace {
            table: table.to_owned(),
            id: id.to_owned(),
            row,
        });
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn into_statements(self) -> Vec<Statement> {
        self.statements
    }
}

/// Row storage used by the vault.
///
/// Implementations must be safe to share across request handlers.
pub trait RowStore: Send + Sync {
    /// Return every row of `table` for which `predicate` holds.
    fn query_rows(
        &self,
        table: &str,
        predicate: &dyn Fn(&Record) -> bool,
    ) -> Result<Vec<Record>, StoreError>;

    /// Run `f` against a fresh [`Transaction`] and apply its statements
    /// atomically. If `f` or any statement fails, nothing is applied.
    fn with_transaction(
        &self,
        f: &mut dyn FnMut(&mut Transaction) -> Result<(), StoreError>,
    ) -> Result<(), StoreError>;

    /// Insert a single row in its own transaction.
    fn insert_row(&self, table: &str, row: Record) -> Result<(), StoreError> {
        let mut row = Some(row);
        self.with_transaction(&mut |tx| {
            if let Some(row) = row.take() {
                tx.insert_row(table, row);
            }
            Ok(())
        })
    }
}

impl<S: RowStore + ?Sized> RowStore for Arc<S> {
    fn query_rows(
        &self,
        table: &str,
        predicate: &dyn Fn(&Record) -> bool,
    ) -> Result<Vec<Record>, StoreError> {
        (**self).query_rows(table, predicate)
    }

    fn with_transaction(
        &self,
        f: &mut dyn FnMut(&mut Transaction) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        (**self).with_transaction(f)
    }

    fn insert_row(&self, table: &str, row: Record) -> Result<(), StoreError> {
        (**self).insert_row(table, row)
    }
}
