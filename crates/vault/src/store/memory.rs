//! In-memory row store (for tests and the startup self-check).

use std::collections::HashMap;
use std::sync::RwLock;

use vault_common::Record;

use super::{RowStore, Statement, StoreError, Transaction};

/// Tables held in process memory.
///
/// Thread-safe via `RwLock`. Not persistent; data is lost on drop.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Vec<Record>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows in `table`, genuine and decoy alike.
    pub fn count(&self, table: &str) -> usize {
        self.tables
            .read()
            .map(|t| t.get(table).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    /// Every row of `table`, unfiltered.
    pub fn raw_rows(&self, table: &str) -> Vec<Record> {
        self.tables
            .read()
            .map(|t| t.get(table).cloned().unwrap_or_default())
            .unwrap_or_default()
    }
}

impl RowStore for MemoryStore {
    fn query_rows(
        &self,
        table: &str,
        predicate: &dyn Fn(&Record) -> bool,
    ) -> Result<Vec<Record>, StoreError> {
        let tables = self
            .tables
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".into()))?;
        Ok(tables
            .get(table)
            .map(|rows| rows.iter().filter(|r| predicate(r)).cloned().collect())
            .unwrap_or_default())
    }

    fn with_transaction(
        &self,
        f: &mut dyn FnMut(&mut Transaction) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let mut tx = Transaction::new();
        f(&mut tx)?;

        let mut tables = self
            .tables
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".into()))?;

        // Apply to a scratch copy of the touched tables first so a failing
        // statement leaves nothing behind.
        let mut staged: HashMap<String, Vec<Record>> = HashMap::new();
        for statement in tx.into_statements() {
            match statement {
                Statement::Insert { table, row } => {
                    let Some(id) = row.id() else {
                        return Err(StoreError::MissingId(table));
                    };
                    let rows = staged_table(&mut staged, &tables, &table);
                    if rows.iter().any(|r| r.id() == Some(id)) {
                        let id = id.to_owned();
                        return Err(StoreError::DuplicateId { table, id });
                    }
                    rows.push(row);
                }
                Statement::Replace { table, id, row } => {
                    let rows = staged_table(&mut staged, &tables, &table);
                    match rows.iter_mut().find(|r| r.id() == Some(id.as_str())) {
                        Some(existing) => *existing = row,
                        None => return Err(StoreError::UnknownRow { table, id }),
                    }
                }
            }
        }

        tables.extend(staged);
        Ok(())
    }
}

fn staged_table<'a>(
    staged: &'a mut HashMap<String, Vec<Record>>,
    committed: &HashMap<String, Vec<Record>>,
    table: &str,
) -> &'a mut Vec<Record> {
    staged
        .entry(table.to_owned())
        .or_insert_with(|| committed.get(table).cloned().unwrap_or_default())
}
