//! In-process store.
//!
//! Behaves like the PostgreSQL table: unique key with "on conflict do nothing", inserts staged in
//! a transaction until commit, nothing kept on rollback or drop. A failure can be injected after
//! a given number of staged rows, or at commit, to exercise rollback paths.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::columns::TableSpec;
use crate::error::{SyncError, SyncResult};
use crate::types::Value;

use super::{Store, StoreConnection};

#[derive(Debug, Default)]
struct MemoryState {
    rows: BTreeMap<String, Vec<Value>>,
    fail_after_rows: Option<usize>,
    fail_commits: bool,
    refuse_connections: bool,
    open_connections: usize,
    commits: usize,
}

/// Shared in-memory table. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the insert that would stage row number `n + 1` of a transaction.
    pub fn fail_after_rows(self, n: usize) -> Self {
        self.lock().fail_after_rows = Some(n);
        self
    }

    /// Make every `commit` fail, leaving the transaction open.
    pub fn fail_commits(self) -> Self {
        self.lock().fail_commits = true;
        self
    }

    /// Make every `connect` fail, as if the database were down.
    pub fn refuse_connections(self) -> Self {
        self.lock().refuse_connections = true;
        self
    }

    /// Seed a committed row outside any transaction.
    pub fn insert_committed(&self, key: impl Into<String>, row: Vec<Value>) {
        self.lock().rows.insert(key.into(), row);
    }

    pub fn row_count(&self) -> usize {
        self.lock().rows.len()
    }

    pub fn row(&self, key: &str) -> Option<Vec<Value>> {
        self.lock().rows.get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock().rows.keys().cloned().collect()
    }

    /// Connections handed out and not yet dropped.
    pub fn open_connections(&self) -> usize {
        self.lock().open_connections
    }

    pub fn commits(&self) -> usize {
        self.lock().commits
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        lock_state(&self.state)
    }
}

fn lock_state(state: &Mutex<MemoryState>) -> MutexGuard<'_, MemoryState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Store for MemoryStore {
    type Connection = MemoryConnection;

    fn connect(&self) -> SyncResult<MemoryConnection> {
        let mut state = self.lock();
        if state.refuse_connections {
            return Err(SyncError::load("connect: connection refused"));
        }
        state.open_connections += 1;
        Ok(MemoryConnection {
            state: Arc::clone(&self.state),
            staged: Vec::new(),
            in_transaction: false,
        })
    }
}

/// Connection to a [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryConnection {
    state: Arc<Mutex<MemoryState>>,
    staged: Vec<(String, Vec<Value>)>,
    in_transaction: bool,
}

impl StoreConnection for MemoryConnection {
    fn begin(&mut self) -> SyncResult<()> {
        if self.in_transaction {
            return Err(SyncError::load("begin: transaction already open"));
        }
        self.in_transaction = true;
        self.staged.clear();
        Ok(())
    }

    fn insert_page(&mut self, table: &TableSpec, rows: &[Vec<Value>]) -> SyncResult<u64> {
        if !self.in_transaction {
            return Err(SyncError::load("insert: no open transaction"));
        }
        let key_idx = table.key_index().ok_or_else(|| {
            SyncError::load(format!("insert: table has no '{}' column", table.key))
        })?;

        let state = lock_state(&self.state);
        let mut staged_keys: HashSet<String> =
            self.staged.iter().map(|(k, _)| k.clone()).collect();
        let mut page: Vec<(String, Vec<Value>)> = Vec::new();
        for row in rows {
            if row.len() != table.columns.len() {
                return Err(SyncError::load(format!(
                    "insert: expected {} values, got {}",
                    table.columns.len(),
                    row.len()
                )));
            }
            let key = key_text(&row[key_idx]).ok_or_else(|| {
                SyncError::load(format!("insert: null value in column '{}'", table.key))
            })?;
            if state.rows.contains_key(&key) || staged_keys.contains(&key) {
                continue;
            }
            if let Some(limit) = state.fail_after_rows {
                if self.staged.len() + page.len() >= limit {
                    return Err(SyncError::load("insert: connection lost"));
                }
            }
            staged_keys.insert(key.clone());
            page.push((key, row.clone()));
        }
        drop(state);

        let inserted = page.len() as u64;
        self.staged.extend(page);
        Ok(inserted)
    }

    fn commit(&mut self) -> SyncResult<()> {
        if !self.in_transaction {
            return Err(SyncError::load("commit: no open transaction"));
        }
        let mut state = lock_state(&self.state);
        if state.fail_commits {
            return Err(SyncError::load("commit: connection lost"));
        }
        for (key, row) in self.staged.drain(..) {
            state.rows.entry(key).or_insert(row);
        }
        state.commits += 1;
        self.in_transaction = false;
        Ok(())
    }

    fn rollback(&mut self) -> SyncResult<()> {
        self.staged.clear();
        self.in_transaction = false;
        Ok(())
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        let mut state = lock_state(&self.state);
        state.open_connections = state.open_connections.saturating_sub(1);
    }
}

fn key_text(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::Utf8(s) => Some(s.clone()),
        Value::Int64(i) => Some(i.to_string()),
        Value::Float64(f) => Some(f.to_string()),
        Value::Timestamp(t) => Some(t.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(table: &TableSpec, key: &str) -> Vec<Value> {
        let mut r = vec![Value::Null; table.columns.len()];
        r[0] = Value::Utf8(key.to_string());
        r
    }

    #[test]
    fn staged_rows_are_invisible_until_commit() {
        let table = TableSpec::healthcare();
        let store = MemoryStore::new();
        let mut conn = store.connect().unwrap();

        conn.begin().unwrap();
        let page = [row(&table, "A1"), row(&table, "A1")];
        assert_eq!(conn.insert_page(&table, &page).unwrap(), 1);
        assert_eq!(store.row_count(), 0);
        conn.commit().unwrap();
        assert_eq!(store.keys(), vec!["A1".to_string()]);
    }

    #[test]
    fn dropping_a_connection_abandons_its_transaction() {
        let table = TableSpec::healthcare();
        let store = MemoryStore::new();
        {
            let mut conn = store.connect().unwrap();
            conn.begin().unwrap();
            conn.insert_page(&table, &[row(&table, "A1")]).unwrap();
            assert_eq!(store.open_connections(), 1);
        }
        assert_eq!(store.open_connections(), 0);
        assert_eq!(store.row_count(), 0);
    }
}
