#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tabular_ingest::store::{DuckDbStore, Store, StoreError, StoreTransaction};
use tabular_ingest::types::Value;

pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// In-memory DuckDB that can fail the N-th `INSERT` and records every statement it sees.
pub struct FailingStore {
    pub inner: DuckDbStore,
    /// 1-based index of the insert to fail, across all transactions.
    pub fail_on_insert: Option<usize>,
    pub statements: Arc<Mutex<Vec<String>>>,
    inserts: Arc<Mutex<usize>>,
}

impl FailingStore {
    pub fn new(fail_on_insert: Option<usize>) -> Self {
        Self {
            inner: DuckDbStore::memory().unwrap(),
            fail_on_insert,
            statements: Arc::new(Mutex::new(Vec::new())),
            inserts: Arc::new(Mutex::new(0)),
        }
    }

    pub fn executed(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }

    pub fn scalar(&self, sql: &str) -> Value {
        self.inner.query_rows(sql).unwrap()[0][0].clone()
    }
}

impl Store for FailingStore {
    fn table_exists(&mut self, name: &str) -> Result<bool, StoreError> {
        self.inner.table_exists(name)
    }

    fn begin(&mut self) -> Result<Box<dyn StoreTransaction + '_>, StoreError> {
        let fail_on_insert = self.fail_on_insert;
        let statements = Arc::clone(&self.statements);
        let inserts = Arc::clone(&self.inserts);
        let inner = self.inner.begin()?;
        Ok(Box::new(FailingTx {
            inner,
            fail_on_insert,
            statements,
            inserts,
        }))
    }
}

struct FailingTx<'a> {
    inner: Box<dyn StoreTransaction + 'a>,
    fail_on_insert: Option<usize>,
    statements: Arc<Mutex<Vec<String>>>,
    inserts: Arc<Mutex<usize>>,
}

impl StoreTransaction for FailingTx<'_> {
    fn table_exists(&mut self, name: &str) -> Result<bool, StoreError> {
        self.inner.table_exists(name)
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, StoreError> {
        self.statements.lock().unwrap().push(sql.to_string());
        if sql.starts_with("INSERT") {
            let mut n = self.inserts.lock().unwrap();
            *n += 1;
            if Some(*n) == self.fail_on_insert {
                return Err(StoreError::Database("injected insert failure".into()));
            }
        }
        self.inner.execute(sql, params)
    }

    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.inner.commit()
    }

    fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.inner.rollback()
    }
}
