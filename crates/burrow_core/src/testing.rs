//! Scripted SQL client for unit tests.
//!
//! `MockClient` answers statements from a script keyed by trimmed SQL text and records
//! every statement it receives. Clones share the script and the log, so a test can keep
//! a handle while the code under test owns a boxed copy.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::BurrowError;
use crate::models::{ConnectionProfile, ResultSet, Row, Value};
use crate::services::{Connector, SqlClient};

/// Build a result set from string literals. `None` cells become NULL.
pub fn result_set(columns: &[&str], rows: &[&[Option<&str>]]) -> ResultSet {
    ResultSet::new(
        columns.iter().map(|c| c.to_string()).collect(),
        rows.iter()
            .map(|row| {
                Row(row
                    .iter()
                    .map(|cell| match cell {
                        Some(text) => Value::Text(text.to_string()),
                        None => Value::Null,
                    })
                    .collect())
            })
            .collect(),
    )
}

#[derive(Default)]
struct Script {
    results: HashMap<String, ResultSet>,
    failures: HashMap<String, (String, Option<String>)>,
    affected: u64,
}

#[derive(Default)]
struct Journal {
    statements: Vec<String>,
    params: Vec<Vec<Value>>,
    closed: Vec<String>,
}

/// In-memory `SqlClient`.
#[derive(Clone)]
pub struct MockClient {
    database: String,
    script: Arc<Mutex<Script>>,
    journal: Arc<Mutex<Journal>>,
}

impl MockClient {
    pub fn new(database: &str) -> Self {
        Self {
            database: database.to_string(),
            script: Arc::default(),
            journal: Arc::default(),
        }
    }

    /// Answer `sql` with `result`.
    pub fn with_result(self, sql: &str, result: ResultSet) -> Self {
        self.script.lock().results.insert(sql.trim().to_string(), result);
        self
    }

    /// Fail `sql` with a server statement error.
    pub fn with_failure(self, sql: &str, message: &str, code: Option<&str>) -> Self {
        self.script
            .lock()
            .failures
            .insert(sql.trim().to_string(), (message.to_string(), code.map(String::from)));
        self
    }

    /// Affected-row count reported by `execute`.
    pub fn with_affected(self, affected: u64) -> Self {
        self.script.lock().affected = affected;
        self
    }

    /// Same script and log, different database.
    pub fn for_database(&self, database: &str) -> Self {
        Self {
            database: database.to_string(),
            script: Arc::clone(&self.script),
            journal: Arc::clone(&self.journal),
        }
    }

    /// Every statement received, trimmed, in order.
    pub fn statements(&self) -> Vec<String> {
        self.journal.lock().statements.clone()
    }

    /// Parameters of every `query`/`execute` call, in order.
    pub fn params(&self) -> Vec<Vec<Value>> {
        self.journal.lock().params.clone()
    }

    /// Databases of the clients that were closed.
    pub fn closed(&self) -> Vec<String> {
        self.journal.lock().closed.clone()
    }

    /// How many times `sql` was received.
    pub fn count(&self, sql: &str) -> usize {
        let sql = sql.trim();
        self.journal.lock().statements.iter().filter(|s| s.as_str() == sql).count()
    }

    fn record(&self, sql: &str, params: Option<&[Value]>) -> Result<(), BurrowError> {
        let sql = sql.trim();
        {
            let mut journal = self.journal.lock();
            journal.statements.push(sql.to_string());
            if let Some(params) = params {
                journal.params.push(params.to_vec());
            }
        }
        match self.script.lock().failures.get(sql) {
            Some((message, code)) => {
                Err(BurrowError::query(message.clone(), None, None, None, code.clone()))
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SqlClient for MockClient {
    fn database(&self) -> &str {
        &self.database
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<ResultSet, BurrowError> {
        self.record(sql, Some(params))?;
        Ok(self.script.lock().results.get(sql.trim()).cloned().unwrap_or_default())
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, BurrowError> {
        self.record(sql, Some(params))?;
        Ok(self.script.lock().affected)
    }

    async fn batch(&self, sql: &str) -> Result<(), BurrowError> {
        self.record(sql, None)
    }

    async fn close(self: Box<Self>) {
        self.journal.lock().closed.push(self.database.clone());
    }
}

/// `Connector` handing out `MockClient`s that share one script.
#[derive(Clone)]
pub struct MockConnector {
    client: MockClient,
    connects: Arc<Mutex<Vec<String>>>,
    refuse: Arc<Mutex<Option<String>>>,
}

impl MockConnector {
    pub fn new(client: MockClient) -> Self {
        Self { client, connects: Arc::default(), refuse: Arc::default() }
    }

    /// Make every following `connect` fail with a connection error.
    pub fn refuse(&self, message: &str) {
        *self.refuse.lock() = Some(message.to_string());
    }

    /// Databases connected to, in order.
    pub fn connects(&self) -> Vec<String> {
        self.connects.lock().clone()
    }

    pub fn client(&self) -> &MockClient {
        &self.client
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(
        &self,
        _profile: &ConnectionProfile,
        database: &str,
    ) -> Result<Box<dyn SqlClient>, BurrowError> {
        if let Some(message) = self.refuse.lock().clone() {
            return Err(BurrowError::connection(message));
        }
        self.connects.lock().push(database.to_string());
        Ok(Box::new(self.client.for_database(database)))
    }
}
