//! SQLite-backed broker store
//!
//! Records live as JSON text in two key/value tables. The retired flag is a
//! timestamp row in `store_state`.

use crate::error::StoreError;
use crate::store::{RecordSink, RecordSource, Retirement};
use crate::types::{BindingDetails, RecordKind, ServiceInstance};
use rusqlite::{params, Connection, OpenFlags};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const RETIRED_AT_KEY: &str = "retired_at";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS service_instances (
    id TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS service_bindings (
    id TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS store_state (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";

/// Broker store backed by a single SQLite connection
pub struct SqlStore {
    conn: Connection,
    path: PathBuf,
}

impl SqlStore {
    /// Open an existing database. Never creates the file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(StoreError::DatabaseMissing(path.display().to_string()));
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Self::init(conn, path)
    }

    /// Open the database, creating the file if needed
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        Self::init(conn, path)
    }

    fn init(conn: Connection, path: &Path) -> Result<Self, StoreError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        debug!(path = %path.display(), "SQL store opened");
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn table(kind: RecordKind) -> &'static str {
        match kind {
            RecordKind::Instance => "service_instances",
            RecordKind::Binding => "service_bindings",
        }
    }

    fn load_all<T: DeserializeOwned>(
        &self,
        kind: RecordKind,
    ) -> Result<HashMap<String, T>, StoreError> {
        let query = format!("SELECT id, value FROM {}", Self::table(kind));
        let mut statement = self.conn.prepare(&query)?;
        let rows = statement.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut records = HashMap::new();
        for row in rows {
            let (id, value) = row?;
            let record = serde_json::from_str(&value).map_err(|e| {
                StoreError::Serialization(format!("Failed to decode {} '{}': {}", kind, id, e))
            })?;
            records.insert(id, record);
        }
        Ok(records)
    }

    fn store<T: Serialize>(&self, kind: RecordKind, id: &str, record: &T) -> Result<(), StoreError> {
        let value = serde_json::to_string(record)?;
        let statement = format!(
            "INSERT OR REPLACE INTO {} (id, value) VALUES (?1, ?2)",
            Self::table(kind)
        );
        self.conn.execute(&statement, params![id, value])?;
        Ok(())
    }
}

impl RecordSource for SqlStore {
    fn retrieve_all_instance_details(&self) -> Result<HashMap<String, ServiceInstance>, StoreError> {
        self.load_all(RecordKind::Instance)
    }

    fn retrieve_all_binding_details(&self) -> Result<HashMap<String, BindingDetails>, StoreError> {
        self.load_all(RecordKind::Binding)
    }
}

impl RecordSink for SqlStore {
    fn create_instance_details(&self, id: &str, details: &ServiceInstance) -> Result<(), StoreError> {
        self.store(RecordKind::Instance, id, details)
    }

    fn create_binding_details(&self, id: &str, details: &BindingDetails) -> Result<(), StoreError> {
        self.store(RecordKind::Binding, id, details)
    }
}

impl Retirement for SqlStore {
    fn is_retired(&self) -> Result<bool, StoreError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM store_state WHERE key = ?1",
            [RETIRED_AT_KEY],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn retire(&self) -> Result<(), StoreError> {
        let retired_at = chrono::Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT OR REPLACE INTO store_state (key, value) VALUES (?1, ?2)",
            params![RETIRED_AT_KEY, retired_at],
        )?;
        Ok(())
    }
}
