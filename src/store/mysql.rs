//! MySQL-backed broker store
//!
//! Same layout as the SQLite store: JSON record values in two key/value
//! tables and a `retired_at` row in `store_state`. The driver is async, so
//! the store owns a current-thread runtime and blocks on each call.

use crate::error::StoreError;
use crate::store::{RecordSink, RecordSource, Retirement};
use crate::types::{BindingDetails, RecordKind, ServiceInstance};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlDatabaseError, MySqlSslMode};
use sqlx::ConnectOptions;
use std::cell::RefCell;
use std::collections::HashMap;
use tokio::runtime::{Builder, Runtime};
use tracing::debug;

/// MySQL server error for `USE` of a database that does not exist
const ER_BAD_DB_ERROR: u16 = 1049;
const RETIRED_AT_KEY: &str = "retired_at";

const SCHEMA: [&str; 3] = [
    "CREATE TABLE IF NOT EXISTS service_instances (id VARCHAR(255) PRIMARY KEY, value TEXT NOT NULL)",
    "CREATE TABLE IF NOT EXISTS service_bindings (id VARCHAR(255) PRIMARY KEY, value TEXT NOT NULL)",
    "CREATE TABLE IF NOT EXISTS store_state (`key` VARCHAR(255) PRIMARY KEY, value TEXT NOT NULL)",
];

/// Connection settings for a MySQL server
#[derive(Debug, Clone)]
pub struct MysqlSettings {
    pub hostname: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub ca_cert_pem: Option<String>,
    pub skip_hostname_validation: bool,
}

impl MysqlSettings {
    /// TLS mode: verify against the CA when one is given, and check the
    /// server hostname unless told to skip it.
    pub fn ssl_mode(&self) -> MySqlSslMode {
        match (&self.ca_cert_pem, self.skip_hostname_validation) {
            (None, _) => MySqlSslMode::Preferred,
            (Some(_), true) => MySqlSslMode::VerifyCa,
            (Some(_), false) => MySqlSslMode::VerifyIdentity,
        }
    }

    fn connect_options(&self) -> MySqlConnectOptions {
        let mut options = MySqlConnectOptions::new()
            .host(&self.hostname)
            .port(self.port)
            .username(&self.username)
            .password(&self.password)
            .database(&self.database)
            .ssl_mode(self.ssl_mode());
        if let Some(pem) = &self.ca_cert_pem {
            options = options.ssl_ca_from_pem(pem.clone().into_bytes());
        }
        options.disable_statement_logging()
    }
}

fn is_unknown_database(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(db_error) => db_error
            .try_downcast_ref::<MySqlDatabaseError>()
            .map_or(false, |e| e.number() == ER_BAD_DB_ERROR),
        _ => false,
    }
}

fn map_sqlx_error(error: sqlx::Error) -> StoreError {
    match error {
        sqlx::Error::Io(e) => StoreError::Unavailable(format!("Connection error: {}", e)),
        sqlx::Error::PoolTimedOut => StoreError::Unavailable("Connection timed out".to_string()),
        other => StoreError::Mysql(other),
    }
}

/// Broker store backed by a single MySQL connection
pub struct MysqlStore {
    // Dropped before the runtime that drives it.
    conn: RefCell<MySqlConnection>,
    runtime: Runtime,
    database: String,
}

impl MysqlStore {
    /// Connect and provision the schema. An unknown database yields
    /// `StoreError::DatabaseMissing`.
    pub fn connect(settings: &MysqlSettings) -> Result<Self, StoreError> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        let conn = runtime
            .block_on(settings.connect_options().connect())
            .map_err(|e| {
                if is_unknown_database(&e) {
                    StoreError::DatabaseMissing(settings.database.clone())
                } else {
                    map_sqlx_error(e)
                }
            })?;

        let store = Self {
            conn: RefCell::new(conn),
            runtime,
            database: settings.database.clone(),
        };
        for statement in SCHEMA {
            store.execute(statement, &[])?;
        }
        debug!(
            host = %settings.hostname,
            database = %store.database,
            "MySQL store opened"
        );
        Ok(store)
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    fn table(kind: RecordKind) -> &'static str {
        match kind {
            RecordKind::Instance => "service_instances",
            RecordKind::Binding => "service_bindings",
        }
    }

    fn execute(&self, statement: &str, binds: &[&str]) -> Result<(), StoreError> {
        let mut query = sqlx::query(statement);
        for value in binds {
            query = query.bind(*value);
        }
        let mut conn = self.conn.borrow_mut();
        self.runtime
            .block_on(query.execute(&mut *conn))
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    fn load_all<T: DeserializeOwned>(
        &self,
        kind: RecordKind,
    ) -> Result<HashMap<String, T>, StoreError> {
        let statement = format!("SELECT id, value FROM {}", Self::table(kind));
        let rows: Vec<(String, String)> = {
            let mut conn = self.conn.borrow_mut();
            self.runtime
                .block_on(sqlx::query_as(&statement).fetch_all(&mut *conn))
                .map_err(map_sqlx_error)?
        };

        let mut records = HashMap::new();
        for (id, value) in rows {
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
            "REPLACE INTO {} (id, value) VALUES (?, ?)",
            Self::table(kind)
        );
        self.execute(&statement, &[id, &value])
    }
}

impl RecordSource for MysqlStore {
    fn retrieve_all_instance_details(&self) -> Result<HashMap<String, ServiceInstance>, StoreError> {
        self.load_all(RecordKind::Instance)
    }

    fn retrieve_all_binding_details(&self) -> Result<HashMap<String, BindingDetails>, StoreError> {
        self.load_all(RecordKind::Binding)
    }
}

impl RecordSink for MysqlStore {
    fn create_instance_details(&self, id: &str, details: &ServiceInstance) -> Result<(), StoreError> {
        self.store(RecordKind::Instance, id, details)
    }

    fn create_binding_details(&self, id: &str, details: &BindingDetails) -> Result<(), StoreError> {
        self.store(RecordKind::Binding, id, details)
    }
}

impl Retirement for MysqlStore {
    fn is_retired(&self) -> Result<bool, StoreError> {
        let mut conn = self.conn.borrow_mut();
        let count: i64 = self
            .runtime
            .block_on(
                sqlx::query_scalar("SELECT COUNT(*) FROM store_state WHERE `key` = ?")
                    .bind(RETIRED_AT_KEY)
                    .fetch_one(&mut *conn),
            )
            .map_err(map_sqlx_error)?;
        Ok(count > 0)
    }

    fn retire(&self) -> Result<(), StoreError> {
        let retired_at = chrono::Utc::now().to_rfc3339();
        self.execute(
            "REPLACE INTO store_state (`key`, value) VALUES (?, ?)",
            &[RETIRED_AT_KEY, &retired_at],
        )
    }
}
