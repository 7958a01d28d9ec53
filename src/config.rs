//! Configuration System
//!
//! Settings come from, in increasing priority: built-in defaults, an optional
//! TOML file, `BROKER_MIGRATE__*` environment variables, and command-line
//! flags. The merged `MigratorConfig` is validated once and resolved into an
//! immutable `MigrationSettings` that the run uses from then on.

use crate::error::ConfigError;
use crate::logging::LoggingConfig;
use crate::store::{MysqlSettings, SecretStoreSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod loader;
mod merge_policy;
mod sources;

pub use loader::ConfigLoader;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MigratorConfig {
    /// Source SQL store
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Destination secret store
    #[serde(default)]
    pub secret_store: SecretStoreConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver: sqlite (default) or mysql
    pub driver: Option<String>,

    /// Path of the SQLite database holding broker state
    pub path: Option<PathBuf>,

    /// MySQL server holding broker state
    pub hostname: Option<String>,
    pub port: Option<u16>,
    pub name: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,

    /// CA certificate for the MySQL TLS connection
    pub ca_cert_path: Option<PathBuf>,

    /// Skip server hostname validation when connecting over TLS
    #[serde(default)]
    pub skip_hostname_validation: bool,
}

/// Supported source database drivers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseDriver {
    Sqlite,
    Mysql,
}

impl DatabaseDriver {
    fn parse(driver: Option<&str>) -> Result<Self, ConfigError> {
        match driver.map(str::trim) {
            None | Some("sqlite") | Some("sqlite3") => Ok(DatabaseDriver::Sqlite),
            Some("mysql") => Ok(DatabaseDriver::Mysql),
            Some(other) => Err(ConfigError::Invalid {
                field: "database.driver",
                message: format!("'{}' (must be 'sqlite' or 'mysql')", other),
            }),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecretStoreConfig {
    /// Secret store server URL
    pub url: Option<String>,

    /// CA certificate for the secret store
    pub ca_cert_path: Option<PathBuf>,

    /// UAA client used to obtain secret store tokens
    pub client_id: Option<String>,
    pub client_secret: Option<String>,

    /// CA certificate for the UAA server
    pub uaa_ca_cert_path: Option<PathBuf>,

    /// Namespace for every credential the broker writes
    pub store_id: Option<String>,
}

/// Resolved source database connection
#[derive(Debug, Clone)]
pub enum DatabaseSettings {
    Sqlite { path: PathBuf },
    Mysql(MysqlSettings),
}

/// Validated settings for one run
#[derive(Debug, Clone)]
pub struct MigrationSettings {
    pub database: DatabaseSettings,
    pub secret_store: SecretStoreSettings,
    pub logging: LoggingConfig,
}

fn required<'a, T>(
    value: &'a Option<T>,
    name: &'static str,
    errors: &mut Vec<ConfigError>,
) -> Option<&'a T> {
    match value {
        Some(v) => Some(v),
        None => {
            errors.push(ConfigError::Missing(name));
            None
        }
    }
}

fn required_text<'a>(
    value: &'a Option<String>,
    name: &'static str,
    errors: &mut Vec<ConfigError>,
) -> Option<&'a str> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Some(v),
        _ => {
            errors.push(ConfigError::Missing(name));
            None
        }
    }
}

/// Read a PEM file named by an optional path
pub fn read_ca_cert(path: Option<&Path>) -> Result<Option<String>, ConfigError> {
    match path {
        None => Ok(None),
        Some(path) => std::fs::read_to_string(path)
            .map(Some)
            .map_err(|error| ConfigError::Unreadable {
                path: path.to_path_buf(),
                error,
            }),
    }
}

impl MigratorConfig {
    /// Validate the entire configuration, reporting every problem at once
    pub fn validate(&self) -> Result<(), Vec<ConfigError>> {
        let mut errors = Vec::new();

        match DatabaseDriver::parse(self.database.driver.as_deref()) {
            Ok(DatabaseDriver::Sqlite) => {
                required(&self.database.path, "database.path (--db-path)", &mut errors);
            }
            Ok(DatabaseDriver::Mysql) => {
                let db = &self.database;
                required_text(&db.hostname, "database.hostname (--db-hostname)", &mut errors);
                required(&db.port, "database.port (--db-port)", &mut errors);
                required_text(&db.name, "database.name (--db-name)", &mut errors);
                required_text(&db.username, "database.username (--db-username)", &mut errors);
                // An empty password is a valid password
                required(&db.password, "database.password (--db-password)", &mut errors);
            }
            Err(e) => errors.push(e),
        }
        if let Some(url) = required_text(
            &self.secret_store.url,
            "secret_store.url (--secret-store-url)",
            &mut errors,
        ) {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                errors.push(ConfigError::Invalid {
                    field: "secret_store.url",
                    message: format!("'{}' is not an http(s) URL", url),
                });
            }
        }
        required_text(
            &self.secret_store.client_id,
            "secret_store.client_id (--uaa-client-id)",
            &mut errors,
        );
        required_text(
            &self.secret_store.client_secret,
            "secret_store.client_secret (--uaa-client-secret)",
            &mut errors,
        );
        required_text(
            &self.secret_store.store_id,
            "secret_store.store_id (--store-id)",
            &mut errors,
        );

        if let Err(e) = self.logging.validate() {
            errors.push(e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate and resolve into run settings, reading CA certificates
    pub fn resolve(&self) -> Result<MigrationSettings, ConfigError> {
        self.validate().map_err(ConfigError::Validation)?;

        let store = &self.secret_store;
        let ca_cert_pem = read_ca_cert(store.ca_cert_path.as_deref())?;
        let uaa_ca_cert_pem = read_ca_cert(store.uaa_ca_cert_path.as_deref())?;

        // validate() guarantees every required field below is present
        let missing = |name| ConfigError::Missing(name);
        let db = &self.database;
        let database = match DatabaseDriver::parse(db.driver.as_deref())? {
            DatabaseDriver::Sqlite => DatabaseSettings::Sqlite {
                path: db.path.clone().ok_or(missing("database.path"))?,
            },
            DatabaseDriver::Mysql => DatabaseSettings::Mysql(MysqlSettings {
                hostname: db.hostname.clone().ok_or(missing("database.hostname"))?,
                port: db.port.ok_or(missing("database.port"))?,
                database: db.name.clone().ok_or(missing("database.name"))?,
                username: db.username.clone().ok_or(missing("database.username"))?,
                password: db.password.clone().ok_or(missing("database.password"))?,
                ca_cert_pem: read_ca_cert(db.ca_cert_path.as_deref())?,
                skip_hostname_validation: db.skip_hostname_validation,
            }),
        };
        Ok(MigrationSettings {
            database,
            secret_store: SecretStoreSettings {
                url: store.url.clone().ok_or(missing("secret_store.url"))?,
                ca_cert_pem,
                client_id: store.client_id.clone().ok_or(missing("secret_store.client_id"))?,
                client_secret: store
                    .client_secret
                    .clone()
                    .ok_or(missing("secret_store.client_secret"))?,
                uaa_ca_cert_pem,
                store_id: store.store_id.clone().ok_or(missing("secret_store.store_id"))?,
            },
            logging: self.logging.clone(),
        })
    }
}
