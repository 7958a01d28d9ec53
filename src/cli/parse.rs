//! CLI parse: clap types for broker-migrate. No behavior beyond flag overrides.

use crate::config::MigratorConfig;
use clap::Parser;
use std::path::PathBuf;

/// Migrate service broker state from a SQL database into a secret store
#[derive(Parser, Debug, Clone)]
#[command(name = "broker-migrate")]
#[command(about = "Migrate service broker state from a SQL database into a secret store")]
pub struct Cli {
    /// Configuration file path (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Database driver holding the broker's records (sqlite, mysql)
    #[arg(long)]
    pub db_driver: Option<String>,

    /// SQLite database holding the broker's instance and binding records
    #[arg(long)]
    pub db_path: Option<PathBuf>,

    /// MySQL server hostname
    #[arg(long)]
    pub db_hostname: Option<String>,

    /// MySQL server port
    #[arg(long)]
    pub db_port: Option<u16>,

    /// MySQL database name
    #[arg(long)]
    pub db_name: Option<String>,

    #[arg(long)]
    pub db_username: Option<String>,

    #[arg(long)]
    pub db_password: Option<String>,

    /// Path to CA certificate for the MySQL connection
    #[arg(long)]
    pub db_ca_cert_path: Option<PathBuf>,

    /// Accept a MySQL server certificate whose hostname does not match
    #[arg(long)]
    pub db_skip_hostname_validation: bool,

    /// Secret store server URL
    #[arg(long)]
    pub secret_store_url: Option<String>,

    /// Path to CA certificate for the secret store
    #[arg(long)]
    pub secret_store_ca_cert_path: Option<PathBuf>,

    /// UAA client ID used to authenticate to the secret store
    #[arg(long)]
    pub uaa_client_id: Option<String>,

    /// UAA client secret used to authenticate to the secret store
    #[arg(long)]
    pub uaa_client_secret: Option<String>,

    /// Path to CA certificate for UAA
    #[arg(long)]
    pub uaa_ca_cert_path: Option<PathBuf>,

    /// Store ID used to namespace instance and binding credentials
    #[arg(long)]
    pub store_id: Option<String>,

    /// Log level (trace, debug, info, warn, error, fatal, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Report what would be migrated without writing anything
    #[arg(long, default_value = "false")]
    pub dry_run: bool,
}

impl Cli {
    /// Apply command-line flags over loaded configuration. Flags win.
    pub fn apply_overrides(&self, config: &mut MigratorConfig) {
        let db = &mut config.database;
        if let Some(ref driver) = self.db_driver {
            db.driver = Some(driver.clone());
        }
        if let Some(ref path) = self.db_path {
            db.path = Some(path.clone());
        }
        if let Some(ref hostname) = self.db_hostname {
            db.hostname = Some(hostname.clone());
        }
        if let Some(port) = self.db_port {
            db.port = Some(port);
        }
        if let Some(ref name) = self.db_name {
            db.name = Some(name.clone());
        }
        if let Some(ref username) = self.db_username {
            db.username = Some(username.clone());
        }
        if let Some(ref password) = self.db_password {
            db.password = Some(password.clone());
        }
        if let Some(ref path) = self.db_ca_cert_path {
            db.ca_cert_path = Some(path.clone());
        }
        // Only ever switches validation off; a file or env setting stands otherwise
        if self.db_skip_hostname_validation {
            db.skip_hostname_validation = true;
        }

        let store = &mut config.secret_store;
        if let Some(ref url) = self.secret_store_url {
            store.url = Some(url.clone());
        }
        if let Some(ref path) = self.secret_store_ca_cert_path {
            store.ca_cert_path = Some(path.clone());
        }
        if let Some(ref client_id) = self.uaa_client_id {
            store.client_id = Some(client_id.clone());
        }
        if let Some(ref client_secret) = self.uaa_client_secret {
            store.client_secret = Some(client_secret.clone());
        }
        if let Some(ref path) = self.uaa_ca_cert_path {
            store.uaa_ca_cert_path = Some(path.clone());
        }
        if let Some(ref store_id) = self.store_id {
            store.store_id = Some(store_id.clone());
        }

        if let Some(ref level) = self.log_level {
            config.logging.level = level.clone();
        }
        if let Some(ref format) = self.log_format {
            config.logging.format = format.clone();
        }
    }
}
