//! CLI route: run context. Opens both stores and hands them to the migrator.

use crate::config::{DatabaseSettings, MigrationSettings, MigratorConfig};
use crate::error::{RunError, StoreError};
use crate::migration::{MigrationOutcome, MigrationPreview, Migrator};
use crate::store::{ActivatableStore, MysqlStore, RetirableStore, SecretStore, SqlStore};
use tracing::info;

use crate::cli::output::{format_outcome, format_preview};

/// Result of one command-line run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunReport {
    Migration(MigrationOutcome),
    Preview(MigrationPreview),
}

impl RunReport {
    pub fn render(&self) -> String {
        match self {
            RunReport::Migration(outcome) => format_outcome(outcome),
            RunReport::Preview(preview) => format_preview(preview),
        }
    }
}

/// Treat a source database that was never created as nothing to migrate.
///
/// Returns `Ok(None)` for `StoreError::DatabaseMissing` and passes every other
/// result through.
pub fn tolerate_missing_database<T>(result: Result<T, StoreError>) -> Result<Option<T>, StoreError> {
    match result {
        Ok(store) => Ok(Some(store)),
        Err(StoreError::DatabaseMissing(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Runtime context for one invocation, built once from validated settings
pub struct RunContext {
    settings: MigrationSettings,
    dry_run: bool,
}

impl RunContext {
    pub fn new(config: &MigratorConfig, dry_run: bool) -> Result<Self, RunError> {
        let settings = config.resolve()?;
        Ok(Self { settings, dry_run })
    }

    pub fn settings(&self) -> &MigrationSettings {
        &self.settings
    }

    /// Open the SQL source and the secret store destination, then migrate
    pub fn execute(&self) -> Result<RunReport, RunError> {
        match &self.settings.database {
            DatabaseSettings::Sqlite { path } => {
                match tolerate_missing_database(SqlStore::open(path))? {
                    Some(source) => self.execute_against(&source),
                    None => Ok(self.source_missing(&path.display().to_string())),
                }
            }
            DatabaseSettings::Mysql(mysql) => {
                match tolerate_missing_database(MysqlStore::connect(mysql))? {
                    Some(source) => self.execute_against(&source),
                    None => Ok(self.source_missing(&mysql.database)),
                }
            }
        }
    }

    fn execute_against<S: RetirableStore>(&self, source: &S) -> Result<RunReport, RunError> {
        let destination = SecretStore::new(self.settings.secret_store.clone())?;
        self.execute_with(source, &destination)
    }

    fn source_missing(&self, database: &str) -> RunReport {
        info!(database, dry_run = self.dry_run, "missing-sql-database");
        if self.dry_run {
            RunReport::Preview(MigrationPreview::SourceMissing)
        } else {
            RunReport::Migration(MigrationOutcome::SourceMissing)
        }
    }

    /// Migrate (or preview, for a dry run) between already-open stores
    pub fn execute_with<S, D>(&self, source: &S, destination: &D) -> Result<RunReport, RunError>
    where
        S: RetirableStore + ?Sized,
        D: ActivatableStore + ?Sized,
    {
        let migrator = Migrator::default();
        if self.dry_run {
            let preview = migrator.preview(source, destination)?;
            return Ok(RunReport::Preview(preview));
        }
        let outcome = migrator.migrate(source, destination)?;
        Ok(RunReport::Migration(outcome))
    }
}
