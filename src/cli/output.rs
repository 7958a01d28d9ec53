//! CLI output: stable text for outcomes and errors.

use crate::error::RunError;
use crate::migration::{MigrationOutcome, MigrationPreview};

/// Map run errors to a string for CLI output.
pub fn map_error(e: &RunError) -> String {
    match e {
        RunError::Migration(err) => format!("{} (category: {})", err, err.category()),
        other => other.to_string(),
    }
}

pub fn format_outcome(outcome: &MigrationOutcome) -> String {
    match outcome {
        MigrationOutcome::Migrated(summary) => format!(
            "Migrated {} instance(s) and {} binding(s); destination activated, source retired",
            summary.instances, summary.bindings
        ),
        MigrationOutcome::AlreadyActivated => {
            "Destination store already activated; nothing to migrate".to_string()
        }
        MigrationOutcome::AlreadyRetired => {
            "Source store already retired; nothing to migrate".to_string()
        }
        MigrationOutcome::SourceMissing => {
            "Source database does not exist; nothing to migrate".to_string()
        }
    }
}

pub fn format_preview(preview: &MigrationPreview) -> String {
    match preview {
        MigrationPreview::Pending {
            instances,
            bindings,
        } => format!(
            "Would migrate {} instance(s) and {} binding(s)",
            instances, bindings
        ),
        MigrationPreview::AlreadyActivated => {
            "Destination store already activated; nothing to migrate".to_string()
        }
        MigrationPreview::AlreadyRetired => {
            "Source store already retired; nothing to migrate".to_string()
        }
        MigrationPreview::SourceMissing => {
            "Source database does not exist; nothing to migrate".to_string()
        }
    }
}
