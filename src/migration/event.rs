//! Migration events and the observers that receive them.

use crate::error::FailureCategory;
use crate::types::RecordKind;
use tracing::{debug, error, info};

/// Something notable that happened during a migration pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationEvent {
    Started,
    AlreadyActivated,
    AlreadyRetired,
    RecordsRead { kind: RecordKind, count: usize },
    RecordWritten { kind: RecordKind, id: String },
    DestinationActivated,
    SourceRetired,
    Completed { instances: usize, bindings: usize },
    /// A dry run started; nothing will be written
    Previewing,
    Previewed { instances: usize, bindings: usize },
    Failed { category: FailureCategory, message: String },
}

impl MigrationEvent {
    /// Stable event name used as the log message
    pub fn name(&self) -> &'static str {
        match self {
            MigrationEvent::Started => "migration-started",
            MigrationEvent::AlreadyActivated => "destination-already-activated",
            MigrationEvent::AlreadyRetired => "source-already-retired",
            MigrationEvent::RecordsRead { .. } => "records-retrieved",
            MigrationEvent::RecordWritten { .. } => "record-created",
            MigrationEvent::DestinationActivated => "destination-activated",
            MigrationEvent::SourceRetired => "source-retired",
            MigrationEvent::Completed { .. } => "migration-complete",
            MigrationEvent::Previewing => "preview-started",
            MigrationEvent::Previewed { .. } => "preview-complete",
            MigrationEvent::Failed { .. } => "migration-failed",
        }
    }
}

/// Receives events from the migrator
pub trait MigrationObserver {
    fn on_event(&self, event: &MigrationEvent);
}

impl<F> MigrationObserver for F
where
    F: Fn(&MigrationEvent),
{
    fn on_event(&self, event: &MigrationEvent) {
        self(event)
    }
}

/// Writes events as structured tracing records
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl MigrationObserver for TracingObserver {
    fn on_event(&self, event: &MigrationEvent) {
        let name = event.name();
        match event {
            MigrationEvent::RecordsRead { kind, count } => {
                info!(kind = %kind, count = *count, "{}", name)
            }
            MigrationEvent::RecordWritten { kind, id } => {
                debug!(kind = %kind, id = %id, "{}", name)
            }
            MigrationEvent::Completed {
                instances,
                bindings,
            }
            | MigrationEvent::Previewed {
                instances,
                bindings,
            } => info!(instances = *instances, bindings = *bindings, "{}", name),
            MigrationEvent::Failed { category, message } => {
                error!(category = %category, error = %message, "{}", name)
            }
            _ => info!("{}", name),
        }
    }
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl MigrationObserver for NoopObserver {
    fn on_event(&self, _event: &MigrationEvent) {}
}
