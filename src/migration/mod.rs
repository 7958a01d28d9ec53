//! Migration Orchestrator
//!
//! Copies every instance and binding record from a retirable source into an
//! activatable destination, then activates the destination and retires the
//! source. Either flag being set means a previous run already finished, so
//! running again is a no-op.
//!
//! Guard order is fixed: the destination's activated flag is checked before
//! the source's retired flag. Any store failure ends the run immediately with
//! no retry and no rollback; the flags are only flipped after every record has
//! been written, so a failed run is safe to repeat.

pub mod event;

pub use event::{MigrationEvent, MigrationObserver, NoopObserver, TracingObserver};

use crate::error::MigrationError;
use crate::store::{ActivatableStore, RetirableStore};
use crate::types::RecordKind;

/// Record counts copied by a completed migration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MigrationSummary {
    pub instances: usize,
    pub bindings: usize,
}

/// How a migration run ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    Migrated(MigrationSummary),
    AlreadyActivated,
    AlreadyRetired,
    /// The source database has never been created; there is nothing to move.
    SourceMissing,
}

/// What a migration would do, computed without writing anything
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationPreview {
    Pending { instances: usize, bindings: usize },
    AlreadyActivated,
    AlreadyRetired,
    /// The source database has never been created
    SourceMissing,
}

enum Guard {
    Proceed,
    AlreadyActivated,
    AlreadyRetired,
}

/// Runs migrations and reports progress to an observer
pub struct Migrator<O: MigrationObserver = TracingObserver> {
    observer: O,
}

impl Default for Migrator<TracingObserver> {
    fn default() -> Self {
        Self::new(TracingObserver)
    }
}

impl<O: MigrationObserver> Migrator<O> {
    pub fn new(observer: O) -> Self {
        Self { observer }
    }

    pub fn migrate<S, D>(&self, source: &S, destination: &D) -> Result<MigrationOutcome, MigrationError>
    where
        S: RetirableStore + ?Sized,
        D: ActivatableStore + ?Sized,
    {
        self.emit(MigrationEvent::Started);
        let result = self.run(source, destination);
        match &result {
            Ok(MigrationOutcome::Migrated(summary)) => self.emit(MigrationEvent::Completed {
                instances: summary.instances,
                bindings: summary.bindings,
            }),
            Ok(_) => {}
            Err(e) => self.emit(MigrationEvent::Failed {
                category: e.category(),
                message: e.to_string(),
            }),
        }
        result
    }

    /// Check both guards and read both collections, without writing anything
    pub fn preview<S, D>(&self, source: &S, destination: &D) -> Result<MigrationPreview, MigrationError>
    where
        S: RetirableStore + ?Sized,
        D: ActivatableStore + ?Sized,
    {
        self.emit(MigrationEvent::Previewing);
        let result = self.run_preview(source, destination);
        match &result {
            Ok(MigrationPreview::Pending {
                instances,
                bindings,
            }) => self.emit(MigrationEvent::Previewed {
                instances: *instances,
                bindings: *bindings,
            }),
            Ok(_) => {}
            Err(e) => self.emit(MigrationEvent::Failed {
                category: e.category(),
                message: e.to_string(),
            }),
        }
        result
    }

    fn run_preview<S, D>(&self, source: &S, destination: &D) -> Result<MigrationPreview, MigrationError>
    where
        S: RetirableStore + ?Sized,
        D: ActivatableStore + ?Sized,
    {
        match self.check_guards(source, destination)? {
            Guard::AlreadyActivated => return Ok(MigrationPreview::AlreadyActivated),
            Guard::AlreadyRetired => return Ok(MigrationPreview::AlreadyRetired),
            Guard::Proceed => {}
        }

        let instances = source
            .retrieve_all_instance_details()
            .map_err(|error| MigrationError::ReadFailed {
                kind: RecordKind::Instance,
                error,
            })?;
        self.emit(MigrationEvent::RecordsRead {
            kind: RecordKind::Instance,
            count: instances.len(),
        });
        let bindings = source
            .retrieve_all_binding_details()
            .map_err(|error| MigrationError::ReadFailed {
                kind: RecordKind::Binding,
                error,
            })?;
        self.emit(MigrationEvent::RecordsRead {
            kind: RecordKind::Binding,
            count: bindings.len(),
        });

        Ok(MigrationPreview::Pending {
            instances: instances.len(),
            bindings: bindings.len(),
        })
    }

    fn run<S, D>(&self, source: &S, destination: &D) -> Result<MigrationOutcome, MigrationError>
    where
        S: RetirableStore + ?Sized,
        D: ActivatableStore + ?Sized,
    {
        match self.check_guards(source, destination)? {
            Guard::AlreadyActivated => return Ok(MigrationOutcome::AlreadyActivated),
            Guard::AlreadyRetired => return Ok(MigrationOutcome::AlreadyRetired),
            Guard::Proceed => {}
        }

        let instances = source
            .retrieve_all_instance_details()
            .map_err(|error| MigrationError::ReadFailed {
                kind: RecordKind::Instance,
                error,
            })?;
        self.emit(MigrationEvent::RecordsRead {
            kind: RecordKind::Instance,
            count: instances.len(),
        });
        for (id, details) in &instances {
            destination
                .create_instance_details(id, details)
                .map_err(|error| MigrationError::WriteFailed {
                    kind: RecordKind::Instance,
                    id: id.clone(),
                    error,
                })?;
            self.emit(MigrationEvent::RecordWritten {
                kind: RecordKind::Instance,
                id: id.clone(),
            });
        }

        let bindings = source
            .retrieve_all_binding_details()
            .map_err(|error| MigrationError::ReadFailed {
                kind: RecordKind::Binding,
                error,
            })?;
        self.emit(MigrationEvent::RecordsRead {
            kind: RecordKind::Binding,
            count: bindings.len(),
        });
        for (id, details) in &bindings {
            destination
                .create_binding_details(id, details)
                .map_err(|error| MigrationError::WriteFailed {
                    kind: RecordKind::Binding,
                    id: id.clone(),
                    error,
                })?;
            self.emit(MigrationEvent::RecordWritten {
                kind: RecordKind::Binding,
                id: id.clone(),
            });
        }

        // Retire only once the destination holds everything and is active.
        destination
            .activate()
            .map_err(MigrationError::ActivationFailed)?;
        self.emit(MigrationEvent::DestinationActivated);

        source.retire().map_err(MigrationError::RetirementFailed)?;
        self.emit(MigrationEvent::SourceRetired);

        Ok(MigrationOutcome::Migrated(MigrationSummary {
            instances: instances.len(),
            bindings: bindings.len(),
        }))
    }

    fn check_guards<S, D>(&self, source: &S, destination: &D) -> Result<Guard, MigrationError>
    where
        S: RetirableStore + ?Sized,
        D: ActivatableStore + ?Sized,
    {
        let activated = destination
            .is_activated()
            .map_err(MigrationError::DestinationUnavailable)?;
        if activated {
            self.emit(MigrationEvent::AlreadyActivated);
            return Ok(Guard::AlreadyActivated);
        }

        let retired = source
            .is_retired()
            .map_err(MigrationError::SourceUnavailable)?;
        if retired {
            self.emit(MigrationEvent::AlreadyRetired);
            return Ok(Guard::AlreadyRetired);
        }

        Ok(Guard::Proceed)
    }

    fn emit(&self, event: MigrationEvent) {
        self.observer.on_event(&event);
    }
}
