//! Broker Store Capabilities
//!
//! A broker store holds two record collections (instances and bindings) plus a
//! lifecycle flag. The record operations and each lifecycle flag are separate
//! traits; a migration source is a record store that can be retired, and a
//! destination is a record store that can be activated.

pub mod memory;
pub mod mysql;
pub mod secret;
pub mod sql;

pub use memory::MemoryStore;
pub use mysql::{MysqlSettings, MysqlStore};
pub use secret::{SecretStore, SecretStoreSettings};
pub use sql::SqlStore;

use crate::error::StoreError;
use crate::types::{BindingDetails, ServiceInstance};
use std::collections::HashMap;

/// Bulk reads over both record collections
pub trait RecordSource {
    fn retrieve_all_instance_details(&self) -> Result<HashMap<String, ServiceInstance>, StoreError>;
    fn retrieve_all_binding_details(&self) -> Result<HashMap<String, BindingDetails>, StoreError>;
}

/// Keyed writes into both record collections
///
/// Implementations must overwrite an existing record with the same id. A
/// migration retried after a partial failure re-issues every write.
pub trait RecordSink {
    fn create_instance_details(&self, id: &str, details: &ServiceInstance) -> Result<(), StoreError>;
    fn create_binding_details(&self, id: &str, details: &BindingDetails) -> Result<(), StoreError>;
}

/// Retired flag carried by a migration source
pub trait Retirement {
    fn is_retired(&self) -> Result<bool, StoreError>;
    fn retire(&self) -> Result<(), StoreError>;
}

/// Activated flag carried by a migration destination
pub trait Activation {
    fn is_activated(&self) -> Result<bool, StoreError>;
    fn activate(&self) -> Result<(), StoreError>;
}

/// Readable and writable broker store
pub trait RecordStore: RecordSource + RecordSink {}

impl<T: RecordSource + RecordSink + ?Sized> RecordStore for T {}

/// Store that can be migrated from
pub trait RetirableStore: RecordStore + Retirement {}

impl<T: RecordStore + Retirement + ?Sized> RetirableStore for T {}

/// Store that can be migrated into
pub trait ActivatableStore: RecordStore + Activation {}

impl<T: RecordStore + Activation + ?Sized> ActivatableStore for T {}
