//! In-memory broker store

use crate::error::StoreError;
use crate::store::{Activation, RecordSink, RecordSource, Retirement};
use crate::types::{BindingDetails, ServiceInstance};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

/// Broker store held entirely in memory. Carries both lifecycle flags, so it
/// can stand in for either side of a migration.
#[derive(Debug, Default)]
pub struct MemoryStore {
    instances: RefCell<HashMap<String, ServiceInstance>>,
    bindings: RefCell<HashMap<String, BindingDetails>>,
    retired: Cell<bool>,
    activated: Cell<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_instances<I>(self, instances: I) -> Self
    where
        I: IntoIterator<Item = (String, ServiceInstance)>,
    {
        self.instances.borrow_mut().extend(instances);
        self
    }

    pub fn with_bindings<I>(self, bindings: I) -> Self
    where
        I: IntoIterator<Item = (String, BindingDetails)>,
    {
        self.bindings.borrow_mut().extend(bindings);
        self
    }

    pub fn retired(self) -> Self {
        self.retired.set(true);
        self
    }

    pub fn activated(self) -> Self {
        self.activated.set(true);
        self
    }

    pub fn instances(&self) -> HashMap<String, ServiceInstance> {
        self.instances.borrow().clone()
    }

    pub fn bindings(&self) -> HashMap<String, BindingDetails> {
        self.bindings.borrow().clone()
    }
}

impl RecordSource for MemoryStore {
    fn retrieve_all_instance_details(&self) -> Result<HashMap<String, ServiceInstance>, StoreError> {
        Ok(self.instances())
    }

    fn retrieve_all_binding_details(&self) -> Result<HashMap<String, BindingDetails>, StoreError> {
        Ok(self.bindings())
    }
}

impl RecordSink for MemoryStore {
    fn create_instance_details(&self, id: &str, details: &ServiceInstance) -> Result<(), StoreError> {
        self.instances
            .borrow_mut()
            .insert(id.to_string(), details.clone());
        Ok(())
    }

    fn create_binding_details(&self, id: &str, details: &BindingDetails) -> Result<(), StoreError> {
        self.bindings
            .borrow_mut()
            .insert(id.to_string(), details.clone());
        Ok(())
    }
}

impl Retirement for MemoryStore {
    fn is_retired(&self) -> Result<bool, StoreError> {
        Ok(self.retired.get())
    }

    fn retire(&self) -> Result<(), StoreError> {
        self.retired.set(true);
        Ok(())
    }
}

impl Activation for MemoryStore {
    fn is_activated(&self) -> Result<bool, StoreError> {
        Ok(self.activated.get())
    }

    fn activate(&self) -> Result<(), StoreError> {
        self.activated.set(true);
        Ok(())
    }
}
