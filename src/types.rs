//! Broker records relayed by the migration.
//!
//! Both record types serialize to the same JSON shape in every store, so a
//! record read from one store can be written to another without translation.
//! Well-known keys are typed; every other key is kept in `extra` and written
//! back verbatim. A key absent on read stays absent on write; a well-known key
//! holding `null` reads as absent.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Free-form provisioning or binding parameters.
pub type Parameters = Map<String, Value>;

/// Persisted metadata for one provisioned service instance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceInstance {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_guid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space_guid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Parameters>,
    /// Keys this crate does not interpret, e.g. fingerprints or platform context
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Target of a binding when it is not a plain application binding
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BindResource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_guid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Persisted metadata for one binding between an application and an instance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BindingDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_guid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind_resource: Option<BindResource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Parameters>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The two record collections a broker store holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Instance,
    Binding,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Instance => "instance",
            RecordKind::Binding => "binding",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
