//! Status payload and service resource types

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ProxyError;

/// Resource type of a monitored service inside `included`
pub const SERVICE_RESOURCE_TYPE: &str = "status_page_resource";

/// The `{data, included}` document served by the status provider
///
/// `data` is passed through untouched. `included` is kept as raw JSON because
/// the provider mixes several resource types in it; only service resources
/// are decoded, on demand, by [`StatusPayload::find_service`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusPayload {
    pub data: Map<String, Value>,
    pub included: Vec<Value>,
}

impl StatusPayload {
    /// Match a JSON value against the payload shape: an object-valued `data`
    /// field and an array-valued `included` field
    pub fn from_shape(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let data = object.get("data")?.as_object()?;
        let included = object.get("included")?.as_array()?;
        Some(Self {
            data: data.clone(),
            included: included.clone(),
        })
    }

    /// Locate a service resource by its public name
    pub fn find_service(&self, public_name: &str) -> crate::Result<ServiceResource> {
        let raw = self
            .included
            .iter()
            .find(|item| {
                item.get("type").and_then(Value::as_str) == Some(SERVICE_RESOURCE_TYPE)
                    && item
                        .get("attributes")
                        .and_then(|a| a.get("public_name"))
                        .and_then(Value::as_str)
                        == Some(public_name)
            })
            .ok_or_else(|| ProxyError::ServiceNotFound(public_name.to_string()))?;

        Ok(ServiceResource::deserialize(raw)?)
    }
}

/// Status of a monitored service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    Operational,
    Degraded,
    Downtime,
    Maintenance,
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceStatus::Operational => write!(f, "operational"),
            ServiceStatus::Degraded => write!(f, "degraded"),
            ServiceStatus::Downtime => write!(f, "downtime"),
            ServiceStatus::Maintenance => write!(f, "maintenance"),
        }
    }
}

/// A daily entry in a service's status history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub day: String,
    pub status: ServiceStatus,
    pub downtime_duration: u64,
    pub maintenance_duration: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceAttributes {
    pub public_name: String,
    pub status: ServiceStatus,
    pub availability: f64,
    #[serde(default)]
    pub status_history: Vec<HistoryEntry>,
}

/// A monitored service as listed in `included`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceResource {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub attributes: ServiceAttributes,
}
