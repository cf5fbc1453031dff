//! Service call type for invoking Home Assistant services

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::EntityId;

/// Represents a call to a Home Assistant service
///
/// This is the single RPC the bridge issues per remote command. It is posted
/// to `/api/services/{domain}/{service}` with `service_data` as JSON body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceCall {
    /// The domain the service belongs to (e.g., "light", "switch")
    pub domain: String,

    /// The service name (e.g., "turn_on", "turn_off")
    pub service: String,

    /// Data passed to the service (e.g., entity_id, brightness)
    pub service_data: Value,
}

impl ServiceCall {
    /// Create a new service call
    pub fn new(domain: impl Into<String>, service: impl Into<String>, service_data: Value) -> Self {
        Self {
            domain: domain.into(),
            service: service.into(),
            service_data,
        }
    }

    /// Create a service call targeting a single entity
    ///
    /// The body is `{"entity_id": "<id>"}`; further fields can be added with
    /// [`ServiceCall::with_data`].
    pub fn for_entity(entity_id: &EntityId, service: impl Into<String>) -> Self {
        let mut data = Map::new();
        data.insert("entity_id".to_string(), Value::String(entity_id.to_string()));
        Self::new(entity_id.domain(), service, Value::Object(data))
    }

    /// Add a field to the service data
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        if let Value::Object(map) = &mut self.service_data {
            map.insert(key.into(), value.into());
        }
        self
    }

    /// Get the full service identifier (domain.service)
    pub fn service_id(&self) -> String {
        format!("{}.{}", self.domain, self.service)
    }
}
