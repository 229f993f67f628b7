//! Cloud service trait and common types for the temp URL action.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while talking to OpenStack APIs.
#[derive(Error, Debug)]
pub enum OpenStackError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Keystone accepted the credentials but returned no token.
    #[error("Keystone response did not include a token")]
    MissingToken,

    /// The service catalog has no usable endpoint for a service type.
    #[error("No {interface} endpoint for service type {service_type}")]
    EndpointNotFound {
        service_type: String,
        interface: String,
    },

    /// Glance reports no default store.
    #[error("no default store set")]
    NoDefaultStore,

    /// Header name or value rejected.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A Glance storage backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlanceStore {
    /// Store identifier (e.g. "swift", "ceph").
    pub id: String,
    /// Whether this is the default store.
    #[serde(default)]
    pub default: bool,
}

/// Identifier of the default store.
///
/// # Errors
/// Returns [`OpenStackError::NoDefaultStore`] when no store is marked default.
pub fn default_store(stores: &[GlanceStore]) -> Result<&str, OpenStackError> {
    stores
        .iter()
        .find(|s| s.default)
        .map(|s| s.id.as_str())
        .ok_or(OpenStackError::NoDefaultStore)
}

/// OpenStack services used by the `set-temp-url-secret` action.
#[async_trait]
pub trait CloudServices: Send + Sync {
    /// Whether the catalog has a public endpoint for `service_type`.
    fn has_service_type(&self, service_type: &str) -> bool;

    /// Whether object storage (Swift or radosgw) is deployed.
    fn has_swift(&self) -> bool {
        self.has_service_type("object-store")
    }

    /// Whether the image service is deployed.
    fn has_glance(&self) -> bool {
        self.has_service_type("image")
    }

    /// Storage backends enabled in Glance.
    async fn glance_stores(&self) -> Result<Vec<GlanceStore>, OpenStackError>;

    /// `X-Account-Meta-*` properties of the object storage account, keyed
    /// without the prefix.
    async fn object_account_properties(&self)
        -> Result<BTreeMap<String, String>, OpenStackError>;

    /// Set an account property; no request is made when it already holds
    /// `value`.
    async fn set_object_account_property(
        &self,
        property: &str,
        value: &str,
    ) -> Result<(), OpenStackError>;

    /// Remove an account property.
    async fn delete_object_account_property(&self, property: &str) -> Result<(), OpenStackError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_store() {
        let mut stores = vec![
            GlanceStore {
                id: "swift".into(),
                default: false,
            },
            GlanceStore {
                id: "local".into(),
                default: false,
            },
            GlanceStore {
                id: "ceph".into(),
                default: true,
            },
        ];
        assert_eq!(default_store(&stores).unwrap(), "ceph");

        stores[2].default = false;
        stores[1].default = true;
        assert_eq!(default_store(&stores).unwrap(), "local");

        stores[1].default = false;
        assert!(matches!(
            default_store(&stores),
            Err(OpenStackError::NoDefaultStore)
        ));
    }
}
