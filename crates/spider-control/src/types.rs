//! Request and response types for control plane operations.

use serde::{Deserialize, Serialize};
use spider_core::{Iid, NameCodec, Namespace};

use crate::error::Result;

/// Configuration for the control plane service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Hand drivers a generated unique name instead of the caller's name.
    #[serde(default = "ControlConfig::default_id_transform")]
    pub id_transform: bool,
    /// Serialise VM create behind the VM type lock.
    ///
    /// Off by default: VM create has historically run without the type lock
    /// so that slow VM provisioning does not block other VM operations. The
    /// store still rejects a duplicate name, and the create is then rolled
    /// back at the provider.
    #[serde(default)]
    pub lock_vm_create: bool,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            id_transform: Self::default_id_transform(),
            lock_vm_create: false,
        }
    }
}

impl ControlConfig {
    const fn default_id_transform() -> bool {
        true
    }
}

/// Who is calling and against which connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    /// Connection name.
    pub connection: String,
    /// Tenant namespace, if any.
    pub namespace: Option<Namespace>,
}

impl CallContext {
    /// A call without a namespace.
    #[must_use]
    pub fn new(connection: impl Into<String>) -> Self {
        Self {
            connection: connection.into(),
            namespace: None,
        }
    }

    /// A call scoped to a tenant namespace.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Validation` if the namespace is invalid.
    pub fn with_namespace(connection: impl Into<String>, namespace: &str) -> Result<Self> {
        Ok(Self {
            connection: connection.into(),
            namespace: Some(Namespace::new(namespace)?),
        })
    }

    /// The name codec for this caller.
    #[must_use]
    pub fn codec(&self) -> NameCodec {
        NameCodec::new(self.namespace.clone())
    }
}

/// Tracked and live resources of one type, side by side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllResourceList {
    /// Tracked and present at the provider.
    pub mapped: Vec<Iid>,
    /// Tracked but missing at the provider.
    pub only_tracked: Vec<Iid>,
    /// Present at the provider but not tracked (provider ids).
    pub only_provider: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = ControlConfig::default();
        assert!(config.id_transform);
        assert!(!config.lock_vm_create);
    }

    #[test]
    fn config_fields_default_when_absent() {
        let config: ControlConfig = serde_json::from_str("{}").unwrap();
        assert!(config.id_transform);
        assert!(!config.lock_vm_create);

        let config: ControlConfig =
            serde_json::from_str(r#"{"id_transform": false, "lock_vm_create": true}"#).unwrap();
        assert!(!config.id_transform);
        assert!(config.lock_vm_create);
    }

    #[test]
    fn invalid_namespace_rejected() {
        assert!(CallContext::with_namespace("aws", "tenant1").is_ok());
        assert!(CallContext::with_namespace("aws", "ten-ant").is_err());
        assert!(CallContext::new("aws").codec().namespace().is_none());
    }
}
