//! Records stored in the identity catalog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use spider_core::{Iid, TypeKey};

/// One tracked resource: a `{NameId, SystemId}` pair bound to a connection
/// and a catalog.
///
/// The `NameId` stored here is the namespaced (and, for security groups,
/// composite) name. Callers never see it directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IidRecord {
    /// Connection the resource lives in.
    pub connection: String,
    /// Catalog the record belongs to.
    pub kind: TypeKey,
    /// Stored name and provider id.
    pub iid: Iid,
    /// Name the driver was given at create time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_name: Option<String>,
    /// When the record was inserted.
    pub created_at: DateTime<Utc>,
}

impl IidRecord {
    /// Create a record stamped with the current time.
    #[must_use]
    pub fn new(connection: impl Into<String>, kind: TypeKey, iid: Iid) -> Self {
        Self {
            connection: connection.into(),
            kind,
            iid,
            driver_name: None,
            created_at: Utc::now(),
        }
    }

    /// Attach the driver-facing name.
    #[must_use]
    pub fn with_driver_name(mut self, driver_name: impl Into<String>) -> Self {
        self.driver_name = Some(driver_name.into());
        self
    }

    /// The identity to hand to the driver for this resource.
    ///
    /// Registered resources have no driver name, so the provider id is used
    /// on both sides.
    #[must_use]
    pub fn driver_iid(&self) -> Iid {
        let name = self
            .driver_name
            .clone()
            .unwrap_or_else(|| self.iid.system_id.clone());
        Iid::new(name, self.iid.system_id.clone())
    }
}
