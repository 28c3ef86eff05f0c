//! Per-call context and name/provider-id resolution.
//!
//! A [`Scope`] binds one caller (connection plus optional namespace) to the
//! store, the lock registry and the connection's driver. It owns the single
//! name resolution routine used by every resource type:
//!
//! ```text
//!   caller name  --resolve-->  {driver name, SystemId}   (requests)
//!   SystemId     --overlay-->  caller name               (responses)
//! ```
//!
//! Resolution failures on requests are `NotFound`; overlay failures on
//! provider responses are `ConsistencyMismatch`, since the provider refers to
//! something the catalog does not track.

use spider_core::{generate_driver_name, naming, Iid, NameCodec, ResourceType, TypeKey};
use spider_store::{IidRecord, Store};

use crate::driver::{CloudConnection, DriverResult};
use crate::error::{ControlError, Result};
use crate::locks::LockRegistry;
use crate::types::ControlConfig;

/// Everything one operation needs, borrowed from the service.
pub struct Scope<'a, S: Store> {
    pub(crate) store: &'a S,
    pub(crate) locks: &'a LockRegistry,
    pub(crate) driver: &'a dyn CloudConnection,
    pub(crate) connection: &'a str,
    pub(crate) codec: NameCodec,
    pub(crate) config: &'a ControlConfig,
}

impl<'a, S: Store> Scope<'a, S> {
    /// Bind a caller to its connection.
    #[must_use]
    pub fn new(
        store: &'a S,
        locks: &'a LockRegistry,
        driver: &'a dyn CloudConnection,
        connection: &'a str,
        codec: NameCodec,
        config: &'a ControlConfig,
    ) -> Self {
        Self {
            store,
            locks,
            driver,
            connection,
            codec,
            config,
        }
    }

    /// Connection name.
    #[must_use]
    pub const fn connection(&self) -> &str {
        self.connection
    }

    /// Name codec of the caller.
    #[must_use]
    pub const fn codec(&self) -> &NameCodec {
        &self.codec
    }

    // =========================================================================
    // Driver dispatch
    // =========================================================================

    /// Fail unless the driver can manage `resource_type`.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Unsupported`.
    pub fn require(&self, resource_type: ResourceType) -> Result<()> {
        if self.driver.supports(resource_type) {
            Ok(())
        } else {
            Err(self.unsupported(resource_type))
        }
    }

    /// Unwrap a driver call made through an optional handler.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Unsupported` when the handler was absent and
    /// `ControlError::Provider` when the call failed.
    pub fn dispatch<T>(
        &self,
        resource_type: ResourceType,
        call: Option<DriverResult<T>>,
    ) -> Result<T> {
        match call {
            Some(result) => result.map_err(ControlError::from),
            None => Err(self.unsupported(resource_type)),
        }
    }

    fn unsupported(&self, resource_type: ResourceType) -> ControlError {
        ControlError::Unsupported {
            connection: self.connection.to_string(),
            resource_type,
        }
    }

    /// Name the driver receives for a new resource.
    #[must_use]
    pub fn driver_name(&self, resource_type: ResourceType, name: &str) -> String {
        if self.config.id_transform {
            generate_driver_name(self.connection, resource_type, name)
        } else {
            name.to_string()
        }
    }

    // =========================================================================
    // Catalog access
    // =========================================================================

    /// Fetch a record by stored name, reporting misses under the caller name.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NotFound` if the name is not tracked.
    pub fn record(&self, kind: &TypeKey, stored: &str, name: &str) -> Result<IidRecord> {
        self.store
            .get_by_name(self.connection, kind, stored)
            .map_err(|e| ControlError::from_store(e, kind.resource_type(), name))
    }

    /// Records of a catalog visible to this caller.
    ///
    /// Child catalogs are already scoped by their parent's stored name.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn visible_records(&self, kind: &TypeKey) -> Result<Vec<IidRecord>> {
        let mut records = self.store.list(self.connection, kind)?;
        if matches!(kind, TypeKey::Top(_)) {
            records.retain(|r| self.codec.owns(&r.iid.name_id));
        }
        Ok(records)
    }

    /// Child catalog key under a parent known by caller name.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Validation` for a type without a parent.
    pub fn child_kind(&self, child_type: ResourceType, parent_name: &str) -> Result<TypeKey> {
        Ok(TypeKey::child(child_type, &self.codec.to_stored(parent_name))?)
    }

    /// Caller-facing name for a stored top-level name.
    #[must_use]
    pub fn display_name(&self, resource_type: ResourceType, stored: &str) -> Option<String> {
        let name = self.codec.to_user(stored)?;
        if resource_type == ResourceType::SecurityGroup {
            if let Some((_, child)) = naming::decompose(&name) {
                return Some(child.to_string());
            }
        }
        Some(name)
    }

    // =========================================================================
    // Name -> provider id
    // =========================================================================

    fn require_name(resource_type: ResourceType, iid: &Iid) -> Result<()> {
        if iid.name_id.is_empty() {
            return Err(ControlError::Validation(format!(
                "{resource_type} reference needs a name"
            )));
        }
        Ok(())
    }

    /// Replace a caller-named reference with the driver-facing identity.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NotFound` if the name is not tracked.
    pub fn resolve(&self, resource_type: ResourceType, iid: &mut Iid) -> Result<()> {
        Self::require_name(resource_type, iid)?;
        let stored = self.codec.to_stored(&iid.name_id);
        let record = self.record(&TypeKey::Top(resource_type), &stored, &iid.name_id)?;
        *iid = record.driver_iid();
        Ok(())
    }

    /// Resolve every reference in a list.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NotFound` on the first untracked name.
    pub fn resolve_all(&self, resource_type: ResourceType, iids: &mut [Iid]) -> Result<()> {
        iids.iter_mut()
            .try_for_each(|iid| self.resolve(resource_type, iid))
    }

    /// Resolve a child reference under a parent known by caller name.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NotFound` if the child is not tracked.
    pub fn resolve_child(
        &self,
        child_type: ResourceType,
        parent_name: &str,
        iid: &mut Iid,
    ) -> Result<()> {
        Self::require_name(child_type, iid)?;
        let kind = self.child_kind(child_type, parent_name)?;
        let record = self.record(&kind, &iid.name_id, &iid.name_id)?;
        *iid = record.driver_iid();
        Ok(())
    }

    /// Resolve a security group reference inside a VPC.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NotFound` if the group is not tracked.
    pub fn resolve_security_group(&self, vpc_name: &str, iid: &mut Iid) -> Result<()> {
        Self::require_name(ResourceType::SecurityGroup, iid)?;
        let stored = self
            .codec
            .to_stored(&naming::compose(vpc_name, &iid.name_id));
        let record = self.record(
            &TypeKey::Top(ResourceType::SecurityGroup),
            &stored,
            &iid.name_id,
        )?;
        *iid = record.driver_iid();
        Ok(())
    }

    // =========================================================================
    // Provider id -> name
    // =========================================================================

    fn overlay_from(&self, kind: &TypeKey, iid: &Iid) -> Result<IidRecord> {
        let resource_type = kind.resource_type();
        self.store
            .get_by_system_id(self.connection, kind, &iid.system_id)
            .map_err(|e| match e {
                spider_store::StoreError::NotFound => ControlError::mismatch(
                    resource_type,
                    format!(
                        "provider references '{}', which is not tracked in {kind}",
                        iid.system_id
                    ),
                ),
                other => ControlError::Store(other),
            })
    }

    /// Fill the caller name of a top-level reference from its provider id.
    ///
    /// Empty provider ids denote an absent optional reference and are left
    /// alone.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::ConsistencyMismatch` if the provider id is not
    /// tracked or belongs to another namespace.
    pub fn overlay(&self, resource_type: ResourceType, iid: &mut Iid) -> Result<()> {
        if iid.system_id.is_empty() {
            return Ok(());
        }
        let record = self.overlay_from(&TypeKey::Top(resource_type), iid)?;
        iid.name_id = self
            .display_name(resource_type, &record.iid.name_id)
            .ok_or_else(|| {
                ControlError::mismatch(
                    resource_type,
                    format!("'{}' belongs to another namespace", iid.system_id),
                )
            })?;
        Ok(())
    }

    /// Overlay every reference in a list.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::ConsistencyMismatch` on the first untracked id.
    pub fn overlay_all(&self, resource_type: ResourceType, iids: &mut [Iid]) -> Result<()> {
        iids.iter_mut()
            .try_for_each(|iid| self.overlay(resource_type, iid))
    }

    /// Fill the caller name of a child reference under a parent known by
    /// caller name.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::ConsistencyMismatch` if the child is not tracked.
    pub fn overlay_child(
        &self,
        child_type: ResourceType,
        parent_name: &str,
        iid: &mut Iid,
    ) -> Result<()> {
        if iid.system_id.is_empty() {
            return Ok(());
        }
        let kind = self.child_kind(child_type, parent_name)?;
        let record = self.overlay_from(&kind, iid)?;
        iid.name_id = record.iid.name_id;
        Ok(())
    }
}
