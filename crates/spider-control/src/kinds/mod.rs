//! Resource kinds: the per-type knowledge the generic engine needs.
//!
//! Each managed resource type is a zero-sized marker implementing
//! [`ResourceKind`]. The marker says how to reach the type's driver handler,
//! where the identity pairs live in its payloads, which references to
//! resolve on requests and overlay on responses, and whether the type owns a
//! child catalog.
//!
//! The reconciliation and lifecycle engines are written once against this
//! trait.

mod compute;
mod network;
mod platform;

use std::fmt;

use spider_core::{Iid, NameCodec, ResourceType, TypeKey};
use spider_store::{IidRecord, Store};

use crate::driver::model::HasIid;
use crate::driver::{CloudConnection, DriverResult};
use crate::error::Result;
use crate::scope::Scope;

pub use compute::{DiskKind, ImageKind, KeyPairKind, MyImageKind, VmKind};
pub use network::{SecurityGroupKind, VpcKind};
pub use platform::{ClusterKind, FileSystemKind, NlbKind};

/// Mutable access to the identities of a nested child collection.
pub trait ChildList {
    /// Identities of every child.
    fn iids_mut(&mut self) -> Vec<&mut Iid>;
    /// Drop children whose identity fails `keep`.
    fn retain_iids(&mut self, keep: &mut dyn FnMut(&Iid) -> bool);
}

impl<T: HasIid> ChildList for Vec<T> {
    fn iids_mut(&mut self) -> Vec<&mut Iid> {
        self.iter_mut().map(HasIid::iid_mut).collect()
    }

    fn retain_iids(&mut self, keep: &mut dyn FnMut(&Iid) -> bool) {
        self.retain(|child| keep(child.iid()));
    }
}

/// Per-type behavior plugged into the generic engines.
///
/// Driver calls return `None` when the connection has no handler for the
/// type.
pub trait ResourceKind {
    /// The resource type.
    const TYPE: ResourceType;

    /// Child type tracked in a catalog under each instance, if any.
    const CHILD: Option<ResourceType> = None;

    /// Whether delete snapshots the resource so it can be recreated if the
    /// record cannot be removed.
    const RECREATABLE: bool = false;

    /// Create request payload.
    type Request: Clone + fmt::Debug;

    /// Resource payload.
    type Info: Clone + fmt::Debug;

    /// Identity of a request.
    fn request_iid_mut(req: &mut Self::Request) -> &mut Iid;

    /// Identity of a payload.
    fn info_iid_mut(info: &mut Self::Info) -> &mut Iid;

    /// Identity of a payload.
    fn info_iid(info: &Self::Info) -> &Iid;

    // =========================================================================
    // Driver calls
    // =========================================================================

    /// Create at the provider.
    fn create(conn: &dyn CloudConnection, req: Self::Request) -> Option<DriverResult<Self::Info>>;

    /// List at the provider, in provider order.
    fn list(conn: &dyn CloudConnection) -> Option<DriverResult<Vec<Self::Info>>>;

    /// Get one resource from the provider.
    fn get(conn: &dyn CloudConnection, iid: &Iid) -> Option<DriverResult<Self::Info>>;

    /// Delete at the provider; `Ok(false)` when the provider declined.
    fn delete(conn: &dyn CloudConnection, iid: &Iid) -> Option<DriverResult<bool>>;

    // =========================================================================
    // Naming
    // =========================================================================

    /// Stored name for a caller name, within an optional parent scope.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Validation` if the type needs a scope that was
    /// not given.
    fn stored_name(codec: &NameCodec, _scope: Option<&str>, name: &str) -> Result<String> {
        Ok(codec.to_stored(name))
    }

    /// Parent scope named by a create request.
    fn request_scope(_req: &Self::Request) -> Option<String> {
        None
    }

    /// Find the record for a caller name.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NotFound` if the name is not tracked.
    fn lookup<S: Store>(scope: &Scope<'_, S>, parent: Option<&str>, name: &str) -> Result<IidRecord> {
        let stored = Self::stored_name(scope.codec(), parent, name)?;
        scope.record(&TypeKey::Top(Self::TYPE), &stored, name)
    }

    // =========================================================================
    // Hooks
    // =========================================================================

    /// Checks that depend on catalog state, run under the type lock.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Validation` if the create is not allowed.
    fn before_create<S: Store>(_scope: &Scope<'_, S>, _req: &Self::Request) -> Result<()> {
        Ok(())
    }

    /// Replace caller names in request references with provider ids.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NotFound` for an untracked reference.
    fn resolve_request<S: Store>(_req: &mut Self::Request, _scope: &Scope<'_, S>) -> Result<()> {
        Ok(())
    }

    /// Fill caller names into response references.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::ConsistencyMismatch` for an untracked reference.
    fn overlay_references<S: Store>(_info: &mut Self::Info, _scope: &Scope<'_, S>) -> Result<()> {
        Ok(())
    }

    /// Children carried by a create request.
    fn request_children(_req: &mut Self::Request) -> Option<&mut dyn ChildList> {
        None
    }

    /// Children carried by a payload.
    fn info_children(_info: &mut Self::Info) -> Option<&mut dyn ChildList> {
        None
    }

    /// Rebuild a create request from a snapshot taken before delete.
    fn recreate_request(_snapshot: &Self::Info, _driver_name: &str) -> Option<Self::Request> {
        None
    }

    /// Remove fields that must not leave a list or get.
    fn redact(_info: &mut Self::Info) {}
}
