//! Control plane service implementation.
//!
//! `ControlPlaneService` is the caller-facing entry point. It owns the lock
//! registry and the connection registry, and binds each call to a [`Scope`]
//! before handing it to the reconciliation or lifecycle engine.
//!
//! Generic operations are parameterized by a resource kind:
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use spider_control::{CallContext, ControlPlaneService, MockConnection};
//! # use spider_control::kinds::KeyPairKind;
//! # use spider_control::driver::model::KeyPairReqInfo;
//! # use spider_core::Iid;
//! # use spider_store::RocksStore;
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let service = ControlPlaneService::with_defaults(Arc::new(RocksStore::open("/tmp/spider")?));
//! service.register_connection("aws", Arc::new(MockConnection::new("aws")));
//!
//! let ctx = CallContext::new("aws");
//! service.create::<KeyPairKind>(&ctx, KeyPairReqInfo { iid: Iid::named("key-01") })?;
//! let keys = service.list::<KeyPairKind>(&ctx)?;
//! assert_eq!(keys[0].iid.name_id, "key-01");
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use spider_core::{Iid, ResourceType};
use spider_store::Store;

use crate::connection::ConnectionRegistry;
use crate::driver::model::{
    DiskInfo, NlbInfo, NodeGroupInfo, SecurityInfo, SecurityRule, SubnetInfo, VmAction,
    VmStatus, VmStatusInfo, VpcInfo,
};
use crate::driver::CloudConnection;
use crate::error::Result;
use crate::kinds::ResourceKind;
use crate::lifecycle;
use crate::locks::{LockRegistry, LockStatus};
use crate::operations;
use crate::reconcile;
use crate::scope::Scope;
use crate::types::{AllResourceList, CallContext, ControlConfig};

/// The main control plane service implementation.
pub struct ControlPlaneService<S: Store> {
    store: Arc<S>,
    locks: LockRegistry,
    connections: ConnectionRegistry,
    config: ControlConfig,
}

impl<S: Store> ControlPlaneService<S> {
    /// Create a new control plane service.
    #[must_use]
    pub fn new(store: Arc<S>, config: ControlConfig) -> Self {
        Self {
            store,
            locks: LockRegistry::new(),
            connections: ConnectionRegistry::new(),
            config,
        }
    }

    /// Create with default configuration.
    #[must_use]
    pub fn with_defaults(store: Arc<S>) -> Self {
        Self::new(store, ControlConfig::default())
    }

    /// Get a reference to the store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &ControlConfig {
        &self.config
    }

    /// Bind a driver to a connection name.
    pub fn register_connection(&self, name: impl Into<String>, connection: Arc<dyn CloudConnection>) {
        self.connections.insert(name, connection);
    }

    /// Registered connection names, sorted.
    #[must_use]
    pub fn connection_names(&self) -> Vec<String> {
        self.connections.names()
    }

    /// Current state of every type lock.
    #[must_use]
    pub fn lock_snapshot(&self) -> Vec<LockStatus> {
        self.locks.snapshot()
    }

    fn with_scope<T>(
        &self,
        ctx: &CallContext,
        op: impl FnOnce(&Scope<'_, S>) -> Result<T>,
    ) -> Result<T> {
        let driver = self.connections.get(&ctx.connection)?;
        let scope = Scope::new(
            self.store.as_ref(),
            &self.locks,
            driver.as_ref(),
            &ctx.connection,
            ctx.codec(),
            &self.config,
        );
        op(&scope)
    }

    // =========================================================================
    // Generic resource operations
    // =========================================================================

    /// Create a resource and track it under the request's name.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::AlreadyExists` if the name is taken.
    pub fn create<K: ResourceKind>(&self, ctx: &CallContext, req: K::Request) -> Result<K::Info> {
        self.with_scope(ctx, |scope| lifecycle::create::<K, S>(scope, req))
    }

    /// List tracked resources with live provider state.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::ConsistencyMismatch` if a tracked resource is
    /// missing at the provider.
    pub fn list<K: ResourceKind>(&self, ctx: &CallContext) -> Result<Vec<K::Info>> {
        self.with_scope(ctx, reconcile::list::<K, S>)
    }

    /// Get one tracked resource. `parent` names the VPC of a security group.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NotFound` if the name is not tracked.
    pub fn get<K: ResourceKind>(
        &self,
        ctx: &CallContext,
        parent: Option<&str>,
        name: &str,
    ) -> Result<K::Info> {
        self.with_scope(ctx, |scope| reconcile::get::<K, S>(scope, parent, name))
    }

    /// Delete a tracked resource.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NotFound` if the name is not tracked.
    pub fn delete<K: ResourceKind>(
        &self,
        ctx: &CallContext,
        parent: Option<&str>,
        name: &str,
        force: bool,
    ) -> Result<bool> {
        self.with_scope(ctx, |scope| {
            lifecycle::delete::<K, S>(scope, parent, name, force)
        })
    }

    /// Track an existing provider resource.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::AlreadyExists` if the name is taken.
    pub fn register<K: ResourceKind>(
        &self,
        ctx: &CallContext,
        parent: Option<&str>,
        iid: Iid,
    ) -> Result<Iid> {
        self.with_scope(ctx, |scope| lifecycle::register::<K, S>(scope, parent, iid))
    }

    /// Stop tracking a resource without touching the provider.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NotFound` if the name is not tracked.
    pub fn unregister<K: ResourceKind>(
        &self,
        ctx: &CallContext,
        parent: Option<&str>,
        name: &str,
    ) -> Result<bool> {
        self.with_scope(ctx, |scope| lifecycle::unregister::<K, S>(scope, parent, name))
    }

    /// Compare tracked and live resources without failing on divergence.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Provider` if the provider listing fails.
    pub fn list_all<K: ResourceKind>(&self, ctx: &CallContext) -> Result<AllResourceList> {
        self.with_scope(ctx, reconcile::list_all::<K, S>)
    }

    /// Delete an untracked provider resource by provider id.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Validation` if the id is tracked.
    pub fn delete_provider_resource<K: ResourceKind>(
        &self,
        ctx: &CallContext,
        system_id: &str,
    ) -> Result<bool> {
        self.with_scope(ctx, |scope| {
            lifecycle::delete_provider_resource::<K, S>(scope, system_id)
        })
    }

    /// Count tracked resources of a type, in one connection or all.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn count(&self, resource_type: ResourceType, connection: Option<&str>) -> Result<u64> {
        Ok(self.store.count(resource_type, connection)?)
    }

    // =========================================================================
    // Subnets
    // =========================================================================

    /// Add a subnet to a VPC.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NotFound` if the VPC is not tracked.
    pub fn add_subnet(&self, ctx: &CallContext, vpc: &str, subnet: SubnetInfo) -> Result<VpcInfo> {
        self.with_scope(ctx, |scope| operations::add_subnet(scope, vpc, subnet))
    }

    /// Remove a subnet from a VPC.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NotFound` if the VPC or subnet is not tracked.
    pub fn remove_subnet(&self, ctx: &CallContext, vpc: &str, subnet: &str) -> Result<bool> {
        self.with_scope(ctx, |scope| operations::remove_subnet(scope, vpc, subnet))
    }

    /// Track an existing subnet under a VPC.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::AlreadyExists` if the subnet name is taken.
    pub fn register_subnet(&self, ctx: &CallContext, vpc: &str, iid: Iid) -> Result<Iid> {
        self.with_scope(ctx, |scope| {
            lifecycle::register_child(scope, ResourceType::Subnet, vpc, iid)
        })
    }

    /// Stop tracking a subnet.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NotFound` if the subnet is not tracked.
    pub fn unregister_subnet(&self, ctx: &CallContext, vpc: &str, subnet: &str) -> Result<bool> {
        self.with_scope(ctx, |scope| {
            lifecycle::unregister_child(scope, ResourceType::Subnet, vpc, subnet)
        })
    }

    // =========================================================================
    // Node groups
    // =========================================================================

    /// Add a node group to a cluster.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NotFound` if the cluster is not tracked.
    pub fn add_node_group(
        &self,
        ctx: &CallContext,
        cluster: &str,
        node_group: NodeGroupInfo,
    ) -> Result<NodeGroupInfo> {
        self.with_scope(ctx, |scope| {
            operations::add_node_group(scope, cluster, node_group)
        })
    }

    /// Remove a node group from a cluster.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NotFound` if the node group is not tracked.
    pub fn remove_node_group(&self, ctx: &CallContext, cluster: &str, node_group: &str) -> Result<bool> {
        self.with_scope(ctx, |scope| {
            operations::remove_node_group(scope, cluster, node_group)
        })
    }

    /// Change the size limits of a node group.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Provider` if the provider rejects the limits.
    pub fn change_node_group_scaling(
        &self,
        ctx: &CallContext,
        cluster: &str,
        node_group: &str,
        desired: u32,
        min: u32,
        max: u32,
    ) -> Result<NodeGroupInfo> {
        self.with_scope(ctx, |scope| {
            operations::change_node_group_scaling(scope, cluster, node_group, desired, min, max)
        })
    }

    // =========================================================================
    // VMs
    // =========================================================================

    /// Suspend, resume or reboot a VM.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NotFound` if the VM is not tracked.
    pub fn control_vm(&self, ctx: &CallContext, name: &str, action: VmAction) -> Result<VmStatus> {
        self.with_scope(ctx, |scope| operations::control_vm(scope, name, action))
    }

    /// Power state of every tracked VM.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::ConsistencyMismatch` if a tracked VM is missing.
    pub fn list_vm_status(&self, ctx: &CallContext) -> Result<Vec<VmStatusInfo>> {
        self.with_scope(ctx, reconcile::list_vm_status)
    }

    /// Power state of one VM.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NotFound` if the VM is not tracked.
    pub fn get_vm_status(&self, ctx: &CallContext, name: &str) -> Result<VmStatus> {
        self.with_scope(ctx, |scope| reconcile::get_vm_status(scope, name))
    }

    // =========================================================================
    // Security group rules
    // =========================================================================

    /// Add rules to a security group.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NotFound` if the group is not tracked.
    pub fn add_rules(
        &self,
        ctx: &CallContext,
        vpc: Option<&str>,
        name: &str,
        rules: Vec<SecurityRule>,
    ) -> Result<SecurityInfo> {
        self.with_scope(ctx, |scope| operations::add_rules(scope, vpc, name, rules))
    }

    /// Remove rules from a security group.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NotFound` if the group is not tracked.
    pub fn remove_rules(
        &self,
        ctx: &CallContext,
        vpc: Option<&str>,
        name: &str,
        rules: Vec<SecurityRule>,
    ) -> Result<bool> {
        self.with_scope(ctx, |scope| operations::remove_rules(scope, vpc, name, rules))
    }

    // =========================================================================
    // Disks and load balancers
    // =========================================================================

    /// Attach a disk to a VM.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NotFound` if the disk or VM is not tracked.
    pub fn attach_disk(&self, ctx: &CallContext, disk: &str, vm: &str) -> Result<DiskInfo> {
        self.with_scope(ctx, |scope| operations::attach_disk(scope, disk, vm))
    }

    /// Detach a disk from a VM.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NotFound` if the disk or VM is not tracked.
    pub fn detach_disk(&self, ctx: &CallContext, disk: &str, vm: &str) -> Result<bool> {
        self.with_scope(ctx, |scope| operations::detach_disk(scope, disk, vm))
    }

    /// Add VMs to a load balancer.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NotFound` if the load balancer or a VM is not
    /// tracked.
    pub fn add_vms(&self, ctx: &CallContext, nlb: &str, vms: &[String]) -> Result<NlbInfo> {
        self.with_scope(ctx, |scope| operations::add_vms(scope, nlb, vms))
    }

    /// Remove VMs from a load balancer.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NotFound` if the load balancer or a VM is not
    /// tracked.
    pub fn remove_vms(&self, ctx: &CallContext, nlb: &str, vms: &[String]) -> Result<bool> {
        self.with_scope(ctx, |scope| operations::remove_vms(scope, nlb, vms))
    }
}
