//! Resource-specific operations beyond create, read and delete.
//!
//! Every operation resolves caller names to provider ids before the driver
//! call and overlays caller names on the answer, like the generic engines.
//! Operations that change a child catalog (subnets, node groups) take the
//! parent's lock exclusively; operations that only change provider-side
//! attributes take the owning type's lock shared.

use spider_core::{Iid, ResourceType};
use spider_store::Store;

use crate::driver::model::{
    DiskInfo, NlbInfo, NodeGroupInfo, SecurityInfo, SecurityRule, SubnetInfo, VmAction,
    VmStatus, VpcInfo,
};
use crate::error::{ControlError, Result};
use crate::kinds::{DiskKind, NlbKind, ResourceKind, SecurityGroupKind, VmKind, VpcKind};
use crate::lifecycle;
use crate::reconcile;
use crate::scope::Scope;

// =============================================================================
// Subnets
// =============================================================================

/// Add a subnet to a tracked VPC.
///
/// # Errors
///
/// Returns `ControlError::NotFound` if the VPC is not tracked and
/// `ControlError::AlreadyExists` if the subnet name is taken in the VPC.
pub fn add_subnet<S: Store>(
    scope: &Scope<'_, S>,
    vpc_name: &str,
    subnet: SubnetInfo,
) -> Result<VpcInfo> {
    scope.require(ResourceType::Subnet)?;
    let _guard = scope.locks.write(ResourceType::Subnet);
    let (vpc, kind) = lifecycle::parent_record(scope, ResourceType::Subnet, vpc_name)?;
    let vpc_iid = vpc.driver_iid();
    let name = subnet.iid.name_id.clone();

    let mut info = lifecycle::attach_child(
        scope,
        ResourceType::Subnet,
        &kind,
        &name,
        |driver_name| {
            let req = SubnetInfo {
                iid: Iid::named(driver_name.clone()),
                ..subnet
            };
            let info = scope.dispatch(
                ResourceType::Subnet,
                scope.driver.vpc_handler().map(|h| h.add_subnet(&vpc_iid, req)),
            )?;
            let child = info
                .subnets
                .iter()
                .find(|s| s.iid.name_id == driver_name)
                .map(|s| s.iid.clone())
                .ok_or_else(|| {
                    ControlError::mismatch(
                        ResourceType::Subnet,
                        format!("provider did not return new subnet '{name}'"),
                    )
                })?;
            Ok((info, child))
        },
        |child| scope.driver.vpc_handler().map(|h| h.remove_subnet(&vpc_iid, child)),
    )?;
    reconcile::enrich::<VpcKind, S>(scope, &vpc, &mut info)?;
    Ok(info)
}

/// Remove a subnet from a tracked VPC.
///
/// # Errors
///
/// Returns `ControlError::NotFound` if the VPC or subnet is not tracked.
pub fn remove_subnet<S: Store>(
    scope: &Scope<'_, S>,
    vpc_name: &str,
    subnet_name: &str,
) -> Result<bool> {
    scope.require(ResourceType::Subnet)?;
    let _guard = scope.locks.write(ResourceType::Subnet);
    let (vpc, kind) = lifecycle::parent_record(scope, ResourceType::Subnet, vpc_name)?;
    let vpc_iid = vpc.driver_iid();
    lifecycle::detach_child(scope, ResourceType::Subnet, &kind, subnet_name, |child| {
        scope.driver.vpc_handler().map(|h| h.remove_subnet(&vpc_iid, child))
    })
}

// =============================================================================
// Node groups
// =============================================================================

/// Add a node group to a tracked cluster.
///
/// # Errors
///
/// Returns `ControlError::NotFound` if the cluster or the node group's key
/// pair is not tracked.
pub fn add_node_group<S: Store>(
    scope: &Scope<'_, S>,
    cluster_name: &str,
    mut node_group: NodeGroupInfo,
) -> Result<NodeGroupInfo> {
    scope.require(ResourceType::NodeGroup)?;
    let _guard = scope.locks.write(ResourceType::NodeGroup);
    let (cluster, kind) = lifecycle::parent_record(scope, ResourceType::NodeGroup, cluster_name)?;
    let cluster_iid = cluster.driver_iid();
    let name = node_group.iid.name_id.clone();
    if !node_group.key_pair_iid.name_id.is_empty() {
        scope.resolve(ResourceType::KeyPair, &mut node_group.key_pair_iid)?;
    }

    let mut info = lifecycle::attach_child(
        scope,
        ResourceType::NodeGroup,
        &kind,
        &name,
        |driver_name| {
            node_group.iid = Iid::named(driver_name);
            let info = scope.dispatch(
                ResourceType::NodeGroup,
                scope
                    .driver
                    .cluster_handler()
                    .map(|h| h.add_node_group(&cluster_iid, node_group)),
            )?;
            let child = info.iid.clone();
            Ok((info, child))
        },
        |child| {
            scope
                .driver
                .cluster_handler()
                .map(|h| h.remove_node_group(&cluster_iid, child))
        },
    )?;
    info.iid.name_id = name;
    scope.overlay(ResourceType::KeyPair, &mut info.key_pair_iid)?;
    Ok(info)
}

/// Remove a node group from a tracked cluster.
///
/// # Errors
///
/// Returns `ControlError::NotFound` if the cluster or node group is not
/// tracked.
pub fn remove_node_group<S: Store>(
    scope: &Scope<'_, S>,
    cluster_name: &str,
    node_group_name: &str,
) -> Result<bool> {
    scope.require(ResourceType::NodeGroup)?;
    let _guard = scope.locks.write(ResourceType::NodeGroup);
    let (cluster, kind) = lifecycle::parent_record(scope, ResourceType::NodeGroup, cluster_name)?;
    let cluster_iid = cluster.driver_iid();
    lifecycle::detach_child(
        scope,
        ResourceType::NodeGroup,
        &kind,
        node_group_name,
        |child| {
            scope
                .driver
                .cluster_handler()
                .map(|h| h.remove_node_group(&cluster_iid, child))
        },
    )
}

/// Change the size limits of a node group.
///
/// # Errors
///
/// Returns `ControlError::Provider` if the provider rejects the limits.
pub fn change_node_group_scaling<S: Store>(
    scope: &Scope<'_, S>,
    cluster_name: &str,
    node_group_name: &str,
    desired: u32,
    min: u32,
    max: u32,
) -> Result<NodeGroupInfo> {
    scope.require(ResourceType::NodeGroup)?;
    let _guard = scope.locks.write(ResourceType::NodeGroup);
    let (cluster, kind) = lifecycle::parent_record(scope, ResourceType::NodeGroup, cluster_name)?;
    let record = scope.record(&kind, node_group_name, node_group_name)?;

    let mut info = scope.dispatch(
        ResourceType::NodeGroup,
        scope.driver.cluster_handler().map(|h| {
            h.change_node_group_scaling(
                &cluster.driver_iid(),
                &record.driver_iid(),
                desired,
                min,
                max,
            )
        }),
    )?;
    info.iid = Iid::new(node_group_name, record.iid.system_id);
    scope.overlay(ResourceType::KeyPair, &mut info.key_pair_iid)?;
    Ok(info)
}

// =============================================================================
// VMs
// =============================================================================

/// Suspend, resume or reboot a VM.
///
/// # Errors
///
/// Returns `ControlError::NotFound` if the VM is not tracked.
pub fn control_vm<S: Store>(scope: &Scope<'_, S>, name: &str, action: VmAction) -> Result<VmStatus> {
    scope.require(ResourceType::Vm)?;
    let _guard = scope.locks.read(ResourceType::Vm);
    let iid = VmKind::lookup(scope, None, name)?.driver_iid();
    tracing::info!(connection = %scope.connection(), name = %name, ?action, "Controlling VM");
    scope.dispatch(
        ResourceType::Vm,
        scope.driver.vm_handler().map(|h| match action {
            VmAction::Suspend => h.suspend_vm(&iid),
            VmAction::Resume => h.resume_vm(&iid),
            VmAction::Reboot => h.reboot_vm(&iid),
        }),
    )
}

// =============================================================================
// Security group rules
// =============================================================================

/// Add rules to a security group.
///
/// # Errors
///
/// Returns `ControlError::NotFound` if the group is not tracked.
pub fn add_rules<S: Store>(
    scope: &Scope<'_, S>,
    vpc_name: Option<&str>,
    name: &str,
    rules: Vec<SecurityRule>,
) -> Result<SecurityInfo> {
    scope.require(ResourceType::SecurityGroup)?;
    let _guard = scope.locks.read(ResourceType::SecurityGroup);
    let record = SecurityGroupKind::lookup(scope, vpc_name, name)?;
    let mut info = scope.dispatch(
        ResourceType::SecurityGroup,
        scope
            .driver
            .security_handler()
            .map(|h| h.add_rules(&record.driver_iid(), rules)),
    )?;
    reconcile::enrich::<SecurityGroupKind, S>(scope, &record, &mut info)?;
    Ok(info)
}

/// Remove rules from a security group.
///
/// # Errors
///
/// Returns `ControlError::NotFound` if the group is not tracked.
pub fn remove_rules<S: Store>(
    scope: &Scope<'_, S>,
    vpc_name: Option<&str>,
    name: &str,
    rules: Vec<SecurityRule>,
) -> Result<bool> {
    scope.require(ResourceType::SecurityGroup)?;
    let _guard = scope.locks.read(ResourceType::SecurityGroup);
    let record = SecurityGroupKind::lookup(scope, vpc_name, name)?;
    scope.dispatch(
        ResourceType::SecurityGroup,
        scope
            .driver
            .security_handler()
            .map(|h| h.remove_rules(&record.driver_iid(), rules)),
    )
}

// =============================================================================
// Disks
// =============================================================================

/// Attach a disk to a VM.
///
/// # Errors
///
/// Returns `ControlError::NotFound` if the disk or VM is not tracked.
pub fn attach_disk<S: Store>(
    scope: &Scope<'_, S>,
    disk_name: &str,
    vm_name: &str,
) -> Result<DiskInfo> {
    scope.require(ResourceType::Disk)?;
    let _guard = scope.locks.read(ResourceType::Disk);
    let disk = DiskKind::lookup(scope, None, disk_name)?;
    let vm = VmKind::lookup(scope, None, vm_name)?;
    let mut info = scope.dispatch(
        ResourceType::Disk,
        scope
            .driver
            .disk_handler()
            .map(|h| h.attach_disk(&disk.driver_iid(), &vm.driver_iid())),
    )?;
    reconcile::enrich::<DiskKind, S>(scope, &disk, &mut info)?;
    Ok(info)
}

/// Detach a disk from a VM.
///
/// # Errors
///
/// Returns `ControlError::NotFound` if the disk or VM is not tracked.
pub fn detach_disk<S: Store>(scope: &Scope<'_, S>, disk_name: &str, vm_name: &str) -> Result<bool> {
    scope.require(ResourceType::Disk)?;
    let _guard = scope.locks.read(ResourceType::Disk);
    let disk = DiskKind::lookup(scope, None, disk_name)?;
    let vm = VmKind::lookup(scope, None, vm_name)?;
    scope.dispatch(
        ResourceType::Disk,
        scope
            .driver
            .disk_handler()
            .map(|h| h.detach_disk(&disk.driver_iid(), &vm.driver_iid())),
    )
}

// =============================================================================
// Load balancer members
// =============================================================================

fn resolve_vms<S: Store>(scope: &Scope<'_, S>, names: &[String]) -> Result<Vec<Iid>> {
    let mut iids: Vec<Iid> = names.iter().map(Iid::named).collect();
    scope.resolve_all(ResourceType::Vm, &mut iids)?;
    Ok(iids)
}

/// Add VMs to a load balancer.
///
/// # Errors
///
/// Returns `ControlError::NotFound` if the load balancer or a VM is not
/// tracked.
pub fn add_vms<S: Store>(scope: &Scope<'_, S>, nlb_name: &str, vms: &[String]) -> Result<NlbInfo> {
    scope.require(ResourceType::Nlb)?;
    let _guard = scope.locks.read(ResourceType::Nlb);
    let record = NlbKind::lookup(scope, None, nlb_name)?;
    let vms = resolve_vms(scope, vms)?;
    let mut info = scope.dispatch(
        ResourceType::Nlb,
        scope
            .driver
            .nlb_handler()
            .map(|h| h.add_vms(&record.driver_iid(), vms)),
    )?;
    reconcile::enrich::<NlbKind, S>(scope, &record, &mut info)?;
    Ok(info)
}

/// Remove VMs from a load balancer.
///
/// # Errors
///
/// Returns `ControlError::NotFound` if the load balancer or a VM is not
/// tracked.
pub fn remove_vms<S: Store>(scope: &Scope<'_, S>, nlb_name: &str, vms: &[String]) -> Result<bool> {
    scope.require(ResourceType::Nlb)?;
    let _guard = scope.locks.read(ResourceType::Nlb);
    let record = NlbKind::lookup(scope, None, nlb_name)?;
    let vms = resolve_vms(scope, vms)?;
    scope.dispatch(
        ResourceType::Nlb,
        scope
            .driver
            .nlb_handler()
            .map(|h| h.remove_vms(&record.driver_iid(), vms)),
    )
}
