//! Load balancers, clusters and file systems.

use spider_core::{Iid, ResourceType};
use spider_store::Store;

use super::{ChildList, ResourceKind};
use crate::driver::model::{
    ClusterInfo, ClusterReqInfo, FileSystemInfo, FileSystemReqInfo, NlbInfo, NlbReqInfo,
};
use crate::driver::{CloudConnection, DriverResult};
use crate::error::Result;
use crate::scope::Scope;

/// Network load balancers.
pub struct NlbKind;

impl ResourceKind for NlbKind {
    const TYPE: ResourceType = ResourceType::Nlb;

    type Request = NlbReqInfo;
    type Info = NlbInfo;

    fn request_iid_mut(req: &mut NlbReqInfo) -> &mut Iid {
        &mut req.iid
    }

    fn info_iid_mut(info: &mut NlbInfo) -> &mut Iid {
        &mut info.iid
    }

    fn info_iid(info: &NlbInfo) -> &Iid {
        &info.iid
    }

    fn create(conn: &dyn CloudConnection, req: NlbReqInfo) -> Option<DriverResult<NlbInfo>> {
        conn.nlb_handler().map(|h| h.create_nlb(req))
    }

    fn list(conn: &dyn CloudConnection) -> Option<DriverResult<Vec<NlbInfo>>> {
        conn.nlb_handler().map(|h| h.list_nlb())
    }

    fn get(conn: &dyn CloudConnection, iid: &Iid) -> Option<DriverResult<NlbInfo>> {
        conn.nlb_handler().map(|h| h.get_nlb(iid))
    }

    fn delete(conn: &dyn CloudConnection, iid: &Iid) -> Option<DriverResult<bool>> {
        conn.nlb_handler().map(|h| h.delete_nlb(iid))
    }

    fn resolve_request<S: Store>(req: &mut NlbReqInfo, scope: &Scope<'_, S>) -> Result<()> {
        scope.resolve(ResourceType::Vpc, &mut req.vpc_iid)?;
        scope.resolve_all(ResourceType::Vm, &mut req.vm_iids)
    }

    fn overlay_references<S: Store>(info: &mut NlbInfo, scope: &Scope<'_, S>) -> Result<()> {
        scope.overlay(ResourceType::Vpc, &mut info.vpc_iid)?;
        scope.overlay_all(ResourceType::Vm, &mut info.vm_iids)
    }
}

/// Managed Kubernetes clusters, with node groups tracked as children.
pub struct ClusterKind;

impl ResourceKind for ClusterKind {
    const TYPE: ResourceType = ResourceType::Cluster;
    const CHILD: Option<ResourceType> = Some(ResourceType::NodeGroup);

    type Request = ClusterReqInfo;
    type Info = ClusterInfo;

    fn request_iid_mut(req: &mut ClusterReqInfo) -> &mut Iid {
        &mut req.iid
    }

    fn info_iid_mut(info: &mut ClusterInfo) -> &mut Iid {
        &mut info.iid
    }

    fn info_iid(info: &ClusterInfo) -> &Iid {
        &info.iid
    }

    fn create(
        conn: &dyn CloudConnection,
        req: ClusterReqInfo,
    ) -> Option<DriverResult<ClusterInfo>> {
        conn.cluster_handler().map(|h| h.create_cluster(req))
    }

    fn list(conn: &dyn CloudConnection) -> Option<DriverResult<Vec<ClusterInfo>>> {
        conn.cluster_handler().map(|h| h.list_cluster())
    }

    fn get(conn: &dyn CloudConnection, iid: &Iid) -> Option<DriverResult<ClusterInfo>> {
        conn.cluster_handler().map(|h| h.get_cluster(iid))
    }

    fn delete(conn: &dyn CloudConnection, iid: &Iid) -> Option<DriverResult<bool>> {
        conn.cluster_handler().map(|h| h.delete_cluster(iid))
    }

    fn resolve_request<S: Store>(req: &mut ClusterReqInfo, scope: &Scope<'_, S>) -> Result<()> {
        let vpc = req.vpc_iid.name_id.clone();
        scope.resolve(ResourceType::Vpc, &mut req.vpc_iid)?;
        for subnet in &mut req.subnet_iids {
            scope.resolve_child(ResourceType::Subnet, &vpc, subnet)?;
        }
        for sg in &mut req.security_group_iids {
            scope.resolve_security_group(&vpc, sg)?;
        }
        for node_group in &mut req.node_groups {
            if !node_group.key_pair_iid.name_id.is_empty() {
                scope.resolve(ResourceType::KeyPair, &mut node_group.key_pair_iid)?;
            }
        }
        Ok(())
    }

    fn overlay_references<S: Store>(info: &mut ClusterInfo, scope: &Scope<'_, S>) -> Result<()> {
        scope.overlay(ResourceType::Vpc, &mut info.vpc_iid)?;
        for subnet in &mut info.subnet_iids {
            scope.overlay_child(ResourceType::Subnet, &info.vpc_iid.name_id, subnet)?;
        }
        scope.overlay_all(ResourceType::SecurityGroup, &mut info.security_group_iids)?;
        for node_group in &mut info.node_groups {
            scope.overlay(ResourceType::KeyPair, &mut node_group.key_pair_iid)?;
        }
        Ok(())
    }

    fn request_children(req: &mut ClusterReqInfo) -> Option<&mut dyn ChildList> {
        Some(&mut req.node_groups)
    }

    fn info_children(info: &mut ClusterInfo) -> Option<&mut dyn ChildList> {
        Some(&mut info.node_groups)
    }
}

/// Shared file systems.
pub struct FileSystemKind;

impl ResourceKind for FileSystemKind {
    const TYPE: ResourceType = ResourceType::FileSystem;

    type Request = FileSystemReqInfo;
    type Info = FileSystemInfo;

    fn request_iid_mut(req: &mut FileSystemReqInfo) -> &mut Iid {
        &mut req.iid
    }

    fn info_iid_mut(info: &mut FileSystemInfo) -> &mut Iid {
        &mut info.iid
    }

    fn info_iid(info: &FileSystemInfo) -> &Iid {
        &info.iid
    }

    fn create(
        conn: &dyn CloudConnection,
        req: FileSystemReqInfo,
    ) -> Option<DriverResult<FileSystemInfo>> {
        conn.file_system_handler().map(|h| h.create_file_system(req))
    }

    fn list(conn: &dyn CloudConnection) -> Option<DriverResult<Vec<FileSystemInfo>>> {
        conn.file_system_handler().map(|h| h.list_file_system())
    }

    fn get(conn: &dyn CloudConnection, iid: &Iid) -> Option<DriverResult<FileSystemInfo>> {
        conn.file_system_handler().map(|h| h.get_file_system(iid))
    }

    fn delete(conn: &dyn CloudConnection, iid: &Iid) -> Option<DriverResult<bool>> {
        conn.file_system_handler().map(|h| h.delete_file_system(iid))
    }

    fn resolve_request<S: Store>(
        req: &mut FileSystemReqInfo,
        scope: &Scope<'_, S>,
    ) -> Result<()> {
        let vpc = req.vpc_iid.name_id.clone();
        scope.resolve(ResourceType::Vpc, &mut req.vpc_iid)?;
        for subnet in &mut req.access_subnet_iids {
            scope.resolve_child(ResourceType::Subnet, &vpc, subnet)?;
        }
        Ok(())
    }

    fn overlay_references<S: Store>(
        info: &mut FileSystemInfo,
        scope: &Scope<'_, S>,
    ) -> Result<()> {
        scope.overlay(ResourceType::Vpc, &mut info.vpc_iid)?;
        for subnet in &mut info.access_subnet_iids {
            scope.overlay_child(ResourceType::Subnet, &info.vpc_iid.name_id, subnet)?;
        }
        Ok(())
    }
}
