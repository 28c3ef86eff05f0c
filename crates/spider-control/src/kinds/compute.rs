//! Images, key pairs, VMs, disks and snapshot images.

use spider_core::{Iid, ResourceType};
use spider_store::Store;

use super::ResourceKind;
use crate::driver::model::{
    DiskInfo, DiskReqInfo, ImageInfo, ImageReqInfo, ImageType, KeyPairInfo, KeyPairReqInfo,
    MyImageInfo, MyImageReqInfo, VmInfo, VmReqInfo, VmStatus,
};
use crate::driver::{CloudConnection, DriverResult};
use crate::error::Result;
use crate::scope::Scope;

/// Public images.
pub struct ImageKind;

impl ResourceKind for ImageKind {
    const TYPE: ResourceType = ResourceType::Image;
    const RECREATABLE: bool = true;

    type Request = ImageReqInfo;
    type Info = ImageInfo;

    fn request_iid_mut(req: &mut ImageReqInfo) -> &mut Iid {
        &mut req.iid
    }

    fn info_iid_mut(info: &mut ImageInfo) -> &mut Iid {
        &mut info.iid
    }

    fn info_iid(info: &ImageInfo) -> &Iid {
        &info.iid
    }

    fn create(conn: &dyn CloudConnection, req: ImageReqInfo) -> Option<DriverResult<ImageInfo>> {
        conn.image_handler().map(|h| h.create_image(req))
    }

    fn list(conn: &dyn CloudConnection) -> Option<DriverResult<Vec<ImageInfo>>> {
        conn.image_handler().map(|h| h.list_image())
    }

    fn get(conn: &dyn CloudConnection, iid: &Iid) -> Option<DriverResult<ImageInfo>> {
        conn.image_handler().map(|h| h.get_image(iid))
    }

    fn delete(conn: &dyn CloudConnection, iid: &Iid) -> Option<DriverResult<bool>> {
        conn.image_handler().map(|h| h.delete_image(iid))
    }

    fn recreate_request(_snapshot: &ImageInfo, driver_name: &str) -> Option<ImageReqInfo> {
        Some(ImageReqInfo {
            iid: Iid::named(driver_name),
        })
    }
}

/// Login key pairs.
pub struct KeyPairKind;

impl ResourceKind for KeyPairKind {
    const TYPE: ResourceType = ResourceType::KeyPair;

    type Request = KeyPairReqInfo;
    type Info = KeyPairInfo;

    fn request_iid_mut(req: &mut KeyPairReqInfo) -> &mut Iid {
        &mut req.iid
    }

    fn info_iid_mut(info: &mut KeyPairInfo) -> &mut Iid {
        &mut info.iid
    }

    fn info_iid(info: &KeyPairInfo) -> &Iid {
        &info.iid
    }

    fn create(
        conn: &dyn CloudConnection,
        req: KeyPairReqInfo,
    ) -> Option<DriverResult<KeyPairInfo>> {
        conn.key_pair_handler().map(|h| h.create_key(req))
    }

    fn list(conn: &dyn CloudConnection) -> Option<DriverResult<Vec<KeyPairInfo>>> {
        conn.key_pair_handler().map(|h| h.list_key())
    }

    fn get(conn: &dyn CloudConnection, iid: &Iid) -> Option<DriverResult<KeyPairInfo>> {
        conn.key_pair_handler().map(|h| h.get_key(iid))
    }

    fn delete(conn: &dyn CloudConnection, iid: &Iid) -> Option<DriverResult<bool>> {
        conn.key_pair_handler().map(|h| h.delete_key(iid))
    }

    /// The private key is handed out once, on create.
    fn redact(info: &mut KeyPairInfo) {
        info.private_key.clear();
    }
}

/// Virtual machines.
pub struct VmKind;

impl VmKind {
    fn resolve_image<S: Store>(
        scope: &Scope<'_, S>,
        image_type: ImageType,
        iid: &mut Iid,
    ) -> Result<()> {
        match image_type {
            // public images are addressed by their provider id
            ImageType::Public => {
                iid.system_id.clone_from(&iid.name_id);
                Ok(())
            }
            ImageType::MyImage => scope.resolve(ResourceType::MyImage, iid),
        }
    }

    fn overlay_image<S: Store>(
        scope: &Scope<'_, S>,
        image_type: ImageType,
        iid: &mut Iid,
    ) -> Result<()> {
        match image_type {
            ImageType::Public => {
                iid.name_id.clone_from(&iid.system_id);
                Ok(())
            }
            ImageType::MyImage => scope.overlay(ResourceType::MyImage, iid),
        }
    }
}

impl ResourceKind for VmKind {
    const TYPE: ResourceType = ResourceType::Vm;

    type Request = VmReqInfo;
    type Info = VmInfo;

    fn request_iid_mut(req: &mut VmReqInfo) -> &mut Iid {
        &mut req.iid
    }

    fn info_iid_mut(info: &mut VmInfo) -> &mut Iid {
        &mut info.iid
    }

    fn info_iid(info: &VmInfo) -> &Iid {
        &info.iid
    }

    fn create(conn: &dyn CloudConnection, req: VmReqInfo) -> Option<DriverResult<VmInfo>> {
        conn.vm_handler().map(|h| h.start_vm(req))
    }

    fn list(conn: &dyn CloudConnection) -> Option<DriverResult<Vec<VmInfo>>> {
        conn.vm_handler().map(|h| h.list_vm())
    }

    fn get(conn: &dyn CloudConnection, iid: &Iid) -> Option<DriverResult<VmInfo>> {
        conn.vm_handler().map(|h| h.get_vm(iid))
    }

    /// Terminate; a `Failed` status means the provider refused.
    fn delete(conn: &dyn CloudConnection, iid: &Iid) -> Option<DriverResult<bool>> {
        conn.vm_handler()
            .map(|h| h.terminate_vm(iid).map(|status| status != VmStatus::Failed))
    }

    fn resolve_request<S: Store>(req: &mut VmReqInfo, scope: &Scope<'_, S>) -> Result<()> {
        let vpc = req.vpc_iid.name_id.clone();
        scope.resolve(ResourceType::Vpc, &mut req.vpc_iid)?;
        scope.resolve_child(ResourceType::Subnet, &vpc, &mut req.subnet_iid)?;
        for sg in &mut req.security_group_iids {
            scope.resolve_security_group(&vpc, sg)?;
        }
        if !req.key_pair_iid.name_id.is_empty() {
            scope.resolve(ResourceType::KeyPair, &mut req.key_pair_iid)?;
        }
        Self::resolve_image(scope, req.image_type, &mut req.image_iid)?;
        scope.resolve_all(ResourceType::Disk, &mut req.data_disk_iids)
    }

    fn overlay_references<S: Store>(info: &mut VmInfo, scope: &Scope<'_, S>) -> Result<()> {
        scope.overlay(ResourceType::Vpc, &mut info.vpc_iid)?;
        scope.overlay_child(ResourceType::Subnet, &info.vpc_iid.name_id, &mut info.subnet_iid)?;
        scope.overlay_all(ResourceType::SecurityGroup, &mut info.security_group_iids)?;
        scope.overlay(ResourceType::KeyPair, &mut info.key_pair_iid)?;
        Self::overlay_image(scope, info.image_type, &mut info.image_iid)?;
        scope.overlay_all(ResourceType::Disk, &mut info.data_disk_iids)
    }
}

/// Block storage disks.
pub struct DiskKind;

impl ResourceKind for DiskKind {
    const TYPE: ResourceType = ResourceType::Disk;
    const RECREATABLE: bool = true;

    type Request = DiskReqInfo;
    type Info = DiskInfo;

    fn request_iid_mut(req: &mut DiskReqInfo) -> &mut Iid {
        &mut req.iid
    }

    fn info_iid_mut(info: &mut DiskInfo) -> &mut Iid {
        &mut info.iid
    }

    fn info_iid(info: &DiskInfo) -> &Iid {
        &info.iid
    }

    fn create(conn: &dyn CloudConnection, req: DiskReqInfo) -> Option<DriverResult<DiskInfo>> {
        conn.disk_handler().map(|h| h.create_disk(req))
    }

    fn list(conn: &dyn CloudConnection) -> Option<DriverResult<Vec<DiskInfo>>> {
        conn.disk_handler().map(|h| h.list_disk())
    }

    fn get(conn: &dyn CloudConnection, iid: &Iid) -> Option<DriverResult<DiskInfo>> {
        conn.disk_handler().map(|h| h.get_disk(iid))
    }

    fn delete(conn: &dyn CloudConnection, iid: &Iid) -> Option<DriverResult<bool>> {
        conn.disk_handler().map(|h| h.delete_disk(iid))
    }

    fn overlay_references<S: Store>(info: &mut DiskInfo, scope: &Scope<'_, S>) -> Result<()> {
        scope.overlay(ResourceType::Vm, &mut info.owner_vm)
    }

    fn recreate_request(snapshot: &DiskInfo, driver_name: &str) -> Option<DiskReqInfo> {
        Some(DiskReqInfo {
            iid: Iid::named(driver_name),
            zone: snapshot.zone.clone(),
            disk_type: snapshot.disk_type.clone(),
            disk_size: snapshot.disk_size.clone(),
        })
    }
}

/// Images snapshotted from VMs.
pub struct MyImageKind;

impl ResourceKind for MyImageKind {
    const TYPE: ResourceType = ResourceType::MyImage;

    type Request = MyImageReqInfo;
    type Info = MyImageInfo;

    fn request_iid_mut(req: &mut MyImageReqInfo) -> &mut Iid {
        &mut req.iid
    }

    fn info_iid_mut(info: &mut MyImageInfo) -> &mut Iid {
        &mut info.iid
    }

    fn info_iid(info: &MyImageInfo) -> &Iid {
        &info.iid
    }

    fn create(
        conn: &dyn CloudConnection,
        req: MyImageReqInfo,
    ) -> Option<DriverResult<MyImageInfo>> {
        conn.my_image_handler().map(|h| h.snapshot_vm(req))
    }

    fn list(conn: &dyn CloudConnection) -> Option<DriverResult<Vec<MyImageInfo>>> {
        conn.my_image_handler().map(|h| h.list_my_image())
    }

    fn get(conn: &dyn CloudConnection, iid: &Iid) -> Option<DriverResult<MyImageInfo>> {
        conn.my_image_handler().map(|h| h.get_my_image(iid))
    }

    fn delete(conn: &dyn CloudConnection, iid: &Iid) -> Option<DriverResult<bool>> {
        conn.my_image_handler().map(|h| h.delete_my_image(iid))
    }

    fn resolve_request<S: Store>(req: &mut MyImageReqInfo, scope: &Scope<'_, S>) -> Result<()> {
        scope.resolve(ResourceType::Vm, &mut req.source_vm)
    }
}
