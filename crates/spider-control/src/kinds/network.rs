//! VPCs and security groups.

use spider_core::{naming, Iid, NameCodec, ResourceType, TypeKey};
use spider_store::{IidRecord, Store};

use super::{ChildList, ResourceKind};
use crate::driver::model::{SecurityInfo, SecurityReqInfo, VpcInfo, VpcReqInfo};
use crate::driver::{CloudConnection, DriverResult};
use crate::error::{ControlError, Result};
use crate::scope::Scope;

/// VPCs, with their subnets tracked as children.
pub struct VpcKind;

impl ResourceKind for VpcKind {
    const TYPE: ResourceType = ResourceType::Vpc;
    const CHILD: Option<ResourceType> = Some(ResourceType::Subnet);
    const RECREATABLE: bool = true;

    type Request = VpcReqInfo;
    type Info = VpcInfo;

    fn request_iid_mut(req: &mut VpcReqInfo) -> &mut Iid {
        &mut req.iid
    }

    fn info_iid_mut(info: &mut VpcInfo) -> &mut Iid {
        &mut info.iid
    }

    fn info_iid(info: &VpcInfo) -> &Iid {
        &info.iid
    }

    fn create(conn: &dyn CloudConnection, req: VpcReqInfo) -> Option<DriverResult<VpcInfo>> {
        conn.vpc_handler().map(|h| h.create_vpc(req))
    }

    fn list(conn: &dyn CloudConnection) -> Option<DriverResult<Vec<VpcInfo>>> {
        conn.vpc_handler().map(|h| h.list_vpc())
    }

    fn get(conn: &dyn CloudConnection, iid: &Iid) -> Option<DriverResult<VpcInfo>> {
        conn.vpc_handler().map(|h| h.get_vpc(iid))
    }

    fn delete(conn: &dyn CloudConnection, iid: &Iid) -> Option<DriverResult<bool>> {
        conn.vpc_handler().map(|h| h.delete_vpc(iid))
    }

    fn before_create<S: Store>(scope: &Scope<'_, S>, _req: &VpcReqInfo) -> Result<()> {
        if !scope.driver.capabilities().single_vpc {
            return Ok(());
        }
        // the limit is per connection, whatever the namespace
        let tracked = scope
            .store
            .list(scope.connection(), &TypeKey::Top(ResourceType::Vpc))?;
        if tracked.is_empty() {
            Ok(())
        } else {
            Err(ControlError::Validation(format!(
                "connection '{}' supports a single VPC and already has one",
                scope.connection()
            )))
        }
    }

    fn request_children(req: &mut VpcReqInfo) -> Option<&mut dyn ChildList> {
        Some(&mut req.subnets)
    }

    fn info_children(info: &mut VpcInfo) -> Option<&mut dyn ChildList> {
        Some(&mut info.subnets)
    }

    fn recreate_request(snapshot: &VpcInfo, driver_name: &str) -> Option<VpcReqInfo> {
        Some(VpcReqInfo {
            iid: Iid::named(driver_name),
            ipv4_cidr: snapshot.ipv4_cidr.clone(),
            subnets: snapshot.subnets.clone(),
            tags: snapshot.tags.clone(),
        })
    }
}

/// Security groups. Names are unique within their VPC only, so the stored
/// name composes the VPC name with the group name.
pub struct SecurityGroupKind;

impl ResourceKind for SecurityGroupKind {
    const TYPE: ResourceType = ResourceType::SecurityGroup;
    const RECREATABLE: bool = true;

    type Request = SecurityReqInfo;
    type Info = SecurityInfo;

    fn request_iid_mut(req: &mut SecurityReqInfo) -> &mut Iid {
        &mut req.iid
    }

    fn info_iid_mut(info: &mut SecurityInfo) -> &mut Iid {
        &mut info.iid
    }

    fn info_iid(info: &SecurityInfo) -> &Iid {
        &info.iid
    }

    fn create(
        conn: &dyn CloudConnection,
        req: SecurityReqInfo,
    ) -> Option<DriverResult<SecurityInfo>> {
        conn.security_handler().map(|h| h.create_security(req))
    }

    fn list(conn: &dyn CloudConnection) -> Option<DriverResult<Vec<SecurityInfo>>> {
        conn.security_handler().map(|h| h.list_security())
    }

    fn get(conn: &dyn CloudConnection, iid: &Iid) -> Option<DriverResult<SecurityInfo>> {
        conn.security_handler().map(|h| h.get_security(iid))
    }

    fn delete(conn: &dyn CloudConnection, iid: &Iid) -> Option<DriverResult<bool>> {
        conn.security_handler().map(|h| h.delete_security(iid))
    }

    fn stored_name(codec: &NameCodec, scope: Option<&str>, name: &str) -> Result<String> {
        let vpc = scope
            .filter(|vpc| !vpc.is_empty())
            .ok_or_else(|| ControlError::Validation("security group needs a VPC".to_string()))?;
        naming::validate_name(vpc)?;
        Ok(codec.to_stored(&naming::compose(vpc, name)))
    }

    fn request_scope(req: &SecurityReqInfo) -> Option<String> {
        Some(req.vpc_iid.name_id.clone())
    }

    /// Without a VPC the group is searched by its own name across VPCs and
    /// must match exactly one.
    fn lookup<S: Store>(
        scope: &Scope<'_, S>,
        parent: Option<&str>,
        name: &str,
    ) -> Result<IidRecord> {
        let kind = TypeKey::Top(Self::TYPE);
        if let Some(vpc) = parent {
            let stored = Self::stored_name(scope.codec(), Some(vpc), name)?;
            return scope.record(&kind, &stored, name);
        }

        let keyword = format!("{}{name}", naming::COMPOSITE_DELIMITER);
        let mut matches: Vec<IidRecord> = scope
            .store
            .find_by_partial_name(scope.connection(), &kind, &keyword)?
            .into_iter()
            .filter(|r| scope.display_name(Self::TYPE, &r.iid.name_id).as_deref() == Some(name))
            .collect();
        match matches.len() {
            0 => Err(ControlError::NotFound {
                resource_type: Self::TYPE,
                name: name.to_string(),
            }),
            1 => Ok(matches.remove(0)),
            n => Err(ControlError::Validation(format!(
                "security group '{name}' exists in {n} VPCs; name the VPC"
            ))),
        }
    }

    fn resolve_request<S: Store>(req: &mut SecurityReqInfo, scope: &Scope<'_, S>) -> Result<()> {
        scope.resolve(ResourceType::Vpc, &mut req.vpc_iid)
    }

    fn overlay_references<S: Store>(info: &mut SecurityInfo, scope: &Scope<'_, S>) -> Result<()> {
        scope.overlay(ResourceType::Vpc, &mut info.vpc_iid)
    }

    fn recreate_request(snapshot: &SecurityInfo, driver_name: &str) -> Option<SecurityReqInfo> {
        Some(SecurityReqInfo {
            iid: Iid::named(driver_name),
            vpc_iid: snapshot.vpc_iid.clone(),
            rules: snapshot.rules.clone(),
        })
    }
}
