//! Reconciliation of the identity catalog with live provider state.
//!
//! Every read joins the tracked records of a catalog with the provider's
//! listing on `SystemId` and overlays caller names onto the provider
//! payloads:
//!
//! ```text
//!   catalog:  [ vpc-01 = vpc-a ] [ vpc-02 = vpc-b ]
//!   provider: [ vpc-b ] [ vpc-x ] [ vpc-a ]
//!   result:   [ vpc-02 (vpc-b) ] [ vpc-01 (vpc-a) ]     provider order
//! ```
//!
//! Provider resources nobody tracks are not part of the view. A tracked
//! record with no live counterpart fails the whole read with
//! `ConsistencyMismatch`; nothing is filtered out silently.

use std::collections::{HashMap, HashSet};

use spider_core::{Iid, ResourceType, TypeKey};
use spider_store::{IidRecord, Store};

use crate::driver::model::{HasIid, VmStatus, VmStatusInfo};
use crate::error::{ControlError, Result};
use crate::kinds::{ResourceKind, VmKind};
use crate::scope::Scope;
use crate::types::AllResourceList;

/// Pair every tracked record with its live payload.
///
/// The result follows the provider's order.
fn join<'r, T>(
    resource_type: ResourceType,
    records: &'r [IidRecord],
    live: Vec<T>,
    system_id: impl Fn(&T) -> &str,
) -> Result<Vec<(&'r IidRecord, T)>> {
    if live.is_empty() {
        return Err(ControlError::mismatch(
            resource_type,
            format!("{} tracked, 0 at the provider", records.len()),
        ));
    }

    let by_system_id: HashMap<&str, &IidRecord> = records
        .iter()
        .map(|r| (r.iid.system_id.as_str(), r))
        .collect();
    let joined: Vec<(&IidRecord, T)> = live
        .into_iter()
        .filter_map(|item| {
            by_system_id
                .get(system_id(&item))
                .map(|record| (*record, item))
        })
        .collect();

    if joined.len() != records.len() {
        let found: HashSet<&str> = joined
            .iter()
            .map(|(r, _)| r.iid.system_id.as_str())
            .collect();
        let missing: Vec<&str> = records
            .iter()
            .filter(|r| !found.contains(r.iid.system_id.as_str()))
            .map(|r| r.iid.system_id.as_str())
            .collect();
        return Err(ControlError::mismatch(
            resource_type,
            format!("tracked but missing at the provider: {}", missing.join(", ")),
        ));
    }
    Ok(joined)
}

/// Caller-facing name of a tracked top-level record.
fn caller_name<S: Store>(
    scope: &Scope<'_, S>,
    resource_type: ResourceType,
    record: &IidRecord,
) -> Result<String> {
    scope
        .display_name(resource_type, &record.iid.name_id)
        .ok_or_else(|| {
            ControlError::mismatch(
                resource_type,
                format!("'{}' belongs to another namespace", record.iid.system_id),
            )
        })
}

/// Overlay caller names onto a payload known to belong to `record`.
///
/// Children are matched against the child catalog of the record; children
/// the catalog does not track are dropped, tracked children missing from the
/// payload are a mismatch.
///
/// # Errors
///
/// Returns `ControlError::ConsistencyMismatch` if a reference cannot be
/// matched.
pub fn enrich<K: ResourceKind, S: Store>(
    scope: &Scope<'_, S>,
    record: &IidRecord,
    info: &mut K::Info,
) -> Result<()> {
    *K::info_iid_mut(info) = Iid::new(
        caller_name(scope, K::TYPE, record)?,
        record.iid.system_id.clone(),
    );

    if let Some(child_type) = K::CHILD {
        let kind = TypeKey::child(child_type, &record.iid.name_id)?;
        let tracked = scope.store.list(scope.connection(), &kind)?;
        if let Some(children) = K::info_children(info) {
            let names: HashMap<&str, &str> = tracked
                .iter()
                .map(|r| (r.iid.system_id.as_str(), r.iid.name_id.as_str()))
                .collect();
            children.retain_iids(&mut |iid| names.contains_key(iid.system_id.as_str()));
            let mut iids = children.iids_mut();
            if iids.len() != tracked.len() {
                return Err(ControlError::mismatch(
                    child_type,
                    format!(
                        "{} tracked under '{}', {} at the provider",
                        tracked.len(),
                        record.iid.name_id,
                        iids.len()
                    ),
                ));
            }
            for iid in &mut iids {
                if let Some(name) = names.get(iid.system_id.as_str()) {
                    iid.name_id = (*name).to_string();
                }
            }
        }
    }

    K::overlay_references(info, scope)
}

/// List a resource type.
///
/// An empty catalog short-circuits without asking the provider.
///
/// # Errors
///
/// Returns `ControlError::ConsistencyMismatch` if a tracked resource is
/// missing at the provider, `ControlError::Provider` if the listing fails.
pub fn list<K: ResourceKind, S: Store>(scope: &Scope<'_, S>) -> Result<Vec<K::Info>> {
    scope.require(K::TYPE)?;
    let _guard = scope.locks.read(K::TYPE);

    let records = scope.visible_records(&TypeKey::Top(K::TYPE))?;
    if records.is_empty() {
        return Ok(Vec::new());
    }

    let live = scope.dispatch(K::TYPE, K::list(scope.driver))?;
    tracing::debug!(
        connection = %scope.connection(),
        resource_type = %K::TYPE,
        tracked = records.len(),
        live = live.len(),
        "Reconciling listing"
    );

    join(K::TYPE, &records, live, |info| K::info_iid(info).system_id.as_str())?
        .into_iter()
        .map(|(record, mut info)| {
            enrich::<K, S>(scope, record, &mut info)?;
            K::redact(&mut info);
            Ok(info)
        })
        .collect()
}

/// Get one resource by caller name.
///
/// `parent` scopes names that are only unique within a parent, such as a
/// security group within its VPC.
///
/// # Errors
///
/// Returns `ControlError::NotFound` if the name is not tracked.
pub fn get<K: ResourceKind, S: Store>(
    scope: &Scope<'_, S>,
    parent: Option<&str>,
    name: &str,
) -> Result<K::Info> {
    scope.require(K::TYPE)?;
    let _guard = scope.locks.read(K::TYPE);

    let record = K::lookup(scope, parent, name)?;
    let mut info = scope.dispatch(K::TYPE, K::get(scope.driver, &record.driver_iid()))?;
    if K::info_iid(&info).system_id != record.iid.system_id {
        return Err(ControlError::mismatch(
            K::TYPE,
            format!(
                "asked for '{}', provider answered '{}'",
                record.iid.system_id,
                K::info_iid(&info).system_id
            ),
        ));
    }
    enrich::<K, S>(scope, &record, &mut info)?;
    K::redact(&mut info);
    Ok(info)
}

/// Compare the catalog with the provider without failing on divergence.
///
/// Provider resources tracked by another namespace of the same connection
/// are neither mapped nor reported as provider-only.
///
/// # Errors
///
/// Returns `ControlError::Provider` if the listing fails.
pub fn list_all<K: ResourceKind, S: Store>(scope: &Scope<'_, S>) -> Result<AllResourceList> {
    scope.require(K::TYPE)?;
    let _guard = scope.locks.read(K::TYPE);

    let kind = TypeKey::Top(K::TYPE);
    let visible = scope.visible_records(&kind)?;
    let tracked: HashSet<String> = scope
        .store
        .list(scope.connection(), &kind)?
        .into_iter()
        .map(|r| r.iid.system_id)
        .collect();
    let live: HashSet<String> = scope
        .dispatch(K::TYPE, K::list(scope.driver))?
        .iter()
        .map(|info| K::info_iid(info).system_id.clone())
        .collect();

    let mut all = AllResourceList::default();
    for record in &visible {
        let iid = Iid::new(
            caller_name(scope, K::TYPE, record)?,
            record.iid.system_id.clone(),
        );
        if live.contains(&record.iid.system_id) {
            all.mapped.push(iid);
        } else {
            all.only_tracked.push(iid);
        }
    }
    all.only_provider = live.into_iter().filter(|id| !tracked.contains(id)).collect();
    all.only_provider.sort();
    Ok(all)
}

// =============================================================================
// VM status
// =============================================================================

/// Power state of every tracked VM.
///
/// # Errors
///
/// Returns `ControlError::ConsistencyMismatch` if a tracked VM is missing at
/// the provider.
pub fn list_vm_status<S: Store>(scope: &Scope<'_, S>) -> Result<Vec<VmStatusInfo>> {
    scope.require(ResourceType::Vm)?;
    let _guard = scope.locks.read(ResourceType::Vm);

    let records = scope.visible_records(&TypeKey::Top(ResourceType::Vm))?;
    if records.is_empty() {
        return Ok(Vec::new());
    }
    let live = scope.dispatch(
        ResourceType::Vm,
        scope.driver.vm_handler().map(|h| h.list_vm_status()),
    )?;

    join(ResourceType::Vm, &records, live, |s| s.iid().system_id.as_str())?
        .into_iter()
        .map(|(record, mut status)| {
            status.iid = Iid::new(
                caller_name(scope, ResourceType::Vm, record)?,
                record.iid.system_id.clone(),
            );
            Ok(status)
        })
        .collect()
}

/// Power state of one VM.
///
/// # Errors
///
/// Returns `ControlError::NotFound` if the VM is not tracked.
pub fn get_vm_status<S: Store>(scope: &Scope<'_, S>, name: &str) -> Result<VmStatus> {
    scope.require(ResourceType::Vm)?;
    let _guard = scope.locks.read(ResourceType::Vm);

    let record = VmKind::lookup(scope, None, name)?;
    scope.dispatch(
        ResourceType::Vm,
        scope
            .driver
            .vm_handler()
            .map(|h| h.get_vm_status(&record.driver_iid())),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, system_id: &str) -> IidRecord {
        IidRecord::new(
            "aws",
            TypeKey::Top(ResourceType::Disk),
            Iid::new(name, system_id),
        )
    }

    #[test]
    fn join_follows_provider_order_and_skips_untracked() {
        let records = vec![record("a", "vol-1"), record("b", "vol-2")];
        let live = vec!["vol-2", "vol-9", "vol-1"];
        let joined = join(ResourceType::Disk, &records, live, |s| *s).unwrap();
        let names: Vec<&str> = joined.iter().map(|(r, _)| r.iid.name_id.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn join_reports_missing_records() {
        let records = vec![record("a", "vol-1"), record("b", "vol-2")];
        let err = join(ResourceType::Disk, &records, vec!["vol-1"], |s| *s).unwrap_err();
        match err {
            ControlError::ConsistencyMismatch { detail, .. } => assert!(detail.contains("vol-2")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn join_rejects_empty_listing() {
        let records = vec![record("a", "vol-1")];
        let err = join(ResourceType::Disk, &records, Vec::<&str>::new(), |s| *s).unwrap_err();
        assert!(err.to_string().contains("1 tracked, 0 at the provider"));
    }
}
