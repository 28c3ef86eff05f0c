//! Create, delete, register and unregister protocols.
//!
//! A provider and the identity catalog cannot share a transaction, so every
//! mutation is a saga: the provider step runs first, the catalog step second,
//! and a failing catalog step is compensated at the provider.
//!
//! ```text
//!   create:  lock ─ exists? ─ resolve ─ driver.create ─ insert record ─ insert children
//!                                             ▲               │               │
//!                                             └── driver.delete ◄─────────────┘ (on failure)
//!
//!   delete:  lock ─ lookup ─ snapshot ─ driver.delete ─ delete record ─ delete children
//!                               │                             │
//!                               └──► driver.create ◄──────────┘ (on failure)
//! ```
//!
//! A compensation that fails is reported together with the error that
//! triggered it as `ControlError::RollbackFailure`; the catalog and the
//! provider then need an operator.

use spider_core::{naming, Iid, ResourceType, TypeKey};
use spider_store::{IidRecord, Store, StoreError};

use crate::driver::DriverResult;
use crate::error::{ControlError, Result};
use crate::kinds::ResourceKind;
use crate::reconcile;
use crate::scope::Scope;

/// Outcome of a compensating provider delete.
fn compensate_delete(
    original: ControlError,
    system_id: &str,
    result: Result<bool>,
) -> ControlError {
    match result {
        Ok(true) => {
            tracing::info!(system_id = %system_id, "rollback: provider resource deleted");
            original
        }
        Ok(false) => {
            tracing::error!(system_id = %system_id, "rollback: provider declined delete");
            ControlError::rollback_failed(
                original,
                format!("provider declined to delete '{system_id}'"),
            )
        }
        Err(err) => {
            tracing::error!(system_id = %system_id, error = %err, "rollback: provider delete failed");
            ControlError::rollback_failed(original, err.to_string())
        }
    }
}

/// Join the failures of a multi-step rollback onto the original error.
fn finish_rollback(original: ControlError, failures: Vec<String>) -> ControlError {
    if failures.is_empty() {
        original
    } else {
        ControlError::rollback_failed(original, failures.join("; "))
    }
}

// =============================================================================
// Create
// =============================================================================

/// Child names of a create request, mapped to the names the driver sees.
struct ChildNames {
    child_type: ResourceType,
    names: Vec<(String, String)>,
}

impl ChildNames {
    fn user_name(&self, driver_name: &str) -> Option<&str> {
        self.names
            .iter()
            .find(|(_, d)| d == driver_name)
            .map(|(u, _)| u.as_str())
    }
}

/// Validate child names and replace them with driver names.
fn rename_children<K: ResourceKind, S: Store>(
    scope: &Scope<'_, S>,
    req: &mut K::Request,
) -> Result<Option<ChildNames>> {
    let (Some(child_type), Some(children)) = (K::CHILD, K::request_children(req)) else {
        return Ok(None);
    };
    let mut names: Vec<(String, String)> = Vec::new();
    for iid in children.iids_mut() {
        naming::validate_name(&iid.name_id)?;
        if names.iter().any(|(u, _)| *u == iid.name_id) {
            return Err(ControlError::Validation(format!(
                "duplicate {child_type} name '{}'",
                iid.name_id
            )));
        }
        let driver_name = scope.driver_name(child_type, &iid.name_id);
        names.push((iid.name_id.clone(), driver_name.clone()));
        *iid = Iid::named(driver_name);
    }
    Ok(Some(ChildNames { child_type, names }))
}

/// Create a resource at the provider and track it.
///
/// The caller's name is checked for uniqueness before the provider is
/// called. References to other resources are resolved by name first.
///
/// # Errors
///
/// Returns `ControlError::AlreadyExists` if the name is taken,
/// `ControlError::Provider` if the provider create fails and
/// `ControlError::RollbackFailure` if tracking failed and the provider
/// resource could not be removed again. A `ControlError::ConsistencyMismatch`
/// after tracking means the resource exists but its references could not be
/// named.
pub fn create<K: ResourceKind, S: Store>(
    scope: &Scope<'_, S>,
    mut req: K::Request,
) -> Result<K::Info> {
    scope.require(K::TYPE)?;
    let name = K::request_iid_mut(&mut req).name_id.clone();
    naming::validate_name(&name)?;
    let stored = K::stored_name(scope.codec(), K::request_scope(&req).as_deref(), &name)?;
    let children = rename_children::<K, S>(scope, &mut req)?;

    let _guard = (K::TYPE != ResourceType::Vm || scope.config.lock_vm_create)
        .then(|| scope.locks.write(K::TYPE));
    tracing::info!(
        connection = %scope.connection(),
        resource_type = %K::TYPE,
        name = %name,
        "Creating resource"
    );

    let kind = TypeKey::Top(K::TYPE);
    if scope.store.is_exist(scope.connection(), &kind, &stored)? {
        return Err(ControlError::AlreadyExists {
            resource_type: K::TYPE,
            name,
        });
    }
    K::before_create(scope, &req)?;
    K::resolve_request(&mut req, scope)?;

    let driver_name = scope.driver_name(K::TYPE, &name);
    *K::request_iid_mut(&mut req) = Iid::named(driver_name.clone());

    let mut info = scope.dispatch(K::TYPE, K::create(scope.driver, req))?;
    let system_id = K::info_iid(&info).system_id.clone();
    let driver_iid = Iid::new(driver_name.clone(), system_id.clone());
    tracing::debug!(system_id = %system_id, "Provider resource created");

    let record = IidRecord::new(
        scope.connection(),
        kind,
        Iid::new(stored, system_id.clone()),
    )
    .with_driver_name(driver_name);
    if let Err(err) = scope.store.create(&record) {
        let err = ControlError::from_store(err, K::TYPE, &name);
        tracing::warn!(system_id = %system_id, error = %err, "rollback: tracking failed, deleting provider resource");
        let result = scope.dispatch(K::TYPE, K::delete(scope.driver, &driver_iid));
        return Err(compensate_delete(err, &system_id, result));
    }

    if let Some(children) = children {
        track_children::<K, S>(scope, &record, &driver_iid, &mut info, &children)?;
    }

    // the resource is committed from here on; a retry would hit AlreadyExists
    if let Err(err) = reconcile::enrich::<K, S>(scope, &record, &mut info) {
        tracing::warn!(system_id = %system_id, error = %err, "Created resource could not be named");
        return Err(ControlError::mismatch(
            K::TYPE,
            format!("'{name}' was created as '{system_id}', but its view failed: {err}"),
        ));
    }
    tracing::info!(
        connection = %scope.connection(),
        resource_type = %K::TYPE,
        name = %name,
        system_id = %system_id,
        "Resource created"
    );
    Ok(info)
}

/// Insert one record per created child, undoing the whole create if any
/// insert fails.
fn track_children<K: ResourceKind, S: Store>(
    scope: &Scope<'_, S>,
    parent: &IidRecord,
    driver_iid: &Iid,
    info: &mut K::Info,
    children: &ChildNames,
) -> Result<()> {
    let kind = TypeKey::child(children.child_type, &parent.iid.name_id)?;
    let created: Vec<IidRecord> = K::info_children(info)
        .map(|list| {
            list.iids_mut()
                .into_iter()
                .filter_map(|iid| {
                    children.user_name(&iid.name_id).map(|user| {
                        IidRecord::new(
                            scope.connection(),
                            kind.clone(),
                            Iid::new(user, iid.system_id.clone()),
                        )
                        .with_driver_name(iid.name_id.clone())
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let mut inserted: Vec<&IidRecord> = Vec::new();
    let mut failure = None;
    if created.len() == children.names.len() {
        for record in &created {
            match scope.store.create(record) {
                Ok(()) => inserted.push(record),
                Err(err) => {
                    failure = Some(ControlError::from_store(
                        err,
                        children.child_type,
                        &record.iid.name_id,
                    ));
                    break;
                }
            }
        }
    } else {
        failure = Some(ControlError::mismatch(
            children.child_type,
            format!(
                "requested {}, provider returned {}",
                children.names.len(),
                created.len()
            ),
        ));
    }
    let Some(original) = failure else {
        return Ok(());
    };

    // reverse order: provider resource, parent record, inserted children
    tracing::warn!(
        resource_type = %K::TYPE,
        system_id = %parent.iid.system_id,
        error = %original,
        "rollback: child tracking failed"
    );
    let mut failures = Vec::new();
    match scope.dispatch(K::TYPE, K::delete(scope.driver, driver_iid)) {
        Ok(true) => {}
        Ok(false) => failures.push(format!(
            "provider declined to delete '{}'",
            parent.iid.system_id
        )),
        Err(err) => failures.push(err.to_string()),
    }
    if let Err(err) = scope
        .store
        .delete(scope.connection(), &parent.kind, &parent.iid.name_id)
    {
        failures.push(err.to_string());
    }
    for record in inserted.iter().rev() {
        if let Err(err) = scope
            .store
            .delete(scope.connection(), &record.kind, &record.iid.name_id)
        {
            failures.push(err.to_string());
        }
    }
    for failure in &failures {
        tracing::error!(error = %failure, "rollback: compensation failed");
    }
    Err(finish_rollback(original, failures))
}

// =============================================================================
// Delete
// =============================================================================

/// Provider state captured before a delete, with driver names restored on
/// children so the resource can be rebuilt.
fn snapshot<K: ResourceKind, S: Store>(
    scope: &Scope<'_, S>,
    record: &IidRecord,
) -> Result<K::Info> {
    let mut info = scope.dispatch(K::TYPE, K::get(scope.driver, &record.driver_iid()))?;
    *K::info_iid_mut(&mut info) = record.driver_iid();
    if let Some(child_type) = K::CHILD {
        let tracked = scope.store.list(
            scope.connection(),
            &TypeKey::child(child_type, &record.iid.name_id)?,
        )?;
        if let Some(children) = K::info_children(&mut info) {
            for iid in children.iids_mut() {
                if let Some(child) = tracked.iter().find(|r| r.iid.system_id == iid.system_id) {
                    *iid = Iid::named(child.driver_iid().name_id);
                }
            }
        }
    }
    Ok(info)
}

/// Rebuild a deleted provider resource after its record could not be
/// removed.
fn recreate<K: ResourceKind, S: Store>(
    scope: &Scope<'_, S>,
    record: &IidRecord,
    snapshot: Option<&K::Info>,
    original: ControlError,
) -> ControlError {
    let Some(req) = snapshot.and_then(|s| K::recreate_request(s, &record.driver_iid().name_id))
    else {
        return original;
    };
    tracing::warn!(
        resource_type = %K::TYPE,
        system_id = %record.iid.system_id,
        error = %original,
        "rollback: untracking failed, recreating provider resource"
    );
    match scope.dispatch(K::TYPE, K::create(scope.driver, req)) {
        Ok(info) => {
            let system_id = &K::info_iid(&info).system_id;
            if *system_id == record.iid.system_id {
                return original;
            }
            // the record now points at a resource that no longer exists
            tracing::error!(
                old = %record.iid.system_id,
                new = %system_id,
                "rollback: recreated resource has a new provider id"
            );
            ControlError::rollback_failed(
                original,
                format!(
                    "recreated as '{system_id}', record still references '{}'",
                    record.iid.system_id
                ),
            )
        }
        Err(err) => {
            tracing::error!(error = %err, "rollback: recreate failed");
            ControlError::rollback_failed(original, err.to_string())
        }
    }
}

/// Delete a tracked resource at the provider and stop tracking it.
///
/// `Ok(false)` means the provider declined; the record is kept. With
/// `force`, provider failures are ignored and the record is always removed.
///
/// # Errors
///
/// Returns `ControlError::NotFound` if the name is not tracked,
/// `ControlError::Provider` if the provider delete fails and
/// `ControlError::RollbackFailure` if the record could not be removed and the
/// recreated resource no longer matches it.
pub fn delete<K: ResourceKind, S: Store>(
    scope: &Scope<'_, S>,
    parent: Option<&str>,
    name: &str,
    force: bool,
) -> Result<bool> {
    scope.require(K::TYPE)?;
    let _guard = scope.locks.write(K::TYPE);
    tracing::info!(
        connection = %scope.connection(),
        resource_type = %K::TYPE,
        name = %name,
        force,
        "Deleting resource"
    );

    let record = K::lookup(scope, parent, name)?;
    let snapshot = if K::RECREATABLE && !force {
        Some(snapshot::<K, S>(scope, &record)?)
    } else {
        None
    };

    let deleted = match scope.dispatch(K::TYPE, K::delete(scope.driver, &record.driver_iid())) {
        Ok(deleted) => deleted,
        Err(err) if force => {
            tracing::warn!(error = %err, "Force delete: ignoring provider error");
            false
        }
        Err(err) => return Err(err),
    };
    if !deleted && !force {
        tracing::info!(system_id = %record.iid.system_id, "Provider declined delete");
        return Ok(false);
    }

    if let Err(err) = scope
        .store
        .delete(scope.connection(), &record.kind, &record.iid.name_id)
    {
        let err = ControlError::from_store(err, K::TYPE, name);
        if !force {
            return Err(recreate::<K, S>(scope, &record, snapshot.as_ref(), err));
        }
        tracing::error!(error = %err, "Force delete: record could not be removed");
    }
    drop_children::<K, S>(scope, &record)?;
    Ok(deleted)
}

fn drop_children<K: ResourceKind, S: Store>(scope: &Scope<'_, S>, parent: &IidRecord) -> Result<()> {
    if let Some(child_type) = K::CHILD {
        let kind = TypeKey::child(child_type, &parent.iid.name_id)?;
        let removed = scope.store.delete_all(scope.connection(), &kind)?;
        tracing::debug!(parent = %parent.iid.name_id, removed, "Removed child records");
    }
    Ok(())
}

/// Delete a provider resource the catalog does not track.
///
/// # Errors
///
/// Returns `ControlError::Validation` if the provider id is tracked.
pub fn delete_provider_resource<K: ResourceKind, S: Store>(
    scope: &Scope<'_, S>,
    system_id: &str,
) -> Result<bool> {
    scope.require(K::TYPE)?;
    let _guard = scope.locks.write(K::TYPE);

    match scope
        .store
        .get_by_system_id(scope.connection(), &TypeKey::Top(K::TYPE), system_id)
    {
        Ok(record) => {
            return Err(ControlError::Validation(format!(
                "'{system_id}' is tracked as '{}'; delete it by name",
                record.iid.name_id
            )))
        }
        Err(StoreError::NotFound) => {}
        Err(err) => return Err(err.into()),
    }
    tracing::info!(
        connection = %scope.connection(),
        resource_type = %K::TYPE,
        system_id = %system_id,
        "Deleting untracked provider resource"
    );
    scope.dispatch(
        K::TYPE,
        K::delete(scope.driver, &Iid::new(system_id, system_id)),
    )
}

// =============================================================================
// Register / unregister
// =============================================================================

/// Track an existing provider resource under a caller name. The provider is
/// not called.
///
/// # Errors
///
/// Returns `ControlError::AlreadyExists` if the name is taken.
pub fn register<K: ResourceKind, S: Store>(
    scope: &Scope<'_, S>,
    parent: Option<&str>,
    iid: Iid,
) -> Result<Iid> {
    scope.require(K::TYPE)?;
    naming::validate_name(&iid.name_id)?;
    let stored = K::stored_name(scope.codec(), parent, &iid.name_id)?;

    let _guard = scope.locks.write(K::TYPE);
    tracing::info!(
        connection = %scope.connection(),
        resource_type = %K::TYPE,
        name = %iid.name_id,
        system_id = %iid.system_id,
        "Registering resource"
    );
    let record = IidRecord::new(
        scope.connection(),
        TypeKey::Top(K::TYPE),
        Iid::new(stored, iid.system_id.clone()),
    );
    scope
        .store
        .create(&record)
        .map_err(|e| ControlError::from_store(e, K::TYPE, &iid.name_id))?;
    Ok(iid)
}

/// Stop tracking a resource, leaving the provider untouched.
///
/// # Errors
///
/// Returns `ControlError::NotFound` if the name is not tracked.
pub fn unregister<K: ResourceKind, S: Store>(
    scope: &Scope<'_, S>,
    parent: Option<&str>,
    name: &str,
) -> Result<bool> {
    let _guard = scope.locks.write(K::TYPE);
    tracing::info!(
        connection = %scope.connection(),
        resource_type = %K::TYPE,
        name = %name,
        "Unregistering resource"
    );
    let record = K::lookup(scope, parent, name)?;
    scope
        .store
        .delete(scope.connection(), &record.kind, &record.iid.name_id)
        .map_err(|e| ControlError::from_store(e, K::TYPE, name))?;
    drop_children::<K, S>(scope, &record)?;
    Ok(true)
}

// =============================================================================
// Children
// =============================================================================

/// Record of the parent a child type lives under.
///
/// # Errors
///
/// Returns `ControlError::NotFound` if the parent is not tracked.
pub fn parent_record<S: Store>(
    scope: &Scope<'_, S>,
    child_type: ResourceType,
    parent_name: &str,
) -> Result<(IidRecord, TypeKey)> {
    let parent_type = child_type.parent().ok_or_else(|| {
        ControlError::Validation(format!("{child_type} is not a child resource type"))
    })?;
    let record = scope.record(
        &TypeKey::Top(parent_type),
        &scope.codec().to_stored(parent_name),
        parent_name,
    )?;
    let kind = TypeKey::child(child_type, &record.iid.name_id)?;
    Ok((record, kind))
}

/// Add a child at the provider and track it.
///
/// `add` receives the driver name and returns the driver's answer together
/// with the identity of the new child; `remove` undoes the provider step.
/// The caller holds the parent's type lock.
///
/// # Errors
///
/// Returns `ControlError::AlreadyExists` if the child name is taken and
/// `ControlError::RollbackFailure` if tracking failed and the provider child
/// could not be removed.
pub fn attach_child<S: Store, T>(
    scope: &Scope<'_, S>,
    child_type: ResourceType,
    kind: &TypeKey,
    name: &str,
    add: impl FnOnce(String) -> Result<(T, Iid)>,
    remove: impl FnOnce(&Iid) -> Option<DriverResult<bool>>,
) -> Result<T> {
    naming::validate_name(name)?;
    if scope.store.is_exist(scope.connection(), kind, name)? {
        return Err(ControlError::AlreadyExists {
            resource_type: child_type,
            name: name.to_string(),
        });
    }

    let driver_name = scope.driver_name(child_type, name);
    let (answer, child) = add(driver_name.clone())?;
    let record = IidRecord::new(
        scope.connection(),
        kind.clone(),
        Iid::new(name, child.system_id.clone()),
    )
    .with_driver_name(driver_name);
    if let Err(err) = scope.store.create(&record) {
        let err = ControlError::from_store(err, child_type, name);
        tracing::warn!(system_id = %child.system_id, error = %err, "rollback: removing provider child");
        let result = scope.dispatch(child_type, remove(&child));
        return Err(compensate_delete(err, &child.system_id, result));
    }
    tracing::info!(
        connection = %scope.connection(),
        resource_type = %child_type,
        name = %name,
        system_id = %child.system_id,
        "Child resource added"
    );
    Ok(answer)
}

/// Remove a tracked child at the provider and stop tracking it.
///
/// # Errors
///
/// Returns `ControlError::NotFound` if the child is not tracked.
pub fn detach_child<S: Store>(
    scope: &Scope<'_, S>,
    child_type: ResourceType,
    kind: &TypeKey,
    name: &str,
    remove: impl FnOnce(&Iid) -> Option<DriverResult<bool>>,
) -> Result<bool> {
    let record = scope.record(kind, name, name)?;
    if !scope.dispatch(child_type, remove(&record.driver_iid()))? {
        return Ok(false);
    }
    scope
        .store
        .delete(scope.connection(), kind, name)
        .map_err(|e| ControlError::from_store(e, child_type, name))?;
    tracing::info!(
        connection = %scope.connection(),
        resource_type = %child_type,
        name = %name,
        "Child resource removed"
    );
    Ok(true)
}

/// Track an existing provider child under its parent.
///
/// # Errors
///
/// Returns `ControlError::AlreadyExists` if the child name is taken.
pub fn register_child<S: Store>(
    scope: &Scope<'_, S>,
    child_type: ResourceType,
    parent_name: &str,
    iid: Iid,
) -> Result<Iid> {
    naming::validate_name(&iid.name_id)?;
    let _guard = scope.locks.write(child_type);
    let (_, kind) = parent_record(scope, child_type, parent_name)?;
    scope
        .store
        .create(&IidRecord::new(scope.connection(), kind, iid.clone()))
        .map_err(|e| ControlError::from_store(e, child_type, &iid.name_id))?;
    Ok(iid)
}

/// Stop tracking a child, leaving the provider untouched.
///
/// # Errors
///
/// Returns `ControlError::NotFound` if the child is not tracked.
pub fn unregister_child<S: Store>(
    scope: &Scope<'_, S>,
    child_type: ResourceType,
    parent_name: &str,
    name: &str,
) -> Result<bool> {
    let _guard = scope.locks.write(child_type);
    let (_, kind) = parent_record(scope, child_type, parent_name)?;
    scope
        .store
        .delete(scope.connection(), &kind, name)
        .map_err(|e| ControlError::from_store(e, child_type, name))?;
    Ok(true)
}
