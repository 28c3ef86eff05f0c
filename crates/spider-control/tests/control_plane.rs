//! End-to-end tests of the control plane against the in-memory driver.
//!
//! A `FlakyStore` wraps the `RocksDB` store so catalog writes can be failed on
//! demand, which drives the compensation paths.

use std::sync::Arc;

use parking_lot::Mutex;
use spider_control::driver::mock::Fault;
use spider_control::driver::model::{
    ClusterReqInfo, DiskReqInfo, ImageType, KeyPairReqInfo, NlbReqInfo, NodeGroupInfo,
    RuleDirection, SecurityReqInfo, SecurityRule, SubnetInfo, VmAction, VmReqInfo, VmStatus,
    VpcReqInfo,
};
use spider_control::kinds::{
    ClusterKind, DiskKind, KeyPairKind, NlbKind, SecurityGroupKind, VmKind, VpcKind,
};
use spider_control::{
    CallContext, ControlConfig, ControlError, ControlPlaneService, DriverCapabilities,
    MockConnection,
};
use spider_core::{Iid, ResourceType, TypeKey};
use spider_store::{IidRecord, RocksStore, Store, StoreError};
use tempfile::TempDir;

// =============================================================================
// Fixtures
// =============================================================================

/// Store wrapper that fails selected operations.
struct FlakyStore {
    inner: RocksStore,
    /// Number of creates that succeed before the next one fails.
    creates_before_failure: Mutex<Option<usize>>,
    fail_next_delete: Mutex<bool>,
    fail_next_lookup_by_system_id: Mutex<bool>,
}

impl FlakyStore {
    fn open(dir: &TempDir) -> Self {
        Self {
            inner: RocksStore::open(dir.path()).unwrap(),
            creates_before_failure: Mutex::new(None),
            fail_next_delete: Mutex::new(false),
            fail_next_lookup_by_system_id: Mutex::new(false),
        }
    }

    fn fail_create_after(&self, successes: usize) {
        *self.creates_before_failure.lock() = Some(successes);
    }

    fn fail_next_delete(&self) {
        *self.fail_next_delete.lock() = true;
    }

    fn fail_next_lookup_by_system_id(&self) {
        *self.fail_next_lookup_by_system_id.lock() = true;
    }
}

impl Store for FlakyStore {
    fn is_exist(&self, connection: &str, kind: &TypeKey, name_id: &str) -> spider_store::Result<bool> {
        self.inner.is_exist(connection, kind, name_id)
    }

    fn get_by_name(&self, connection: &str, kind: &TypeKey, name_id: &str) -> spider_store::Result<IidRecord> {
        self.inner.get_by_name(connection, kind, name_id)
    }

    fn get_by_system_id(
        &self,
        connection: &str,
        kind: &TypeKey,
        system_id: &str,
    ) -> spider_store::Result<IidRecord> {
        if std::mem::take(&mut *self.fail_next_lookup_by_system_id.lock()) {
            return Err(StoreError::Database("injected lookup failure".to_string()));
        }
        self.inner.get_by_system_id(connection, kind, system_id)
    }

    fn list(&self, connection: &str, kind: &TypeKey) -> spider_store::Result<Vec<IidRecord>> {
        self.inner.list(connection, kind)
    }

    fn find_by_partial_name(
        &self,
        connection: &str,
        kind: &TypeKey,
        keyword: &str,
    ) -> spider_store::Result<Vec<IidRecord>> {
        self.inner.find_by_partial_name(connection, kind, keyword)
    }

    fn count(&self, resource_type: ResourceType, connection: Option<&str>) -> spider_store::Result<u64> {
        self.inner.count(resource_type, connection)
    }

    fn create(&self, record: &IidRecord) -> spider_store::Result<()> {
        {
            let mut budget = self.creates_before_failure.lock();
            match *budget {
                Some(0) => {
                    *budget = None;
                    return Err(StoreError::Database("injected create failure".to_string()));
                }
                Some(n) => *budget = Some(n - 1),
                None => {}
            }
        }
        self.inner.create(record)
    }

    fn delete(&self, connection: &str, kind: &TypeKey, name_id: &str) -> spider_store::Result<()> {
        if std::mem::take(&mut *self.fail_next_delete.lock()) {
            return Err(StoreError::Database("injected delete failure".to_string()));
        }
        self.inner.delete(connection, kind, name_id)
    }

    fn delete_all(&self, connection: &str, kind: &TypeKey) -> spider_store::Result<usize> {
        self.inner.delete_all(connection, kind)
    }
}

struct Harness {
    service: ControlPlaneService<FlakyStore>,
    store: Arc<FlakyStore>,
    driver: Arc<MockConnection>,
    ctx: CallContext,
    _dir: TempDir,
}

fn harness_with(driver: MockConnection, config: ControlConfig) -> Harness {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(FlakyStore::open(&dir));
    let service = ControlPlaneService::new(Arc::clone(&store), config);
    let driver = Arc::new(driver);
    service.register_connection("aws-east", driver.clone());
    Harness {
        service,
        store,
        driver,
        ctx: CallContext::new("aws-east"),
        _dir: dir,
    }
}

fn harness() -> Harness {
    harness_with(MockConnection::new("aws"), ControlConfig::default())
}

fn key(name: &str) -> KeyPairReqInfo {
    KeyPairReqInfo {
        iid: Iid::named(name),
    }
}

fn disk(name: &str) -> DiskReqInfo {
    DiskReqInfo {
        iid: Iid::named(name),
        zone: "us-east-1a".to_string(),
        disk_type: "gp3".to_string(),
        disk_size: "100".to_string(),
    }
}

fn vpc(name: &str, subnets: &[&str]) -> VpcReqInfo {
    VpcReqInfo {
        iid: Iid::named(name),
        ipv4_cidr: "10.0.0.0/16".to_string(),
        subnets: subnets
            .iter()
            .enumerate()
            .map(|(i, s)| SubnetInfo {
                iid: Iid::named(*s),
                zone: String::new(),
                ipv4_cidr: format!("10.0.{}.0/24", i + 1),
            })
            .collect(),
        tags: Vec::new(),
    }
}

fn ssh_rule() -> SecurityRule {
    SecurityRule {
        direction: RuleDirection::Inbound,
        ip_protocol: "tcp".to_string(),
        from_port: "22".to_string(),
        to_port: "22".to_string(),
        cidr: "0.0.0.0/0".to_string(),
    }
}

fn security_group(vpc: &str, name: &str) -> SecurityReqInfo {
    SecurityReqInfo {
        iid: Iid::named(name),
        vpc_iid: Iid::named(vpc),
        rules: vec![ssh_rule()],
    }
}

fn names<'a>(iids: impl IntoIterator<Item = &'a Iid>) -> Vec<&'a str> {
    iids.into_iter().map(|i| i.name_id.as_str()).collect()
}

/// VPC, subnet, security group and key pair a VM can reference.
fn network(h: &Harness) {
    h.service.create::<VpcKind>(&h.ctx, vpc("vpc-01", &["sub-01"])).unwrap();
    h.service
        .create::<SecurityGroupKind>(&h.ctx, security_group("vpc-01", "web"))
        .unwrap();
    h.service.create::<KeyPairKind>(&h.ctx, key("key-01")).unwrap();
}

fn vm(name: &str) -> VmReqInfo {
    VmReqInfo {
        iid: Iid::named(name),
        image_type: ImageType::Public,
        image_iid: Iid::named("ami-ubuntu-22"),
        vpc_iid: Iid::named("vpc-01"),
        subnet_iid: Iid::named("sub-01"),
        security_group_iids: vec![Iid::named("web")],
        key_pair_iid: Iid::named("key-01"),
        spec_name: "t3.micro".to_string(),
        ..VmReqInfo::default()
    }
}

// =============================================================================
// Uniqueness and round trip
// =============================================================================

#[test]
fn duplicate_name_never_reaches_the_provider() {
    let h = harness();
    h.service.create::<KeyPairKind>(&h.ctx, key("key-01")).unwrap();

    let err = h
        .service
        .create::<KeyPairKind>(&h.ctx, key("key-01"))
        .unwrap_err();
    assert!(matches!(err, ControlError::AlreadyExists { .. }));
    assert_eq!(h.driver.create_calls(ResourceType::KeyPair), 1);
    assert_eq!(h.driver.live_count(ResourceType::KeyPair), 1);
}

#[test]
fn created_resource_reads_back_under_caller_name() {
    let h = harness();
    let created = h.service.create::<DiskKind>(&h.ctx, disk("data-01")).unwrap();
    assert_eq!(created.iid.name_id, "data-01");

    let fetched = h.service.get::<DiskKind>(&h.ctx, None, "data-01").unwrap();
    assert_eq!(fetched.iid, created.iid);
    assert_eq!(fetched.disk_size, "100");

    let listed = h.service.list::<DiskKind>(&h.ctx).unwrap();
    assert_eq!(names(listed.iter().map(|d| &d.iid)), vec!["data-01"]);
}

#[test]
fn driver_sees_generated_names_unless_disabled() {
    let h = harness();
    h.service.create::<KeyPairKind>(&h.ctx, key("key-01")).unwrap();
    let record = h
        .store
        .get_by_name("aws-east", &TypeKey::Top(ResourceType::KeyPair), "key-01")
        .unwrap();
    assert_ne!(record.driver_iid().name_id, "key-01");
    assert!(record.driver_iid().name_id.starts_with("key-01-"));

    let plain = harness_with(
        MockConnection::new("aws"),
        ControlConfig {
            id_transform: false,
            ..ControlConfig::default()
        },
    );
    plain.service.create::<KeyPairKind>(&plain.ctx, key("key-01")).unwrap();
    let record = plain
        .store
        .get_by_name("aws-east", &TypeKey::Top(ResourceType::KeyPair), "key-01")
        .unwrap();
    assert_eq!(record.driver_iid().name_id, "key-01");
}

#[test]
fn invalid_names_are_rejected_before_the_provider() {
    let h = harness();
    let err = h.service.create::<KeyPairKind>(&h.ctx, key("")).unwrap_err();
    assert!(matches!(err, ControlError::Validation(_)));
    assert_eq!(h.driver.create_calls(ResourceType::KeyPair), 0);
}

#[test]
fn private_key_is_returned_on_create_only() {
    let h = harness();
    let created = h.service.create::<KeyPairKind>(&h.ctx, key("key-01")).unwrap();
    assert!(!created.private_key.is_empty());

    let fetched = h.service.get::<KeyPairKind>(&h.ctx, None, "key-01").unwrap();
    assert!(fetched.private_key.is_empty());
    assert_eq!(fetched.fingerprint, created.fingerprint);
}

#[test]
fn concurrent_creates_of_one_name_yield_one_resource() {
    let h = harness();
    let results: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| s.spawn(|| h.service.create::<KeyPairKind>(&h.ctx, key("shared"))))
            .collect();
        handles.into_iter().map(|t| t.join().unwrap()).collect()
    });

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, ControlError::AlreadyExists { .. })));
    assert_eq!(h.driver.create_calls(ResourceType::KeyPair), 1);
    assert_eq!(h.service.count(ResourceType::KeyPair, Some("aws-east")).unwrap(), 1);
}

#[test]
fn concurrent_creates_of_distinct_names_all_succeed() {
    for n in [1, 8, 32] {
        let h = harness();
        let results: Vec<_> = std::thread::scope(|s| {
            let h = &h;
            let handles: Vec<_> = (0..n)
                .map(|i| {
                    s.spawn(move || h.service.create::<KeyPairKind>(&h.ctx, key(&format!("key-{i}"))))
                })
                .collect();
            handles.into_iter().map(|t| t.join().unwrap()).collect()
        });

        assert!(results.iter().all(Result::is_ok), "n = {n}");
        assert_eq!(h.service.list::<KeyPairKind>(&h.ctx).unwrap().len(), n);
    }
}

#[test]
fn concurrent_vm_creates_of_distinct_names_all_succeed() {
    for n in [1, 8, 32] {
        let h = harness();
        network(&h);
        let results: Vec<_> = std::thread::scope(|s| {
            let h = &h;
            let handles: Vec<_> = (0..n)
                .map(|i| s.spawn(move || h.service.create::<VmKind>(&h.ctx, vm(&format!("vm-{i}")))))
                .collect();
            handles.into_iter().map(|t| t.join().unwrap()).collect()
        });

        assert!(results.iter().all(Result::is_ok), "n = {n}");
        assert_eq!(h.service.list::<VmKind>(&h.ctx).unwrap().len(), n);
    }
}

#[test]
fn racing_vm_creates_leave_one_vm() {
    let h = harness();
    network(&h);
    let results: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| s.spawn(|| h.service.create::<VmKind>(&h.ctx, vm("vm-01"))))
            .collect();
        handles.into_iter().map(|t| t.join().unwrap()).collect()
    });

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(h.driver.live_count(ResourceType::Vm), 1);
    assert_eq!(h.service.count(ResourceType::Vm, None).unwrap(), 1);
}

// =============================================================================
// Rollback
// =============================================================================

#[test]
fn failed_tracking_deletes_the_provider_resource() {
    let h = harness();
    h.store.fail_create_after(0);

    let err = h
        .service
        .create::<KeyPairKind>(&h.ctx, key("key-01"))
        .unwrap_err();
    assert!(matches!(err, ControlError::Store(_)));
    assert_eq!(h.driver.create_calls(ResourceType::KeyPair), 1);
    assert_eq!(h.driver.delete_calls(ResourceType::KeyPair), 1);
    assert_eq!(h.driver.live_count(ResourceType::KeyPair), 0);
    assert_eq!(h.service.count(ResourceType::KeyPair, None).unwrap(), 0);
}

#[test]
fn failed_compensation_is_reported_with_the_original_error() {
    let h = harness();
    h.store.fail_create_after(0);
    h.driver.inject(Fault::DeclineDelete(ResourceType::Disk));

    let err = h.service.create::<DiskKind>(&h.ctx, disk("data-01")).unwrap_err();
    match err {
        ControlError::RollbackFailure {
            original,
            compensation,
        } => {
            assert!(matches!(*original, ControlError::Store(_)));
            assert!(compensation.contains("declined"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(h.driver.live_count(ResourceType::Disk), 1);
}

#[test]
fn failed_child_tracking_undoes_the_whole_create() {
    let h = harness();
    // parent record and first subnet succeed, second subnet fails
    h.store.fail_create_after(2);

    let err = h
        .service
        .create::<VpcKind>(&h.ctx, vpc("vpc-01", &["sub-01", "sub-02"]))
        .unwrap_err();
    assert!(matches!(err, ControlError::Store(_)));
    assert_eq!(h.driver.live_count(ResourceType::Vpc), 0);
    assert_eq!(h.service.count(ResourceType::Vpc, None).unwrap(), 0);
    assert_eq!(h.service.count(ResourceType::Subnet, None).unwrap(), 0);
}

#[test]
fn provider_create_failure_tracks_nothing() {
    let h = harness();
    h.driver.inject(Fault::FailCreate(ResourceType::Vpc));

    let err = h
        .service
        .create::<VpcKind>(&h.ctx, vpc("vpc-01", &["sub-01"]))
        .unwrap_err();
    assert!(matches!(err, ControlError::Provider(_)));
    assert_eq!(h.service.count(ResourceType::Vpc, None).unwrap(), 0);
    assert_eq!(h.service.count(ResourceType::Subnet, None).unwrap(), 0);
}

#[test]
fn failed_untracking_recreates_the_resource() {
    let h = harness();
    let created = h.service.create::<DiskKind>(&h.ctx, disk("data-01")).unwrap();
    h.store.fail_next_delete();

    let err = h
        .service
        .delete::<DiskKind>(&h.ctx, None, "data-01", false)
        .unwrap_err();
    assert_eq!(h.driver.create_calls(ResourceType::Disk), 2);
    assert_eq!(h.driver.live_count(ResourceType::Disk), 1);
    assert_eq!(h.service.count(ResourceType::Disk, None).unwrap(), 1);

    // the provider hands out a new id, so the record is stale and must say so
    match err {
        ControlError::RollbackFailure {
            original,
            compensation,
        } => {
            assert!(matches!(*original, ControlError::Store(_)));
            assert!(compensation.contains(&created.iid.system_id));
        }
        other => panic!("unexpected error: {other}"),
    }
    let err = h.service.list::<DiskKind>(&h.ctx).unwrap_err();
    assert!(matches!(err, ControlError::ConsistencyMismatch { .. }));
}

#[test]
fn failed_recreate_is_a_rollback_failure() {
    let h = harness();
    h.service.create::<VpcKind>(&h.ctx, vpc("vpc-01", &["sub-01"])).unwrap();
    h.store.fail_next_delete();
    h.driver.inject(Fault::FailCreate(ResourceType::Vpc));

    let err = h
        .service
        .delete::<VpcKind>(&h.ctx, None, "vpc-01", false)
        .unwrap_err();
    assert!(matches!(err, ControlError::RollbackFailure { .. }));
    assert_eq!(h.driver.live_count(ResourceType::Vpc), 0);
}

// =============================================================================
// Delete
// =============================================================================

#[test]
fn declined_delete_keeps_the_record() {
    let h = harness();
    h.service.create::<KeyPairKind>(&h.ctx, key("key-01")).unwrap();
    h.driver.inject(Fault::DeclineDelete(ResourceType::KeyPair));

    assert!(!h.service.delete::<KeyPairKind>(&h.ctx, None, "key-01", false).unwrap());
    assert!(h.service.get::<KeyPairKind>(&h.ctx, None, "key-01").is_ok());

    assert!(h.service.delete::<KeyPairKind>(&h.ctx, None, "key-01", false).unwrap());
    let err = h.service.get::<KeyPairKind>(&h.ctx, None, "key-01").unwrap_err();
    assert!(matches!(err, ControlError::NotFound { .. }));
}

#[test]
fn force_delete_drops_the_record_despite_provider_errors() {
    let h = harness();
    h.service.create::<KeyPairKind>(&h.ctx, key("key-01")).unwrap();

    h.driver.inject(Fault::FailDelete(ResourceType::KeyPair));
    let err = h
        .service
        .delete::<KeyPairKind>(&h.ctx, None, "key-01", false)
        .unwrap_err();
    assert!(matches!(err, ControlError::Provider(_)));
    assert_eq!(h.service.count(ResourceType::KeyPair, None).unwrap(), 1);

    h.driver.inject(Fault::FailDelete(ResourceType::KeyPair));
    h.service
        .delete::<KeyPairKind>(&h.ctx, None, "key-01", true)
        .unwrap();
    assert_eq!(h.service.count(ResourceType::KeyPair, None).unwrap(), 0);
}

#[test]
fn deleting_a_vpc_drops_its_subnet_records() {
    let h = harness();
    h.service
        .create::<VpcKind>(&h.ctx, vpc("vpc-01", &["sub-01", "sub-02"]))
        .unwrap();
    assert_eq!(h.service.count(ResourceType::Subnet, None).unwrap(), 2);

    assert!(h.service.delete::<VpcKind>(&h.ctx, None, "vpc-01", false).unwrap());
    assert_eq!(h.service.count(ResourceType::Subnet, None).unwrap(), 0);
    assert_eq!(h.driver.live_count(ResourceType::Vpc), 0);
}

#[test]
fn unknown_name_is_not_found() {
    let h = harness();
    let err = h
        .service
        .delete::<DiskKind>(&h.ctx, None, "nope", false)
        .unwrap_err();
    assert!(matches!(err, ControlError::NotFound { .. }));
    assert_eq!(h.driver.delete_calls(ResourceType::Disk), 0);
}

// =============================================================================
// Reconciliation
// =============================================================================

#[test]
fn out_of_band_deletion_is_a_mismatch() {
    let h = harness();
    let a = h.service.create::<DiskKind>(&h.ctx, disk("data-01")).unwrap();
    h.service.create::<DiskKind>(&h.ctx, disk("data-02")).unwrap();
    assert!(h.driver.remove_out_of_band(ResourceType::Disk, &a.iid.system_id));

    let err = h.service.list::<DiskKind>(&h.ctx).unwrap_err();
    match err {
        ControlError::ConsistencyMismatch {
            resource_type,
            detail,
        } => {
            assert_eq!(resource_type, ResourceType::Disk);
            assert!(detail.contains(&a.iid.system_id));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(h.service.get::<DiskKind>(&h.ctx, None, "data-01").is_err());
}

#[test]
fn removed_subnet_makes_the_vpc_inconsistent() {
    let h = harness();
    let created = h
        .service
        .create::<VpcKind>(&h.ctx, vpc("vpc-01", &["sub-01"]))
        .unwrap();
    h.driver
        .remove_out_of_band(ResourceType::Subnet, &created.subnets[0].iid.system_id);

    let err = h.service.get::<VpcKind>(&h.ctx, None, "vpc-01").unwrap_err();
    assert!(matches!(
        err,
        ControlError::ConsistencyMismatch {
            resource_type: ResourceType::Subnet,
            ..
        }
    ));
}

#[test]
fn list_all_reports_both_sides_of_a_divergence() {
    let h = harness();
    let gone = h.service.create::<DiskKind>(&h.ctx, disk("data-01")).unwrap();
    let kept = h.service.create::<DiskKind>(&h.ctx, disk("data-02")).unwrap();
    h.driver.remove_out_of_band(ResourceType::Disk, &gone.iid.system_id);
    h.driver.insert_out_of_band(ResourceType::Disk, "vol-console");

    let all = h.service.list_all::<DiskKind>(&h.ctx).unwrap();
    assert_eq!(all.mapped, vec![kept.iid]);
    assert_eq!(all.only_tracked, vec![gone.iid]);
    assert_eq!(all.only_provider, vec!["vol-console".to_string()]);
}

#[test]
fn empty_catalog_lists_without_asking_the_provider() {
    let h = harness();
    h.driver.inject(Fault::FailList(ResourceType::Nlb));
    assert!(h.service.list::<NlbKind>(&h.ctx).unwrap().is_empty());
}

// =============================================================================
// Register / unregister
// =============================================================================

#[test]
fn register_tracks_an_existing_resource_without_creating() {
    let h = harness();
    h.driver.insert_out_of_band(ResourceType::Disk, "vol-console");

    h.service
        .register::<DiskKind>(&h.ctx, None, Iid::new("imported", "vol-console"))
        .unwrap();
    assert_eq!(h.driver.create_calls(ResourceType::Disk), 0);

    let fetched = h.service.get::<DiskKind>(&h.ctx, None, "imported").unwrap();
    assert_eq!(fetched.iid, Iid::new("imported", "vol-console"));
    assert!(h.service.list_all::<DiskKind>(&h.ctx).unwrap().only_provider.is_empty());

    assert!(h.service.unregister::<DiskKind>(&h.ctx, None, "imported").unwrap());
    assert_eq!(h.driver.live_count(ResourceType::Disk), 1);
    assert_eq!(h.driver.delete_calls(ResourceType::Disk), 0);
}

#[test]
fn subnets_can_be_unregistered_and_registered_again() {
    let h = harness();
    let created = h
        .service
        .create::<VpcKind>(&h.ctx, vpc("vpc-01", &["sub-01"]))
        .unwrap();
    let subnet_id = created.subnets[0].iid.system_id.clone();

    assert!(h.service.unregister_subnet(&h.ctx, "vpc-01", "sub-01").unwrap());
    let view = h.service.get::<VpcKind>(&h.ctx, None, "vpc-01").unwrap();
    assert!(view.subnets.is_empty());

    h.service
        .register_subnet(&h.ctx, "vpc-01", Iid::new("sub-renamed", subnet_id))
        .unwrap();
    let view = h.service.get::<VpcKind>(&h.ctx, None, "vpc-01").unwrap();
    assert_eq!(names(view.subnets.iter().map(|s| &s.iid)), vec!["sub-renamed"]);
}

#[test]
fn provider_resources_are_deleted_by_id_only_when_untracked() {
    let h = harness();
    let tracked = h.service.create::<DiskKind>(&h.ctx, disk("data-01")).unwrap();
    h.driver.insert_out_of_band(ResourceType::Disk, "vol-console");

    let err = h
        .service
        .delete_provider_resource::<DiskKind>(&h.ctx, &tracked.iid.system_id)
        .unwrap_err();
    assert!(matches!(err, ControlError::Validation(_)));

    assert!(h
        .service
        .delete_provider_resource::<DiskKind>(&h.ctx, "vol-console")
        .unwrap());
    assert_eq!(h.driver.live_count(ResourceType::Disk), 1);
}

// =============================================================================
// Capabilities
// =============================================================================

#[test]
fn unsupported_type_fails_without_provider_calls() {
    let h = harness_with(
        MockConnection::new("aws").without(ResourceType::Nlb),
        ControlConfig::default(),
    );
    let err = h
        .service
        .create::<NlbKind>(
            &h.ctx,
            NlbReqInfo {
                iid: Iid::named("nlb-01"),
                ..NlbReqInfo::default()
            },
        )
        .unwrap_err();
    assert!(matches!(
        err,
        ControlError::Unsupported {
            resource_type: ResourceType::Nlb,
            ..
        }
    ));
    assert!(h.service.list::<NlbKind>(&h.ctx).is_err());
    assert!(h
        .service
        .register::<NlbKind>(&h.ctx, None, Iid::new("nlb-01", "nlb-x"))
        .is_err());
}

#[test]
fn single_vpc_providers_reject_a_second_vpc() {
    let h = harness_with(
        MockConnection::new("gcp").with_capabilities(DriverCapabilities { single_vpc: true }),
        ControlConfig::default(),
    );
    h.service.create::<VpcKind>(&h.ctx, vpc("vpc-01", &["sub-01"])).unwrap();

    let err = h
        .service
        .create::<VpcKind>(&h.ctx, vpc("vpc-02", &["sub-01"]))
        .unwrap_err();
    assert!(matches!(err, ControlError::Validation(_)));
    assert_eq!(h.driver.create_calls(ResourceType::Vpc), 1);
}

// =============================================================================
// Naming
// =============================================================================

#[test]
fn security_group_names_are_scoped_by_vpc() {
    let h = harness();
    h.service.create::<VpcKind>(&h.ctx, vpc("vpc-01", &["sub-01"])).unwrap();
    h.service.create::<VpcKind>(&h.ctx, vpc("vpc-02", &["sub-01"])).unwrap();
    h.service
        .create::<SecurityGroupKind>(&h.ctx, security_group("vpc-01", "web"))
        .unwrap();
    h.service
        .create::<SecurityGroupKind>(&h.ctx, security_group("vpc-02", "web"))
        .unwrap();

    let sg = h
        .service
        .get::<SecurityGroupKind>(&h.ctx, Some("vpc-02"), "web")
        .unwrap();
    assert_eq!(sg.iid.name_id, "web");
    assert_eq!(sg.vpc_iid.name_id, "vpc-02");

    let err = h
        .service
        .get::<SecurityGroupKind>(&h.ctx, None, "web")
        .unwrap_err();
    assert!(matches!(err, ControlError::Validation(_)));

    h.service
        .delete::<SecurityGroupKind>(&h.ctx, Some("vpc-01"), "web", false)
        .unwrap();
    let sg = h
        .service
        .get::<SecurityGroupKind>(&h.ctx, None, "web")
        .unwrap();
    assert_eq!(sg.vpc_iid.name_id, "vpc-02");
}

#[test]
fn security_group_needs_a_vpc() {
    let h = harness();
    let err = h
        .service
        .create::<SecurityGroupKind>(&h.ctx, security_group("", "web"))
        .unwrap_err();
    assert!(matches!(err, ControlError::Validation(_)));
    assert_eq!(h.driver.create_calls(ResourceType::SecurityGroup), 0);
}

#[test]
fn namespaces_share_a_connection_without_seeing_each_other() {
    let h = harness();
    let tenant_a = CallContext::with_namespace("aws-east", "tenantA").unwrap();
    let tenant_b = CallContext::with_namespace("aws-east", "tenantB").unwrap();

    let a = h.service.create::<KeyPairKind>(&tenant_a, key("key-01")).unwrap();
    let b = h.service.create::<KeyPairKind>(&tenant_b, key("key-01")).unwrap();
    assert_eq!(a.iid.name_id, "key-01");
    assert_ne!(a.iid.system_id, b.iid.system_id);

    let listed = h.service.list::<KeyPairKind>(&tenant_a).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].iid, a.iid);

    let all = h.service.list_all::<KeyPairKind>(&tenant_a).unwrap();
    assert_eq!(all.mapped, vec![a.iid.clone()]);
    assert!(all.only_provider.is_empty());

    assert_eq!(h.service.count(ResourceType::KeyPair, Some("aws-east")).unwrap(), 2);
    assert!(h.service.delete::<KeyPairKind>(&tenant_b, None, "key-01", false).unwrap());
    assert!(h.service.get::<KeyPairKind>(&tenant_a, None, "key-01").is_ok());
}

// =============================================================================
// VMs and attachments
// =============================================================================

#[test]
fn vm_references_are_resolved_and_overlaid() {
    let h = harness();
    network(&h);

    let created = h.service.create::<VmKind>(&h.ctx, vm("vm-01")).unwrap();
    assert_eq!(created.iid.name_id, "vm-01");
    assert_eq!(created.vpc_iid.name_id, "vpc-01");
    assert_eq!(created.subnet_iid.name_id, "sub-01");
    assert_eq!(names(&created.security_group_iids), vec!["web"]);
    assert_eq!(created.key_pair_iid.name_id, "key-01");
    assert_eq!(created.image_iid, Iid::new("ami-ubuntu-22", "ami-ubuntu-22"));

    let fetched = h.service.get::<VmKind>(&h.ctx, None, "vm-01").unwrap();
    assert_eq!(fetched.subnet_iid, created.subnet_iid);
    assert_eq!(fetched.security_group_iids, created.security_group_iids);
}

#[test]
fn created_vm_whose_view_fails_is_reported_as_created() {
    let h = harness();
    network(&h);
    h.store.fail_next_lookup_by_system_id();

    let err = h.service.create::<VmKind>(&h.ctx, vm("vm-01")).unwrap_err();
    match err {
        ControlError::ConsistencyMismatch {
            resource_type,
            detail,
        } => {
            assert_eq!(resource_type, ResourceType::Vm);
            assert!(detail.contains("was created"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(h.driver.live_count(ResourceType::Vm), 1);
    let fetched = h.service.get::<VmKind>(&h.ctx, None, "vm-01").unwrap();
    assert_eq!(fetched.key_pair_iid.name_id, "key-01");
}

#[test]
fn vm_with_untracked_reference_is_not_created() {
    let h = harness();
    network(&h);
    let req = VmReqInfo {
        key_pair_iid: Iid::named("missing-key"),
        ..vm("vm-01")
    };
    let err = h.service.create::<VmKind>(&h.ctx, req).unwrap_err();
    assert!(matches!(
        err,
        ControlError::NotFound {
            resource_type: ResourceType::KeyPair,
            ..
        }
    ));
    assert_eq!(h.driver.create_calls(ResourceType::Vm), 0);
}

#[test]
fn vm_power_control_and_status() {
    let h = harness();
    network(&h);
    h.service.create::<VmKind>(&h.ctx, vm("vm-01")).unwrap();

    assert_eq!(
        h.service.control_vm(&h.ctx, "vm-01", VmAction::Suspend).unwrap(),
        VmStatus::Suspended
    );
    assert_eq!(h.service.get_vm_status(&h.ctx, "vm-01").unwrap(), VmStatus::Suspended);

    let statuses = h.service.list_vm_status(&h.ctx).unwrap();
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].iid.name_id, "vm-01");
    assert_eq!(statuses[0].status, VmStatus::Suspended);

    assert!(h.service.control_vm(&h.ctx, "vm-01", VmAction::Suspend).is_err());
    assert!(h.service.delete::<VmKind>(&h.ctx, None, "vm-01", false).unwrap());
    assert_eq!(h.driver.live_count(ResourceType::Vm), 0);
}

#[test]
fn disks_attach_to_vms_by_name() {
    let h = harness();
    network(&h);
    h.service.create::<VmKind>(&h.ctx, vm("vm-01")).unwrap();
    h.service.create::<DiskKind>(&h.ctx, disk("data-01")).unwrap();

    let attached = h.service.attach_disk(&h.ctx, "data-01", "vm-01").unwrap();
    assert_eq!(attached.iid.name_id, "data-01");
    assert_eq!(attached.owner_vm.name_id, "vm-01");

    assert!(h.service.detach_disk(&h.ctx, "data-01", "vm-01").unwrap());
    let fetched = h.service.get::<DiskKind>(&h.ctx, None, "data-01").unwrap();
    assert!(fetched.owner_vm.system_id.is_empty());
}

#[test]
fn security_rules_are_added_and_removed() {
    let h = harness();
    network(&h);
    let https = SecurityRule {
        from_port: "443".to_string(),
        to_port: "443".to_string(),
        ..ssh_rule()
    };

    let sg = h
        .service
        .add_rules(&h.ctx, Some("vpc-01"), "web", vec![https.clone()])
        .unwrap();
    assert_eq!(sg.iid.name_id, "web");
    assert_eq!(sg.rules.len(), 2);

    assert!(h.service.remove_rules(&h.ctx, None, "web", vec![https]).unwrap());
    let sg = h
        .service
        .get::<SecurityGroupKind>(&h.ctx, Some("vpc-01"), "web")
        .unwrap();
    assert_eq!(sg.rules, vec![ssh_rule()]);
}

#[test]
fn load_balancer_members_are_named() {
    let h = harness();
    network(&h);
    h.service.create::<VmKind>(&h.ctx, vm("vm-01")).unwrap();
    h.service.create::<VmKind>(&h.ctx, vm("vm-02")).unwrap();
    h.service
        .create::<NlbKind>(
            &h.ctx,
            NlbReqInfo {
                iid: Iid::named("nlb-01"),
                vpc_iid: Iid::named("vpc-01"),
                listener_protocol: "TCP".to_string(),
                listener_port: "80".to_string(),
                target_port: "8080".to_string(),
                vm_iids: vec![Iid::named("vm-01")],
            },
        )
        .unwrap();

    let nlb = h
        .service
        .add_vms(&h.ctx, "nlb-01", &["vm-02".to_string()])
        .unwrap();
    assert_eq!(names(&nlb.vm_iids), vec!["vm-01", "vm-02"]);
    assert_eq!(nlb.vpc_iid.name_id, "vpc-01");

    assert!(h
        .service
        .remove_vms(&h.ctx, "nlb-01", &["vm-01".to_string()])
        .unwrap());
    let nlb = h.service.get::<NlbKind>(&h.ctx, None, "nlb-01").unwrap();
    assert_eq!(names(&nlb.vm_iids), vec!["vm-02"]);
}

// =============================================================================
// Clusters
// =============================================================================

fn node_group(name: &str) -> NodeGroupInfo {
    NodeGroupInfo {
        iid: Iid::named(name),
        spec_name: "m5.large".to_string(),
        key_pair_iid: Iid::named("key-01"),
        on_auto_scaling: true,
        desired_node_size: 2,
        min_node_size: 1,
        max_node_size: 3,
    }
}

#[test]
fn cluster_node_groups_are_tracked_as_children() {
    let h = harness();
    network(&h);
    let cluster = h
        .service
        .create::<ClusterKind>(
            &h.ctx,
            ClusterReqInfo {
                iid: Iid::named("k8s-01"),
                version: "1.30".to_string(),
                vpc_iid: Iid::named("vpc-01"),
                subnet_iids: vec![Iid::named("sub-01")],
                security_group_iids: vec![Iid::named("web")],
                node_groups: vec![node_group("ng-01")],
            },
        )
        .unwrap();
    assert_eq!(names(cluster.node_groups.iter().map(|n| &n.iid)), vec!["ng-01"]);
    assert_eq!(names(&cluster.subnet_iids), vec!["sub-01"]);
    assert_eq!(cluster.node_groups[0].key_pair_iid.name_id, "key-01");

    let added = h
        .service
        .add_node_group(&h.ctx, "k8s-01", node_group("ng-02"))
        .unwrap();
    assert_eq!(added.iid.name_id, "ng-02");
    assert_eq!(added.key_pair_iid.name_id, "key-01");

    let scaled = h
        .service
        .change_node_group_scaling(&h.ctx, "k8s-01", "ng-02", 4, 2, 5)
        .unwrap();
    assert_eq!(scaled.desired_node_size, 4);
    assert!(h
        .service
        .change_node_group_scaling(&h.ctx, "k8s-01", "ng-02", 9, 2, 5)
        .is_err());

    assert!(h.service.remove_node_group(&h.ctx, "k8s-01", "ng-01").unwrap());
    let cluster = h.service.get::<ClusterKind>(&h.ctx, None, "k8s-01").unwrap();
    assert_eq!(names(cluster.node_groups.iter().map(|n| &n.iid)), vec!["ng-02"]);
    assert_eq!(h.service.count(ResourceType::NodeGroup, None).unwrap(), 1);
}

#[test]
fn failed_child_add_tracks_nothing() {
    let h = harness();
    h.service.create::<VpcKind>(&h.ctx, vpc("vpc-01", &["sub-01"])).unwrap();
    h.driver.inject(Fault::FailAddChild(ResourceType::Subnet));

    let err = h
        .service
        .add_subnet(
            &h.ctx,
            "vpc-01",
            SubnetInfo {
                iid: Iid::named("sub-02"),
                zone: String::new(),
                ipv4_cidr: "10.0.9.0/24".to_string(),
            },
        )
        .unwrap_err();
    assert!(matches!(err, ControlError::Provider(_)));
    assert_eq!(h.service.count(ResourceType::Subnet, None).unwrap(), 1);
}
