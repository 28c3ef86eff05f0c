//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded,
    Options, WriteBatch,
};
use spider_core::{ResourceType, TypeKey};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::types::IidRecord;
use crate::Store;

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    /// Serialises check-then-write sequences.
    write_lock: Mutex<()>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Mutex::new(()),
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn get_record(&self, key: &[u8]) -> Result<Option<IidRecord>> {
        let cf = self.cf(cf::IIDS)?;
        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    /// Decode every record whose key starts with `prefix`.
    fn scan(&self, prefix: &[u8]) -> Result<Vec<IidRecord>> {
        let cf = self.cf(cf::IIDS)?;
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(prefix, rocksdb::Direction::Forward));

        let mut records = Vec::new();
        for item in iter {
            let (key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;

            // Stop if we're past the prefix
            if !key.starts_with(prefix) {
                break;
            }

            records.push(Self::deserialize(&value)?);
        }

        Ok(records)
    }

    fn validate(record: &IidRecord) -> Result<()> {
        if record.connection.is_empty() {
            return Err(StoreError::InvalidRecord(
                "connection must not be empty".to_string(),
            ));
        }
        if record.iid.name_id.is_empty() {
            return Err(StoreError::InvalidRecord("NameId must not be empty".to_string()));
        }
        if record.iid.system_id.is_empty() {
            return Err(StoreError::InvalidRecord(format!(
                "SystemId must not be empty for '{}'",
                record.iid.name_id
            )));
        }
        keys::check_component("connection", &record.connection)?;
        keys::check_kind(&record.kind)?;
        keys::check_component("NameId", &record.iid.name_id)?;
        keys::check_component("SystemId", &record.iid.system_id)
    }
}

impl Store for RocksStore {
    // =========================================================================
    // Lookup
    // =========================================================================

    fn is_exist(&self, connection: &str, kind: &TypeKey, name_id: &str) -> Result<bool> {
        let cf = self.cf(cf::IIDS)?;
        let key = keys::record_key(connection, kind, name_id);

        let found = self
            .db
            .get_pinned_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(found.is_some())
    }

    fn get_by_name(&self, connection: &str, kind: &TypeKey, name_id: &str) -> Result<IidRecord> {
        let key = keys::record_key(connection, kind, name_id);
        self.get_record(&key)?.ok_or(StoreError::NotFound)
    }

    fn get_by_system_id(
        &self,
        connection: &str,
        kind: &TypeKey,
        system_id: &str,
    ) -> Result<IidRecord> {
        let cf_by_system = self.cf(cf::IIDS_BY_SYSTEM_ID)?;
        let key = keys::system_key(connection, kind, system_id);

        let name = self
            .db
            .get_cf(&cf_by_system, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .ok_or(StoreError::NotFound)?;
        let name = String::from_utf8(name).map_err(|e| StoreError::Serialization(e.to_string()))?;

        self.get_by_name(connection, kind, &name)
    }

    fn list(&self, connection: &str, kind: &TypeKey) -> Result<Vec<IidRecord>> {
        self.scan(&keys::catalog_prefix(connection, kind))
    }

    fn find_by_partial_name(
        &self,
        connection: &str,
        kind: &TypeKey,
        keyword: &str,
    ) -> Result<Vec<IidRecord>> {
        let mut records = self.list(connection, kind)?;
        records.retain(|r| r.iid.name_id.contains(keyword));
        Ok(records)
    }

    fn count(&self, resource_type: ResourceType, connection: Option<&str>) -> Result<u64> {
        let prefix = connection.map(keys::connection_prefix).unwrap_or_default();
        let count = self
            .scan(&prefix)?
            .iter()
            .filter(|r| r.kind.resource_type() == resource_type)
            .count();
        Ok(u64::try_from(count).unwrap_or(u64::MAX))
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    fn create(&self, record: &IidRecord) -> Result<()> {
        Self::validate(record)?;

        let cf_iids = self.cf(cf::IIDS)?;
        let cf_by_system = self.cf(cf::IIDS_BY_SYSTEM_ID)?;

        let record_key = keys::record_key(&record.connection, &record.kind, &record.iid.name_id);
        let system_key = keys::system_key(&record.connection, &record.kind, &record.iid.system_id);
        let value = Self::serialize(record)?;

        let _guard = self.write_lock.lock();

        if self.get_record(&record_key)?.is_some() {
            return Err(StoreError::AlreadyExists(record.iid.name_id.clone()));
        }
        if let Some(owner) = self
            .db
            .get_cf(&cf_by_system, &system_key)
            .map_err(|e| StoreError::Database(e.to_string()))?
        {
            return Err(StoreError::InvalidRecord(format!(
                "SystemId '{}' is already tracked as '{}'",
                record.iid.system_id,
                String::from_utf8_lossy(&owner)
            )));
        }

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_iids, &record_key, &value);
        batch.put_cf(&cf_by_system, &system_key, record.iid.name_id.as_bytes());

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::debug!(
            connection = %record.connection,
            kind = %record.kind,
            name = %record.iid.name_id,
            system_id = %record.iid.system_id,
            "Inserted identity record"
        );
        Ok(())
    }

    fn delete(&self, connection: &str, kind: &TypeKey, name_id: &str) -> Result<()> {
        let cf_iids = self.cf(cf::IIDS)?;
        let cf_by_system = self.cf(cf::IIDS_BY_SYSTEM_ID)?;
        let record_key = keys::record_key(connection, kind, name_id);

        let _guard = self.write_lock.lock();

        let record = self.get_record(&record_key)?.ok_or(StoreError::NotFound)?;
        let system_key = keys::system_key(connection, kind, &record.iid.system_id);

        let mut batch = WriteBatch::default();
        batch.delete_cf(&cf_iids, &record_key);
        batch.delete_cf(&cf_by_system, &system_key);

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::debug!(%connection, %kind, name = %name_id, "Deleted identity record");
        Ok(())
    }

    fn delete_all(&self, connection: &str, kind: &TypeKey) -> Result<usize> {
        let cf_iids = self.cf(cf::IIDS)?;
        let cf_by_system = self.cf(cf::IIDS_BY_SYSTEM_ID)?;

        let _guard = self.write_lock.lock();

        let records = self.list(connection, kind)?;
        if records.is_empty() {
            return Ok(0);
        }

        let mut batch = WriteBatch::default();
        for record in &records {
            batch.delete_cf(
                &cf_iids,
                keys::record_key(connection, kind, &record.iid.name_id),
            );
            batch.delete_cf(
                &cf_by_system,
                keys::system_key(connection, kind, &record.iid.system_id),
            );
        }

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::debug!(%connection, %kind, count = records.len(), "Deleted identity catalog");
        Ok(records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spider_core::Iid;
    use tempfile::TempDir;

    fn create_test_store() -> (RocksStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        (store, dir)
    }

    fn vpc_record(connection: &str, name: &str, system_id: &str) -> IidRecord {
        IidRecord::new(
            connection,
            TypeKey::Top(ResourceType::Vpc),
            Iid::new(name, system_id),
        )
    }

    #[test]
    fn record_crud() {
        let (store, _dir) = create_test_store();
        let kind = TypeKey::Top(ResourceType::Vpc);
        let record = vpc_record("aws", "vpc-01", "vpc-0a1b").with_driver_name("vpc-01-abc");

        // Create
        assert!(!store.is_exist("aws", &kind, "vpc-01").unwrap());
        store.create(&record).unwrap();
        assert!(store.is_exist("aws", &kind, "vpc-01").unwrap());

        // Read
        let by_name = store.get_by_name("aws", &kind, "vpc-01").unwrap();
        assert_eq!(by_name, record);
        let by_system = store.get_by_system_id("aws", &kind, "vpc-0a1b").unwrap();
        assert_eq!(by_system.iid.name_id, "vpc-01");

        // Delete
        store.delete("aws", &kind, "vpc-01").unwrap();
        assert!(!store.is_exist("aws", &kind, "vpc-01").unwrap());
        assert!(matches!(
            store.get_by_system_id("aws", &kind, "vpc-0a1b"),
            Err(StoreError::NotFound)
        ));
        assert!(matches!(
            store.delete("aws", &kind, "vpc-01"),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn duplicate_name_rejected() {
        let (store, _dir) = create_test_store();
        store.create(&vpc_record("aws", "vpc-01", "vpc-a")).unwrap();

        let result = store.create(&vpc_record("aws", "vpc-01", "vpc-b"));
        assert!(matches!(result, Err(StoreError::AlreadyExists(name)) if name == "vpc-01"));

        // Same name in another connection is a different catalog
        store.create(&vpc_record("gcp", "vpc-01", "vpc-b")).unwrap();
    }

    #[test]
    fn duplicate_system_id_rejected() {
        let (store, _dir) = create_test_store();
        store.create(&vpc_record("aws", "vpc-01", "vpc-a")).unwrap();

        let result = store.create(&vpc_record("aws", "vpc-02", "vpc-a"));
        assert!(matches!(result, Err(StoreError::InvalidRecord(_))));
    }

    #[test]
    fn empty_fields_rejected() {
        let (store, _dir) = create_test_store();
        assert!(matches!(
            store.create(&vpc_record("aws", "", "vpc-a")),
            Err(StoreError::InvalidRecord(_))
        ));
        assert!(matches!(
            store.create(&vpc_record("aws", "vpc-01", "")),
            Err(StoreError::InvalidRecord(_))
        ));
    }

    #[test]
    fn list_is_scoped_to_catalog() {
        let (store, _dir) = create_test_store();
        store.create(&vpc_record("aws", "b", "vpc-b")).unwrap();
        store.create(&vpc_record("aws", "a", "vpc-a")).unwrap();
        store.create(&vpc_record("gcp", "c", "vpc-c")).unwrap();

        let subnets = TypeKey::child(ResourceType::Subnet, "a").unwrap();
        store
            .create(&IidRecord::new("aws", subnets.clone(), Iid::new("sub-1", "subnet-1")))
            .unwrap();

        let names: Vec<_> = store
            .list("aws", &TypeKey::Top(ResourceType::Vpc))
            .unwrap()
            .into_iter()
            .map(|r| r.iid.name_id)
            .collect();
        assert_eq!(names, vec!["a", "b"]);

        let children = store.list("aws", &subnets).unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].iid.system_id, "subnet-1");
    }

    #[test]
    fn find_by_partial_name_matches_substring() {
        let (store, _dir) = create_test_store();
        let kind = TypeKey::Top(ResourceType::SecurityGroup);
        for (name, id) in [
            ("vpc-01-delimiter-web", "sg-1"),
            ("vpc-02-delimiter-web", "sg-2"),
            ("vpc-01-delimiter-db", "sg-3"),
        ] {
            store
                .create(&IidRecord::new("aws", kind.clone(), Iid::new(name, id)))
                .unwrap();
        }

        let found = store
            .find_by_partial_name("aws", &kind, "-delimiter-web")
            .unwrap();
        assert_eq!(found.len(), 2);
        assert!(store
            .find_by_partial_name("aws", &kind, "cache")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn count_by_type_and_connection() {
        let (store, _dir) = create_test_store();
        store.create(&vpc_record("aws", "a", "vpc-a")).unwrap();
        store.create(&vpc_record("aws", "b", "vpc-b")).unwrap();
        store.create(&vpc_record("gcp", "a", "vpc-a")).unwrap();
        let subnets = TypeKey::child(ResourceType::Subnet, "a").unwrap();
        store
            .create(&IidRecord::new("aws", subnets, Iid::new("s", "subnet-1")))
            .unwrap();

        assert_eq!(store.count(ResourceType::Vpc, None).unwrap(), 3);
        assert_eq!(store.count(ResourceType::Vpc, Some("aws")).unwrap(), 2);
        assert_eq!(store.count(ResourceType::Subnet, Some("aws")).unwrap(), 1);
        assert_eq!(store.count(ResourceType::Vm, None).unwrap(), 0);
    }

    #[test]
    fn delete_all_clears_one_catalog() {
        let (store, _dir) = create_test_store();
        let subnets = TypeKey::child(ResourceType::Subnet, "vpc-01").unwrap();
        for i in 0..3 {
            store
                .create(&IidRecord::new(
                    "aws",
                    subnets.clone(),
                    Iid::new(format!("s{i}"), format!("subnet-{i}")),
                ))
                .unwrap();
        }
        store.create(&vpc_record("aws", "vpc-01", "vpc-a")).unwrap();

        assert_eq!(store.delete_all("aws", &subnets).unwrap(), 3);
        assert!(store.list("aws", &subnets).unwrap().is_empty());
        assert!(store
            .get_by_system_id("aws", &subnets, "subnet-0")
            .is_err());
        assert!(store
            .is_exist("aws", &TypeKey::Top(ResourceType::Vpc), "vpc-01")
            .unwrap());
    }

    #[test]
    fn records_survive_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = RocksStore::open(dir.path()).unwrap();
            store.create(&vpc_record("aws", "vpc-01", "vpc-a")).unwrap();
        }
        let store = RocksStore::open(dir.path()).unwrap();
        let record = store
            .get_by_system_id("aws", &TypeKey::Top(ResourceType::Vpc), "vpc-a")
            .unwrap();
        assert_eq!(record.iid.name_id, "vpc-01");
    }
}
