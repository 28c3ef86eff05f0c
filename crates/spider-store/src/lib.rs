//! `RocksDB` identity store for the spider control plane.
//!
//! This crate persists the mapping between caller-facing names and
//! provider-assigned ids for every tracked resource, partitioned by
//! connection and catalog.
//!
//! # Architecture
//!
//! The storage uses the following column families:
//!
//! - `iids`: Identity records, keyed by `connection || type key || name`
//! - `iids_by_system_id`: Index from provider id to stored name within a catalog
//!
//! Within one catalog a name is unique and a provider id is bound to at most
//! one name.
//!
//! # Example
//!
//! ```no_run
//! use spider_core::{Iid, ResourceType, TypeKey};
//! use spider_store::{IidRecord, RocksStore, Store};
//!
//! let store = RocksStore::open("/tmp/spider-db").unwrap();
//!
//! let kind = TypeKey::Top(ResourceType::Vpc);
//! let record = IidRecord::new("aws-us-east-1", kind.clone(), Iid::new("vpc-01", "vpc-0a1b"));
//! store.create(&record).unwrap();
//!
//! let found = store.get_by_system_id("aws-us-east-1", &kind, "vpc-0a1b").unwrap();
//! assert_eq!(found.iid.name_id, "vpc-01");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod rocks;
pub mod schema;
pub mod types;

pub use error::{Result, StoreError};
pub use rocks::RocksStore;
pub use types::IidRecord;

use spider_core::{ResourceType, TypeKey};

/// The storage trait defining all identity catalog operations.
///
/// This trait abstracts the storage layer, allowing for different implementations
/// (e.g., `RocksDB`, fault-injecting wrappers in tests).
pub trait Store: Send + Sync {
    // =========================================================================
    // Lookup
    // =========================================================================

    /// Check whether a name is tracked in a catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn is_exist(&self, connection: &str, kind: &TypeKey, name_id: &str) -> Result<bool>;

    /// Get a record by its stored name.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the name is not tracked.
    fn get_by_name(&self, connection: &str, kind: &TypeKey, name_id: &str) -> Result<IidRecord>;

    /// Get a record by its provider id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the provider id is not tracked.
    fn get_by_system_id(
        &self,
        connection: &str,
        kind: &TypeKey,
        system_id: &str,
    ) -> Result<IidRecord>;

    /// List all records of a catalog, ordered by stored name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list(&self, connection: &str, kind: &TypeKey) -> Result<Vec<IidRecord>>;

    /// List records whose stored name contains `keyword`.
    ///
    /// Used for composite names when the caller only knows the child part.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn find_by_partial_name(
        &self,
        connection: &str,
        kind: &TypeKey,
        keyword: &str,
    ) -> Result<Vec<IidRecord>>;

    /// Count records of a type, across all connections or within one.
    ///
    /// Child records are counted under their child type.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn count(&self, resource_type: ResourceType, connection: Option<&str>) -> Result<u64>;

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Insert a new record.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::AlreadyExists` if the name is taken and
    /// `StoreError::InvalidRecord` if a field is empty or the provider id is
    /// already tracked under another name.
    fn create(&self, record: &IidRecord) -> Result<()>;

    /// Delete a record by its stored name.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the name is not tracked.
    fn delete(&self, connection: &str, kind: &TypeKey, name_id: &str) -> Result<()>;

    /// Delete every record of a catalog, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn delete_all(&self, connection: &str, kind: &TypeKey) -> Result<usize>;
}
