//! Key encoding utilities for `RocksDB`.
//!
//! Keys are `connection || 0x00 || type segment || 0x00 || last`, where `last`
//! is a stored name or a provider id. Child catalogs encode their type segment
//! as `parent_type || 0x1F || parent_name || 0x1F || child_type`, so a
//! top-level prefix scan never reaches into a child catalog.

use spider_core::TypeKey;

use crate::error::{Result, StoreError};

/// Separator between key components.
const SEP: u8 = 0x00;

/// Separator inside a child catalog's type segment.
const CHILD_SEP: u8 = 0x1F;

/// Reject values that would corrupt the key layout.
///
/// # Errors
///
/// Returns `StoreError::InvalidRecord` if the value contains a separator byte.
pub fn check_component(field: &str, value: &str) -> Result<()> {
    if value.bytes().any(|b| b == SEP || b == CHILD_SEP) {
        return Err(StoreError::InvalidRecord(format!(
            "{field} contains a reserved byte: {value:?}"
        )));
    }
    Ok(())
}

/// Check every component a type key contributes.
///
/// # Errors
///
/// Returns `StoreError::InvalidRecord` if the parent name is unusable.
pub fn check_kind(kind: &TypeKey) -> Result<()> {
    match kind.parent_name() {
        Some(parent) if parent.is_empty() => Err(StoreError::InvalidRecord(
            "parent name must not be empty".to_string(),
        )),
        Some(parent) => check_component("parent name", parent),
        None => Ok(()),
    }
}

fn push_type_segment(key: &mut Vec<u8>, kind: &TypeKey) {
    match kind {
        TypeKey::Top(t) => key.extend_from_slice(t.as_str().as_bytes()),
        TypeKey::Child {
            parent_type,
            parent_name,
            child_type,
        } => {
            key.extend_from_slice(parent_type.as_str().as_bytes());
            key.push(CHILD_SEP);
            key.extend_from_slice(parent_name.as_bytes());
            key.push(CHILD_SEP);
            key.extend_from_slice(child_type.as_str().as_bytes());
        }
    }
}

/// Encode a connection prefix for scanning every catalog of a connection.
#[must_use]
pub fn connection_prefix(connection: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(connection.len() + 1);
    key.extend_from_slice(connection.as_bytes());
    key.push(SEP);
    key
}

/// Encode a catalog prefix: `connection || type segment`.
///
/// This allows efficient prefix scans over one catalog.
#[must_use]
pub fn catalog_prefix(connection: &str, kind: &TypeKey) -> Vec<u8> {
    let mut key = connection_prefix(connection);
    push_type_segment(&mut key, kind);
    key.push(SEP);
    key
}

/// Encode a record key: `connection || type segment || name`.
#[must_use]
pub fn record_key(connection: &str, kind: &TypeKey, name_id: &str) -> Vec<u8> {
    let mut key = catalog_prefix(connection, kind);
    key.extend_from_slice(name_id.as_bytes());
    key
}

/// Encode a system-id index key: `connection || type segment || system id`.
#[must_use]
pub fn system_key(connection: &str, kind: &TypeKey, system_id: &str) -> Vec<u8> {
    let mut key = catalog_prefix(connection, kind);
    key.extend_from_slice(system_id.as_bytes());
    key
}
