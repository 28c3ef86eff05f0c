//! Database schema definitions and column families.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Identity records, keyed by `connection || type key || name`.
    pub const IIDS: &str = "iids";

    /// Index: stored name by provider id, keyed by
    /// `connection || type key || system id`.
    pub const IIDS_BY_SYSTEM_ID: &str = "iids_by_system_id";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![cf::IIDS, cf::IIDS_BY_SYSTEM_ID]
}
