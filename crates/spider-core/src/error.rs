//! Common error types for the spider control plane.

use thiserror::Error;

/// A result type using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors shared across crates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A caller-supplied name or namespace failed validation.
    #[error("invalid {field}: {reason}")]
    InvalidName {
        /// Which input was rejected (e.g. "name", "namespace").
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// An invalid identifier was provided.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] crate::ids::IdError),
}
