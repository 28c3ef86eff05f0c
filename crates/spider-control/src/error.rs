//! Error types for the control plane.
//!
//! This module defines all errors that can occur while creating, reading,
//! reconciling and deleting provider resources.

use spider_core::{CoreError, IdError, ResourceType};
use spider_store::StoreError;
use thiserror::Error;

use crate::driver::DriverError;

/// A result type using `ControlError`.
pub type Result<T> = std::result::Result<T, ControlError>;

/// Errors that can occur in control plane operations.
#[derive(Debug, Error)]
pub enum ControlError {
    /// The named resource is not tracked.
    #[error("{resource_type} '{name}' not found")]
    NotFound {
        /// Type of the missing resource.
        resource_type: ResourceType,
        /// Caller-facing name.
        name: String,
    },

    /// A resource with this name is already tracked.
    #[error("{resource_type} '{name}' already exists")]
    AlreadyExists {
        /// Type of the conflicting resource.
        resource_type: ResourceType,
        /// Caller-facing name.
        name: String,
    },

    /// The provider rejected or failed the call.
    #[error("provider error: {0}")]
    Provider(#[from] DriverError),

    /// The identity catalog and the provider disagree.
    #[error("consistency mismatch for {resource_type}: {detail}")]
    ConsistencyMismatch {
        /// Type whose catalog diverged.
        resource_type: ResourceType,
        /// What diverged.
        detail: String,
    },

    /// An operation failed and undoing its partial effects failed too.
    #[error("{original}; rollback failed: {compensation}")]
    RollbackFailure {
        /// The error that triggered the rollback.
        original: Box<ControlError>,
        /// Why the rollback failed.
        compensation: String,
    },

    /// The request is malformed.
    #[error("validation error: {0}")]
    Validation(String),

    /// The connection's driver does not support the resource type.
    #[error("{resource_type} is not supported by connection '{connection}'")]
    Unsupported {
        /// Connection that was asked.
        connection: String,
        /// Requested resource type.
        resource_type: ResourceType,
    },

    /// No driver is registered under this connection name.
    #[error("connection not found: {0}")]
    ConnectionNotFound(String),

    /// Storage layer error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl From<CoreError> for ControlError {
    fn from(err: CoreError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<IdError> for ControlError {
    fn from(err: IdError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl ControlError {
    /// Map a store error for a named resource onto the control taxonomy.
    #[must_use]
    pub fn from_store(err: StoreError, resource_type: ResourceType, name: &str) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound {
                resource_type,
                name: name.to_string(),
            },
            StoreError::AlreadyExists(_) => Self::AlreadyExists {
                resource_type,
                name: name.to_string(),
            },
            StoreError::InvalidRecord(reason) => Self::Validation(reason),
            other => Self::Store(other),
        }
    }

    /// The catalog and the provider disagree about a resource type.
    #[must_use]
    pub fn mismatch(resource_type: ResourceType, detail: impl Into<String>) -> Self {
        Self::ConsistencyMismatch {
            resource_type,
            detail: detail.into(),
        }
    }

    /// Combine an error with the failure of its compensation.
    #[must_use]
    pub fn rollback_failed(original: Self, compensation: impl Into<String>) -> Self {
        Self::RollbackFailure {
            original: Box::new(original),
            compensation: compensation.into(),
        }
    }

    /// Returns the appropriate HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } | Self::ConnectionNotFound(_) => 404,
            Self::AlreadyExists { .. } | Self::ConsistencyMismatch { .. } => 409,
            Self::Validation(_) => 400,
            Self::Unsupported { .. } => 501,
            Self::Provider(_) => 502,
            Self::RollbackFailure { .. } | Self::Store(_) => 500,
        }
    }

    /// Returns true if this error might be resolved by retrying.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::Provider(_))
    }
}
