//! Core types and naming rules for the spider control plane.
//!
//! This crate provides the foundational types shared by the store and the
//! control plane:
//!
//! - **Identifiers**: the `{NameId, SystemId}` identity pair, the resource-type
//!   catalog and structured type keys for child catalogs
//! - **Naming**: namespace prefixing and composite names for resources scoped
//!   under a parent
//! - **Error types**: Common error definitions shared across crates
//!
//! # Example
//!
//! ```
//! use spider_core::{naming, Iid, ResourceType, TypeKey};
//!
//! // A subnet catalog lives under its VPC
//! let key = TypeKey::child(ResourceType::Subnet, "vpc-01").unwrap();
//! assert_eq!(key.resource_type(), ResourceType::Subnet);
//!
//! // Security groups are tracked under a composite name
//! let stored = naming::compose("vpc-01", "web");
//! assert_eq!(naming::decompose(&stored), Some(("vpc-01", "web")));
//!
//! let iid = Iid::new("web", "sg-0a1b2c");
//! assert!(iid.is_resolved());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod ids;
pub mod naming;

pub use error::{CoreError, Result};
pub use ids::{generate_driver_name, IdError, Iid, ResourceType, TypeKey};
pub use naming::{NameCodec, Namespace};
