//! Identity reconciliation and lifecycle orchestration for multi-cloud
//! resources.
//!
//! This crate keeps the local mapping between caller-chosen names and
//! provider-assigned ids consistent with what the cloud providers actually
//! run. Every read is reconciled against the provider; every mutation is a
//! saga with explicit compensation.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Transport (HTTP, CLI, ...)                 │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    ControlPlaneService                      │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────────┐    │
//! │  │ Reconcile   │ │ Lifecycle   │ │ Resource-specific   │    │
//! │  │ list / get  │ │ sagas       │ │ operations          │    │
//! │  └─────────────┘ └─────────────┘ └─────────────────────┘    │
//! │         Scope: name <-> provider id resolution              │
//! │         LockRegistry: one RW lock per resource type         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!               ┌──────────────┴──────────────┐
//!               ▼                             ▼
//!        ┌──────────────┐             ┌──────────────┐
//!        │ Identity     │             │ Cloud        │
//!        │ Store        │             │ Connection   │
//!        │ (RocksDB)    │             │ (driver)     │
//!        └──────────────┘             └──────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use spider_control::{CallContext, ControlPlaneService, MockConnection};
//! use spider_control::driver::model::{SubnetInfo, VpcReqInfo};
//! use spider_control::kinds::VpcKind;
//! use spider_core::Iid;
//! use spider_store::RocksStore;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(RocksStore::open("/tmp/spider")?);
//! let control = ControlPlaneService::with_defaults(store);
//! control.register_connection("aws-us-east-1", Arc::new(MockConnection::new("aws")));
//!
//! // a tenant sees its own names only
//! let ctx = CallContext::with_namespace("aws-us-east-1", "tenantA")?;
//! let vpc = control.create::<VpcKind>(&ctx, VpcReqInfo {
//!     iid: Iid::named("vpc-01"),
//!     ipv4_cidr: "10.0.0.0/16".to_string(),
//!     subnets: vec![SubnetInfo {
//!         iid: Iid::named("subnet-01"),
//!         zone: String::new(),
//!         ipv4_cidr: "10.0.1.0/24".to_string(),
//!     }],
//!     tags: Vec::new(),
//! })?;
//!
//! println!("Created {} as {}", vpc.iid.name_id, vpc.iid.system_id);
//! # Ok(())
//! # }
//! ```
//!
//! # Consistency
//!
//! - A tracked record with no live provider resource fails the read with
//!   `ControlError::ConsistencyMismatch`.
//! - A failed compensation is reported as `ControlError::RollbackFailure`
//!   together with the error that triggered it.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod connection;
pub mod driver;
pub mod error;
pub mod kinds;
pub mod lifecycle;
pub mod locks;
pub mod operations;
pub mod reconcile;
pub mod scope;
pub mod service;
pub mod types;

pub use connection::ConnectionRegistry;
pub use driver::{CloudConnection, DriverCapabilities, DriverError, MockConnection};
pub use error::{ControlError, Result};
pub use kinds::ResourceKind;
pub use locks::{LockRegistry, LockState, LockStatus};
pub use scope::Scope;
pub use service::ControlPlaneService;
pub use types::{AllResourceList, CallContext, ControlConfig};
