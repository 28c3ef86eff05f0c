//! Identity types for provider resources.
//!
//! Every resource the control plane manages is known by two identifiers: the
//! caller-chosen `NameId` and the provider-assigned `SystemId`. Identity
//! catalogs are partitioned by connection and by [`TypeKey`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

/// The identity pair of a resource.
///
/// `name_id` is the caller-facing name, `system_id` the provider's identifier.
/// Either side may be empty while a request is being built (a name before
/// create, a system id before resolution).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Iid {
    /// Caller-facing name.
    pub name_id: String,
    /// Provider-assigned identifier.
    pub system_id: String,
}

impl Iid {
    /// Create an identity pair.
    #[must_use]
    pub fn new(name_id: impl Into<String>, system_id: impl Into<String>) -> Self {
        Self {
            name_id: name_id.into(),
            system_id: system_id.into(),
        }
    }

    /// An identity known only by name.
    #[must_use]
    pub fn named(name_id: impl Into<String>) -> Self {
        Self::new(name_id, String::new())
    }

    /// An identity known only by provider id.
    #[must_use]
    pub fn system(system_id: impl Into<String>) -> Self {
        Self::new(String::new(), system_id)
    }

    /// Whether both sides of the pair are populated.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        !self.name_id.is_empty() && !self.system_id.is_empty()
    }
}

impl fmt::Display for Iid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name_id, self.system_id)
    }
}

/// The kinds of provider resources the control plane tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    /// Public machine image.
    Image,
    /// Virtual network.
    Vpc,
    /// Subnet inside a VPC.
    Subnet,
    /// Security group, scoped to a VPC.
    #[serde(rename = "sg")]
    SecurityGroup,
    /// SSH key pair.
    #[serde(rename = "keypair")]
    KeyPair,
    /// Virtual machine.
    Vm,
    /// Network load balancer.
    Nlb,
    /// Block storage volume.
    Disk,
    /// Machine image snapshotted from a VM.
    #[serde(rename = "myimage")]
    MyImage,
    /// Managed Kubernetes cluster.
    Cluster,
    /// Node group inside a cluster.
    #[serde(rename = "nodegroup")]
    NodeGroup,
    /// Shared file system.
    #[serde(rename = "filesystem")]
    FileSystem,
}

impl ResourceType {
    /// Every resource type, in catalog order.
    pub const ALL: [Self; 12] = [
        Self::Image,
        Self::Vpc,
        Self::Subnet,
        Self::SecurityGroup,
        Self::KeyPair,
        Self::Vm,
        Self::Nlb,
        Self::Disk,
        Self::MyImage,
        Self::Cluster,
        Self::NodeGroup,
        Self::FileSystem,
    ];

    /// Types that own a catalog of their own (everything except child types).
    pub const TOP_LEVEL: [Self; 10] = [
        Self::Image,
        Self::Vpc,
        Self::SecurityGroup,
        Self::KeyPair,
        Self::Vm,
        Self::Nlb,
        Self::Disk,
        Self::MyImage,
        Self::Cluster,
        Self::FileSystem,
    ];

    /// Return the wire/storage name of the type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Vpc => "vpc",
            Self::Subnet => "subnet",
            Self::SecurityGroup => "sg",
            Self::KeyPair => "keypair",
            Self::Vm => "vm",
            Self::Nlb => "nlb",
            Self::Disk => "disk",
            Self::MyImage => "myimage",
            Self::Cluster => "cluster",
            Self::NodeGroup => "nodegroup",
            Self::FileSystem => "filesystem",
        }
    }

    /// The parent type for child types.
    #[must_use]
    pub const fn parent(&self) -> Option<Self> {
        match self {
            Self::Subnet => Some(Self::Vpc),
            Self::NodeGroup => Some(Self::Cluster),
            _ => None,
        }
    }

    /// Whether this type owns its own catalog.
    #[must_use]
    pub const fn is_top_level(&self) -> bool {
        self.parent().is_none()
    }

    /// The type whose lock guards this type.
    ///
    /// Child types share their parent's lock.
    #[must_use]
    pub const fn lock_owner(&self) -> Self {
        match self.parent() {
            Some(parent) => parent,
            None => *self,
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| IdError::UnknownResourceType(s.to_string()))
    }
}

/// Selects one identity catalog within a connection.
///
/// Top-level resources have a catalog per type. Child resources have a
/// catalog per parent instance, keyed by the parent's stored name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKey {
    /// Catalog of a top-level type.
    Top(ResourceType),
    /// Catalog of children under one parent.
    Child {
        /// Type of the owning resource.
        parent_type: ResourceType,
        /// Stored name of the owning resource.
        parent_name: String,
        /// Type of the children.
        child_type: ResourceType,
    },
}

impl TypeKey {
    /// Catalog key for a top-level type.
    ///
    /// # Errors
    ///
    /// Returns `IdError::NotTopLevel` for child types.
    pub fn top(resource_type: ResourceType) -> Result<Self, IdError> {
        if resource_type.is_top_level() {
            Ok(Self::Top(resource_type))
        } else {
            Err(IdError::NotTopLevel(resource_type))
        }
    }

    /// Catalog key for children of `child_type` under the named parent.
    ///
    /// # Errors
    ///
    /// Returns `IdError::NotAChildType` if `child_type` has no parent type.
    pub fn child(child_type: ResourceType, parent_name: &str) -> Result<Self, IdError> {
        let parent_type = child_type
            .parent()
            .ok_or(IdError::NotAChildType(child_type))?;
        Ok(Self::Child {
            parent_type,
            parent_name: parent_name.to_string(),
            child_type,
        })
    }

    /// The type of records in this catalog.
    #[must_use]
    pub const fn resource_type(&self) -> ResourceType {
        match self {
            Self::Top(t) => *t,
            Self::Child { child_type, .. } => *child_type,
        }
    }

    /// The parent's stored name, for child catalogs.
    #[must_use]
    pub fn parent_name(&self) -> Option<&str> {
        match self {
            Self::Top(_) => None,
            Self::Child { parent_name, .. } => Some(parent_name),
        }
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Top(t) => write!(f, "{t}"),
            Self::Child {
                parent_type,
                parent_name,
                child_type,
            } => write!(f, "{parent_type}/{parent_name}/{child_type}"),
        }
    }
}

static DRIVER_NAME_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a globally unique driver-facing name for a resource.
///
/// The result is `{name}-{20 hex chars}`, derived from the connection, type,
/// name, wall clock and a process-wide counter.
#[must_use]
pub fn generate_driver_name(connection: &str, resource_type: ResourceType, name: &str) -> String {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let seq = DRIVER_NAME_COUNTER.fetch_add(1, Ordering::Relaxed);

    let mut hasher = blake3::Hasher::new();
    hasher.update(connection.as_bytes());
    hasher.update(resource_type.as_str().as_bytes());
    hasher.update(name.as_bytes());
    hasher.update(&timestamp.to_le_bytes());
    hasher.update(&seq.to_le_bytes());

    let digest = hasher.finalize();
    format!("{name}-{}", &hex::encode(digest.as_bytes())[..20])
}

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The string does not name a known resource type.
    #[error("unknown resource type: {0}")]
    UnknownResourceType(String),

    /// A child catalog was requested for a type without a parent.
    #[error("{0} is not a child resource type")]
    NotAChildType(ResourceType),

    /// A top-level catalog was requested for a child type.
    #[error("{0} is not a top-level resource type")]
    NotTopLevel(ResourceType),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_type_parse_roundtrip() {
        for t in ResourceType::ALL {
            assert_eq!(t.as_str().parse::<ResourceType>().unwrap(), t);
        }
        assert_eq!("VPC".parse::<ResourceType>().unwrap(), ResourceType::Vpc);
        assert!(matches!(
            "bucket".parse::<ResourceType>(),
            Err(IdError::UnknownResourceType(_))
        ));
    }

    #[test]
    fn child_types_share_parent_lock() {
        assert_eq!(ResourceType::Subnet.lock_owner(), ResourceType::Vpc);
        assert_eq!(ResourceType::NodeGroup.lock_owner(), ResourceType::Cluster);
        assert_eq!(ResourceType::Vm.lock_owner(), ResourceType::Vm);
        assert!(ResourceType::TOP_LEVEL.iter().all(ResourceType::is_top_level));
    }

    #[test]
    fn type_key_constructors_check_hierarchy() {
        assert!(TypeKey::top(ResourceType::Vpc).is_ok());
        assert_eq!(
            TypeKey::top(ResourceType::Subnet),
            Err(IdError::NotTopLevel(ResourceType::Subnet))
        );

        let key = TypeKey::child(ResourceType::Subnet, "vpc-01").unwrap();
        assert_eq!(key.resource_type(), ResourceType::Subnet);
        assert_eq!(key.parent_name(), Some("vpc-01"));
        assert_eq!(key.to_string(), "vpc/vpc-01/subnet");

        assert_eq!(
            TypeKey::child(ResourceType::Disk, "vm-01"),
            Err(IdError::NotAChildType(ResourceType::Disk))
        );
    }

    #[test]
    fn child_keys_for_different_parents_differ() {
        let a = TypeKey::child(ResourceType::Subnet, "a").unwrap();
        let b = TypeKey::child(ResourceType::Subnet, "b").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn driver_names_are_unique_and_keep_the_name() {
        let a = generate_driver_name("aws-conn", ResourceType::Vm, "web");
        let b = generate_driver_name("aws-conn", ResourceType::Vm, "web");
        assert_ne!(a, b);
        assert!(a.starts_with("web-"));
        assert_eq!(a.len(), "web-".len() + 20);
    }

    #[test]
    fn resource_type_serde_names() {
        let json = serde_json::to_string(&ResourceType::SecurityGroup).unwrap();
        assert_eq!(json, "\"sg\"");
        let parsed: ResourceType = serde_json::from_str("\"nodegroup\"").unwrap();
        assert_eq!(parsed, ResourceType::NodeGroup);
    }
}
