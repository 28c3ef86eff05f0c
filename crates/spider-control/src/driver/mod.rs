//! Cloud driver interface.
//!
//! A driver exposes one [`CloudConnection`] per configured cloud connection.
//! The connection is queried for a handler before every dispatch; a missing
//! handler means the provider does not support that resource type and the
//! operation fails with `ControlError::Unsupported` without touching the
//! provider.
//!
//! Drivers are provider-authoritative only for `SystemId`s. A create response
//! echoes the driver-facing names it was given; list and get responses may
//! leave every `NameId` empty.

pub mod mock;
pub mod model;

use spider_core::{Iid, ResourceType};
use thiserror::Error;

use model::{
    ClusterInfo, ClusterReqInfo, DiskInfo, DiskReqInfo, FileSystemInfo, FileSystemReqInfo,
    ImageInfo, ImageReqInfo, KeyPairInfo, KeyPairReqInfo, MyImageInfo, MyImageReqInfo,
    NlbInfo, NlbReqInfo, NodeGroupInfo, SecurityInfo, SecurityReqInfo, SecurityRule,
    SubnetInfo, VmInfo, VmReqInfo, VmStatus, VmStatusInfo, VpcInfo, VpcReqInfo,
};

pub use mock::MockConnection;

/// A result type using `DriverError`.
pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// An opaque provider failure, passed through to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct DriverError(pub String);

impl DriverError {
    /// Create a driver error from a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Provider-level traits that change orchestration rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverCapabilities {
    /// The provider allows only one VPC per connection.
    pub single_vpc: bool,
}

/// One live connection to a cloud provider.
///
/// Handler accessors double as the capability query: `None` means the
/// resource type is not supported on this connection.
pub trait CloudConnection: Send + Sync {
    /// Provider name, for diagnostics.
    fn provider_name(&self) -> &str;

    /// Provider-level capabilities.
    fn capabilities(&self) -> DriverCapabilities {
        DriverCapabilities::default()
    }

    /// Public image handler.
    fn image_handler(&self) -> Option<&dyn ImageHandler> {
        None
    }

    /// VPC handler.
    fn vpc_handler(&self) -> Option<&dyn VpcHandler> {
        None
    }

    /// Security group handler.
    fn security_handler(&self) -> Option<&dyn SecurityHandler> {
        None
    }

    /// Key pair handler.
    fn key_pair_handler(&self) -> Option<&dyn KeyPairHandler> {
        None
    }

    /// VM handler.
    fn vm_handler(&self) -> Option<&dyn VmHandler> {
        None
    }

    /// Disk handler.
    fn disk_handler(&self) -> Option<&dyn DiskHandler> {
        None
    }

    /// Load balancer handler.
    fn nlb_handler(&self) -> Option<&dyn NlbHandler> {
        None
    }

    /// VM snapshot image handler.
    fn my_image_handler(&self) -> Option<&dyn MyImageHandler> {
        None
    }

    /// Kubernetes cluster handler.
    fn cluster_handler(&self) -> Option<&dyn ClusterHandler> {
        None
    }

    /// File system handler.
    fn file_system_handler(&self) -> Option<&dyn FileSystemHandler> {
        None
    }

    /// Whether the connection can manage `resource_type` at all.
    fn supports(&self, resource_type: ResourceType) -> bool {
        match resource_type {
            ResourceType::Image => self.image_handler().is_some(),
            ResourceType::Vpc | ResourceType::Subnet => self.vpc_handler().is_some(),
            ResourceType::SecurityGroup => self.security_handler().is_some(),
            ResourceType::KeyPair => self.key_pair_handler().is_some(),
            ResourceType::Vm => self.vm_handler().is_some(),
            ResourceType::Nlb => self.nlb_handler().is_some(),
            ResourceType::Disk => self.disk_handler().is_some(),
            ResourceType::MyImage => self.my_image_handler().is_some(),
            ResourceType::Cluster | ResourceType::NodeGroup => self.cluster_handler().is_some(),
            ResourceType::FileSystem => self.file_system_handler().is_some(),
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Public image operations.
pub trait ImageHandler: Send + Sync {
    /// Register a public image with the provider.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    fn create_image(&self, req: ImageReqInfo) -> DriverResult<ImageInfo>;
    /// List images.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    fn list_image(&self) -> DriverResult<Vec<ImageInfo>>;
    /// Get one image.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    fn get_image(&self, iid: &Iid) -> DriverResult<ImageInfo>;
    /// Delete an image; `Ok(false)` when the provider declined.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    fn delete_image(&self, iid: &Iid) -> DriverResult<bool>;
}

/// VPC and subnet operations.
pub trait VpcHandler: Send + Sync {
    /// Create a VPC together with its subnets.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    fn create_vpc(&self, req: VpcReqInfo) -> DriverResult<VpcInfo>;
    /// List VPCs.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    fn list_vpc(&self) -> DriverResult<Vec<VpcInfo>>;
    /// Get one VPC.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    fn get_vpc(&self, iid: &Iid) -> DriverResult<VpcInfo>;
    /// Delete a VPC and its subnets.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    fn delete_vpc(&self, iid: &Iid) -> DriverResult<bool>;
    /// Add a subnet; returns the updated VPC.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    fn add_subnet(&self, vpc: &Iid, subnet: SubnetInfo) -> DriverResult<VpcInfo>;
    /// Remove a subnet.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    fn remove_subnet(&self, vpc: &Iid, subnet: &Iid) -> DriverResult<bool>;
}

/// Security group operations.
pub trait SecurityHandler: Send + Sync {
    /// Create a security group.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    fn create_security(&self, req: SecurityReqInfo) -> DriverResult<SecurityInfo>;
    /// List security groups.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    fn list_security(&self) -> DriverResult<Vec<SecurityInfo>>;
    /// Get one security group.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    fn get_security(&self, iid: &Iid) -> DriverResult<SecurityInfo>;
    /// Delete a security group.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    fn delete_security(&self, iid: &Iid) -> DriverResult<bool>;
    /// Add rules; returns the updated group.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    fn add_rules(&self, sg: &Iid, rules: Vec<SecurityRule>) -> DriverResult<SecurityInfo>;
    /// Remove rules.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    fn remove_rules(&self, sg: &Iid, rules: Vec<SecurityRule>) -> DriverResult<bool>;
}

/// Key pair operations.
pub trait KeyPairHandler: Send + Sync {
    /// Create a key pair. The response carries the private key.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    fn create_key(&self, req: KeyPairReqInfo) -> DriverResult<KeyPairInfo>;
    /// List key pairs.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    fn list_key(&self) -> DriverResult<Vec<KeyPairInfo>>;
    /// Get one key pair.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    fn get_key(&self, iid: &Iid) -> DriverResult<KeyPairInfo>;
    /// Delete a key pair.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    fn delete_key(&self, iid: &Iid) -> DriverResult<bool>;
}

/// VM operations.
pub trait VmHandler: Send + Sync {
    /// Start (create) a VM.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    fn start_vm(&self, req: VmReqInfo) -> DriverResult<VmInfo>;
    /// Suspend a VM.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    fn suspend_vm(&self, iid: &Iid) -> DriverResult<VmStatus>;
    /// Resume a suspended VM.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    fn resume_vm(&self, iid: &Iid) -> DriverResult<VmStatus>;
    /// Reboot a VM.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    fn reboot_vm(&self, iid: &Iid) -> DriverResult<VmStatus>;
    /// Terminate a VM.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    fn terminate_vm(&self, iid: &Iid) -> DriverResult<VmStatus>;
    /// Power state of every VM.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    fn list_vm_status(&self) -> DriverResult<Vec<VmStatusInfo>>;
    /// Power state of one VM.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    fn get_vm_status(&self, iid: &Iid) -> DriverResult<VmStatus>;
    /// List VMs.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    fn list_vm(&self) -> DriverResult<Vec<VmInfo>>;
    /// Get one VM.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    fn get_vm(&self, iid: &Iid) -> DriverResult<VmInfo>;
}

/// Disk operations.
pub trait DiskHandler: Send + Sync {
    /// Create a disk.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    fn create_disk(&self, req: DiskReqInfo) -> DriverResult<DiskInfo>;
    /// List disks.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    fn list_disk(&self) -> DriverResult<Vec<DiskInfo>>;
    /// Get one disk.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    fn get_disk(&self, iid: &Iid) -> DriverResult<DiskInfo>;
    /// Delete a disk.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    fn delete_disk(&self, iid: &Iid) -> DriverResult<bool>;
    /// Attach a disk to a VM; returns the updated disk.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    fn attach_disk(&self, disk: &Iid, vm: &Iid) -> DriverResult<DiskInfo>;
    /// Detach a disk from a VM.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    fn detach_disk(&self, disk: &Iid, vm: &Iid) -> DriverResult<bool>;
}

/// Network load balancer operations.
pub trait NlbHandler: Send + Sync {
    /// Create a load balancer.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    fn create_nlb(&self, req: NlbReqInfo) -> DriverResult<NlbInfo>;
    /// List load balancers.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    fn list_nlb(&self) -> DriverResult<Vec<NlbInfo>>;
    /// Get one load balancer.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    fn get_nlb(&self, iid: &Iid) -> DriverResult<NlbInfo>;
    /// Delete a load balancer.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    fn delete_nlb(&self, iid: &Iid) -> DriverResult<bool>;
    /// Add target VMs; returns the updated load balancer.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    fn add_vms(&self, nlb: &Iid, vms: Vec<Iid>) -> DriverResult<NlbInfo>;
    /// Remove target VMs.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    fn remove_vms(&self, nlb: &Iid, vms: Vec<Iid>) -> DriverResult<bool>;
}

/// VM snapshot image operations.
pub trait MyImageHandler: Send + Sync {
    /// Snapshot a VM into an image.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    fn snapshot_vm(&self, req: MyImageReqInfo) -> DriverResult<MyImageInfo>;
    /// List images.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    fn list_my_image(&self) -> DriverResult<Vec<MyImageInfo>>;
    /// Get one image.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    fn get_my_image(&self, iid: &Iid) -> DriverResult<MyImageInfo>;
    /// Delete an image.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    fn delete_my_image(&self, iid: &Iid) -> DriverResult<bool>;
}

/// Kubernetes cluster operations.
pub trait ClusterHandler: Send + Sync {
    /// Create a cluster together with its node groups.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    fn create_cluster(&self, req: ClusterReqInfo) -> DriverResult<ClusterInfo>;
    /// List clusters.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    fn list_cluster(&self) -> DriverResult<Vec<ClusterInfo>>;
    /// Get one cluster.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    fn get_cluster(&self, iid: &Iid) -> DriverResult<ClusterInfo>;
    /// Delete a cluster and its node groups.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    fn delete_cluster(&self, iid: &Iid) -> DriverResult<bool>;
    /// Add a node group.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    fn add_node_group(&self, cluster: &Iid, req: NodeGroupInfo) -> DriverResult<NodeGroupInfo>;
    /// Remove a node group.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    fn remove_node_group(&self, cluster: &Iid, node_group: &Iid) -> DriverResult<bool>;
    /// Change the size limits of a node group.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    fn change_node_group_scaling(
        &self,
        cluster: &Iid,
        node_group: &Iid,
        desired: u32,
        min: u32,
        max: u32,
    ) -> DriverResult<NodeGroupInfo>;
}

/// File system operations.
pub trait FileSystemHandler: Send + Sync {
    /// Create a file system.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    fn create_file_system(&self, req: FileSystemReqInfo) -> DriverResult<FileSystemInfo>;
    /// List file systems.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    fn list_file_system(&self) -> DriverResult<Vec<FileSystemInfo>>;
    /// Get one file system.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    fn get_file_system(&self, iid: &Iid) -> DriverResult<FileSystemInfo>;
    /// Delete a file system.
    ///
    /// # Errors
    ///
    /// Returns the provider's error.
    fn delete_file_system(&self, iid: &Iid) -> DriverResult<bool>;
}
