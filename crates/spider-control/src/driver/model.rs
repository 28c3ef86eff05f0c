//! Request and response payloads exchanged with cloud drivers.
//!
//! Every payload carries identity pairs. On requests the control plane fills
//! them with driver-facing names and resolved provider ids; on responses the
//! driver is only authoritative for the provider ids.

use serde::{Deserialize, Serialize};
use spider_core::Iid;

/// Access to the identity pair of a payload.
pub trait HasIid {
    /// The identity pair.
    fn iid(&self) -> &Iid;
    /// Mutable access to the identity pair.
    fn iid_mut(&mut self) -> &mut Iid;
}

macro_rules! impl_has_iid {
    ($($ty:ty),* $(,)?) => {
        $(
            impl HasIid for $ty {
                fn iid(&self) -> &Iid {
                    &self.iid
                }

                fn iid_mut(&mut self) -> &mut Iid {
                    &mut self.iid
                }
            }
        )*
    };
}

impl_has_iid!(
    ImageReqInfo,
    ImageInfo,
    VpcReqInfo,
    VpcInfo,
    SubnetInfo,
    SecurityReqInfo,
    SecurityInfo,
    KeyPairReqInfo,
    KeyPairInfo,
    VmReqInfo,
    VmInfo,
    DiskReqInfo,
    DiskInfo,
    NlbReqInfo,
    NlbInfo,
    MyImageReqInfo,
    MyImageInfo,
    ClusterReqInfo,
    ClusterInfo,
    NodeGroupInfo,
    FileSystemReqInfo,
    FileSystemInfo,
);

/// A free-form tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    /// Tag key.
    pub key: String,
    /// Tag value.
    pub value: String,
}

// =============================================================================
// Image
// =============================================================================

/// Request to register a public image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReqInfo {
    /// Identity of the image.
    pub iid: Iid,
}

/// A public machine image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    /// Identity of the image.
    pub iid: Iid,
    /// Operating system distribution.
    pub os_distribution: String,
    /// Provider status string.
    pub status: String,
}

// =============================================================================
// VPC
// =============================================================================

/// A subnet, used both in requests and responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetInfo {
    /// Identity of the subnet.
    pub iid: Iid,
    /// Availability zone.
    #[serde(default)]
    pub zone: String,
    /// IPv4 CIDR block.
    pub ipv4_cidr: String,
}

/// Request to create a VPC with its initial subnets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpcReqInfo {
    /// Identity of the VPC.
    pub iid: Iid,
    /// IPv4 CIDR block.
    pub ipv4_cidr: String,
    /// Subnets to create with the VPC.
    pub subnets: Vec<SubnetInfo>,
    /// Tags.
    #[serde(default)]
    pub tags: Vec<KeyValue>,
}

/// A VPC and its subnets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpcInfo {
    /// Identity of the VPC.
    pub iid: Iid,
    /// IPv4 CIDR block.
    pub ipv4_cidr: String,
    /// Subnets in the VPC.
    pub subnets: Vec<SubnetInfo>,
    /// Tags.
    #[serde(default)]
    pub tags: Vec<KeyValue>,
}

// =============================================================================
// Security group
// =============================================================================

/// Traffic direction of a security rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleDirection {
    /// Incoming traffic.
    Inbound,
    /// Outgoing traffic.
    Outbound,
}

/// One security group rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityRule {
    /// Traffic direction.
    pub direction: RuleDirection,
    /// Protocol (`tcp`, `udp`, `icmp`, `all`).
    pub ip_protocol: String,
    /// First port of the range.
    pub from_port: String,
    /// Last port of the range.
    pub to_port: String,
    /// Source or destination CIDR.
    pub cidr: String,
}

/// Request to create a security group inside a VPC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityReqInfo {
    /// Identity of the security group.
    pub iid: Iid,
    /// Owning VPC.
    pub vpc_iid: Iid,
    /// Initial rules.
    pub rules: Vec<SecurityRule>,
}

/// A security group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityInfo {
    /// Identity of the security group.
    pub iid: Iid,
    /// Owning VPC.
    pub vpc_iid: Iid,
    /// Current rules.
    pub rules: Vec<SecurityRule>,
}

// =============================================================================
// Key pair
// =============================================================================

/// Request to create a key pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPairReqInfo {
    /// Identity of the key pair.
    pub iid: Iid,
}

/// A key pair. Key material is only present in the create response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPairInfo {
    /// Identity of the key pair.
    pub iid: Iid,
    /// Key fingerprint.
    pub fingerprint: String,
    /// Public key.
    pub public_key: String,
    /// Private key.
    pub private_key: String,
}

// =============================================================================
// VM
// =============================================================================

/// Where a VM's image comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageType {
    /// Provider public image, referenced by its provider id.
    #[default]
    Public,
    /// Image snapshotted from a VM and tracked as a `MyImage`.
    MyImage,
}

/// Request to start a VM.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmReqInfo {
    /// Identity of the VM.
    pub iid: Iid,
    /// Kind of image reference.
    pub image_type: ImageType,
    /// Image to boot from.
    pub image_iid: Iid,
    /// VPC to attach to.
    pub vpc_iid: Iid,
    /// Subnet inside the VPC.
    pub subnet_iid: Iid,
    /// Security groups, all in the same VPC.
    pub security_group_iids: Vec<Iid>,
    /// Key pair for login.
    pub key_pair_iid: Iid,
    /// Additional data disks.
    #[serde(default)]
    pub data_disk_iids: Vec<Iid>,
    /// Provider instance type.
    pub spec_name: String,
    /// Root disk type, provider default when empty.
    #[serde(default)]
    pub root_disk_type: String,
    /// Root disk size in GB, provider default when empty.
    #[serde(default)]
    pub root_disk_size: String,
}

/// A VM.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmInfo {
    /// Identity of the VM.
    pub iid: Iid,
    /// Kind of image reference.
    pub image_type: ImageType,
    /// Image the VM booted from.
    pub image_iid: Iid,
    /// Attached VPC.
    pub vpc_iid: Iid,
    /// Attached subnet.
    pub subnet_iid: Iid,
    /// Security groups.
    pub security_group_iids: Vec<Iid>,
    /// Login key pair.
    pub key_pair_iid: Iid,
    /// Attached data disks.
    pub data_disk_iids: Vec<Iid>,
    /// Provider instance type.
    pub spec_name: String,
    /// Public address.
    pub public_ip: String,
    /// Private address.
    pub private_ip: String,
}

/// Power state of a VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VmStatus {
    /// Being created.
    Creating,
    /// Running.
    Running,
    /// Suspend in progress.
    Suspending,
    /// Suspended.
    Suspended,
    /// Resume in progress.
    Resuming,
    /// Reboot in progress.
    Rebooting,
    /// Termination in progress.
    Terminating,
    /// Terminated.
    Terminated,
    /// Provider reported something unexpected.
    Failed,
}

/// Power operations on a running VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VmAction {
    /// Suspend the VM.
    Suspend,
    /// Resume a suspended VM.
    Resume,
    /// Reboot the VM.
    Reboot,
}

/// A VM identity with its power state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmStatusInfo {
    /// Identity of the VM.
    pub iid: Iid,
    /// Current power state.
    pub status: VmStatus,
}

impl HasIid for VmStatusInfo {
    fn iid(&self) -> &Iid {
        &self.iid
    }

    fn iid_mut(&mut self) -> &mut Iid {
        &mut self.iid
    }
}

// =============================================================================
// Disk
// =============================================================================

/// Request to create a disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskReqInfo {
    /// Identity of the disk.
    pub iid: Iid,
    /// Availability zone.
    #[serde(default)]
    pub zone: String,
    /// Provider disk type.
    pub disk_type: String,
    /// Size in GB.
    pub disk_size: String,
}

/// A disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskInfo {
    /// Identity of the disk.
    pub iid: Iid,
    /// Availability zone.
    pub zone: String,
    /// Provider disk type.
    pub disk_type: String,
    /// Size in GB.
    pub disk_size: String,
    /// VM the disk is attached to; empty when detached.
    #[serde(default)]
    pub owner_vm: Iid,
}

// =============================================================================
// NLB
// =============================================================================

/// Request to create a network load balancer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NlbReqInfo {
    /// Identity of the load balancer.
    pub iid: Iid,
    /// VPC the load balancer serves.
    pub vpc_iid: Iid,
    /// Listener protocol.
    pub listener_protocol: String,
    /// Listener port.
    pub listener_port: String,
    /// Port on the target VMs.
    pub target_port: String,
    /// Target VMs.
    pub vm_iids: Vec<Iid>,
}

/// A network load balancer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NlbInfo {
    /// Identity of the load balancer.
    pub iid: Iid,
    /// VPC the load balancer serves.
    pub vpc_iid: Iid,
    /// Listener protocol.
    pub listener_protocol: String,
    /// Listener port.
    pub listener_port: String,
    /// Port on the target VMs.
    pub target_port: String,
    /// Target VMs.
    pub vm_iids: Vec<Iid>,
    /// Public DNS name or address.
    pub listener_address: String,
}

// =============================================================================
// MyImage
// =============================================================================

/// Request to snapshot a VM into an image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MyImageReqInfo {
    /// Identity of the image.
    pub iid: Iid,
    /// VM to snapshot.
    pub source_vm: Iid,
}

/// An image snapshotted from a VM.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MyImageInfo {
    /// Identity of the image.
    pub iid: Iid,
    /// Provider status string.
    pub status: String,
}

// =============================================================================
// Cluster
// =============================================================================

/// A node group, used both in requests and responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeGroupInfo {
    /// Identity of the node group.
    pub iid: Iid,
    /// Node instance type.
    pub spec_name: String,
    /// Login key pair for nodes.
    pub key_pair_iid: Iid,
    /// Whether the provider autoscaler manages the group.
    #[serde(default)]
    pub on_auto_scaling: bool,
    /// Desired node count.
    pub desired_node_size: u32,
    /// Minimum node count.
    pub min_node_size: u32,
    /// Maximum node count.
    pub max_node_size: u32,
}

/// Request to create a cluster with its initial node groups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterReqInfo {
    /// Identity of the cluster.
    pub iid: Iid,
    /// Kubernetes version.
    pub version: String,
    /// VPC the cluster runs in.
    pub vpc_iid: Iid,
    /// Subnets of that VPC.
    pub subnet_iids: Vec<Iid>,
    /// Security groups of that VPC.
    pub security_group_iids: Vec<Iid>,
    /// Node groups to create with the cluster.
    pub node_groups: Vec<NodeGroupInfo>,
}

/// A managed Kubernetes cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterInfo {
    /// Identity of the cluster.
    pub iid: Iid,
    /// Kubernetes version.
    pub version: String,
    /// VPC the cluster runs in.
    pub vpc_iid: Iid,
    /// Subnets of that VPC.
    pub subnet_iids: Vec<Iid>,
    /// Security groups of that VPC.
    pub security_group_iids: Vec<Iid>,
    /// Node groups.
    pub node_groups: Vec<NodeGroupInfo>,
    /// Provider status string.
    pub status: String,
}

// =============================================================================
// File system
// =============================================================================

/// Request to create a shared file system.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSystemReqInfo {
    /// Identity of the file system.
    pub iid: Iid,
    /// Availability zone.
    #[serde(default)]
    pub zone: String,
    /// VPC the file system is reachable from.
    pub vpc_iid: Iid,
    /// Subnets with mount targets.
    pub access_subnet_iids: Vec<Iid>,
    /// Capacity in GB.
    pub capacity_gb: u64,
}

/// A shared file system.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSystemInfo {
    /// Identity of the file system.
    pub iid: Iid,
    /// Availability zone.
    pub zone: String,
    /// VPC the file system is reachable from.
    pub vpc_iid: Iid,
    /// Subnets with mount targets.
    pub access_subnet_iids: Vec<Iid>,
    /// Capacity in GB.
    pub capacity_gb: u64,
}
