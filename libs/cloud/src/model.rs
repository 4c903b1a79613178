//! Resource model as reported by the control plane.
//!
//! Field names follow the OpenStack wire format (Neutron for networking,
//! Nova for compute) so the REST client can deserialize responses directly.

use std::fmt;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use stackops_id::{
    FlavorId, FloatingIpId, ImageId, InstanceId, NetworkId, PortId, ProjectId, RouterId,
    SecurityGroupId, SubnetId,
};

// =============================================================================
// Networking
// =============================================================================

/// A virtual L2/L3 domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub id: NetworkId,

    #[serde(default)]
    pub name: String,

    /// Whether the network provides outside connectivity.
    #[serde(rename = "router:external", default)]
    pub is_external: bool,

    #[serde(rename = "subnets", default)]
    pub subnet_ids: Vec<SubnetId>,
}

/// An IP block bound to exactly one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subnet {
    pub id: SubnetId,

    pub network_id: NetworkId,

    #[serde(default)]
    pub name: String,

    pub cidr: String,

    #[serde(default)]
    pub gateway_ip: Option<IpAddr>,
}

/// Attachment of a router to an external network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalGateway {
    pub network_id: NetworkId,
}

/// A virtual L3 forwarding node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Router {
    pub id: RouterId,

    #[serde(default)]
    pub name: String,

    #[serde(rename = "external_gateway_info", default)]
    pub external_gateway: Option<ExternalGateway>,
}

impl Router {
    /// The external network this router forwards to, if any.
    pub fn gateway_network_id(&self) -> Option<&NetworkId> {
        self.external_gateway.as_ref().map(|gw| &gw.network_id)
    }

    /// True when instances behind this router can be reached from outside.
    pub fn has_external_gateway(&self) -> bool {
        self.external_gateway.is_some()
    }
}

/// A (subnet, address) pair held by a port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedIp {
    pub subnet_id: SubnetId,
    pub ip_address: IpAddr,
}

/// A network attachment point owned by a device (instance or router).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    pub id: PortId,

    /// Owning device id; empty for unbound ports.
    #[serde(default)]
    pub device_id: String,

    #[serde(default)]
    pub device_owner: String,

    pub network_id: NetworkId,

    /// Router gateway ports carry no project, hence optional.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub project_id: Option<ProjectId>,

    #[serde(default)]
    pub fixed_ips: Vec<FixedIp>,
}

/// Binding state of a floating IP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FloatingIpStatus {
    /// Allocated but not bound to a port.
    Down,
    /// Bound to a port.
    Active,
    Error,
    Other(String),
}

impl From<String> for FloatingIpStatus {
    fn from(s: String) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "DOWN" => Self::Down,
            "ACTIVE" => Self::Active,
            "ERROR" => Self::Error,
            _ => Self::Other(s),
        }
    }
}

impl From<FloatingIpStatus> for String {
    fn from(status: FloatingIpStatus) -> Self {
        status.to_string()
    }
}

impl fmt::Display for FloatingIpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Down => f.write_str("DOWN"),
            Self::Active => f.write_str("ACTIVE"),
            Self::Error => f.write_str("ERROR"),
            Self::Other(s) => f.write_str(s),
        }
    }
}

/// A reassignable public address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FloatingIp {
    pub id: FloatingIpId,

    #[serde(rename = "floating_ip_address")]
    pub address: IpAddr,

    pub status: FloatingIpStatus,

    #[serde(default, deserialize_with = "empty_as_none")]
    pub project_id: Option<ProjectId>,

    pub floating_network_id: NetworkId,

    #[serde(default, deserialize_with = "empty_as_none")]
    pub port_id: Option<PortId>,
}

impl FloatingIp {
    /// Allocated, unbound and therefore safe to reuse.
    pub fn is_free(&self) -> bool {
        self.status == FloatingIpStatus::Down && self.port_id.is_none()
    }
}

/// A security group (only the fields needed to pick one by name).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroup {
    pub id: SecurityGroupId,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,
}

// =============================================================================
// Compute
// =============================================================================

/// Lifecycle state of a compute instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InstanceStatus {
    Build,
    Active,
    Error,
    Shutoff,
    Deleted,
    Other(String),
}

impl InstanceStatus {
    /// True once the instance will not change state without intervention.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Active | Self::Error | Self::Shutoff | Self::Deleted)
    }
}

impl From<String> for InstanceStatus {
    fn from(s: String) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "BUILD" => Self::Build,
            "ACTIVE" => Self::Active,
            "ERROR" => Self::Error,
            "SHUTOFF" => Self::Shutoff,
            "DELETED" => Self::Deleted,
            _ => Self::Other(s),
        }
    }
}

impl From<InstanceStatus> for String {
    fn from(status: InstanceStatus) -> Self {
        status.to_string()
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Build => f.write_str("BUILD"),
            Self::Active => f.write_str("ACTIVE"),
            Self::Error => f.write_str("ERROR"),
            Self::Shutoff => f.write_str("SHUTOFF"),
            Self::Deleted => f.write_str("DELETED"),
            Self::Other(s) => f.write_str(s),
        }
    }
}

/// A compute workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub id: InstanceId,

    #[serde(default)]
    pub name: String,

    pub status: InstanceStatus,

    #[serde(rename = "created")]
    pub created_at: DateTime<Utc>,
}

/// An SSH keypair registered with compute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keypair {
    pub name: String,

    #[serde(default)]
    pub fingerprint: String,

    #[serde(default)]
    pub public_key: String,

    /// Only present in the response to a create call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub id: ImageId,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flavor {
    pub id: FlavorId,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub vcpus: u32,

    /// Memory in MiB.
    #[serde(default)]
    pub ram: u64,

    /// Root disk in GiB.
    #[serde(default)]
    pub disk: u64,
}

/// Everything needed to boot an instance except its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceTemplate {
    pub image: ImageId,
    pub flavor: FlavorId,
    pub networks: Vec<NetworkId>,
    pub key_name: Option<String>,
    pub security_group: Option<String>,

    /// Cloud-init payload in plain text; encoded by the transport.
    pub user_data: Option<String>,
}

impl InstanceTemplate {
    /// Build a create request for a named instance.
    pub fn instantiate(&self, name: impl Into<String>) -> CreateInstance {
        CreateInstance {
            name: name.into(),
            template: self.clone(),
        }
    }
}

/// Request to create one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateInstance {
    pub name: String,
    pub template: InstanceTemplate,
}

/// Deserialize `""` and `null` as `None`.
fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref() {
        None | Some("") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_network_external_flag() {
        let net: Network = serde_json::from_value(json!({
            "id": "ext-net",
            "name": "public",
            "router:external": true,
            "subnets": ["sub-ext"]
        }))
        .unwrap();
        assert!(net.is_external);
        assert_eq!(net.subnet_ids.len(), 1);
    }

    #[test]
    fn test_router_without_gateway() {
        let router: Router = serde_json::from_value(json!({
            "id": "r1",
            "name": "r1",
            "external_gateway_info": null
        }))
        .unwrap();
        assert!(!router.has_external_gateway());
    }

    #[test]
    fn test_gateway_port_has_no_project() {
        let port: Port = serde_json::from_value(json!({
            "id": "p-gw",
            "device_id": "r1",
            "device_owner": "network:router_gateway",
            "network_id": "ext-net",
            "project_id": "",
            "fixed_ips": [{"subnet_id": "sub-ext", "ip_address": "203.0.113.5"}]
        }))
        .unwrap();
        assert!(port.project_id.is_none());
        assert_eq!(port.fixed_ips[0].subnet_id.as_str(), "sub-ext");
    }

    #[test]
    fn test_floating_ip_free() {
        let fip: FloatingIp = serde_json::from_value(json!({
            "id": "fip-1",
            "floating_ip_address": "203.0.113.10",
            "status": "DOWN",
            "project_id": "proj",
            "floating_network_id": "ext-net",
            "port_id": null
        }))
        .unwrap();
        assert!(fip.is_free());
    }

    #[test]
    fn test_unknown_instance_status_preserved() {
        let status = InstanceStatus::from("MIGRATING".to_string());
        assert_eq!(status, InstanceStatus::Other("MIGRATING".to_string()));
        assert_eq!(status.to_string(), "MIGRATING");
        assert!(!status.is_terminal());
    }

    #[test]
    fn test_instance_created_timestamp() {
        let instance: Instance = serde_json::from_value(json!({
            "id": "vm1",
            "name": "web_1",
            "status": "ACTIVE",
            "created": "2024-05-01T10:00:00Z"
        }))
        .unwrap();
        assert_eq!(instance.status, InstanceStatus::Active);
        assert_eq!(instance.created_at.timestamp(), 1714557600);
    }
}
