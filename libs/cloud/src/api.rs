//! The contract the core needs from the control plane.

use async_trait::async_trait;
use stackops_id::{FloatingIpId, InstanceId, NetworkId, PortId, ProjectId, SubnetId};

use crate::error::CloudResult;
use crate::model::{CreateInstance, FloatingIp, Instance, Network, Port, Router, Subnet};

/// Control-plane operations used by topology resolution, floating-IP binding
/// and pool reconciliation.
///
/// Implementations must be safe to share across tasks. Every call reads or
/// mutates live state; nothing is cached between calls.
#[async_trait]
pub trait CloudApi: Send + Sync {
    /// List all networks visible to the caller.
    async fn list_networks(&self) -> CloudResult<Vec<Network>>;

    /// List all routers visible to the caller.
    async fn list_routers(&self) -> CloudResult<Vec<Router>>;

    /// List ports, optionally only those owned by `device_id`.
    async fn list_ports(&self, device_id: Option<&str>) -> CloudResult<Vec<Port>>;

    /// Fetch a subnet. Fails with `CloudError::NotFound` once it is deleted.
    async fn get_subnet(&self, id: &SubnetId) -> CloudResult<Subnet>;

    /// List floating IPs, optionally scoped to a project.
    async fn list_floating_ips(&self, project_id: Option<&ProjectId>)
        -> CloudResult<Vec<FloatingIp>>;

    /// Allocate a new floating IP from `network_id` for `project_id`.
    async fn create_floating_ip(
        &self,
        network_id: &NetworkId,
        project_id: Option<&ProjectId>,
    ) -> CloudResult<FloatingIp>;

    /// Point a floating IP at a port.
    async fn bind_floating_ip(&self, id: &FloatingIpId, port_id: &PortId)
        -> CloudResult<FloatingIp>;

    /// List instances with full detail (name, status, creation time).
    async fn list_instances(&self) -> CloudResult<Vec<Instance>>;

    /// Fetch one instance.
    async fn get_instance(&self, id: &InstanceId) -> CloudResult<Instance>;

    /// Submit an instance for creation. Returns once the request is accepted;
    /// the instance is usually still building.
    async fn create_instance(&self, request: &CreateInstance) -> CloudResult<Instance>;

    /// Delete an instance. Deleting an instance that is already gone succeeds.
    async fn delete_instance(&self, id: &InstanceId) -> CloudResult<()>;
}
