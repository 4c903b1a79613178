//! In-memory control plane for tests and dry runs.
//!
//! Seed it with the builder methods, run the core against it, then inspect
//! the resulting state. Instances boot through `BUILD` for a configurable
//! number of polls; failures can be injected per operation.

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use stackops_id::{FloatingIpId, InstanceId, NetworkId, PortId, ProjectId, SubnetId};
use tokio::sync::Mutex;
use tracing::debug;

use crate::api::CloudApi;
use crate::error::{CloudError, CloudResult};
use crate::model::{
    CreateInstance, ExternalGateway, FixedIp, FloatingIp, FloatingIpStatus, Instance,
    InstanceStatus, Network, Port, Router, Subnet,
};

/// Call counters for assertions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockCounters {
    pub subnet_lookups: usize,
    pub floating_ips_created: usize,
    pub binds: usize,
    pub instances_created: usize,
    pub instance_polls: usize,
    pub delete_calls: usize,
}

#[derive(Debug, Default)]
struct Failures {
    /// Creation fails once this many instances were created.
    creates_after: Option<usize>,
    /// Instance names that boot into `ERROR`.
    error_on_boot: HashSet<String>,
    deletes: HashSet<InstanceId>,
    allocation: bool,
    bind: bool,
    list_instances: bool,
}

#[derive(Debug)]
struct MockInstance {
    instance: Instance,
    polls_remaining: u32,
    boots_into_error: bool,
}

#[derive(Debug, Default)]
struct MockState {
    networks: Vec<Network>,
    subnets: Vec<Subnet>,
    routers: Vec<Router>,
    ports: Vec<Port>,
    floating_ips: Vec<FloatingIp>,
    instances: Vec<MockInstance>,
    boot_polls: u32,
    failures: Failures,
    counters: MockCounters,
    next_address: u8,
}

/// In-memory [`CloudApi`] implementation.
#[derive(Debug, Default)]
pub struct MockCloud {
    state: Mutex<MockState>,
}

/// Parse a fixture id; fixtures are authored in tests, so a bad one is a bug.
fn fixture_id<T>(raw: &str) -> T
where
    T: FromStr,
    T::Err: std::fmt::Debug,
{
    raw.parse()
        .unwrap_or_else(|e| panic!("invalid fixture id '{raw}': {e:?}"))
}

/// Timestamp `secs` seconds after the mock epoch.
pub fn mock_time(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
        + Duration::seconds(secs)
}

impl MockCloud {
    /// Create an empty mock cloud. Instances become active on first poll.
    pub fn new() -> Self {
        Self::default()
    }

    fn state_mut(&mut self) -> &mut MockState {
        self.state.get_mut()
    }

    // Seeding

    pub fn with_network(mut self, id: &str, name: &str, external: bool) -> Self {
        self.state_mut().networks.push(Network {
            id: fixture_id(id),
            name: name.to_string(),
            is_external: external,
            subnet_ids: Vec::new(),
        });
        self
    }

    /// Add a subnet and register it on its network.
    pub fn with_subnet(mut self, id: &str, network_id: &str, cidr: &str) -> Self {
        let subnet = Subnet {
            id: fixture_id(id),
            network_id: fixture_id(network_id),
            name: id.to_string(),
            cidr: cidr.to_string(),
            gateway_ip: None,
        };
        let state = self.state_mut();
        if let Some(network) = state.networks.iter_mut().find(|n| n.id == subnet.network_id) {
            network.subnet_ids.push(subnet.id.clone());
        }
        state.subnets.push(subnet);
        self
    }

    pub fn with_router(mut self, id: &str, gateway_network: Option<&str>) -> Self {
        self.state_mut().routers.push(Router {
            id: fixture_id(id),
            name: id.to_string(),
            external_gateway: gateway_network.map(|net| ExternalGateway {
                network_id: fixture_id(net),
            }),
        });
        self
    }

    /// Attach a router interface port on `subnet_id`.
    pub fn with_router_port(
        mut self,
        router_id: &str,
        port_id: &str,
        network_id: &str,
        subnet_id: &str,
    ) -> Self {
        let address = self.next_fixed_address();
        self.state_mut().ports.push(Port {
            id: fixture_id(port_id),
            device_id: router_id.to_string(),
            device_owner: "network:router_interface".to_string(),
            network_id: fixture_id(network_id),
            project_id: None,
            fixed_ips: vec![FixedIp {
                subnet_id: fixture_id(subnet_id),
                ip_address: address,
            }],
        });
        self
    }

    /// Attach an instance port on `network_id`, owned by `project_id`.
    pub fn with_instance_port(
        mut self,
        instance_id: &str,
        port_id: &str,
        network_id: &str,
        project_id: &str,
    ) -> Self {
        let address = self.next_fixed_address();
        let network_id: NetworkId = fixture_id(network_id);
        let subnet_id = self
            .state_mut()
            .subnets
            .iter()
            .find(|s| s.network_id == network_id)
            .map(|s| s.id.clone());
        self.state_mut().ports.push(Port {
            id: fixture_id(port_id),
            device_id: instance_id.to_string(),
            device_owner: "compute:nova".to_string(),
            network_id,
            project_id: Some(fixture_id(project_id)),
            fixed_ips: subnet_id
                .map(|subnet_id| FixedIp {
                    subnet_id,
                    ip_address: address,
                })
                .into_iter()
                .collect(),
        });
        self
    }

    /// Add an active instance created `created_secs` after the mock epoch.
    pub fn with_instance(mut self, id: &str, name: &str, created_secs: i64) -> Self {
        self.state_mut().instances.push(MockInstance {
            instance: Instance {
                id: fixture_id(id),
                name: name.to_string(),
                status: InstanceStatus::Active,
                created_at: mock_time(created_secs),
            },
            polls_remaining: 0,
            boots_into_error: false,
        });
        self
    }

    /// Add an allocated floating IP, bound when `port_id` is given.
    pub fn with_floating_ip(
        mut self,
        id: &str,
        network_id: &str,
        project_id: &str,
        port_id: Option<&str>,
    ) -> Self {
        let address = self.next_public_address();
        self.state_mut().floating_ips.push(FloatingIp {
            id: fixture_id(id),
            address,
            status: if port_id.is_some() {
                FloatingIpStatus::Active
            } else {
                FloatingIpStatus::Down
            },
            project_id: Some(fixture_id(project_id)),
            floating_network_id: fixture_id(network_id),
            port_id: port_id.map(fixture_id::<PortId>),
        });
        self
    }

    // Behaviour

    /// Number of `get_instance` polls a new instance spends in `BUILD`.
    pub fn with_boot_polls(mut self, polls: u32) -> Self {
        self.state_mut().boot_polls = polls;
        self
    }

    /// Fail every instance creation after `count` successful ones.
    pub fn fail_creates_after(mut self, count: usize) -> Self {
        self.state_mut().failures.creates_after = Some(count);
        self
    }

    /// Instances created with this name boot into `ERROR`.
    pub fn boot_into_error(mut self, name: &str) -> Self {
        self.state_mut()
            .failures
            .error_on_boot
            .insert(name.to_string());
        self
    }

    pub fn fail_delete(mut self, instance_id: &str) -> Self {
        self.state_mut()
            .failures
            .deletes
            .insert(fixture_id(instance_id));
        self
    }

    pub fn reject_allocation(mut self) -> Self {
        self.state_mut().failures.allocation = true;
        self
    }

    pub fn reject_bind(mut self) -> Self {
        self.state_mut().failures.bind = true;
        self
    }

    pub fn fail_list_instances(mut self) -> Self {
        self.state_mut().failures.list_instances = true;
        self
    }

    // Inspection

    pub async fn instances(&self) -> Vec<Instance> {
        let state = self.state.lock().await;
        state.instances.iter().map(|m| m.instance.clone()).collect()
    }

    pub async fn floating_ips(&self) -> Vec<FloatingIp> {
        self.state.lock().await.floating_ips.clone()
    }

    pub async fn counters(&self) -> MockCounters {
        self.state.lock().await.counters.clone()
    }

    /// Delete a subnet while leaving ports that reference it in place.
    pub async fn remove_subnet(&self, id: &str) {
        let mut state = self.state.lock().await;
        state.subnets.retain(|s| s.id.as_str() != id);
    }

    fn next_fixed_address(&mut self) -> IpAddr {
        let state = self.state_mut();
        state.next_address = state.next_address.wrapping_add(1);
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, state.next_address))
    }

    fn next_public_address(&mut self) -> IpAddr {
        next_public_address(self.state_mut())
    }
}

fn next_public_address(state: &mut MockState) -> IpAddr {
    state.next_address = state.next_address.wrapping_add(1);
    IpAddr::V4(Ipv4Addr::new(203, 0, 113, state.next_address))
}

#[async_trait]
impl CloudApi for MockCloud {
    async fn list_networks(&self) -> CloudResult<Vec<Network>> {
        Ok(self.state.lock().await.networks.clone())
    }

    async fn list_routers(&self) -> CloudResult<Vec<Router>> {
        Ok(self.state.lock().await.routers.clone())
    }

    async fn list_ports(&self, device_id: Option<&str>) -> CloudResult<Vec<Port>> {
        let state = self.state.lock().await;
        Ok(state
            .ports
            .iter()
            .filter(|p| device_id.map_or(true, |d| p.device_id == d))
            .cloned()
            .collect())
    }

    async fn get_subnet(&self, id: &SubnetId) -> CloudResult<Subnet> {
        let mut state = self.state.lock().await;
        state.counters.subnet_lookups += 1;
        state
            .subnets
            .iter()
            .find(|s| &s.id == id)
            .cloned()
            .ok_or_else(|| CloudError::not_found("subnet", id.as_str()))
    }

    async fn list_floating_ips(
        &self,
        project_id: Option<&ProjectId>,
    ) -> CloudResult<Vec<FloatingIp>> {
        let state = self.state.lock().await;
        Ok(state
            .floating_ips
            .iter()
            .filter(|f| project_id.map_or(true, |p| f.project_id.as_ref() == Some(p)))
            .cloned()
            .collect())
    }

    async fn create_floating_ip(
        &self,
        network_id: &NetworkId,
        project_id: Option<&ProjectId>,
    ) -> CloudResult<FloatingIp> {
        let mut state = self.state.lock().await;
        if state.failures.allocation {
            return Err(CloudError::Api {
                status: 409,
                message: "floating IP quota exceeded".to_string(),
            });
        }
        if !state.networks.iter().any(|n| &n.id == network_id) {
            return Err(CloudError::not_found("network", network_id.as_str()));
        }

        let address = next_public_address(&mut state);
        let floating_ip = FloatingIp {
            id: FloatingIpId::generate(),
            address,
            status: FloatingIpStatus::Down,
            project_id: project_id.cloned(),
            floating_network_id: network_id.clone(),
            port_id: None,
        };
        state.counters.floating_ips_created += 1;
        state.floating_ips.push(floating_ip.clone());
        debug!(floating_ip_id = %floating_ip.id, "mock: allocated floating IP");
        Ok(floating_ip)
    }

    async fn bind_floating_ip(
        &self,
        id: &FloatingIpId,
        port_id: &PortId,
    ) -> CloudResult<FloatingIp> {
        let mut state = self.state.lock().await;
        state.counters.binds += 1;
        if state.failures.bind {
            return Err(CloudError::Conflict(format!(
                "floating IP {id} cannot be bound to port {port_id}"
            )));
        }

        let floating_ip = state
            .floating_ips
            .iter_mut()
            .find(|f| &f.id == id)
            .ok_or_else(|| CloudError::not_found("floating IP", id.as_str()))?;

        if let Some(existing) = &floating_ip.port_id {
            if existing != port_id {
                return Err(CloudError::Conflict(format!(
                    "floating IP {id} is already bound to port {existing}"
                )));
            }
        }

        floating_ip.port_id = Some(port_id.clone());
        floating_ip.status = FloatingIpStatus::Active;
        Ok(floating_ip.clone())
    }

    async fn list_instances(&self) -> CloudResult<Vec<Instance>> {
        let state = self.state.lock().await;
        if state.failures.list_instances {
            return Err(CloudError::Api {
                status: 503,
                message: "compute service unavailable".to_string(),
            });
        }
        Ok(state.instances.iter().map(|m| m.instance.clone()).collect())
    }

    async fn get_instance(&self, id: &InstanceId) -> CloudResult<Instance> {
        let mut state = self.state.lock().await;
        state.counters.instance_polls += 1;
        let entry = state
            .instances
            .iter_mut()
            .find(|m| &m.instance.id == id)
            .ok_or_else(|| CloudError::not_found("instance", id.as_str()))?;

        if entry.instance.status == InstanceStatus::Build {
            entry.polls_remaining = entry.polls_remaining.saturating_sub(1);
            if entry.polls_remaining == 0 {
                entry.instance.status = if entry.boots_into_error {
                    InstanceStatus::Error
                } else {
                    InstanceStatus::Active
                };
            }
        }
        Ok(entry.instance.clone())
    }

    async fn create_instance(&self, request: &CreateInstance) -> CloudResult<Instance> {
        let mut state = self.state.lock().await;
        if let Some(limit) = state.failures.creates_after {
            if state.counters.instances_created >= limit {
                return Err(CloudError::Injected(format!(
                    "instance creation rejected for {}",
                    request.name
                )));
            }
        }

        let created_at = state
            .instances
            .iter()
            .map(|m| m.instance.created_at)
            .max()
            .map_or_else(|| mock_time(0), |latest| latest + Duration::seconds(1));

        let boots_into_error = state.failures.error_on_boot.contains(&request.name);
        let polls_remaining = state.boot_polls.max(1);
        let instance = Instance {
            id: InstanceId::generate(),
            name: request.name.clone(),
            status: InstanceStatus::Build,
            created_at,
        };
        state.counters.instances_created += 1;
        state.instances.push(MockInstance {
            instance: instance.clone(),
            polls_remaining,
            boots_into_error,
        });
        debug!(instance_id = %instance.id, name = %instance.name, "mock: instance submitted");
        Ok(instance)
    }

    async fn delete_instance(&self, id: &InstanceId) -> CloudResult<()> {
        let mut state = self.state.lock().await;
        state.counters.delete_calls += 1;
        if state.failures.deletes.contains(id) {
            return Err(CloudError::Injected(format!("delete rejected for {id}")));
        }
        state.instances.retain(|m| &m.instance.id != id);
        Ok(())
    }
}
