//! Topology resolution.
//!
//! Finds the port of an instance that can be reached from outside. A port is
//! reachable when its network is attached to a router whose external gateway
//! is set. Router interfaces only carry subnet ids, so each one is resolved to
//! its network through a subnet lookup.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use stackops_cloud::model::{Network, Port};
use stackops_cloud::CloudApi;
use stackops_id::{InstanceId, NetworkId, SubnetId};
use tracing::{debug, info, instrument, warn};

use crate::error::{OrchestratorError, OrchestratorResult};

/// The port to expose and the network to draw its public address from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EgressRoute {
    pub port: Port,
    pub external_network: Network,
}

/// Resolves instance ports against the current router topology.
#[derive(Clone)]
pub struct TopologyResolver {
    cloud: Arc<dyn CloudApi>,
}

impl TopologyResolver {
    pub fn new(cloud: Arc<dyn CloudApi>) -> Self {
        Self { cloud }
    }

    /// Pick the port of `instance_id` that sits on an externally routed network.
    ///
    /// Ports are considered in id order, so the result is stable for a given
    /// topology.
    #[instrument(skip_all, fields(instance_id = %instance_id))]
    pub async fn resolve_egress_port(
        &self,
        instance_id: &InstanceId,
    ) -> OrchestratorResult<EgressRoute> {
        let external_network = self.external_network().await?;

        let mut ports = self.cloud.list_ports(Some(instance_id.as_str())).await?;
        if ports.is_empty() {
            return Err(OrchestratorError::NoInstancePorts {
                instance_id: instance_id.clone(),
            });
        }
        ports.sort_by(|a, b| a.id.cmp(&b.id));

        let preferred = ports[0].network_id.clone();
        let reachable = self.reachable_networks(Some(&preferred)).await?;

        let port = ports
            .into_iter()
            .find(|port| reachable.contains(&port.network_id))
            .ok_or_else(|| OrchestratorError::NoReachablePort {
                instance_id: instance_id.clone(),
            })?;

        info!(
            port_id = %port.id,
            network_id = %port.network_id,
            external_network_id = %external_network.id,
            "Resolved egress port"
        );

        Ok(EgressRoute {
            port,
            external_network,
        })
    }

    /// The external network addresses are drawn from: the first by id.
    pub async fn external_network(&self) -> OrchestratorResult<Network> {
        self.cloud
            .list_networks()
            .await?
            .into_iter()
            .filter(|network| network.is_external)
            .min_by(|a, b| a.id.cmp(&b.id))
            .ok_or(OrchestratorError::NoExternalNetwork)
    }

    /// Networks attached to a router with an external gateway.
    ///
    /// With `stop_at` set, the scan ends as soon as that network is found and
    /// the returned set may be partial.
    pub async fn reachable_networks(
        &self,
        stop_at: Option<&NetworkId>,
    ) -> OrchestratorResult<HashSet<NetworkId>> {
        let mut routers: Vec<_> = self
            .cloud
            .list_routers()
            .await?
            .into_iter()
            .filter(|router| router.has_external_gateway())
            .collect();
        routers.sort_by(|a, b| a.id.cmp(&b.id));

        let mut resolved: HashMap<SubnetId, Option<NetworkId>> = HashMap::new();
        let mut networks = HashSet::new();

        for router in &routers {
            let ports = self.cloud.list_ports(Some(router.id.as_str())).await?;
            for fixed_ip in ports.iter().flat_map(|port| &port.fixed_ips) {
                let network_id = match resolved.get(&fixed_ip.subnet_id) {
                    Some(cached) => cached.clone(),
                    None => {
                        let network_id = self.subnet_network(&fixed_ip.subnet_id).await?;
                        resolved.insert(fixed_ip.subnet_id.clone(), network_id.clone());
                        network_id
                    }
                };

                if let Some(network_id) = network_id {
                    networks.insert(network_id);
                }

                if stop_at.is_some_and(|target| networks.contains(target)) {
                    debug!(router_id = %router.id, "Preferred network reachable, stopping scan");
                    return Ok(networks);
                }
            }
        }

        Ok(networks)
    }

    /// Network owning a subnet, or `None` when the subnet has been deleted.
    async fn subnet_network(&self, subnet_id: &SubnetId) -> OrchestratorResult<Option<NetworkId>> {
        match self.cloud.get_subnet(subnet_id).await {
            Ok(subnet) => Ok(Some(subnet.network_id)),
            Err(e) if e.is_not_found() => {
                warn!(subnet_id = %subnet_id, "Router interface references missing subnet, skipping");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}
