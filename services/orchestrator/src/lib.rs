//! stackops orchestration core.
//!
//! Two operations sit on top of the control plane's plain CRUD:
//!
//! - **Floating-IP assignment**: [`TopologyResolver`] finds the instance port
//!   reachable through a router with an external gateway, then
//!   [`FloatingIpBinder`] binds a reused or newly allocated address to it.
//! - **Pool reconciliation**: [`PoolReconciler`] creates or deletes members
//!   until a named pool has the requested size.
//!
//! Nothing is cached between calls; every operation reads the current state
//! through [`CloudApi`]. Dropping a returned future cancels the operation and
//! leaves any mutation already made in place.

use std::sync::Arc;

use stackops_cloud::model::{FloatingIp, InstanceTemplate, Network, Port};
use stackops_cloud::CloudApi;
use stackops_id::InstanceId;
use tracing::{info, instrument};

pub mod config;
pub mod error;
pub mod floating_ip;
pub mod pool;
pub mod topology;

pub use config::OrchestratorConfig;
pub use error::{OrchestratorError, OrchestratorResult};
pub use floating_ip::{AssignMode, Binding, BindingSource, FloatingIpBinder};
pub use pool::{CreateFailure, CreateFailureKind, DeleteFailure, PoolReconciler, ReconcileReport};
pub use topology::{EgressRoute, TopologyResolver};

/// Result of assigning a floating IP to an instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub port: Port,
    pub external_network: Network,
    pub floating_ip: FloatingIp,
    pub source: BindingSource,
}

/// The orchestration core wired to one control plane.
#[derive(Clone)]
pub struct Orchestrator {
    topology: TopologyResolver,
    binder: FloatingIpBinder,
    pools: PoolReconciler,
}

impl Orchestrator {
    pub fn new(cloud: Arc<dyn CloudApi>, config: &OrchestratorConfig) -> Self {
        Self {
            topology: TopologyResolver::new(cloud.clone()),
            binder: FloatingIpBinder::new(cloud.clone())
                .with_network_matching(config.match_external_network),
            pools: PoolReconciler::new(cloud, config.membership, config.wait.clone()),
        }
    }

    pub fn topology(&self) -> &TopologyResolver {
        &self.topology
    }

    pub fn binder(&self) -> &FloatingIpBinder {
        &self.binder
    }

    pub fn pools(&self) -> &PoolReconciler {
        &self.pools
    }

    /// Give `instance_id` a public address on its externally routed port.
    #[instrument(skip_all, fields(instance_id = %instance_id, mode = ?mode))]
    pub async fn assign_floating_ip(
        &self,
        instance_id: &InstanceId,
        mode: AssignMode,
    ) -> OrchestratorResult<Assignment> {
        let EgressRoute {
            port,
            external_network,
        } = self.topology.resolve_egress_port(instance_id).await?;

        if mode == AssignMode::ReuseExisting {
            if let Some(floating_ip) = self.binder.existing_binding(&port).await? {
                info!(
                    floating_ip_id = %floating_ip.id,
                    address = %floating_ip.address,
                    "Port already has a floating IP"
                );
                return Ok(Assignment {
                    port,
                    external_network,
                    floating_ip,
                    source: BindingSource::AlreadyBound,
                });
            }
        }

        let Binding {
            floating_ip,
            source,
        } = self.binder.bind_new(&port, &external_network).await?;

        Ok(Assignment {
            port,
            external_network,
            floating_ip,
            source,
        })
    }

    /// See [`PoolReconciler::reconcile`].
    pub async fn reconcile_pool(
        &self,
        base_name: &str,
        target: usize,
        template: &InstanceTemplate,
    ) -> OrchestratorResult<ReconcileReport> {
        self.pools.reconcile(base_name, target, template).await
    }

    /// See [`PoolReconciler::delete_members`].
    pub async fn delete_pool_members(
        &self,
        base_name: &str,
        count: usize,
    ) -> OrchestratorResult<ReconcileReport> {
        self.pools.delete_members(base_name, count).await
    }
}
