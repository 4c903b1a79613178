//! Floating-IP binding.
//!
//! Unbound addresses already allocated to the project are reused before a new
//! one is allocated, so repeated assignments do not exhaust the quota.

use std::sync::Arc;

use serde::Serialize;
use stackops_cloud::model::{FloatingIp, Network, Port};
use stackops_cloud::CloudApi;
use tracing::{debug, info, instrument};

use crate::error::{OrchestratorError, OrchestratorResult};

/// Whether an address already bound to the port satisfies the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignMode {
    /// Always bind another address, even if the port already has one.
    Always,

    /// Return the address already bound to the port, if any, without
    /// changing anything.
    ReuseExisting,
}

/// Where the bound address came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingSource {
    /// The port was already bound; nothing changed.
    AlreadyBound,

    /// An unbound address of the project was reused.
    Reused,

    /// A new address was allocated.
    Allocated,
}

/// A floating IP bound to a port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub floating_ip: FloatingIp,
    pub source: BindingSource,
}

/// Finds or allocates a public address and binds it to a port.
#[derive(Clone)]
pub struct FloatingIpBinder {
    cloud: Arc<dyn CloudApi>,
    match_external_network: bool,
}

impl FloatingIpBinder {
    pub fn new(cloud: Arc<dyn CloudApi>) -> Self {
        Self {
            cloud,
            match_external_network: false,
        }
    }

    /// Only reuse addresses that belong to the requested external network.
    pub fn with_network_matching(mut self, enabled: bool) -> Self {
        self.match_external_network = enabled;
        self
    }

    /// Bind an address from `external_network` to `port`.
    pub async fn assign(
        &self,
        port: &Port,
        external_network: &Network,
    ) -> OrchestratorResult<FloatingIp> {
        self.bind_new(port, external_network)
            .await
            .map(|binding| binding.floating_ip)
    }

    /// Like [`assign`](Self::assign), also reporting whether the address was
    /// reused or allocated.
    #[instrument(skip_all, fields(port_id = %port.id, network_id = %external_network.id))]
    pub async fn bind_new(
        &self,
        port: &Port,
        external_network: &Network,
    ) -> OrchestratorResult<Binding> {
        let candidates = self.reuse_candidates(port, external_network).await?;

        let (floating_ip, source) = match candidates.into_iter().next() {
            Some(floating_ip) => {
                info!(
                    floating_ip_id = %floating_ip.id,
                    address = %floating_ip.address,
                    "Reusing unbound floating IP"
                );
                (floating_ip, BindingSource::Reused)
            }
            None => (
                self.allocate(port, external_network).await?,
                BindingSource::Allocated,
            ),
        };

        let floating_ip = self.bind(&floating_ip, port).await?;
        Ok(Binding {
            floating_ip,
            source,
        })
    }

    /// Unbound addresses of the port's project, ordered by id.
    ///
    /// A port without a project has no candidates; listing without a project
    /// filter would return every project's addresses.
    pub async fn reuse_candidates(
        &self,
        port: &Port,
        external_network: &Network,
    ) -> OrchestratorResult<Vec<FloatingIp>> {
        let Some(project_id) = port.project_id.as_ref() else {
            debug!(port_id = %port.id, "Port has no project, skipping reuse");
            return Ok(Vec::new());
        };

        let mut candidates: Vec<_> = self
            .cloud
            .list_floating_ips(Some(project_id))
            .await?
            .into_iter()
            .filter(FloatingIp::is_free)
            .filter(|fip| {
                !self.match_external_network || fip.floating_network_id == external_network.id
            })
            .collect();
        candidates.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(candidates)
    }

    /// The address currently bound to `port`, if any.
    pub async fn existing_binding(&self, port: &Port) -> OrchestratorResult<Option<FloatingIp>> {
        Ok(self
            .cloud
            .list_floating_ips(port.project_id.as_ref())
            .await?
            .into_iter()
            .filter(|fip| fip.port_id.as_ref() == Some(&port.id))
            .min_by(|a, b| a.id.cmp(&b.id)))
    }

    async fn allocate(&self, port: &Port, external_network: &Network) -> OrchestratorResult<FloatingIp> {
        let floating_ip = self
            .cloud
            .create_floating_ip(&external_network.id, port.project_id.as_ref())
            .await
            .map_err(|source| OrchestratorError::AllocationFailed {
                network_id: external_network.id.clone(),
                source,
            })?;

        info!(
            floating_ip_id = %floating_ip.id,
            address = %floating_ip.address,
            "Allocated floating IP"
        );
        Ok(floating_ip)
    }

    async fn bind(&self, floating_ip: &FloatingIp, port: &Port) -> OrchestratorResult<FloatingIp> {
        let bind_failed = |reason: String| OrchestratorError::BindFailed {
            floating_ip_id: floating_ip.id.clone(),
            port_id: port.id.clone(),
            reason,
        };

        let bound = self
            .cloud
            .bind_floating_ip(&floating_ip.id, &port.id)
            .await
            .map_err(|e| bind_failed(e.to_string()))?;

        if bound.port_id.as_ref() != Some(&port.id) {
            return Err(bind_failed(
                "control plane did not report the port binding".to_string(),
            ));
        }

        info!(
            floating_ip_id = %bound.id,
            address = %bound.address,
            port_id = %port.id,
            "Bound floating IP"
        );
        Ok(bound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use stackops_cloud::MockCloud;
    use stackops_id::NetworkId;

    fn port(id: &str, project: &str) -> Port {
        Port {
            id: id.parse().unwrap(),
            device_id: "vm1".to_string(),
            device_owner: "compute:nova".to_string(),
            network_id: "priv".parse().unwrap(),
            project_id: Some(project.parse().unwrap()),
            fixed_ips: Vec::new(),
        }
    }

    fn network(id: &str) -> Network {
        Network {
            id: id.parse().unwrap(),
            name: id.to_string(),
            is_external: true,
            subnet_ids: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_reuses_lowest_id_candidate() {
        let cloud = Arc::new(
            MockCloud::new()
                .with_network("ext", "public", true)
                .with_floating_ip("fip-b", "ext", "proj", None)
                .with_floating_ip("fip-a", "ext", "proj", None)
                .with_floating_ip("fip-0", "ext", "proj", Some("other-port")),
        );
        let binder = FloatingIpBinder::new(cloud.clone());

        let binding = binder.bind_new(&port("p1", "proj"), &network("ext")).await.unwrap();
        assert_eq!(binding.floating_ip.id.as_str(), "fip-a");
        assert_eq!(binding.source, BindingSource::Reused);
        assert_eq!(cloud.counters().await.floating_ips_created, 0);
    }

    #[tokio::test]
    async fn test_other_projects_are_not_reused() {
        let cloud = Arc::new(
            MockCloud::new()
                .with_network("ext", "public", true)
                .with_floating_ip("fip-x", "ext", "other", None),
        );
        let binder = FloatingIpBinder::new(cloud.clone());

        let fip = binder.assign(&port("p1", "proj"), &network("ext")).await.unwrap();
        assert_ne!(fip.id.as_str(), "fip-x");
        assert_eq!(fip.project_id.as_ref().map(|p| p.as_str()), Some("proj"));
        assert_eq!(cloud.counters().await.floating_ips_created, 1);
    }

    #[tokio::test]
    async fn test_network_matching_skips_foreign_candidates() {
        let cloud = Arc::new(
            MockCloud::new()
                .with_network("ext", "public", true)
                .with_network("ext-2", "public-2", true)
                .with_floating_ip("fip-a", "ext-2", "proj", None),
        );
        let binder = FloatingIpBinder::new(cloud.clone()).with_network_matching(true);

        let fip = binder.assign(&port("p1", "proj"), &network("ext")).await.unwrap();
        let expected: NetworkId = "ext".parse().unwrap();
        assert_eq!(fip.floating_network_id, expected);
        assert_eq!(cloud.counters().await.floating_ips_created, 1);
    }

    #[tokio::test]
    async fn test_existing_binding() {
        let cloud = Arc::new(
            MockCloud::new()
                .with_network("ext", "public", true)
                .with_floating_ip("fip-a", "ext", "proj", Some("p1")),
        );
        let binder = FloatingIpBinder::new(cloud);

        let existing = binder.existing_binding(&port("p1", "proj")).await.unwrap();
        assert_eq!(existing.unwrap().id.as_str(), "fip-a");
        assert!(binder
            .existing_binding(&port("p2", "proj"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_port_without_project_allocates() {
        let cloud = Arc::new(
            MockCloud::new()
                .with_network("ext", "public", true)
                .with_floating_ip("fip-x", "ext", "other", None),
        );
        let binder = FloatingIpBinder::new(cloud.clone());
        let mut port = port("p1", "proj");
        port.project_id = None;

        let binding = binder.bind_new(&port, &network("ext")).await.unwrap();
        assert_ne!(binding.floating_ip.id.as_str(), "fip-x");
        assert_eq!(binding.source, BindingSource::Allocated);
        assert_eq!(cloud.counters().await.floating_ips_created, 1);
        assert!(binder
            .reuse_candidates(&port, &network("ext"))
            .await
            .unwrap()
            .is_empty());
    }

    #[derive(Debug, Clone, Copy)]
    enum Failure {
        Allocation,
        Bind,
    }

    #[rstest]
    #[case::allocation_without_candidates(Failure::Allocation, false)]
    #[case::bind_of_reused_address(Failure::Bind, true)]
    #[case::bind_of_new_address(Failure::Bind, false)]
    #[tokio::test]
    async fn test_rejections(#[case] failure: Failure, #[case] with_candidate: bool) {
        let mut cloud = MockCloud::new().with_network("ext", "public", true);
        if with_candidate {
            cloud = cloud.with_floating_ip("fip-a", "ext", "proj", None);
        }
        cloud = match failure {
            Failure::Allocation => cloud.reject_allocation(),
            Failure::Bind => cloud.reject_bind(),
        };
        let binder = FloatingIpBinder::new(Arc::new(cloud));

        let err = binder.assign(&port("p1", "proj"), &network("ext")).await.unwrap_err();
        match failure {
            Failure::Allocation => {
                assert!(matches!(err, OrchestratorError::AllocationFailed { .. }))
            }
            Failure::Bind => assert!(matches!(err, OrchestratorError::BindFailed { .. })),
        }
        assert!(!err.is_precondition());
    }
}
