//! Integration tests for floating-IP assignment.
//!
//! Topologies are seeded into MockCloud and the full resolve-then-bind flow
//! runs through the Orchestrator.

use std::sync::Arc;

use stackops_cloud::model::FloatingIpStatus;
use stackops_cloud::MockCloud;
use stackops_id::InstanceId;
use stackops_orchestrator::{
    AssignMode, BindingSource, Orchestrator, OrchestratorConfig, OrchestratorError,
    TopologyResolver,
};

fn instance(id: &str) -> InstanceId {
    id.parse().unwrap()
}

fn orchestrator(cloud: &Arc<MockCloud>) -> Orchestrator {
    Orchestrator::new(cloud.clone(), &OrchestratorConfig::default())
}

/// `vm1` has ports on priv-A and priv-B. Only priv-B is attached to a router
/// with an external gateway.
fn two_network_topology() -> MockCloud {
    MockCloud::new()
        .with_network("ext", "public", true)
        .with_subnet("sub-ext", "ext", "203.0.113.0/24")
        .with_network("priv-A", "private-a", false)
        .with_subnet("sub-A", "priv-A", "10.0.1.0/24")
        .with_network("priv-B", "private-b", false)
        .with_subnet("sub-B", "priv-B", "10.0.2.0/24")
        .with_router("R1", Some("ext"))
        .with_router_port("R1", "rp-b", "priv-B", "sub-B")
        .with_instance_port("vm1", "port-a", "priv-A", "proj")
        .with_instance_port("vm1", "port-b", "priv-B", "proj")
}

#[tokio::test]
async fn test_vm_with_two_networks_resolves_to_routed_one() {
    let cloud = Arc::new(two_network_topology());
    let orchestrator = orchestrator(&cloud);

    let assignment = orchestrator
        .assign_floating_ip(&instance("vm1"), AssignMode::Always)
        .await
        .unwrap();

    assert_eq!(assignment.port.id.as_str(), "port-b");
    assert_eq!(assignment.port.network_id.as_str(), "priv-B");
    assert_eq!(assignment.external_network.id.as_str(), "ext");

    // No free address existed, so exactly one was allocated and bound.
    assert_eq!(assignment.source, BindingSource::Allocated);
    assert_eq!(assignment.floating_ip.port_id.as_ref(), Some(&assignment.port.id));
    assert_eq!(assignment.floating_ip.status, FloatingIpStatus::Active);
    assert_eq!(cloud.counters().await.floating_ips_created, 1);
}

#[tokio::test]
async fn test_free_address_in_project_is_reused() {
    let cloud = Arc::new(
        two_network_topology()
            .with_floating_ip("fip-2", "ext", "proj", None)
            .with_floating_ip("fip-1", "ext", "proj", None),
    );
    let orchestrator = orchestrator(&cloud);

    let assignment = orchestrator
        .assign_floating_ip(&instance("vm1"), AssignMode::Always)
        .await
        .unwrap();

    assert_eq!(assignment.source, BindingSource::Reused);
    assert_eq!(assignment.floating_ip.id.as_str(), "fip-1");
    assert_eq!(assignment.floating_ip.port_id.as_ref().unwrap().as_str(), "port-b");
    assert_eq!(cloud.counters().await.floating_ips_created, 0);
}

#[tokio::test]
async fn test_reuse_existing_leaves_bound_port_alone() {
    let cloud = Arc::new(two_network_topology().with_floating_ip("fip-1", "ext", "proj", Some("port-b")));
    let orchestrator = orchestrator(&cloud);

    let assignment = orchestrator
        .assign_floating_ip(&instance("vm1"), AssignMode::ReuseExisting)
        .await
        .unwrap();

    assert_eq!(assignment.source, BindingSource::AlreadyBound);
    assert_eq!(assignment.floating_ip.id.as_str(), "fip-1");

    let counters = cloud.counters().await;
    assert_eq!(counters.binds, 0);
    assert_eq!(counters.floating_ips_created, 0);
}

#[tokio::test]
async fn test_always_mode_binds_another_address() {
    let cloud = Arc::new(two_network_topology().with_floating_ip("fip-1", "ext", "proj", Some("port-b")));
    let orchestrator = orchestrator(&cloud);

    let assignment = orchestrator
        .assign_floating_ip(&instance("vm1"), AssignMode::Always)
        .await
        .unwrap();

    assert_eq!(assignment.source, BindingSource::Allocated);
    assert_ne!(assignment.floating_ip.id.as_str(), "fip-1");

    let bound_to_port = cloud
        .floating_ips()
        .await
        .into_iter()
        .filter(|fip| fip.port_id.as_ref().map(|p| p.as_str()) == Some("port-b"))
        .count();
    assert_eq!(bound_to_port, 2);
}

#[tokio::test]
async fn test_no_reachable_port() {
    let cloud = Arc::new(
        MockCloud::new()
            .with_network("ext", "public", true)
            .with_network("priv-A", "private-a", false)
            .with_subnet("sub-A", "priv-A", "10.0.1.0/24")
            .with_network("priv-C", "private-c", false)
            .with_subnet("sub-C", "priv-C", "10.0.3.0/24")
            .with_router("R1", Some("ext"))
            .with_router_port("R1", "rp-c", "priv-C", "sub-C")
            .with_instance_port("vm1", "port-a", "priv-A", "proj"),
    );
    let orchestrator = orchestrator(&cloud);

    let err = orchestrator
        .assign_floating_ip(&instance("vm1"), AssignMode::Always)
        .await
        .unwrap_err();

    assert!(matches!(err, OrchestratorError::NoReachablePort { .. }));
    assert!(err.is_precondition());
    assert_eq!(cloud.counters().await.floating_ips_created, 0);
}

#[tokio::test]
async fn test_deleted_subnet_is_skipped() {
    let cloud = Arc::new(
        two_network_topology()
            .with_network("priv-old", "private-old", false)
            .with_subnet("sub-old", "priv-old", "10.0.9.0/24")
            .with_router("R0", Some("ext"))
            .with_router_port("R0", "rp-old", "priv-old", "sub-old"),
    );
    cloud.remove_subnet("sub-old").await;

    let route = TopologyResolver::new(cloud.clone())
        .resolve_egress_port(&instance("vm1"))
        .await
        .unwrap();

    assert_eq!(route.port.id.as_str(), "port-b");
}

#[tokio::test]
async fn test_scan_stops_once_first_port_network_is_reachable() {
    // R1 routes priv-A, the network of the lowest-id port. R2 is never scanned.
    let cloud = Arc::new(
        MockCloud::new()
            .with_network("ext", "public", true)
            .with_network("priv-A", "private-a", false)
            .with_subnet("sub-A", "priv-A", "10.0.1.0/24")
            .with_network("priv-B", "private-b", false)
            .with_subnet("sub-B", "priv-B", "10.0.2.0/24")
            .with_router("R1", Some("ext"))
            .with_router_port("R1", "rp-a", "priv-A", "sub-A")
            .with_router("R2", Some("ext"))
            .with_router_port("R2", "rp-b", "priv-B", "sub-B")
            .with_instance_port("vm1", "port-a", "priv-A", "proj")
            .with_instance_port("vm1", "port-b", "priv-B", "proj"),
    );

    let route = TopologyResolver::new(cloud.clone())
        .resolve_egress_port(&instance("vm1"))
        .await
        .unwrap();

    assert_eq!(route.port.id.as_str(), "port-a");
    assert_eq!(cloud.counters().await.subnet_lookups, 1);
}

#[tokio::test]
async fn test_allocation_failure_is_surfaced() {
    let cloud = Arc::new(two_network_topology().reject_allocation());
    let orchestrator = orchestrator(&cloud);

    let err = orchestrator
        .assign_floating_ip(&instance("vm1"), AssignMode::Always)
        .await
        .unwrap_err();

    assert!(matches!(err, OrchestratorError::AllocationFailed { .. }));
    assert!(!err.is_precondition());
}

#[tokio::test]
async fn test_bind_failure_is_surfaced() {
    let cloud = Arc::new(
        two_network_topology()
            .with_floating_ip("fip-1", "ext", "proj", None)
            .reject_bind(),
    );
    let orchestrator = orchestrator(&cloud);

    let err = orchestrator
        .assign_floating_ip(&instance("vm1"), AssignMode::Always)
        .await
        .unwrap_err();

    assert!(matches!(err, OrchestratorError::BindFailed { .. }));
}
