//! End-to-end happy path test.
//!
//! Drives the orchestration core through the REST client against a mock
//! control plane, verifying:
//!
//! 1. Egress port resolution through a gateway router
//! 2. Floating IP allocation and binding on that port
//! 3. Pool scale-up that creates the missing member and waits for it
//!
//! ## Running
//!
//! ```bash
//! cargo test -p stackops-e2e --test happy_path
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use stackops_cloud::model::InstanceTemplate;
use stackops_cloud::{CloudConfig, RestCloudClient};
use stackops_orchestrator::{AssignMode, BindingSource, Orchestrator, OrchestratorConfig};
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("stackops_orchestrator=debug")
        .try_init();
}

fn orchestrator(server: &MockServer) -> Orchestrator {
    let config = CloudConfig {
        compute_url: format!("{}/compute", server.uri()),
        network_url: server.uri(),
        token: Some("e2e-token".to_string()),
        request_timeout: Duration::from_secs(5),
    };
    let client = RestCloudClient::new(&config).unwrap();
    Orchestrator::new(Arc::new(client), &OrchestratorConfig::default())
}

async fn mount_get(server: &MockServer, route: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// One external network, two private networks, one router bridging priv-b
/// to the outside. vm1 has a port on each private network.
async fn mount_topology(server: &MockServer) {
    mount_get(
        server,
        "/v2.0/networks",
        json!({
            "networks": [
                {"id": "ext", "name": "public", "router:external": true, "subnets": ["sub-ext"]},
                {"id": "priv-a", "name": "a", "router:external": false, "subnets": ["sub-a"]},
                {"id": "priv-b", "name": "b", "router:external": false, "subnets": ["sub-b"]}
            ]
        }),
    )
    .await;

    mount_get(
        server,
        "/v2.0/routers",
        json!({
            "routers": [
                {"id": "r1", "name": "edge", "external_gateway_info": {"network_id": "ext"}},
                {"id": "r2", "name": "isolated", "external_gateway_info": null}
            ]
        }),
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/v2.0/ports"))
        .and(query_param("device_id", "vm1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ports": [
                {
                    "id": "port-a", "device_id": "vm1", "device_owner": "compute:nova",
                    "network_id": "priv-a", "project_id": "proj-1",
                    "fixed_ips": [{"subnet_id": "sub-a", "ip_address": "10.0.1.5"}]
                },
                {
                    "id": "port-b", "device_id": "vm1", "device_owner": "compute:nova",
                    "network_id": "priv-b", "project_id": "proj-1",
                    "fixed_ips": [{"subnet_id": "sub-b", "ip_address": "10.0.2.5"}]
                }
            ]
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v2.0/ports"))
        .and(query_param("device_id", "r1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ports": [
                {
                    "id": "rport-b", "device_id": "r1",
                    "device_owner": "network:router_interface",
                    "network_id": "priv-b", "project_id": "",
                    "fixed_ips": [{"subnet_id": "sub-b", "ip_address": "10.0.2.1"}]
                }
            ]
        })))
        .mount(server)
        .await;

    mount_get(
        server,
        "/v2.0/subnets/sub-b",
        json!({
            "subnet": {"id": "sub-b", "network_id": "priv-b", "name": "b", "cidr": "10.0.2.0/24"}
        }),
    )
    .await;
}

#[tokio::test]
async fn test_assign_floating_ip_over_rest() {
    init_tracing();
    let server = MockServer::start().await;
    mount_topology(&server).await;

    mount_get(&server, "/v2.0/floatingips", json!({ "floatingips": [] })).await;

    Mock::given(method("POST"))
        .and(path("/v2.0/floatingips"))
        .and(body_partial_json(json!({
            "floatingip": {"floating_network_id": "ext", "project_id": "proj-1"}
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "floatingip": {
                "id": "fip-new", "floating_ip_address": "203.0.113.10", "status": "DOWN",
                "project_id": "proj-1", "floating_network_id": "ext", "port_id": null
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/v2.0/floatingips/fip-new"))
        .and(body_partial_json(json!({ "floatingip": {"port_id": "port-b"} })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "floatingip": {
                "id": "fip-new", "floating_ip_address": "203.0.113.10", "status": "ACTIVE",
                "project_id": "proj-1", "floating_network_id": "ext", "port_id": "port-b"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let assignment = orchestrator(&server)
        .assign_floating_ip(&"vm1".parse().unwrap(), AssignMode::ReuseExisting)
        .await
        .unwrap();

    assert_eq!(assignment.port.id.as_str(), "port-b");
    assert_eq!(assignment.external_network.id.as_str(), "ext");
    assert_eq!(assignment.floating_ip.address.to_string(), "203.0.113.10");
    assert_eq!(assignment.source, BindingSource::Allocated);
}

#[tokio::test]
async fn test_scale_pool_over_rest() {
    init_tracing();
    let server = MockServer::start().await;

    mount_get(
        &server,
        "/compute/servers/detail",
        json!({
            "servers": [
                {"id": "i-1", "name": "web_1", "status": "ACTIVE", "created": "2024-05-01T12:00:00Z"},
                {"id": "i-9", "name": "db_1", "status": "ACTIVE", "created": "2024-05-01T11:00:00Z"}
            ]
        }),
    )
    .await;

    Mock::given(method("POST"))
        .and(path("/compute/servers"))
        .and(body_partial_json(json!({
            "server": {"name": "web_2", "imageRef": "img-1", "flavorRef": "m1.small"}
        })))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "server": {"id": "i-2"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    mount_get(
        &server,
        "/compute/servers/i-2",
        json!({
            "server": {"id": "i-2", "name": "web_2", "status": "ACTIVE", "created": "2024-05-01T12:05:00Z"}
        }),
    )
    .await;

    let template = InstanceTemplate {
        image: "img-1".parse().unwrap(),
        flavor: "m1.small".parse().unwrap(),
        networks: vec!["priv-b".parse().unwrap()],
        key_name: None,
        security_group: None,
        user_data: None,
    };

    let report = orchestrator(&server)
        .reconcile_pool("web", 2, &template)
        .await
        .unwrap();

    assert_eq!(report.previous_count, 1);
    assert_eq!(report.created, vec!["web_2".to_string()]);
    assert!(report.deleted.is_empty());
    assert!(report.is_complete());
}
