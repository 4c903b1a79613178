//! HTTP client for the control plane's REST API.

use async_trait::async_trait;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use stackops_id::{FloatingIpId, InstanceId, NetworkId, PortId, ProjectId, RouterId, SubnetId};
use tracing::{debug, instrument};

use crate::api::CloudApi;
use crate::config::CloudConfig;
use crate::error::{CloudError, CloudResult};
use crate::model::{
    CreateInstance, FloatingIp, Flavor, Image, Instance, Keypair, Network, Port, Router,
    SecurityGroup, Subnet,
};

const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// Which service an endpoint path belongs to.
#[derive(Debug, Clone, Copy)]
enum Service {
    Compute,
    Network,
}

/// REST client for the compute and network services.
#[derive(Debug, Clone)]
pub struct RestCloudClient {
    client: reqwest::Client,
    compute_url: String,
    network_url: String,
}

impl RestCloudClient {
    /// Create a new client from config.
    pub fn new(config: &CloudConfig) -> CloudResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        if let Some(token) = config.token.as_deref() {
            let value = HeaderValue::from_str(token)
                .map_err(|_| CloudError::Config("token is not a valid header value".into()))?;
            headers.insert(AUTH_TOKEN_HEADER, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            compute_url: config.compute_url.trim_end_matches('/').to_string(),
            network_url: config.network_url.trim_end_matches('/').to_string(),
        })
    }

    /// Build a URL for an endpoint.
    fn url(&self, service: Service, path: &str) -> String {
        match service {
            Service::Compute => format!("{}{}", self.compute_url, path),
            Service::Network => format!("{}/v2.0{}", self.network_url, path),
        }
    }

    async fn get<T: DeserializeOwned>(
        &self,
        service: Service,
        path: &str,
        query: &[(&str, &str)],
    ) -> CloudResult<T> {
        let url = self.url(service, path);
        debug!(url = %url, "GET");
        let response = self.client.get(url).query(query).send().await?;
        handle_response(response, path).await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        service: Service,
        path: &str,
        body: &B,
    ) -> CloudResult<T> {
        let url = self.url(service, path);
        debug!(url = %url, "POST");
        let response = self.client.post(url).json(body).send().await?;
        handle_response(response, path).await
    }

    async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        service: Service,
        path: &str,
        body: &B,
    ) -> CloudResult<T> {
        let url = self.url(service, path);
        debug!(url = %url, "PUT");
        let response = self.client.put(url).json(body).send().await?;
        handle_response(response, path).await
    }

    /// DELETE that treats an already-absent resource as success.
    async fn delete_ignore_missing(&self, service: Service, path: &str) -> CloudResult<()> {
        let url = self.url(service, path);
        debug!(url = %url, "DELETE");
        let response = self.client.delete(url).send().await?;

        if response.status().is_success() || response.status() == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            handle_error(response, path).await
        }
    }

    // Networks

    /// Create a network together with one IPv4 subnet.
    #[instrument(skip(self))]
    pub async fn create_network(
        &self,
        name: &str,
        subnet_name: &str,
        cidr: &str,
    ) -> CloudResult<(Network, Subnet)> {
        let network: NetworkEnvelope = self
            .post(Service::Network, "/networks", &json!({ "network": { "name": name } }))
            .await?;

        let body = json!({
            "subnet": {
                "name": subnet_name,
                "network_id": network.network.id,
                "ip_version": 4,
                "cidr": cidr,
            }
        });
        let subnet: SubnetEnvelope = self.post(Service::Network, "/subnets", &body).await?;

        Ok((network.network, subnet.subnet))
    }

    pub async fn delete_network(&self, id: &NetworkId) -> CloudResult<()> {
        self.delete_ignore_missing(Service::Network, &format!("/networks/{id}"))
            .await
    }

    pub async fn list_security_groups(&self) -> CloudResult<Vec<SecurityGroup>> {
        let response: SecurityGroupsEnvelope =
            self.get(Service::Network, "/security-groups", &[]).await?;
        Ok(response.security_groups)
    }

    // Routers

    /// Create a router with its gateway on `external_network_id`.
    #[instrument(skip(self))]
    pub async fn create_router(
        &self,
        name: &str,
        external_network_id: &NetworkId,
    ) -> CloudResult<Router> {
        let body = json!({
            "router": {
                "name": name,
                "external_gateway_info": { "network_id": external_network_id },
            }
        });
        let response: RouterEnvelope = self.post(Service::Network, "/routers", &body).await?;
        Ok(response.router)
    }

    pub async fn delete_router(&self, id: &RouterId) -> CloudResult<()> {
        self.delete_ignore_missing(Service::Network, &format!("/routers/{id}"))
            .await
    }

    // Compute catalog

    pub async fn list_images(&self) -> CloudResult<Vec<Image>> {
        let response: ImagesEnvelope = self.get(Service::Compute, "/images", &[]).await?;
        Ok(response.images)
    }

    pub async fn list_flavors(&self) -> CloudResult<Vec<Flavor>> {
        let response: FlavorsEnvelope =
            self.get(Service::Compute, "/flavors/detail", &[]).await?;
        Ok(response.flavors)
    }

    // Keypairs

    pub async fn list_keypairs(&self) -> CloudResult<Vec<Keypair>> {
        let response: KeypairsEnvelope = self.get(Service::Compute, "/os-keypairs", &[]).await?;
        Ok(response.keypairs.into_iter().map(|k| k.keypair).collect())
    }

    /// Create a keypair; the response carries the private key exactly once.
    #[instrument(skip(self))]
    pub async fn create_keypair(&self, name: &str) -> CloudResult<Keypair> {
        let response: KeypairEnvelope = self
            .post(Service::Compute, "/os-keypairs", &json!({ "keypair": { "name": name } }))
            .await?;
        Ok(response.keypair)
    }

    pub async fn delete_keypair(&self, name: &str) -> CloudResult<()> {
        self.delete_ignore_missing(Service::Compute, &format!("/os-keypairs/{name}"))
            .await
    }
}

#[async_trait]
impl CloudApi for RestCloudClient {
    async fn list_networks(&self) -> CloudResult<Vec<Network>> {
        let response: NetworksEnvelope = self.get(Service::Network, "/networks", &[]).await?;
        Ok(response.networks)
    }

    async fn list_routers(&self) -> CloudResult<Vec<Router>> {
        let response: RoutersEnvelope = self.get(Service::Network, "/routers", &[]).await?;
        Ok(response.routers)
    }

    async fn list_ports(&self, device_id: Option<&str>) -> CloudResult<Vec<Port>> {
        let query: Vec<(&str, &str)> = device_id.map(|id| ("device_id", id)).into_iter().collect();
        let response: PortsEnvelope = self.get(Service::Network, "/ports", &query).await?;
        Ok(response.ports)
    }

    async fn get_subnet(&self, id: &SubnetId) -> CloudResult<Subnet> {
        let response: SubnetEnvelope = self
            .get(Service::Network, &format!("/subnets/{id}"), &[])
            .await
            .map_err(|e| match e {
                CloudError::NotFound { .. } => CloudError::not_found("subnet", id.as_str()),
                other => other,
            })?;
        Ok(response.subnet)
    }

    async fn list_floating_ips(
        &self,
        project_id: Option<&ProjectId>,
    ) -> CloudResult<Vec<FloatingIp>> {
        let query: Vec<(&str, &str)> = project_id
            .map(|id| ("project_id", id.as_str()))
            .into_iter()
            .collect();
        let response: FloatingIpsEnvelope =
            self.get(Service::Network, "/floatingips", &query).await?;
        Ok(response.floatingips)
    }

    async fn create_floating_ip(
        &self,
        network_id: &NetworkId,
        project_id: Option<&ProjectId>,
    ) -> CloudResult<FloatingIp> {
        let mut body = json!({ "floating_network_id": network_id });
        if let Some(project_id) = project_id {
            body["project_id"] = json!(project_id);
        }
        let response: FloatingIpEnvelope = self
            .post(Service::Network, "/floatingips", &json!({ "floatingip": body }))
            .await?;
        Ok(response.floatingip)
    }

    async fn bind_floating_ip(
        &self,
        id: &FloatingIpId,
        port_id: &PortId,
    ) -> CloudResult<FloatingIp> {
        let response: FloatingIpEnvelope = self
            .put(
                Service::Network,
                &format!("/floatingips/{id}"),
                &json!({ "floatingip": { "port_id": port_id } }),
            )
            .await?;
        Ok(response.floatingip)
    }

    async fn list_instances(&self) -> CloudResult<Vec<Instance>> {
        let response: ServersEnvelope = self.get(Service::Compute, "/servers/detail", &[]).await?;
        Ok(response.servers)
    }

    async fn get_instance(&self, id: &InstanceId) -> CloudResult<Instance> {
        let response: ServerEnvelope = self
            .get(Service::Compute, &format!("/servers/{id}"), &[])
            .await
            .map_err(|e| match e {
                CloudError::NotFound { .. } => CloudError::not_found("instance", id.as_str()),
                other => other,
            })?;
        Ok(response.server)
    }

    async fn create_instance(&self, request: &CreateInstance) -> CloudResult<Instance> {
        let template = &request.template;
        let mut server = json!({
            "name": request.name,
            "imageRef": template.image,
            "flavorRef": template.flavor,
            "networks": template
                .networks
                .iter()
                .map(|id| json!({ "uuid": id }))
                .collect::<Vec<_>>(),
        });
        if let Some(key_name) = &template.key_name {
            server["key_name"] = json!(key_name);
        }
        if let Some(group) = &template.security_group {
            server["security_groups"] = json!([{ "name": group }]);
        }
        if let Some(user_data) = &template.user_data {
            server["user_data"] =
                json!(base64::engine::general_purpose::STANDARD.encode(user_data.as_bytes()));
        }

        // The create response only carries the id; fetch the full record.
        let created: CreatedServerEnvelope = self
            .post(Service::Compute, "/servers", &json!({ "server": server }))
            .await?;
        self.get_instance(&created.server.id).await
    }

    async fn delete_instance(&self, id: &InstanceId) -> CloudResult<()> {
        self.delete_ignore_missing(Service::Compute, &format!("/servers/{id}"))
            .await
    }
}

/// Handle a successful or error response.
async fn handle_response<T: DeserializeOwned>(
    response: reqwest::Response,
    path: &str,
) -> CloudResult<T> {
    if response.status().is_success() {
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    } else {
        handle_error(response, path).await
    }
}

/// Handle an error response.
async fn handle_error<T>(response: reqwest::Response, path: &str) -> CloudResult<T> {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string()
    });

    Err(match status {
        StatusCode::NOT_FOUND => CloudError::not_found("resource", path),
        StatusCode::CONFLICT => CloudError::Conflict(message),
        StatusCode::UNAUTHORIZED => CloudError::Unauthorized(message),
        _ => CloudError::Api {
            status: status.as_u16(),
            message,
        },
    })
}

/// Extract a message from either `{"message": ...}` or the
/// `{"<FaultKind>": {"message": ...}}` envelope.
fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    if let Some(message) = value.get("message").and_then(|m| m.as_str()) {
        return Some(message.to_string());
    }
    value.as_object()?.values().find_map(|inner| {
        inner
            .get("message")
            .and_then(|m| m.as_str())
            .map(ToString::to_string)
    })
}

#[derive(Debug, Deserialize)]
struct NetworksEnvelope {
    networks: Vec<Network>,
}

#[derive(Debug, Deserialize)]
struct NetworkEnvelope {
    network: Network,
}

#[derive(Debug, Deserialize)]
struct SubnetEnvelope {
    subnet: Subnet,
}

#[derive(Debug, Deserialize)]
struct RoutersEnvelope {
    routers: Vec<Router>,
}

#[derive(Debug, Deserialize)]
struct RouterEnvelope {
    router: Router,
}

#[derive(Debug, Deserialize)]
struct PortsEnvelope {
    ports: Vec<Port>,
}

#[derive(Debug, Deserialize)]
struct SecurityGroupsEnvelope {
    security_groups: Vec<SecurityGroup>,
}

#[derive(Debug, Deserialize)]
struct FloatingIpsEnvelope {
    floatingips: Vec<FloatingIp>,
}

#[derive(Debug, Deserialize)]
struct FloatingIpEnvelope {
    floatingip: FloatingIp,
}

#[derive(Debug, Deserialize)]
struct ServersEnvelope {
    servers: Vec<Instance>,
}

#[derive(Debug, Deserialize)]
struct ServerEnvelope {
    server: Instance,
}

#[derive(Debug, Deserialize)]
struct CreatedServerEnvelope {
    server: CreatedServer,
}

#[derive(Debug, Deserialize)]
struct CreatedServer {
    id: InstanceId,
}

#[derive(Debug, Deserialize)]
struct ImagesEnvelope {
    images: Vec<Image>,
}

#[derive(Debug, Deserialize)]
struct FlavorsEnvelope {
    flavors: Vec<Flavor>,
}

#[derive(Debug, Deserialize)]
struct KeypairsEnvelope {
    keypairs: Vec<KeypairEnvelope>,
}

#[derive(Debug, Deserialize)]
struct KeypairEnvelope {
    keypair: Keypair,
}
