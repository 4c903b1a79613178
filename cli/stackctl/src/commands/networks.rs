//! Network commands.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;
use stackops_cloud::model::Network;
use stackops_cloud::{CloudApi, RestCloudClient};
use stackops_id::NetworkId;
use tabled::Tabled;
use tracing::warn;

use crate::output::{display_bool, print_output, print_single, print_success, OutputFormat};

use super::CommandContext;

/// Network commands.
#[derive(Debug, Args)]
pub struct NetworksCommand {
    #[command(subcommand)]
    command: NetworksSubcommand,
}

#[derive(Debug, Subcommand)]
enum NetworksSubcommand {
    /// List networks with their subnets.
    List,

    /// Create a network with one IPv4 subnet.
    Create(CreateNetworkArgs),

    /// Delete a network.
    Delete(DeleteNetworkArgs),
}

#[derive(Debug, Args)]
struct CreateNetworkArgs {
    /// Network name.
    name: String,

    /// Subnet name.
    #[arg(long)]
    subnet_name: String,

    /// Subnet CIDR (e.g., 10.0.1.0/24).
    #[arg(long)]
    cidr: String,
}

#[derive(Debug, Args)]
struct DeleteNetworkArgs {
    /// Network ID.
    network: NetworkId,
}

impl NetworksCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        match self.command {
            NetworksSubcommand::List => list_networks(ctx).await,
            NetworksSubcommand::Create(args) => create_network(ctx, args).await,
            NetworksSubcommand::Delete(args) => delete_network(ctx, args).await,
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
struct NetworkRow {
    #[tabled(rename = "ID")]
    id: String,

    #[tabled(rename = "Name")]
    name: String,

    #[tabled(rename = "External", display = "display_bool")]
    external: bool,

    #[tabled(rename = "Subnets")]
    subnets: String,
}

impl NetworkRow {
    fn new(network: &Network, cidrs: &[String]) -> Self {
        Self {
            id: network.id.to_string(),
            name: network.name.clone(),
            external: network.is_external,
            subnets: if cidrs.is_empty() {
                "-".to_string()
            } else {
                cidrs.join(", ")
            },
        }
    }
}

/// CIDRs of a network's subnets. Subnets deleted since the listing are skipped.
async fn subnet_cidrs(client: &RestCloudClient, network: &Network) -> Result<Vec<String>> {
    let mut cidrs = Vec::with_capacity(network.subnet_ids.len());
    for subnet_id in &network.subnet_ids {
        match client.get_subnet(subnet_id).await {
            Ok(subnet) => cidrs.push(subnet.cidr),
            Err(e) if e.is_not_found() => {
                warn!(subnet_id = %subnet_id, network_id = %network.id, "Subnet vanished, skipping");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(cidrs)
}

async fn list_networks(ctx: CommandContext) -> Result<()> {
    let client = ctx.client()?;

    let mut rows = Vec::new();
    for network in client.list_networks().await? {
        let cidrs = subnet_cidrs(&client, &network).await?;
        rows.push(NetworkRow::new(&network, &cidrs));
    }

    print_output(&rows, ctx.format);
    Ok(())
}

async fn create_network(ctx: CommandContext, args: CreateNetworkArgs) -> Result<()> {
    let client = ctx.client()?;

    let (network, subnet) = client
        .create_network(&args.name, &args.subnet_name, &args.cidr)
        .await?;

    match ctx.format {
        OutputFormat::Json => print_single(&serde_json::json!({
            "network": network,
            "subnet": subnet,
        })),
        OutputFormat::Table => print_success(&format!(
            "Created network '{}' ({}) with subnet {}",
            network.name, network.id, subnet.cidr
        )),
    }
    Ok(())
}

async fn delete_network(ctx: CommandContext, args: DeleteNetworkArgs) -> Result<()> {
    let client = ctx.client()?;
    client.delete_network(&args.network).await?;
    print_success(&format!("Deleted network {}", args.network));
    Ok(())
}
