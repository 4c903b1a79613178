//! Router commands.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;
use stackops_cloud::CloudApi;
use stackops_id::{NetworkId, RouterId};
use tabled::Tabled;

use crate::output::{display_option, print_output, print_single, print_success, OutputFormat};

use super::CommandContext;

/// Router commands.
#[derive(Debug, Args)]
pub struct RoutersCommand {
    #[command(subcommand)]
    command: RoutersSubcommand,
}

#[derive(Debug, Subcommand)]
enum RoutersSubcommand {
    /// List routers.
    List,

    /// Create a router with an external gateway.
    Create(CreateRouterArgs),

    /// Delete a router.
    Delete(DeleteRouterArgs),
}

#[derive(Debug, Args)]
struct CreateRouterArgs {
    /// Router name.
    name: String,

    /// External network for the router's gateway.
    #[arg(long)]
    external_network: NetworkId,
}

#[derive(Debug, Args)]
struct DeleteRouterArgs {
    /// Router ID.
    router: RouterId,
}

impl RoutersCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        match self.command {
            RoutersSubcommand::List => list_routers(ctx).await,
            RoutersSubcommand::Create(args) => create_router(ctx, args).await,
            RoutersSubcommand::Delete(args) => delete_router(ctx, args).await,
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
struct RouterRow {
    #[tabled(rename = "ID")]
    id: String,

    #[tabled(rename = "Name")]
    name: String,

    #[tabled(rename = "Gateway Network", display = "display_option")]
    gateway_network: Option<String>,
}

async fn list_routers(ctx: CommandContext) -> Result<()> {
    let client = ctx.client()?;

    let rows: Vec<RouterRow> = client
        .list_routers()
        .await?
        .into_iter()
        .map(|router| RouterRow {
            gateway_network: router.gateway_network_id().map(ToString::to_string),
            id: router.id.to_string(),
            name: router.name,
        })
        .collect();

    print_output(&rows, ctx.format);
    Ok(())
}

async fn create_router(ctx: CommandContext, args: CreateRouterArgs) -> Result<()> {
    let client = ctx.client()?;

    let router = client
        .create_router(&args.name, &args.external_network)
        .await?;

    match ctx.format {
        OutputFormat::Json => print_single(&router),
        OutputFormat::Table => print_success(&format!(
            "Created router '{}' ({}) with gateway on {}",
            router.name, router.id, args.external_network
        )),
    }
    Ok(())
}

async fn delete_router(ctx: CommandContext, args: DeleteRouterArgs) -> Result<()> {
    let client = ctx.client()?;
    client.delete_router(&args.router).await?;
    print_success(&format!("Deleted router {}", args.router));
    Ok(())
}
