//! Read-only listings of what instances can be built from.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;
use stackops_cloud::CloudApi;
use tabled::Tabled;

use crate::output::print_output;

use super::CommandContext;

/// Catalog commands.
#[derive(Debug, Args)]
pub struct CatalogCommand {
    #[command(subcommand)]
    command: CatalogSubcommand,
}

#[derive(Debug, Subcommand)]
enum CatalogSubcommand {
    /// List images.
    Images,

    /// List flavors.
    Flavors,

    /// List security groups.
    SecurityGroups,

    /// List networks flagged as external.
    ExternalNetworks,
}

impl CatalogCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        match self.command {
            CatalogSubcommand::Images => list_images(ctx).await,
            CatalogSubcommand::Flavors => list_flavors(ctx).await,
            CatalogSubcommand::SecurityGroups => list_security_groups(ctx).await,
            CatalogSubcommand::ExternalNetworks => list_external_networks(ctx).await,
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
struct ImageRow {
    #[tabled(rename = "ID")]
    id: String,

    #[tabled(rename = "Name")]
    name: String,

    #[tabled(rename = "Status")]
    status: String,
}

#[derive(Debug, Serialize, Tabled)]
struct FlavorRow {
    #[tabled(rename = "ID")]
    id: String,

    #[tabled(rename = "Name")]
    name: String,

    #[tabled(rename = "vCPUs")]
    vcpus: u32,

    #[tabled(rename = "RAM (MiB)")]
    ram: u64,

    #[tabled(rename = "Disk (GiB)")]
    disk: u64,
}

#[derive(Debug, Serialize, Tabled)]
struct SecurityGroupRow {
    #[tabled(rename = "ID")]
    id: String,

    #[tabled(rename = "Name")]
    name: String,

    #[tabled(rename = "Description")]
    description: String,
}

#[derive(Debug, Serialize, Tabled)]
struct ExternalNetworkRow {
    #[tabled(rename = "ID")]
    id: String,

    #[tabled(rename = "Name")]
    name: String,
}

async fn list_images(ctx: CommandContext) -> Result<()> {
    let client = ctx.client()?;

    let rows: Vec<ImageRow> = client
        .list_images()
        .await?
        .into_iter()
        .map(|image| ImageRow {
            id: image.id.to_string(),
            name: image.name,
            status: image.status,
        })
        .collect();

    print_output(&rows, ctx.format);
    Ok(())
}

async fn list_flavors(ctx: CommandContext) -> Result<()> {
    let client = ctx.client()?;

    let mut flavors = client.list_flavors().await?;
    flavors.sort_by_key(|f| (f.vcpus, f.ram));

    let rows: Vec<FlavorRow> = flavors
        .into_iter()
        .map(|flavor| FlavorRow {
            id: flavor.id.to_string(),
            name: flavor.name,
            vcpus: flavor.vcpus,
            ram: flavor.ram,
            disk: flavor.disk,
        })
        .collect();

    print_output(&rows, ctx.format);
    Ok(())
}

async fn list_security_groups(ctx: CommandContext) -> Result<()> {
    let client = ctx.client()?;

    let rows: Vec<SecurityGroupRow> = client
        .list_security_groups()
        .await?
        .into_iter()
        .map(|group| SecurityGroupRow {
            id: group.id.to_string(),
            name: group.name,
            description: group.description,
        })
        .collect();

    print_output(&rows, ctx.format);
    Ok(())
}

async fn list_external_networks(ctx: CommandContext) -> Result<()> {
    let client = ctx.client()?;

    let rows: Vec<ExternalNetworkRow> = client
        .list_networks()
        .await?
        .into_iter()
        .filter(|network| network.is_external)
        .map(|network| ExternalNetworkRow {
            id: network.id.to_string(),
            name: network.name,
        })
        .collect();

    print_output(&rows, ctx.format);
    Ok(())
}
