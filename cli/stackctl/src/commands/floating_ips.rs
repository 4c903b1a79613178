//! Floating IP commands.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;
use stackops_cloud::CloudApi;
use stackops_id::InstanceId;
use stackops_orchestrator::{AssignMode, Assignment, BindingSource};
use tabled::Tabled;

use crate::output::{display_option, print_output, print_single, OutputFormat};

use super::CommandContext;

/// Floating IP commands.
#[derive(Debug, Args)]
pub struct FloatingIpsCommand {
    #[command(subcommand)]
    command: FloatingIpsSubcommand,
}

#[derive(Debug, Subcommand)]
enum FloatingIpsSubcommand {
    /// List floating IPs.
    List,

    /// Give an instance a public address on its externally routed port.
    Assign(AssignArgs),
}

#[derive(Debug, Args)]
struct AssignArgs {
    /// Instance ID.
    instance: InstanceId,

    /// Bind another address even if the port already has one.
    #[arg(long)]
    force_new: bool,
}

impl AssignArgs {
    fn mode(&self) -> AssignMode {
        if self.force_new {
            AssignMode::Always
        } else {
            AssignMode::ReuseExisting
        }
    }
}

impl FloatingIpsCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        match self.command {
            FloatingIpsSubcommand::List => list_floating_ips(ctx).await,
            FloatingIpsSubcommand::Assign(args) => assign(ctx, args).await,
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
struct FloatingIpRow {
    #[tabled(rename = "ID")]
    id: String,

    #[tabled(rename = "Address")]
    address: String,

    #[tabled(rename = "Status")]
    status: String,

    #[tabled(rename = "Network")]
    network: String,

    #[tabled(rename = "Port", display = "display_option")]
    port: Option<String>,
}

#[derive(Debug, Serialize, Tabled)]
struct AssignmentRow {
    #[tabled(rename = "Instance")]
    instance_id: String,

    #[tabled(rename = "Port")]
    port_id: String,

    #[tabled(rename = "External Network")]
    external_network: String,

    #[tabled(rename = "Address")]
    address: String,

    #[tabled(rename = "Floating IP")]
    floating_ip_id: String,

    #[tabled(rename = "Source")]
    source: String,
}

impl AssignmentRow {
    fn new(instance_id: &InstanceId, assignment: &Assignment) -> Self {
        Self {
            instance_id: instance_id.to_string(),
            port_id: assignment.port.id.to_string(),
            external_network: assignment.external_network.id.to_string(),
            address: assignment.floating_ip.address.to_string(),
            floating_ip_id: assignment.floating_ip.id.to_string(),
            source: source_label(assignment.source).to_string(),
        }
    }
}

fn source_label(source: BindingSource) -> &'static str {
    match source {
        BindingSource::AlreadyBound => "already bound",
        BindingSource::Reused => "reused",
        BindingSource::Allocated => "allocated",
    }
}

async fn list_floating_ips(ctx: CommandContext) -> Result<()> {
    let client = ctx.client()?;

    let rows: Vec<FloatingIpRow> = client
        .list_floating_ips(None)
        .await?
        .into_iter()
        .map(|fip| FloatingIpRow {
            id: fip.id.to_string(),
            address: fip.address.to_string(),
            status: fip.status.to_string(),
            network: fip.floating_network_id.to_string(),
            port: fip.port_id.map(|p| p.to_string()),
        })
        .collect();

    print_output(&rows, ctx.format);
    Ok(())
}

async fn assign(ctx: CommandContext, args: AssignArgs) -> Result<()> {
    let orchestrator = ctx.orchestrator()?;

    let assignment = orchestrator
        .assign_floating_ip(&args.instance, args.mode())
        .await?;

    let row = AssignmentRow::new(&args.instance, &assignment);
    match ctx.format {
        OutputFormat::Json => print_single(&row),
        OutputFormat::Table => print_output(&[row], ctx.format),
    }
    Ok(())
}
