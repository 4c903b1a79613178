//! Instance commands.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use stackops_cloud::model::{Instance, InstanceTemplate};
use stackops_cloud::CloudApi;
use stackops_id::{FlavorId, ImageId, InstanceId, NetworkId};
use tabled::Tabled;

use crate::error::CliError;
use crate::output::{print_output, print_single, print_success, OutputFormat};

use super::CommandContext;

/// Instance commands.
#[derive(Debug, Args)]
pub struct InstancesCommand {
    #[command(subcommand)]
    command: InstancesSubcommand,
}

#[derive(Debug, Subcommand)]
enum InstancesSubcommand {
    /// List instances.
    List,

    /// Show one instance.
    Get(InstanceRefArgs),

    /// Create one instance and return once the request is accepted.
    Create(CreateInstanceArgs),

    /// Delete an instance.
    Delete(InstanceRefArgs),
}

#[derive(Debug, Args)]
struct InstanceRefArgs {
    /// Instance ID.
    instance: InstanceId,
}

#[derive(Debug, Args)]
struct CreateInstanceArgs {
    /// Instance name.
    name: String,

    #[command(flatten)]
    template: TemplateArgs,
}

/// Boot parameters shared by `instances create` and `pools scale`.
#[derive(Debug, Args)]
pub(super) struct TemplateArgs {
    /// Image ID.
    #[arg(long)]
    image: ImageId,

    /// Flavor ID.
    #[arg(long)]
    flavor: FlavorId,

    /// Network to attach (repeatable, one port per network).
    #[arg(long = "network", required = true)]
    networks: Vec<NetworkId>,

    /// SSH keypair name.
    #[arg(long)]
    key_name: Option<String>,

    /// Security group name.
    #[arg(long)]
    security_group: Option<String>,

    /// Cloud-init file passed as user data.
    #[arg(long, value_name = "FILE")]
    user_data: Option<PathBuf>,
}

impl TemplateArgs {
    pub(super) fn template(&self) -> Result<InstanceTemplate> {
        let user_data = self
            .user_data
            .as_ref()
            .map(|path| {
                std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read user data from {:?}", path))
            })
            .transpose()?;

        Ok(InstanceTemplate {
            image: self.image.clone(),
            flavor: self.flavor.clone(),
            networks: self.networks.clone(),
            key_name: self.key_name.clone(),
            security_group: self.security_group.clone(),
            user_data,
        })
    }
}

impl InstancesCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        match self.command {
            InstancesSubcommand::List => list_instances(ctx).await,
            InstancesSubcommand::Get(args) => get_instance(ctx, args).await,
            InstancesSubcommand::Create(args) => create_instance(ctx, args).await,
            InstancesSubcommand::Delete(args) => delete_instance(ctx, args).await,
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
pub(super) struct InstanceRow {
    #[tabled(rename = "ID")]
    id: String,

    #[tabled(rename = "Name")]
    name: String,

    #[tabled(rename = "Status")]
    status: String,

    #[tabled(rename = "Created")]
    created_at: String,
}

impl From<Instance> for InstanceRow {
    fn from(instance: Instance) -> Self {
        Self {
            id: instance.id.to_string(),
            name: instance.name,
            status: instance.status.to_string(),
            created_at: instance.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

async fn list_instances(ctx: CommandContext) -> Result<()> {
    let client = ctx.client()?;

    let mut instances = client.list_instances().await?;
    instances.sort_by(|a, b| a.name.cmp(&b.name));

    let rows: Vec<InstanceRow> = instances.into_iter().map(InstanceRow::from).collect();
    print_output(&rows, ctx.format);
    Ok(())
}

async fn get_instance(ctx: CommandContext, args: InstanceRefArgs) -> Result<()> {
    let client = ctx.client()?;

    let instance = match client.get_instance(&args.instance).await {
        Ok(instance) => instance,
        Err(e) if e.is_not_found() => {
            return Err(CliError::NotFound(format!("instance {}", args.instance)).into())
        }
        Err(e) => return Err(e.into()),
    };

    match ctx.format {
        OutputFormat::Json => print_single(&instance),
        OutputFormat::Table => print_output(&[InstanceRow::from(instance)], ctx.format),
    }
    Ok(())
}

async fn create_instance(ctx: CommandContext, args: CreateInstanceArgs) -> Result<()> {
    let client = ctx.client()?;
    let request = args.template.template()?.instantiate(args.name);

    let instance = client.create_instance(&request).await?;

    match ctx.format {
        OutputFormat::Json => print_single(&instance),
        OutputFormat::Table => print_success(&format!(
            "Submitted instance '{}' ({}), status {}",
            instance.name, instance.id, instance.status
        )),
    }
    Ok(())
}

async fn delete_instance(ctx: CommandContext, args: InstanceRefArgs) -> Result<()> {
    let client = ctx.client()?;
    client.delete_instance(&args.instance).await?;
    print_success(&format!("Deleted instance {}", args.instance));
    Ok(())
}
