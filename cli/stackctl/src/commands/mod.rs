//! CLI commands.

mod auth;
mod catalog;
mod floating_ips;
mod instances;
mod keypairs;
mod networks;
mod pools;
mod routers;

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use stackops_cloud::{CloudConfig, RestCloudClient};
use stackops_orchestrator::{Orchestrator, OrchestratorConfig};

use crate::config::{Config, Credentials};
use crate::error::CliError;
use crate::output::OutputFormat;

/// stackctl - manage networks, instances, floating IPs and pools.
#[derive(Debug, Parser)]
#[command(name = "stackctl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format (table or json).
    #[arg(long, global = true, default_value = "table")]
    format: String,

    /// Compute endpoint, overriding config and environment.
    #[arg(long, global = true)]
    compute_url: Option<String>,

    /// Network endpoint, overriding config and environment.
    #[arg(long, global = true)]
    network_url: Option<String>,

    /// Identity token, overriding stored credentials and environment.
    #[arg(long, global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Store or clear the identity token.
    Auth(auth::AuthCommand),

    /// Manage networks and their subnets.
    Networks(networks::NetworksCommand),

    /// Manage routers.
    Routers(routers::RoutersCommand),

    /// Manage compute instances.
    Instances(instances::InstancesCommand),

    /// Manage SSH keypairs.
    Keypairs(keypairs::KeypairsCommand),

    /// List images, flavors, security groups and external networks.
    Catalog(catalog::CatalogCommand),

    /// List and assign floating IPs.
    FloatingIps(floating_ips::FloatingIpsCommand),

    /// Scale and inspect instance pools.
    Pools(pools::PoolsCommand),

    /// Show CLI version.
    Version,
}

impl Cli {
    /// Run the CLI command.
    pub async fn run(self) -> Result<()> {
        let config = Config::load()?;
        let credentials = Credentials::load()?;

        // Build context from flags, config and stored credentials
        let ctx = CommandContext {
            config,
            credentials,
            format: OutputFormat::parse(&self.format),
            overrides: Overrides {
                compute_url: self.compute_url,
                network_url: self.network_url,
                token: self.token,
            },
        };

        match self.command {
            Commands::Auth(cmd) => cmd.run(ctx).await,
            Commands::Networks(cmd) => cmd.run(ctx).await,
            Commands::Routers(cmd) => cmd.run(ctx).await,
            Commands::Instances(cmd) => cmd.run(ctx).await,
            Commands::Keypairs(cmd) => cmd.run(ctx).await,
            Commands::Catalog(cmd) => cmd.run(ctx).await,
            Commands::FloatingIps(cmd) => cmd.run(ctx).await,
            Commands::Pools(cmd) => cmd.run(ctx).await,
            Commands::Version => {
                println!("stackctl {}", env!("CARGO_PKG_VERSION"));
                Ok(())
            }
        }
    }
}

/// Values given on the command line.
#[derive(Debug, Default)]
pub struct Overrides {
    pub compute_url: Option<String>,
    pub network_url: Option<String>,
    pub token: Option<String>,
}

/// Shared command context.
pub struct CommandContext {
    pub config: Config,
    pub credentials: Option<Credentials>,
    pub format: OutputFormat,
    pub overrides: Overrides,
}

impl CommandContext {
    /// Effective cloud configuration after applying every layer.
    pub fn cloud_config(&self) -> Result<CloudConfig> {
        let mut cloud = self.config.cloud_config(self.credentials.as_ref())?;

        if let Some(url) = &self.overrides.compute_url {
            cloud.compute_url = url.clone();
        }
        if let Some(url) = &self.overrides.network_url {
            cloud.network_url = url.clone();
        }
        if let Some(token) = &self.overrides.token {
            cloud.token = Some(token.clone());
        }

        Ok(cloud)
    }

    /// Get an authenticated REST client.
    pub fn client(&self) -> Result<RestCloudClient> {
        let cloud = self.cloud_config()?;
        if cloud.token.is_none() {
            return Err(CliError::NotAuthenticated.into());
        }
        Ok(RestCloudClient::new(&cloud)?)
    }

    /// Get the orchestration core over an authenticated client.
    pub fn orchestrator(&self) -> Result<Orchestrator> {
        let client = self.client()?;
        let config = OrchestratorConfig::from_env()?;
        Ok(Orchestrator::new(Arc::new(client), &config))
    }
}
