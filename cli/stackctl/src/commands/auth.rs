//! Token storage commands.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::config::Credentials;
use crate::output::{print_info, print_single, print_success, OutputFormat};

use super::CommandContext;

/// Auth commands.
#[derive(Debug, Args)]
pub struct AuthCommand {
    #[command(subcommand)]
    command: AuthSubcommand,
}

#[derive(Debug, Subcommand)]
enum AuthSubcommand {
    /// Store a pre-issued identity token, and any endpoint flags given with it.
    Login(LoginArgs),

    /// Remove the stored token.
    Logout,

    /// Show where the token and endpoints come from.
    Status,
}

#[derive(Debug, Args)]
struct LoginArgs {
    /// Identity token issued by the identity service.
    #[arg(long)]
    token: String,
}

impl AuthCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        match self.command {
            AuthSubcommand::Login(args) => login(ctx, args),
            AuthSubcommand::Logout => logout(),
            AuthSubcommand::Status => status(ctx),
        }
    }
}

fn login(ctx: CommandContext, args: LoginArgs) -> Result<()> {
    let path = Credentials::new(args.token).save()?;
    print_success(&format!("Token saved to {}", path.display()));

    let mut config = ctx.config;
    let mut changed = false;
    if let Some(url) = ctx.overrides.compute_url {
        config.compute_url = url;
        changed = true;
    }
    if let Some(url) = ctx.overrides.network_url {
        config.network_url = url;
        changed = true;
    }
    if changed {
        let path = config.save()?;
        print_success(&format!("Endpoints saved to {}", path.display()));
    }
    Ok(())
}

fn logout() -> Result<()> {
    Credentials::delete()?;
    print_success("Stored token removed");
    Ok(())
}

#[derive(Debug, Serialize)]
struct AuthStatus {
    compute_url: String,
    network_url: String,
    authenticated: bool,
    saved_at: Option<String>,
}

fn status(ctx: CommandContext) -> Result<()> {
    let cloud = ctx.cloud_config()?;
    let status = AuthStatus {
        compute_url: cloud.compute_url,
        network_url: cloud.network_url,
        authenticated: cloud.token.is_some(),
        saved_at: ctx
            .credentials
            .as_ref()
            .and_then(|c| c.saved_at)
            .map(|t| t.to_rfc3339()),
    };

    match ctx.format {
        OutputFormat::Json => print_single(&status),
        OutputFormat::Table => {
            print_info(&format!("Compute endpoint: {}", status.compute_url));
            print_info(&format!("Network endpoint: {}", status.network_url));
            if status.authenticated {
                print_info("Token: configured");
            } else {
                print_info("Token: not configured");
            }
        }
    }
    Ok(())
}
