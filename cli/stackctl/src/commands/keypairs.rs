//! Keypair commands.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use crate::config::write_private;
use crate::output::{print_output, print_success, print_warning};

use super::CommandContext;

/// Keypair commands.
#[derive(Debug, Args)]
pub struct KeypairsCommand {
    #[command(subcommand)]
    command: KeypairsSubcommand,
}

#[derive(Debug, Subcommand)]
enum KeypairsSubcommand {
    /// List keypairs.
    List,

    /// Generate a keypair and save its private key.
    Create(CreateKeypairArgs),

    /// Delete a keypair.
    Delete(DeleteKeypairArgs),
}

#[derive(Debug, Args)]
struct CreateKeypairArgs {
    /// Keypair name.
    name: String,

    /// Where to write the private key (defaults to <NAME>.pem).
    #[arg(long, short = 'o', value_name = "FILE")]
    output: Option<PathBuf>,
}

impl CreateKeypairArgs {
    fn key_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("{}.pem", self.name)))
    }
}

#[derive(Debug, Args)]
struct DeleteKeypairArgs {
    /// Keypair name.
    name: String,
}

impl KeypairsCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        match self.command {
            KeypairsSubcommand::List => list_keypairs(ctx).await,
            KeypairsSubcommand::Create(args) => create_keypair(ctx, args).await,
            KeypairsSubcommand::Delete(args) => delete_keypair(ctx, args).await,
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
struct KeypairRow {
    #[tabled(rename = "Name")]
    name: String,

    #[tabled(rename = "Fingerprint")]
    fingerprint: String,
}

async fn list_keypairs(ctx: CommandContext) -> Result<()> {
    let client = ctx.client()?;

    let rows: Vec<KeypairRow> = client
        .list_keypairs()
        .await?
        .into_iter()
        .map(|kp| KeypairRow {
            name: kp.name,
            fingerprint: kp.fingerprint,
        })
        .collect();

    print_output(&rows, ctx.format);
    Ok(())
}

async fn create_keypair(ctx: CommandContext, args: CreateKeypairArgs) -> Result<()> {
    let client = ctx.client()?;

    let keypair = client.create_keypair(&args.name).await?;

    match &keypair.private_key {
        Some(private_key) => {
            let path = args.key_path();
            write_private(&path, private_key.as_bytes())?;
            print_success(&format!(
                "Created keypair '{}' ({}), private key saved to {}",
                keypair.name,
                keypair.fingerprint,
                path.display()
            ));
        }
        None => {
            print_success(&format!("Created keypair '{}'", keypair.name));
            print_warning("The control plane returned no private key; nothing was saved.");
        }
    }
    Ok(())
}

async fn delete_keypair(ctx: CommandContext, args: DeleteKeypairArgs) -> Result<()> {
    let client = ctx.client()?;
    client.delete_keypair(&args.name).await?;
    print_success(&format!("Deleted keypair '{}'", args.name));
    Ok(())
}
