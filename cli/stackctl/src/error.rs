//! Error handling and display for the CLI.

use colored::Colorize;
use stackops_cloud::CloudError;
use stackops_orchestrator::OrchestratorError;
use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("No token configured. Run `stackctl auth login` or set STACKOPS_TOKEN.")]
    NotAuthenticated,

    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The operation ran but some of its steps failed.
    #[error("{0}")]
    Incomplete(String),
}

/// Print an error in a user-friendly format.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {}", "Error:".red().bold(), err);

    if let Some(hint) = hint(err) {
        eprintln!("\n{}", format!("Hint: {hint}").yellow());
    }
}

fn hint(err: &anyhow::Error) -> Option<&'static str> {
    if let Some(cli_err) = err.downcast_ref::<CliError>() {
        return match cli_err {
            CliError::NotAuthenticated => Some("Run `stackctl auth login --token <TOKEN>`."),
            CliError::Incomplete(_) => Some("Run the same command again to retry the failed steps."),
            CliError::NotFound(_) => None,
        };
    }

    let cloud_err = match err.downcast_ref::<OrchestratorError>() {
        Some(OrchestratorError::NoExternalNetwork) => {
            return Some("Create a network with the router:external flag first.");
        }
        Some(OrchestratorError::NoReachablePort { .. }) => {
            return Some(
                "Attach one of the instance's networks to a router with an external gateway.",
            );
        }
        Some(OrchestratorError::EmptyPool { .. }) => {
            return Some("Check the pool name with `stackctl pools members <BASE>`.");
        }
        Some(OrchestratorError::Cloud(e)) => Some(e),
        Some(_) => None,
        None => err.downcast_ref::<CloudError>(),
    };

    match cloud_err? {
        CloudError::Unauthorized(_) => {
            Some("Your token may have expired. Run `stackctl auth login` with a fresh one.")
        }
        CloudError::Transport(_) => {
            Some("Check your network connection and the compute/network endpoints.")
        }
        _ => None,
    }
}
