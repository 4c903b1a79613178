//! Pool commands.

use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;
use stackops_orchestrator::ReconcileReport;

use crate::error::CliError;
use crate::output::{
    print_info, print_output, print_single, print_success, print_warning, OutputFormat,
};

use super::instances::{InstanceRow, TemplateArgs};
use super::CommandContext;

/// Pool commands.
#[derive(Debug, Args)]
pub struct PoolsCommand {
    #[command(subcommand)]
    command: PoolsSubcommand,
}

#[derive(Debug, Subcommand)]
enum PoolsSubcommand {
    /// Create or delete members until the pool has COUNT members.
    Scale(ScaleArgs),

    /// Delete the COUNT newest members of a pool.
    Delete(DeleteArgs),

    /// List the members of a pool.
    Members(MembersArgs),
}

#[derive(Debug, Args)]
struct ScaleArgs {
    /// Pool base name; members are named <BASE>_<N>.
    base: String,

    /// Target member count.
    count: usize,

    #[command(flatten)]
    template: TemplateArgs,
}

#[derive(Debug, Args)]
struct DeleteArgs {
    /// Pool base name.
    base: String,

    /// Number of members to delete.
    count: usize,
}

#[derive(Debug, Args)]
struct MembersArgs {
    /// Pool base name.
    base: String,
}

impl PoolsCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        match self.command {
            PoolsSubcommand::Scale(args) => scale(ctx, args).await,
            PoolsSubcommand::Delete(args) => delete(ctx, args).await,
            PoolsSubcommand::Members(args) => members(ctx, args).await,
        }
    }
}

async fn scale(ctx: CommandContext, args: ScaleArgs) -> Result<()> {
    let template = args.template.template()?;
    let orchestrator = ctx.orchestrator()?;

    let report = orchestrator
        .reconcile_pool(&args.base, args.count, &template)
        .await?;

    finish(&report, ctx.format)
}

async fn delete(ctx: CommandContext, args: DeleteArgs) -> Result<()> {
    let orchestrator = ctx.orchestrator()?;

    let report = orchestrator
        .delete_pool_members(&args.base, args.count)
        .await?;

    finish(&report, ctx.format)
}

async fn members(ctx: CommandContext, args: MembersArgs) -> Result<()> {
    let orchestrator = ctx.orchestrator()?;

    let mut members = orchestrator.pools().members(&args.base).await?;
    members.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.name.cmp(&b.name)));

    let rows: Vec<InstanceRow> = members.into_iter().map(InstanceRow::from).collect();
    print_output(&rows, ctx.format);
    Ok(())
}

/// Print the report, then fail if any step did not succeed.
fn finish(report: &ReconcileReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_single(report),
        OutputFormat::Table => print_report(report),
    }

    if report.is_complete() {
        Ok(())
    } else {
        Err(CliError::Incomplete(incomplete_summary(report)).into())
    }
}

fn print_report(report: &ReconcileReport) {
    if report.is_noop() {
        print_info(&format!(
            "Pool '{}' already has {} members",
            report.base_name, report.previous_count
        ));
        return;
    }

    println!(
        "Pool {}: {} -> {} members",
        report.base_name.bold(),
        report.previous_count,
        report.target_count
    );
    for name in &report.created {
        println!("  {} {}", "+".green(), name);
    }
    for id in &report.deleted {
        println!("  {} {}", "-".red(), id);
    }
    for failure in &report.failed {
        print_warning(&format!(
            "Could not delete {} ({}): {}",
            failure.name, failure.id, failure.reason
        ));
    }
    if let Some(aborted) = &report.aborted {
        print_warning(&format!("Stopped at {}: {}", aborted.name, aborted.reason));
    }

    if report.is_complete() {
        print_success(&format!("Pool '{}' reconciled", report.base_name));
    }
}

fn incomplete_summary(report: &ReconcileReport) -> String {
    if let Some(aborted) = &report.aborted {
        format!(
            "Scale-up of '{}' stopped after {} of {} creates: {}",
            report.base_name,
            report.created.len(),
            report.target_count.saturating_sub(report.previous_count),
            aborted.reason
        )
    } else {
        format!(
            "{} of {} deletes in '{}' failed",
            report.failed.len(),
            report.failed.len() + report.deleted.len(),
            report.base_name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackops_orchestrator::{CreateFailure, CreateFailureKind, DeleteFailure};

    fn report() -> ReconcileReport {
        ReconcileReport {
            base_name: "web".to_string(),
            previous_count: 2,
            target_count: 4,
            created: vec!["web_3".to_string()],
            deleted: Vec::new(),
            failed: Vec::new(),
            aborted: None,
        }
    }

    #[test]
    fn test_complete_report_succeeds() {
        let mut report = report();
        report.created.push("web_4".to_string());
        assert!(finish(&report, OutputFormat::Json).is_ok());
    }

    #[test]
    fn test_aborted_scale_up_is_incomplete() {
        let mut report = report();
        report.aborted = Some(CreateFailure {
            name: "web_4".to_string(),
            instance_id: None,
            kind: CreateFailureKind::Rejected,
            reason: "quota exceeded".to_string(),
        });

        let err = finish(&report, OutputFormat::Json).unwrap_err();
        let cli_err = err.downcast_ref::<CliError>().unwrap();
        assert!(matches!(cli_err, CliError::Incomplete(_)));
        assert_eq!(
            err.to_string(),
            "Scale-up of 'web' stopped after 1 of 2 creates: quota exceeded"
        );
    }

    #[test]
    fn test_failed_delete_is_incomplete() {
        let report = ReconcileReport {
            base_name: "web".to_string(),
            previous_count: 4,
            target_count: 1,
            created: Vec::new(),
            deleted: vec!["i-4".parse().unwrap(), "i-3".parse().unwrap()],
            failed: vec![DeleteFailure {
                id: "i-2".parse().unwrap(),
                name: "web_2".to_string(),
                reason: "conflict".to_string(),
            }],
            aborted: None,
        };

        let err = finish(&report, OutputFormat::Json).unwrap_err();
        assert_eq!(err.to_string(), "1 of 3 deletes in 'web' failed");
    }
}
