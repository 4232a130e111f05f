use anyhow::{Context, bail};
use common::config::DeployConfig;
use orchestrator::validation::validate_config;
use orchestrator::{EnvironmentSelection, Operation, TrafficController};
use tracing::info;

use crate::args::DeployArgs;
use crate::commands::CommandContext;
use crate::view::render_summary;

pub async fn handle_deploy(ctx: &CommandContext, args: DeployArgs) -> anyhow::Result<()> {
    let config = ctx.load_config()?;
    let selection = args.environments.selection();
    validate_selection(&config, &selection)?;

    let clients = ctx.clients().await?;
    let operation = if args.rollback {
        let Some(revision) = args.revision else {
            let target = selected_config(&config, &selection)?;
            let revisions = TrafficController::new(clients.platform.clone())
                .list_revisions(&target)
                .await
                .with_context(|| format!("failed to list revisions of {}", target.name))?;
            if revisions.is_empty() {
                println!("{} has no revisions", target.name);
            } else {
                println!("revisions of {}:", target.name);
                for revision in revisions {
                    println!("  {revision}");
                }
                println!("re-run with --rollback --revision <REVISION>");
            }
            return Ok(());
        };
        Operation::Rollback { revision }
    } else {
        Operation::Deploy
    };

    info!(config = %ctx.config_path.display(), ?operation, "starting");
    let runner = ctx.runner(&clients);
    let summary = runner.run(&config, &selection, &operation).await?;
    print!("{}", render_summary(&summary));
    summary.ensure_success()
}

/// A single targeted document is checked before any remote call is made.
/// With `--all-envs` each environment is validated inside its own run, so one
/// bad overlay is reported in the summary without stopping the others.
pub(crate) fn validate_selection(
    config: &DeployConfig,
    selection: &EnvironmentSelection,
) -> anyhow::Result<()> {
    if *selection == EnvironmentSelection::All {
        return Ok(());
    }
    let target = selected_config(config, selection)?;
    validate_config(&target)
        .with_context(|| format!("invalid configuration for service {}", target.name))
}

fn selected_config(
    config: &DeployConfig,
    selection: &EnvironmentSelection,
) -> anyhow::Result<DeployConfig> {
    match selection {
        EnvironmentSelection::Base => Ok(config.clone()),
        EnvironmentSelection::Single(env) => Ok(config.for_environment(env)?),
        EnvironmentSelection::All => bail!("select a single environment"),
    }
}
