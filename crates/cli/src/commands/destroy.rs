use orchestrator::Operation;

use crate::args::DestroyArgs;
use crate::commands::CommandContext;
use crate::view::render_summary;

pub async fn handle_destroy(ctx: &CommandContext, args: DestroyArgs) -> anyhow::Result<()> {
    let config = ctx.load_config()?;
    let clients = ctx.clients().await?;
    let summary = ctx
        .runner(&clients)
        .run(&config, &args.environments.selection(), &Operation::Destroy)
        .await?;
    print!("{}", render_summary(&summary));
    summary.ensure_success()
}
