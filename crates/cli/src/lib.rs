pub mod args;
pub mod commands;
pub mod view;

pub use args::*;
pub use commands::CommandContext;

use clap::Parser;
use orchestrator::telemetry::{LogFormat, init_tracing};

use crate::commands::completions::generate_completions;
use crate::commands::deploy::handle_deploy;
use crate::commands::destroy::handle_destroy;
use crate::commands::init::handle_init;
use crate::commands::package::handle_package;
use crate::commands::secret::handle_secret;

/// Shared async entrypoint used by the CLI binary.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run_parsed(cli).await
}

/// Execute the CLI given a pre-parsed argument struct.
pub async fn run_parsed(cli: Cli) -> anyhow::Result<()> {
    if let Commands::Completions { shell } = &cli.command {
        generate_completions(*shell);
        return Ok(());
    }

    init_tracing(LogFormat::from_env());
    let ctx = CommandContext::new(cli.globals)?;

    match cli.command {
        Commands::Init(args) => handle_init(&ctx, args)?,
        Commands::Deploy(args) => handle_deploy(&ctx, args).await?,
        Commands::Package(args) => handle_package(&ctx, args).await?,
        Commands::Destroy(args) => handle_destroy(&ctx, args).await?,
        Commands::Secret { command } => handle_secret(&ctx, command).await?,
        Commands::Completions { .. } => {}
    }

    Ok(())
}
