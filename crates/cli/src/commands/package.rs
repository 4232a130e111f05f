use std::path::Path;

use anyhow::Context;
use common::config::BuildConfig;
use orchestrator::{CommandExecutor, CommandSpec};
use tracing::info;

use crate::args::PackageArgs;
use crate::commands::CommandContext;

pub async fn handle_package(ctx: &CommandContext, args: PackageArgs) -> anyhow::Result<()> {
    let config = ctx.load_config()?;
    let build = config.build.clone().unwrap_or_default();
    let image = &config.container.image;
    let docker = &ctx.settings.docker_bin;
    let executor = ctx.executor();

    let command = build_command(docker, &build, ctx.config_dir(), image);
    info!(%command, "building image");
    executor
        .run(&command)
        .await
        .with_context(|| format!("failed to build {image}"))?;
    println!("built {image}");

    if args.push {
        let command = push_command(docker, image);
        info!(%command, "pushing image");
        executor
            .run(&command)
            .await
            .with_context(|| format!("failed to push {image}"))?;
        println!("pushed {image}");
    }
    Ok(())
}

/// Dockerfile and context are relative to the deployment document.
fn build_command(docker: &str, build: &BuildConfig, base: &Path, image: &str) -> CommandSpec {
    let dockerfile = base.join(&build.dockerfile);
    let context = base.join(&build.context);
    CommandSpec::new(docker).args([
        "build".to_string(),
        "--file".to_string(),
        dockerfile.display().to_string(),
        "--tag".to_string(),
        image.to_string(),
        context.display().to_string(),
    ])
}

fn push_command(docker: &str, image: &str) -> CommandSpec {
    CommandSpec::new(docker).args(["push", image])
}
