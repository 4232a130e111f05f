use clap::Args;

use super::EnvironmentArgs;

#[derive(Debug, Clone, Args)]
pub struct InitArgs {
    /// Overwrite an existing document.
    #[arg(long)]
    pub force: bool,

    /// Service name; defaults to the current directory name.
    #[arg(long)]
    pub name: Option<String>,

    /// Platform project the service lives in.
    #[arg(long, default_value = "my-project")]
    pub project_id: String,

    /// Platform region.
    #[arg(long, default_value = "us-central1")]
    pub region: String,
}

#[derive(Debug, Clone, Args)]
pub struct DeployArgs {
    /// Route all traffic to an earlier revision instead of deploying.
    #[arg(long, conflicts_with = "all_envs")]
    pub rollback: bool,

    /// Revision to roll back to. Without it the available revisions are listed.
    #[arg(long, requires = "rollback")]
    pub revision: Option<String>,

    #[command(flatten)]
    pub environments: EnvironmentArgs,
}

#[derive(Debug, Clone, Args)]
pub struct PackageArgs {
    /// Push the image after building it.
    #[arg(long)]
    pub push: bool,
}

#[derive(Debug, Clone, Args)]
pub struct DestroyArgs {
    #[command(flatten)]
    pub environments: EnvironmentArgs,
}
