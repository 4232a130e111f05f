use std::path::PathBuf;

use ::common::config::DEFAULT_CONFIG_FILE;
use clap::{Args, Parser, Subcommand};

pub mod common;
pub mod deploy;
pub mod secret;

pub use self::common::*;
pub use deploy::*;
pub use secret::*;

#[derive(Debug, Parser)]
#[command(
    name = "runway",
    version = orchestrator::VERSION,
    about = "runway - deploy container services to a serverless platform"
)]
pub struct Cli {
    #[command(flatten)]
    pub globals: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Args)]
pub struct GlobalArgs {
    /// Deployment document to read (or write, for `init`).
    #[arg(
        long,
        short = 'c',
        env = "RUNWAY_CONFIG",
        default_value = DEFAULT_CONFIG_FILE,
        global = true
    )]
    pub config: PathBuf,

    /// Bearer token for platform API calls. Without one, `gcloud auth
    /// print-access-token` is asked.
    #[arg(
        long,
        env = "RUNWAY_ACCESS_TOKEN",
        hide_env_values = true,
        global = true
    )]
    pub access_token: Option<String>,

    /// Settings file layered over `runway.toml`.
    #[arg(long, env = "RUNWAY_SETTINGS", global = true)]
    pub settings: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Write a starter deployment document.
    Init(InitArgs),
    /// Deploy the service, or move traffic back to an earlier revision.
    Deploy(DeployArgs),
    /// Build the container image, optionally pushing it.
    Package(PackageArgs),
    /// Delete the service and the load balancer resources created for it.
    Destroy(DestroyArgs),
    /// Secret store management commands.
    Secret {
        #[command(subcommand)]
        command: SecretCommands,
    },
    /// Generate shell completions for the CLI.
    Completions {
        /// Shell to generate completions for.
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use orchestrator::EnvironmentSelection;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn deploy_flags_parse() {
        let cli = Cli::try_parse_from([
            "runway", "deploy", "--rollback", "--revision", "svc-00002", "--env", "staging",
        ])
        .expect("parse");
        let Commands::Deploy(args) = cli.command else {
            panic!("expected deploy");
        };
        assert!(args.rollback);
        assert_eq!(args.revision.as_deref(), Some("svc-00002"));
        assert_eq!(
            args.environments.selection(),
            EnvironmentSelection::Single("staging".into())
        );
    }

    #[test]
    fn env_and_all_envs_conflict() {
        let err = Cli::try_parse_from(["runway", "destroy", "--env", "dev", "--all-envs"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn rollback_is_single_environment() {
        let err = Cli::try_parse_from(["runway", "deploy", "--rollback", "--all-envs"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn revision_requires_rollback() {
        let err = Cli::try_parse_from(["runway", "deploy", "--revision", "svc-00001"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn secret_create_needs_a_value_source() {
        assert!(Cli::try_parse_from(["runway", "secret", "create", "db-pass"]).is_err());
        assert!(
            Cli::try_parse_from(["runway", "secret", "create", "db-pass", "--value", "x"]).is_ok()
        );
    }
}
