use clap::{Args, ValueEnum};
use orchestrator::EnvironmentSelection;

/// Which environment overlays a command runs against.
#[derive(Debug, Clone, Default, Args)]
pub struct EnvironmentArgs {
    /// Apply the overlay declared under `environments.<ENV>`.
    #[arg(long = "env", value_name = "ENV", conflicts_with = "all_envs")]
    pub env: Option<String>,

    /// Run once for every declared environment, continuing past failures.
    #[arg(long)]
    pub all_envs: bool,
}

impl EnvironmentArgs {
    pub fn selection(&self) -> EnvironmentSelection {
        match (&self.env, self.all_envs) {
            (Some(env), _) => EnvironmentSelection::Single(env.clone()),
            (None, true) => EnvironmentSelection::All,
            (None, false) => EnvironmentSelection::Base,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum, PartialEq, Eq)]
#[value(rename_all = "lowercase")]
pub enum CompletionShell {
    Bash,
    Fish,
    Zsh,
}
