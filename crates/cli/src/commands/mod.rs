use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use common::config::DeployConfig;
use orchestrator::settings::{self, AppSettings};
use orchestrator::{
    CloudRunApi, CommandExecutor, CommandSpec, DeploymentDriver, DynCommandExecutor,
    DynPlatformClient, EnvironmentRunner, LoadBalancerProvisioner, ProcessExecutor,
    SecretManagerApi, log_progress,
};

use crate::args::GlobalArgs;

pub mod completions;
pub mod deploy;
pub mod destroy;
pub mod init;
pub mod package;
pub mod secret;

pub struct CommandContext {
    pub client: reqwest::Client,
    pub settings: AppSettings,
    pub config_path: PathBuf,
    access_token: Option<String>,
}

/// Remote API clients sharing one access token.
pub struct Clients {
    pub platform: DynPlatformClient,
    pub secrets: Arc<SecretManagerApi>,
}

impl CommandContext {
    pub fn new(globals: GlobalArgs) -> anyhow::Result<Self> {
        let settings = settings::load_from(globals.settings.as_deref())
            .context("failed to load runway settings")?;
        let access_token = globals
            .access_token
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
            .or_else(|| settings.access_token().map(str::to_string));
        Ok(Self {
            client: orchestrator::build_client()?,
            settings,
            config_path: globals.config,
            access_token,
        })
    }

    pub fn load_config(&self) -> anyhow::Result<DeployConfig> {
        DeployConfig::load(&self.config_path).with_context(|| {
            format!(
                "cannot load deployment document (run `runway init` to create {})",
                self.config_path.display()
            )
        })
    }

    /// Directory relative paths in the document are resolved against.
    pub fn config_dir(&self) -> &Path {
        match self.config_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    pub fn executor(&self) -> DynCommandExecutor {
        Arc::new(ProcessExecutor::new(self.settings.command_timeout()))
    }

    pub async fn access_token(&self) -> anyhow::Result<String> {
        if let Some(token) = &self.access_token {
            return Ok(token.clone());
        }
        let command =
            CommandSpec::new(&self.settings.gcloud_bin).args(["auth", "print-access-token"]);
        let output = self.executor().run(&command).await.context(
            "no access token configured; pass --access-token or log in with `gcloud auth login`",
        )?;
        let token = output.stdout.trim();
        if token.is_empty() {
            bail!("`{command}` printed no token");
        }
        Ok(token.to_string())
    }

    pub async fn clients(&self) -> anyhow::Result<Clients> {
        let token = self.access_token().await?;
        Ok(Clients {
            platform: Arc::new(CloudRunApi::new(
                self.client.clone(),
                &self.settings.platform_endpoint,
                token.clone(),
            )),
            secrets: Arc::new(SecretManagerApi::new(
                self.client.clone(),
                &self.settings.secrets_endpoint,
                token,
            )),
        })
    }

    pub fn runner(&self, clients: &Clients) -> EnvironmentRunner {
        let progress = log_progress();
        let driver = DeploymentDriver::new(
            clients.platform.clone(),
            clients.secrets.clone(),
            self.settings.poll_policy(),
        )
        .with_progress(progress.clone());
        let load_balancer =
            LoadBalancerProvisioner::new(self.executor(), self.settings.gcloud_bin.clone())
                .with_progress(progress);
        EnvironmentRunner::new(clients.platform.clone(), driver, load_balancer)
    }
}
