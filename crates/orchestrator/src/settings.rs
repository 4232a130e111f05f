use std::env;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::command::DEFAULT_COMMAND_TIMEOUT;
use crate::gcloud::DEFAULT_GCLOUD_BIN;
use crate::platform::DEFAULT_PLATFORM_ENDPOINT;
use crate::poll::{DEFAULT_DEPLOY_TIMEOUT, DEFAULT_POLL_INTERVAL, DEFAULT_SETTLE_DELAY, PollPolicy};
use crate::secrets::DEFAULT_SECRETS_ENDPOINT;

pub const ENV_PREFIX: &str = "RUNWAY";
pub const SETTINGS_FILE: &str = "runway";

/// Runtime settings of the tool itself, separate from the deployment
/// document.
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    pub platform_endpoint: String,
    pub secrets_endpoint: String,
    #[serde(default)]
    pub access_token: Option<String>,
    pub poll_settle_secs: u64,
    pub poll_interval_secs: u64,
    pub deploy_timeout_secs: u64,
    pub command_timeout_secs: u64,
    pub gcloud_bin: String,
    pub docker_bin: String,
}

const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("RUNWAY_PLATFORM_ENDPOINT", "platform_endpoint"),
    ("RUNWAY_SECRETS_ENDPOINT", "secrets_endpoint"),
    ("RUNWAY_ACCESS_TOKEN", "access_token"),
    ("RUNWAY_POLL_SETTLE_SECS", "poll_settle_secs"),
    ("RUNWAY_POLL_INTERVAL_SECS", "poll_interval_secs"),
    ("RUNWAY_DEPLOY_TIMEOUT_SECS", "deploy_timeout_secs"),
    ("RUNWAY_COMMAND_TIMEOUT_SECS", "command_timeout_secs"),
    ("RUNWAY_GCLOUD_BIN", "gcloud_bin"),
    ("RUNWAY_DOCKER_BIN", "docker_bin"),
];

impl AppSettings {
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            settle_delay: Duration::from_secs(self.poll_settle_secs),
            interval: Duration::from_secs(self.poll_interval_secs),
            timeout: Duration::from_secs(self.deploy_timeout_secs),
        }
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    /// Token from settings or the environment; empty values count as unset.
    pub fn access_token(&self) -> Option<&str> {
        self.access_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval_secs must be > 0");
        }
        if self.deploy_timeout_secs == 0 {
            anyhow::bail!("deploy_timeout_secs must be > 0");
        }
        if self.command_timeout_secs == 0 {
            anyhow::bail!("command_timeout_secs must be > 0");
        }
        for (field, value) in [
            ("platform_endpoint", &self.platform_endpoint),
            ("secrets_endpoint", &self.secrets_endpoint),
            ("gcloud_bin", &self.gcloud_bin),
            ("docker_bin", &self.docker_bin),
        ] {
            if value.trim().is_empty() {
                anyhow::bail!("{field} cannot be empty");
            }
        }
        Ok(())
    }
}

pub fn load() -> anyhow::Result<AppSettings> {
    load_from(None)
}

/// Defaults, then `runway.toml` in the working directory (if present), then
/// an explicit file, then `RUNWAY_*` environment variables.
pub fn load_from(file: Option<&Path>) -> anyhow::Result<AppSettings> {
    let mut builder = config::Config::builder()
        .set_default("platform_endpoint", DEFAULT_PLATFORM_ENDPOINT)?
        .set_default("secrets_endpoint", DEFAULT_SECRETS_ENDPOINT)?
        .set_default("access_token", Option::<String>::None)?
        .set_default("poll_settle_secs", DEFAULT_SETTLE_DELAY.as_secs())?
        .set_default("poll_interval_secs", DEFAULT_POLL_INTERVAL.as_secs())?
        .set_default("deploy_timeout_secs", DEFAULT_DEPLOY_TIMEOUT.as_secs())?
        .set_default("command_timeout_secs", DEFAULT_COMMAND_TIMEOUT.as_secs())?
        .set_default("gcloud_bin", DEFAULT_GCLOUD_BIN)?
        .set_default("docker_bin", "docker")?
        .add_source(config::File::with_name(SETTINGS_FILE).required(false));

    if let Some(path) = file {
        builder = builder.add_source(config::File::from(path).required(true));
    }

    for (env_key, cfg_key) in ENV_OVERRIDES {
        if let Ok(value) = env::var(env_key) {
            builder = builder.set_override(*cfg_key, value)?;
        }
    }

    let settings: AppSettings = builder.build()?.try_deserialize()?;
    settings.validate()?;
    Ok(settings)
}
