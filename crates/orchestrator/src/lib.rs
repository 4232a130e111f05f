use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::info;

pub mod command;
pub mod driver;
pub mod error;
pub mod gcloud;
pub mod load_balancer;
pub mod platform;
pub mod poll;
pub mod runner;
pub mod secrets;
pub mod settings;
pub mod spec;
pub mod telemetry;
pub mod traffic;
pub mod validation;

#[cfg(test)]
pub(crate) mod test_support;

pub use command::{CommandExecutor, CommandSpec, DynCommandExecutor, ProcessExecutor};
pub use driver::{DeploymentDriver, DeploymentOutcome};
pub use error::{ConfigError, DeployError};
pub use load_balancer::{LoadBalancerProvisioner, ProvisionOutcome, TeardownReport};
pub use platform::{CloudRunApi, DynPlatformClient, PlatformClient, PlatformError, ServiceRef};
pub use runner::{EnvironmentRunner, EnvironmentSelection, Operation, RunSummary};
pub use secrets::{DynSecretResolver, SecretManagerApi, SecretResolver};
pub use traffic::TrafficController;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Receives human readable progress lines (status changes, provisioning steps).
pub type ProgressSink = Arc<dyn Fn(String) + Send + Sync>;

/// Progress sink that forwards every line to the tracing subscriber.
pub fn log_progress() -> ProgressSink {
    Arc::new(|line: String| info!("{line}"))
}

pub fn build_client() -> anyhow::Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&format!("runway/{VERSION}"))?,
    );
    reqwest::Client::builder()
        .default_headers(headers)
        .build()
        .map_err(Into::into)
}
