use anyhow::{Context, bail};
use common::config::DeployConfig;
use tracing::{error, info};

use crate::driver::{DeploymentDriver, DeploymentOutcome};
use crate::load_balancer::{LoadBalancerProvisioner, ProvisionOutcome, TeardownReport};
use crate::platform::{DynPlatformClient, ServiceRef};
use crate::traffic::TrafficController;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Deploy,
    Rollback { revision: String },
    Destroy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvironmentSelection {
    /// The document as written, no overlay.
    Base,
    Single(String),
    All,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationSummary {
    Deployed {
        uri: String,
        load_balancer: Option<ProvisionOutcome>,
    },
    RolledBack {
        revision: String,
    },
    Destroyed {
        teardown: Option<TeardownReport>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentReport {
    pub environment: Option<String>,
    pub service: String,
    /// Rendered error chain on failure.
    pub result: Result<OperationSummary, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub reports: Vec<EnvironmentReport>,
}

impl RunSummary {
    pub fn failed(&self) -> impl Iterator<Item = &EnvironmentReport> {
        self.reports.iter().filter(|report| report.result.is_err())
    }

    /// Error naming every failed environment, if any failed.
    pub fn ensure_success(&self) -> anyhow::Result<()> {
        let failed: Vec<String> = self
            .failed()
            .map(|report| {
                report
                    .environment
                    .clone()
                    .unwrap_or_else(|| report.service.clone())
            })
            .collect();
        if failed.is_empty() {
            return Ok(());
        }
        bail!(
            "{} of {} environments failed: {}",
            failed.len(),
            self.reports.len(),
            failed.join(", ")
        )
    }
}

/// Fans an operation out over the selected environments, one at a time.
pub struct EnvironmentRunner {
    platform: DynPlatformClient,
    driver: DeploymentDriver,
    traffic: TrafficController,
    load_balancer: LoadBalancerProvisioner,
}

impl EnvironmentRunner {
    pub fn new(
        platform: DynPlatformClient,
        driver: DeploymentDriver,
        load_balancer: LoadBalancerProvisioner,
    ) -> Self {
        Self {
            traffic: TrafficController::new(platform.clone()),
            platform,
            driver,
            load_balancer,
        }
    }

    /// Single selections stop at the first error. `All` runs every declared
    /// environment and records failures in the summary.
    pub async fn run(
        &self,
        base: &DeployConfig,
        selection: &EnvironmentSelection,
        operation: &Operation,
    ) -> anyhow::Result<RunSummary> {
        match selection {
            EnvironmentSelection::Base => {
                let summary = self.run_one(base, operation).await?;
                Ok(RunSummary {
                    reports: vec![EnvironmentReport {
                        environment: None,
                        service: base.name.clone(),
                        result: Ok(summary),
                    }],
                })
            }
            EnvironmentSelection::Single(env) => {
                let config = base.for_environment(env)?;
                let summary = self
                    .run_one(&config, operation)
                    .await
                    .with_context(|| format!("environment '{env}' failed"))?;
                Ok(RunSummary {
                    reports: vec![EnvironmentReport {
                        environment: Some(env.clone()),
                        service: config.name,
                        result: Ok(summary),
                    }],
                })
            }
            EnvironmentSelection::All => {
                let environments = base.environment_names();
                if environments.is_empty() {
                    bail!("--all-envs requires at least one entry under 'environments'");
                }
                let mut reports = Vec::with_capacity(environments.len());
                for env in environments {
                    let config = base.for_environment(&env)?;
                    info!(environment = %env, service = %config.name, "running environment");
                    let result = match self.run_one(&config, operation).await {
                        Ok(summary) => Ok(summary),
                        Err(err) => {
                            error!(environment = %env, error = %format!("{err:#}"), "environment failed; continuing");
                            Err(format!("{err:#}"))
                        }
                    };
                    reports.push(EnvironmentReport {
                        environment: Some(env),
                        service: config.name,
                        result,
                    });
                }
                Ok(RunSummary { reports })
            }
        }
    }

    async fn run_one(
        &self,
        config: &DeployConfig,
        operation: &Operation,
    ) -> anyhow::Result<OperationSummary> {
        match operation {
            Operation::Deploy => self.deploy(config).await,
            Operation::Rollback { revision } => {
                self.traffic.rollback(config, revision).await?;
                Ok(OperationSummary::RolledBack {
                    revision: revision.clone(),
                })
            }
            Operation::Destroy => self.destroy(config).await,
        }
    }

    async fn deploy(&self, config: &DeployConfig) -> anyhow::Result<OperationSummary> {
        let uri = match self.driver.deploy(config).await? {
            DeploymentOutcome::Succeeded { uri } => uri,
            DeploymentOutcome::Failed { reason } => {
                bail!("deployment of {} failed: {reason}", config.name)
            }
            DeploymentOutcome::TimedOut {
                last_state,
                last_message,
            } => {
                let state = last_state.as_deref().unwrap_or("no status reported");
                match last_message {
                    Some(message) => bail!(
                        "deployment of {} timed out (last state {state}: {message})",
                        config.name
                    ),
                    None => bail!(
                        "deployment of {} timed out (last state {state})",
                        config.name
                    ),
                }
            }
        };

        let load_balancer = match &config.load_balancer {
            Some(lb) => Some(
                self.load_balancer
                    .provision(config, lb)
                    .await
                    .with_context(|| format!("load balancer for {} failed", config.name))?,
            ),
            None => None,
        };
        Ok(OperationSummary::Deployed { uri, load_balancer })
    }

    async fn destroy(&self, config: &DeployConfig) -> anyhow::Result<OperationSummary> {
        let teardown = match &config.load_balancer {
            Some(lb) => Some(self.load_balancer.teardown(config, lb).await),
            None => None,
        };
        let target = ServiceRef::from_config(config);
        info!(service = %target, "deleting service");
        self.platform
            .delete_service(&target)
            .await
            .with_context(|| format!("failed to delete service {}", config.name))?;
        Ok(OperationSummary::Destroyed { teardown })
    }
}
