use common::config::DeployConfig;
use common::platform::{IamPolicy, Service};
use tokio::time::{Instant, sleep};
use tracing::{info, warn};

use crate::error::DeployError;
use crate::platform::{DynPlatformClient, PlatformError, ServiceRef};
use crate::poll::{ConditionSnapshot, Observation, PollPolicy, PollState, transition};
use crate::secrets::{DynSecretResolver, resolve_env};
use crate::spec::build_service;
use crate::validation::validate_config;
use crate::{ProgressSink, log_progress};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentOutcome {
    Succeeded {
        uri: String,
    },
    Failed {
        reason: String,
    },
    TimedOut {
        last_state: Option<String>,
        last_message: Option<String>,
    },
}

impl DeploymentOutcome {
    fn from_terminal(state: &PollState) -> Option<Self> {
        match state {
            PollState::Succeeded { uri } => Some(DeploymentOutcome::Succeeded { uri: uri.clone() }),
            PollState::Failed { reason } => Some(DeploymentOutcome::Failed {
                reason: reason.clone(),
            }),
            PollState::TimedOut { last } => Some(DeploymentOutcome::TimedOut {
                last_state: last.as_ref().map(|c| c.state.clone()),
                last_message: last.as_ref().and_then(|c| c.message.clone()),
            }),
            PollState::Submitted | PollState::Polling { .. } => None,
        }
    }
}

/// Validates, submits and watches a single service deployment.
pub struct DeploymentDriver {
    platform: DynPlatformClient,
    secrets: DynSecretResolver,
    policy: PollPolicy,
    progress: ProgressSink,
}

impl DeploymentDriver {
    pub fn new(platform: DynPlatformClient, secrets: DynSecretResolver, policy: PollPolicy) -> Self {
        Self {
            platform,
            secrets,
            policy,
            progress: log_progress(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressSink) -> Self {
        self.progress = progress;
        self
    }

    /// Nothing is sent to the platform when validation or secret resolution
    /// fails. A failed or timed-out rollout is an `Ok` outcome; only errors
    /// talking to the platform are `Err`.
    pub async fn deploy(&self, config: &DeployConfig) -> Result<DeploymentOutcome, DeployError> {
        validate_config(config)?;
        let target = ServiceRef::from_config(config);
        let env =
            resolve_env(&config.project_id, &config.container.env, self.secrets.as_ref()).await?;
        let service = build_service(config, &env);

        self.submit(&target, &service).await?;
        let outcome = self.await_rollout(&target).await?;

        if let DeploymentOutcome::Succeeded { uri } = &outcome {
            info!(service = %target, uri = %uri, "service is ready");
            if config.allow_unauthenticated {
                self.platform
                    .set_iam_policy(&target, &IamPolicy::public_invoker())
                    .await
                    .map_err(|source| DeployError::InvokerPolicy { source })?;
                (self.progress)(format!("granted unauthenticated access to {}", target.name));
            }
        }
        Ok(outcome)
    }

    async fn submit(&self, target: &ServiceRef, service: &Service) -> Result<(), PlatformError> {
        (self.progress)(format!("submitting service {}", target.name));
        match self.platform.create_service(target, service).await {
            Ok(()) => Ok(()),
            Err(err) if err.is_already_exists() => {
                info!(service = %target, "service already exists, replacing definition");
                self.platform.replace_service(target, service).await
            }
            Err(err) => Err(err),
        }
    }

    async fn await_rollout(&self, target: &ServiceRef) -> Result<DeploymentOutcome, PlatformError> {
        let started = Instant::now();
        sleep(self.policy.settle_delay).await;

        let mut state = PollState::Submitted;
        let mut reported: Option<ConditionSnapshot> = None;
        loop {
            let observation = match self.platform.get_service(target).await {
                Ok(service) => Observation::from_service(&service),
                Err(err) if err.is_structured() => return Err(err),
                Err(err) => {
                    warn!(service = %target, error = %err, "status read failed; retrying");
                    Observation::ReadFailed
                }
            };
            state = transition(state, started.elapsed(), observation, &self.policy);

            if let Some(condition) = state.last_condition()
                && reported.as_ref() != Some(condition)
            {
                (self.progress)(describe_condition(&target.name, condition));
                reported = Some(condition.clone());
            }
            if let Some(outcome) = DeploymentOutcome::from_terminal(&state) {
                return Ok(outcome);
            }
            sleep(self.policy.interval).await;
        }
    }
}

fn describe_condition(service: &str, condition: &ConditionSnapshot) -> String {
    match &condition.message {
        Some(message) if !message.is_empty() => {
            format!("{service}: {} ({message})", condition.state)
        }
        _ => format!("{service}: {}", condition.state),
    }
}
