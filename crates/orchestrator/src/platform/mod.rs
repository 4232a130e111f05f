use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use common::config::DeployConfig;
use common::platform::{IamPolicy, Service, TrafficTargetSpec};
use thiserror::Error;

mod cloud_run;
mod rest;

pub use cloud_run::{CloudRunApi, DEFAULT_PLATFORM_ENDPOINT};
pub use rest::RestClient;

const ALREADY_EXISTS: &str = "ALREADY_EXISTS";

#[derive(Debug, Error)]
pub enum PlatformError {
    /// Structured error returned by the platform; never retried.
    #[error("Error ({code}): {details}")]
    Api {
        code: i32,
        status: Option<String>,
        details: String,
    },
    /// Network failure or a response without a structured error payload.
    #[error("platform request failed ({context}): {source}")]
    Transport {
        context: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl PlatformError {
    pub fn api(code: i32, details: impl Into<String>) -> Self {
        PlatformError::Api {
            code,
            status: None,
            details: details.into(),
        }
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, PlatformError::Api { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        match self {
            PlatformError::Api { code, status, .. } => {
                *code == 409 || status.as_deref() == Some(ALREADY_EXISTS)
            }
            PlatformError::Transport { .. } => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            PlatformError::Api { code, status, .. } => {
                *code == 404 || status.as_deref() == Some("NOT_FOUND")
            }
            PlatformError::Transport { .. } => false,
        }
    }
}

/// Fully qualified address of a service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceRef {
    pub project_id: String,
    pub region: String,
    pub name: String,
}

impl ServiceRef {
    pub fn new(
        project_id: impl Into<String>,
        region: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            region: region.into(),
            name: name.into(),
        }
    }

    pub fn from_config(config: &DeployConfig) -> Self {
        Self::new(&config.project_id, &config.region, &config.name)
    }

    pub fn parent(&self) -> String {
        format!("projects/{}/locations/{}", self.project_id, self.region)
    }

    pub fn resource_name(&self) -> String {
        format!("{}/services/{}", self.parent(), self.name)
    }
}

impl fmt::Display for ServiceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.resource_name())
    }
}

/// Operations the orchestrator needs from the serverless platform.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    async fn create_service(&self, target: &ServiceRef, service: &Service)
    -> Result<(), PlatformError>;

    async fn replace_service(
        &self,
        target: &ServiceRef,
        service: &Service,
    ) -> Result<(), PlatformError>;

    async fn get_service(&self, target: &ServiceRef) -> Result<Service, PlatformError>;

    /// Replace the traffic assignment, leaving the revision template untouched.
    async fn update_traffic(
        &self,
        target: &ServiceRef,
        traffic: &[TrafficTargetSpec],
    ) -> Result<(), PlatformError>;

    async fn set_iam_policy(
        &self,
        target: &ServiceRef,
        policy: &IamPolicy,
    ) -> Result<(), PlatformError>;

    /// Short revision names in platform order.
    async fn list_revisions(&self, target: &ServiceRef) -> Result<Vec<String>, PlatformError>;

    async fn delete_service(&self, target: &ServiceRef) -> Result<(), PlatformError>;
}

pub type DynPlatformClient = Arc<dyn PlatformClient>;
