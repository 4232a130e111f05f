use thiserror::Error;

use crate::platform::PlatformError;
use crate::secrets::SecretError;

/// Problems with the deployment document, detected before any remote call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },
    #[error("invalid service name '{0}': must match ^[a-z][a-z0-9-]{{0,48}}[a-z0-9]$")]
    ServiceName(String),
    #[error("container port must be greater than zero")]
    Port,
    #[error("invalid cpu quantity '{0}' (expected e.g. 1, 0.5 or 500m)")]
    Cpu(String),
    #[error("invalid memory quantity '{0}' (expected digits with a unit, e.g. 512Mi)")]
    Memory(String),
    #[error("invalid scaling: {0}")]
    Scaling(String),
    #[error("invalid traffic target: {0}")]
    Traffic(String),
    #[error("volume name '{0}' is used more than once (secret names are compared after sanitizing)")]
    DuplicateVolume(String),
}

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),
    #[error("failed to resolve secrets: {0}")]
    Secrets(#[from] SecretError),
    #[error(transparent)]
    Platform(#[from] PlatformError),
    /// The service is serving but the public invoker grant failed.
    #[error("service deployed but granting unauthenticated access failed: {source}")]
    InvokerPolicy {
        #[source]
        source: PlatformError,
    },
}
