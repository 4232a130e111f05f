use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default file name of the deployment document.
pub const DEFAULT_CONFIG_FILE: &str = "deploy.yaml";
/// Secret version used when a secret does not pin one.
pub const DEFAULT_SECRET_VERSION: &str = "latest";

/// Errors raised while loading a deployment document.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// The document could not be read from disk.
    #[error("failed to read {path}: {source}")]
    Read {
        /// Path that was read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The document is not valid YAML for the model.
    #[error("failed to parse {origin}: {source}")]
    Parse {
        /// Where the document came from (a path or `<inline>`).
        origin: String,
        /// Underlying YAML error.
        #[source]
        source: serde_yaml::Error,
    },
    /// The document could not be rendered back to YAML.
    #[error("failed to render deployment document: {0}")]
    Render(#[source] serde_yaml::Error),
    /// An environment tag was requested that the document does not declare.
    #[error("environment '{name}' is not declared (available: {available})")]
    UnknownEnvironment {
        /// Requested tag.
        name: String,
        /// Comma separated list of declared tags.
        available: String,
    },
}

/// Validated-shape deployment document.
///
/// Values are immutable once loaded; per-environment variants are derived with
/// [`DeployConfig::for_environment`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Service name (DNS-label-like token).
    pub name: String,
    /// Platform project identifier.
    pub project_id: String,
    /// Platform region, e.g. `us-central1`.
    pub region: String,
    /// Grant `allUsers` the invoker role after a successful deploy.
    #[serde(default)]
    pub allow_unauthenticated: bool,
    /// Identity the revisions run as.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account: Option<String>,
    /// The single serving container.
    pub container: ContainerConfig,
    /// Secrets mounted as files.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secrets: Vec<SecretMount>,
    /// Object-storage or claim-backed volumes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<VolumeConfig>,
    /// Declared traffic split, submitted with the service definition.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub traffic: Vec<TrafficTarget>,
    /// Optional global HTTP load balancer in front of the service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_balancer: Option<LoadBalancerConfig>,
    /// Named environment overlays.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environments: BTreeMap<String, EnvironmentOverlay>,
    /// Container build settings used by `package`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildConfig>,
}

/// Container definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerConfig {
    /// Image reference, e.g. `us-docker.pkg.dev/p/repo/app:latest`.
    pub image: String,
    /// Port the container listens on.
    pub port: u16,
    /// Optional resource limits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceLimits>,
    /// Environment variables in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
    /// Optional scaling policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaling: Option<ScalingPolicy>,
}

/// CPU and memory limits as platform quantity strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// CPU quantity, e.g. `1`, `0.5` or `500m`.
    pub cpu: String,
    /// Memory quantity, e.g. `512Mi`.
    pub memory: String,
}

/// Instance bounds and per-instance concurrency.
///
/// Fields are signed so out-of-range input survives parsing and is rejected by
/// validation with a precise message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingPolicy {
    /// Minimum number of warm instances.
    pub min_instances: i64,
    /// Maximum number of instances.
    pub max_instances: i64,
    /// Maximum concurrent requests per instance.
    pub concurrency: i64,
}

/// A container environment variable.
///
/// On the wire an entry is either `{name, value}` or
/// `{name, valueFrom: {secretKeyRef: {name}}}`; exactly one form is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawEnvVar", into = "RawEnvVar")]
pub enum EnvVar {
    /// Plain value, possibly containing `$(SECRET)` placeholders.
    Literal {
        /// Variable name.
        name: String,
        /// Variable value.
        value: String,
    },
    /// Value read from a secret at deploy time.
    SecretRef {
        /// Variable name.
        name: String,
        /// Name of the referenced secret.
        secret_name: String,
    },
}

impl EnvVar {
    /// Build a literal entry.
    pub fn literal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Literal {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Build a secret-referencing entry.
    pub fn secret_ref(name: impl Into<String>, secret_name: impl Into<String>) -> Self {
        Self::SecretRef {
            name: name.into(),
            secret_name: secret_name.into(),
        }
    }

    /// Variable name regardless of form.
    pub fn name(&self) -> &str {
        match self {
            Self::Literal { name, .. } | Self::SecretRef { name, .. } => name,
        }
    }
}

/// Reasons an env entry does not describe exactly one form.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EnvVarError {
    /// The entry has no name.
    #[error("env var name cannot be empty")]
    EmptyName,
    /// Neither `value` nor `valueFrom.secretKeyRef.name` was given.
    #[error("env var '{0}' must set either value or valueFrom.secretKeyRef.name")]
    Missing(String),
    /// Both forms were given.
    #[error("env var '{0}' cannot set both value and valueFrom.secretKeyRef.name")]
    Ambiguous(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEnvVar {
    #[serde(default)]
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value_from: Option<RawValueFrom>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawValueFrom {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    secret_key_ref: Option<RawSecretKeyRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawSecretKeyRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

impl TryFrom<RawEnvVar> for EnvVar {
    type Error = EnvVarError;

    fn try_from(raw: RawEnvVar) -> Result<Self, Self::Error> {
        if raw.name.trim().is_empty() {
            return Err(EnvVarError::EmptyName);
        }
        let secret_name = raw
            .value_from
            .and_then(|from| from.secret_key_ref)
            .and_then(|key_ref| key_ref.name)
            .filter(|name| !name.trim().is_empty());

        match (raw.value, secret_name) {
            (Some(value), None) => Ok(EnvVar::Literal {
                name: raw.name,
                value,
            }),
            (None, Some(secret_name)) => Ok(EnvVar::SecretRef {
                name: raw.name,
                secret_name,
            }),
            (Some(_), Some(_)) => Err(EnvVarError::Ambiguous(raw.name)),
            (None, None) => Err(EnvVarError::Missing(raw.name)),
        }
    }
}

impl From<EnvVar> for RawEnvVar {
    fn from(var: EnvVar) -> Self {
        match var {
            EnvVar::Literal { name, value } => RawEnvVar {
                name,
                value: Some(value),
                value_from: None,
            },
            EnvVar::SecretRef { name, secret_name } => RawEnvVar {
                name,
                value: None,
                value_from: Some(RawValueFrom {
                    secret_key_ref: Some(RawSecretKeyRef {
                        name: Some(secret_name),
                    }),
                }),
            },
        }
    }
}

/// Secret mounted into the container filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretMount {
    /// Secret name as stored in the secret store.
    pub name: String,
    /// Secret version to mount.
    #[serde(default = "default_secret_version")]
    pub version: String,
    /// Mount directory; defaults to `/secrets/{name}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_path: Option<String>,
}

impl SecretMount {
    /// Configured mount path or the `/secrets/{name}` default.
    pub fn effective_mount_path(&self) -> String {
        self.mount_path
            .clone()
            .unwrap_or_else(|| format!("/secrets/{}", self.name))
    }
}

fn default_secret_version() -> String {
    DEFAULT_SECRET_VERSION.to_string()
}

/// Access mode of a declared volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VolumeKind {
    /// Mounted read-only.
    ReadOnly,
    /// Mounted read-write.
    ReadWrite,
}

impl VolumeKind {
    /// Returns the canonical kebab-case representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            VolumeKind::ReadOnly => "read-only",
            VolumeKind::ReadWrite => "read-write",
        }
    }
}

/// Volume backed by an object-storage bucket or a persistent claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeConfig {
    /// Volume name; also the claim name when no bucket is set.
    pub name: String,
    /// Mount path inside the container.
    pub path: String,
    /// Access mode.
    pub kind: VolumeKind,
    /// Backing bucket, if object-storage backed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
}

/// One entry of a traffic split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficTarget {
    /// Target revision; absent means the latest ready revision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    /// Optional tag that gets a dedicated URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Share of traffic in percent (0-100).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent: Option<i64>,
}

impl TrafficTarget {
    /// Route `percent` of traffic to a named revision.
    pub fn revision(revision: impl Into<String>, percent: i64) -> Self {
        Self {
            revision: Some(revision.into()),
            tag: None,
            percent: Some(percent),
        }
    }
}

/// Load balancer placed in front of the service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancerConfig {
    /// Base name for the URL map, proxy, address and forwarding rule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Backend service settings.
    #[serde(default)]
    pub backend_service: BackendServiceConfig,
    /// Forwarding rule to attach to when `backend_service.existing` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forwarding_rule: Option<String>,
}

/// Backend service settings of a load balancer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendServiceConfig {
    /// Backend service name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Attach to an existing forwarding rule / URL map chain instead of creating one.
    #[serde(default)]
    pub existing: bool,
}

/// Per-environment overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentOverlay {
    /// Project used by this environment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// Region used by this environment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

/// Container build settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Dockerfile path relative to the document.
    #[serde(default = "default_dockerfile")]
    pub dockerfile: String,
    /// Build context directory.
    #[serde(default = "default_context")]
    pub context: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            dockerfile: default_dockerfile(),
            context: default_context(),
        }
    }
}

fn default_dockerfile() -> String {
    "Dockerfile".into()
}

fn default_context() -> String {
    ".".into()
}

impl DeployConfig {
    /// Parse a document from YAML text.
    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigFileError> {
        serde_yaml::from_str(raw).map_err(|source| ConfigFileError::Parse {
            origin: "<inline>".into(),
            source,
        })
    }

    /// Read and parse a document from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigFileError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigFileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigFileError::Parse {
            origin: path.display().to_string(),
            source,
        })
    }

    /// Render the document as YAML.
    pub fn to_yaml_string(&self) -> Result<String, ConfigFileError> {
        serde_yaml::to_string(self).map_err(ConfigFileError::Render)
    }

    /// Declared environment tags in sorted order.
    pub fn environment_names(&self) -> Vec<String> {
        self.environments.keys().cloned().collect()
    }

    /// Derive the document for one environment: the service name and any
    /// explicit load balancer or backend service name are suffixed with the
    /// tag, and project/region are overlaid. A pinned forwarding rule is a
    /// shared resource and is kept as written.
    pub fn for_environment(&self, env: &str) -> Result<DeployConfig, ConfigFileError> {
        let overlay =
            self.environments
                .get(env)
                .ok_or_else(|| ConfigFileError::UnknownEnvironment {
                    name: env.to_string(),
                    available: if self.environments.is_empty() {
                        "none".to_string()
                    } else {
                        self.environment_names().join(", ")
                    },
                })?;

        let mut derived = self.clone();
        derived.name = format!("{}-{}", self.name, env);
        if let Some(project_id) = &overlay.project_id {
            derived.project_id = project_id.clone();
        }
        if let Some(region) = &overlay.region {
            derived.region = region.clone();
        }
        if let Some(lb) = derived.load_balancer.as_mut() {
            if let Some(name) = lb.name.as_mut() {
                *name = format!("{name}-{env}");
            }
            if let Some(backend) = lb.backend_service.name.as_mut() {
                *backend = format!("{backend}-{env}");
            }
        }
        derived.environments = BTreeMap::new();
        Ok(derived)
    }
}
