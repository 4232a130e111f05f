//! Wire DTOs for the serverless platform (services, revisions, IAM) and the
//! secret store. Field names follow the platform's camelCase JSON.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Condition state reported once a rollout finished successfully.
pub const CONDITION_SUCCEEDED: &str = "CONDITION_SUCCEEDED";
/// Condition state reported when a rollout failed.
pub const CONDITION_FAILED: &str = "CONDITION_FAILED";
/// Role that allows invoking a service.
pub const INVOKER_ROLE: &str = "roles/run.invoker";
/// Principal representing every caller, authenticated or not.
pub const ALL_USERS: &str = "allUsers";

/// A deployed (or to-be-deployed) service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    /// Fully qualified resource name (output only on create).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Revision template applied on every change.
    #[serde(default)]
    pub template: RevisionTemplate,
    /// Traffic assignment across revisions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub traffic: Vec<TrafficTargetSpec>,
    /// Public endpoint (output only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    /// Condition summarising the latest reconciliation (output only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal_condition: Option<Condition>,
    /// Detailed conditions (output only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    /// Latest revision that became ready (output only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_ready_revision: Option<String>,
}

impl Service {
    /// The condition that reflects the most recent reconciliation: the terminal
    /// condition when reported, otherwise the last detailed condition.
    pub fn latest_condition(&self) -> Option<&Condition> {
        self.terminal_condition
            .as_ref()
            .or_else(|| self.conditions.last())
    }
}

/// Template for new revisions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionTemplate {
    /// Identity revisions run as.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account: Option<String>,
    /// Instance count bounds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaling: Option<RevisionScaling>,
    /// Maximum concurrent requests per instance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_instance_request_concurrency: Option<i64>,
    /// Containers of the revision.
    #[serde(default)]
    pub containers: Vec<Container>,
    /// Volumes available to the containers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,
}

/// Instance count bounds of a revision. The platform omits zero counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RevisionScaling {
    /// Minimum number of instances.
    pub min_instance_count: i64,
    /// Maximum number of instances.
    pub max_instance_count: i64,
}

/// A container of a revision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Container {
    /// Image reference.
    pub image: String,
    /// Exposed ports.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<ContainerPort>,
    /// Resource limits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
    /// Environment variables.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVarValue>,
    /// Volume mounts.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volume_mounts: Vec<VolumeMount>,
}

/// Container port.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContainerPort {
    /// Port number.
    pub container_port: u16,
}

/// Resource limits keyed by resource name (`cpu`, `memory`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequirements {
    /// Limits map.
    #[serde(default)]
    pub limits: BTreeMap<String, String>,
}

/// Resolved environment variable. Empty values are omitted on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvVarValue {
    /// Variable name.
    pub name: String,
    /// Variable value.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub value: String,
}

/// Mount of a volume into a container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VolumeMount {
    /// Volume name.
    pub name: String,
    /// Path inside the container.
    pub mount_path: String,
    /// Mount read-only.
    #[serde(default)]
    pub read_only: bool,
}

/// Volume definition. Exactly one source is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Volume {
    /// Volume name referenced by mounts.
    pub name: String,
    /// Secret-backed source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<SecretVolumeSource>,
    /// Object-storage source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gcs: Option<GcsVolumeSource>,
    /// Persistent claim source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_volume_claim: Option<ClaimVolumeSource>,
}

/// Secret-backed volume source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretVolumeSource {
    /// Secret resource name.
    pub secret: String,
    /// Versions projected as files.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<VersionToPath>,
}

/// Projection of one secret version to a file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionToPath {
    /// File name relative to the mount path.
    pub path: String,
    /// Secret version.
    pub version: String,
}

/// Object-storage volume source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GcsVolumeSource {
    /// Bucket name.
    pub bucket: String,
    /// Mount the bucket read-only.
    #[serde(default)]
    pub read_only: bool,
}

/// Persistent claim volume source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClaimVolumeSource {
    /// Claim name.
    pub claim_name: String,
    /// Mount the claim read-only.
    #[serde(default)]
    pub read_only: bool,
}

/// How a traffic target selects its revision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrafficAllocationType {
    /// Route to the latest ready revision.
    #[default]
    #[serde(rename = "TRAFFIC_TARGET_ALLOCATION_TYPE_LATEST")]
    Latest,
    /// Route to a named revision.
    #[serde(rename = "TRAFFIC_TARGET_ALLOCATION_TYPE_REVISION")]
    Revision,
}

/// Traffic target on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficTargetSpec {
    /// Allocation type.
    #[serde(rename = "type", default)]
    pub kind: TrafficAllocationType,
    /// Revision name when `kind` is `Revision`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    /// Share of traffic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent: Option<i64>,
    /// Optional tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl TrafficTargetSpec {
    /// Pin `percent` of traffic to a revision.
    pub fn revision(revision: impl Into<String>, percent: i64) -> Self {
        Self {
            kind: TrafficAllocationType::Revision,
            revision: Some(revision.into()),
            percent: Some(percent),
            tag: None,
        }
    }
}

/// Body of a traffic-only update, sent with `updateMask=traffic`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficUpdate {
    /// New traffic assignment.
    pub traffic: Vec<TrafficTargetSpec>,
}

/// Reconciliation condition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Condition type, e.g. `Ready`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// State, e.g. `CONDITION_PENDING`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Human readable message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Machine readable reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Last transition timestamp (RFC 3339).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

/// A revision entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Revision {
    /// Fully qualified revision name.
    pub name: String,
}

impl Revision {
    /// Last path segment of the resource name.
    pub fn short_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

/// A page of revisions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionList {
    /// Revisions in platform order.
    #[serde(default)]
    pub revisions: Vec<Revision>,
    /// Token for the next page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// IAM policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IamPolicy {
    /// Role bindings.
    #[serde(default)]
    pub bindings: Vec<IamBinding>,
    /// Concurrency token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

impl IamPolicy {
    /// Policy granting unauthenticated callers the invoker role.
    pub fn public_invoker() -> Self {
        Self {
            bindings: vec![IamBinding {
                role: INVOKER_ROLE.to_string(),
                members: vec![ALL_USERS.to_string()],
            }],
            etag: None,
        }
    }
}

/// One role binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IamBinding {
    /// Role name.
    pub role: String,
    /// Principals granted the role.
    pub members: Vec<String>,
}

/// Body of a `setIamPolicy` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetIamPolicyRequest {
    /// Policy to set.
    pub policy: IamPolicy,
}

/// Structured error envelope returned by the platform APIs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorEnvelope {
    /// Error details.
    pub error: ApiErrorBody,
}

/// Structured error details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    /// HTTP-like numeric code.
    pub code: i32,
    /// Human readable message.
    #[serde(default)]
    pub message: String,
    /// Canonical status, e.g. `NOT_FOUND`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Secret resource in the secret store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretResource {
    /// Fully qualified secret name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Replication policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication: Option<serde_json::Value>,
    /// Creation timestamp (output only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
}

impl SecretResource {
    /// Last path segment of the resource name.
    pub fn short_name(&self) -> &str {
        self.name
            .as_deref()
            .and_then(|name| name.rsplit('/').next())
            .unwrap_or_default()
    }
}

/// A page of secrets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretList {
    /// Secrets.
    #[serde(default)]
    pub secrets: Vec<SecretResource>,
    /// Token for the next page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// Secret payload; `data` is base64 encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretPayload {
    /// Base64 encoded bytes.
    pub data: String,
}

/// Body of an add-version call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddSecretVersionRequest {
    /// Payload to store.
    pub payload: SecretPayload,
}

/// Response of an access-version call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessSecretVersionResponse {
    /// Version resource name.
    #[serde(default)]
    pub name: String,
    /// Payload.
    pub payload: SecretPayload,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_condition_prefers_terminal_condition() {
        let service: Service = serde_json::from_value(serde_json::json!({
            "uri": "https://svc.run.app",
            "terminalCondition": {"type": "Ready", "state": "CONDITION_SUCCEEDED"},
            "conditions": [
                {"type": "RoutesReady", "state": "CONDITION_PENDING"}
            ]
        }))
        .expect("decode");
        let latest = service.latest_condition().expect("condition");
        assert_eq!(latest.state.as_deref(), Some(CONDITION_SUCCEEDED));

        let pending: Service = serde_json::from_value(serde_json::json!({
            "conditions": [
                {"type": "ConfigurationsReady", "state": "CONDITION_SUCCEEDED"},
                {"type": "RoutesReady", "state": "CONDITION_RECONCILING"}
            ]
        }))
        .expect("decode");
        assert_eq!(
            pending.latest_condition().and_then(|c| c.state.as_deref()),
            Some("CONDITION_RECONCILING")
        );
    }

    #[test]
    fn status_read_tolerates_omitted_zero_and_empty_values() {
        let service: Service = serde_json::from_value(serde_json::json!({
            "name": "projects/demo/locations/us-central1/services/api",
            "ingress": "INGRESS_TRAFFIC_ALL",
            "template": {
                "scaling": {"maxInstanceCount": 100},
                "timeout": "300s",
                "containers": [{
                    "image": "img:2",
                    "ports": [{"name": "http1", "containerPort": 8080}],
                    "env": [
                        {"name": "EMPTY"},
                        {"name": "DB", "valueSource": {"secretKeyRef": {"secret": "db", "version": "latest"}}}
                    ],
                    "resources": {"limits": {"cpu": "1000m", "memory": "512Mi"}, "cpuIdle": true}
                }]
            },
            "traffic": [{"type": "TRAFFIC_TARGET_ALLOCATION_TYPE_LATEST", "percent": 100}],
            "uri": "https://api.run.app",
            "terminalCondition": {"type": "Ready", "state": "CONDITION_SUCCEEDED"}
        }))
        .expect("decode");

        let scaling = service.template.scaling.expect("scaling");
        assert_eq!(scaling.min_instance_count, 0);
        assert_eq!(scaling.max_instance_count, 100);
        assert_eq!(service.template.containers[0].env[0].value, "");
        assert_eq!(
            service.latest_condition().and_then(|c| c.state.as_deref()),
            Some(CONDITION_SUCCEEDED)
        );
    }

    #[test]
    fn empty_env_values_are_omitted() {
        let encoded = serde_json::to_value(EnvVarValue {
            name: "EMPTY".into(),
            value: String::new(),
        })
        .unwrap();
        assert_eq!(encoded, serde_json::json!({"name": "EMPTY"}));
    }

    #[test]
    fn traffic_target_uses_platform_enum_names() {
        let encoded = serde_json::to_value(TrafficTargetSpec::revision("rev-2", 100)).unwrap();
        assert_eq!(
            encoded,
            serde_json::json!({
                "type": "TRAFFIC_TARGET_ALLOCATION_TYPE_REVISION",
                "revision": "rev-2",
                "percent": 100
            })
        );
    }

    #[test]
    fn short_names_strip_resource_prefix() {
        let revision = Revision {
            name: "projects/p/locations/r/services/s/revisions/s-00002-abc".into(),
        };
        assert_eq!(revision.short_name(), "s-00002-abc");

        let secret = SecretResource {
            name: Some("projects/p/secrets/db-password".into()),
            ..Default::default()
        };
        assert_eq!(secret.short_name(), "db-password");
        assert_eq!(SecretResource::default().short_name(), "");
    }
}
