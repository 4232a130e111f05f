//! Translation of a deployment document into the platform's service shape.
//!
//! The builder is pure: secret values are resolved beforehand and passed in as
//! plain env entries.

use std::collections::BTreeMap;

use common::config::{DeployConfig, SecretMount, TrafficTarget, VolumeConfig, VolumeKind};
use common::platform::{
    ClaimVolumeSource, Container, ContainerPort, EnvVarValue, GcsVolumeSource,
    ResourceRequirements, RevisionScaling, RevisionTemplate, SecretVolumeSource, Service,
    TrafficAllocationType, TrafficTargetSpec, VersionToPath, Volume, VolumeMount,
};

use crate::validation::sanitize_secret_name;

pub fn build_service(config: &DeployConfig, env: &[EnvVarValue]) -> Service {
    let mut volumes = Vec::new();
    let mut mounts = Vec::new();

    for secret in &config.secrets {
        let (volume, mount) = secret_volume(secret);
        volumes.push(volume);
        mounts.push(mount);
    }
    for declared in &config.volumes {
        let (volume, mount) = storage_volume(declared);
        volumes.push(volume);
        mounts.push(mount);
    }

    let resources = config.container.resources.as_ref().map(|limits| {
        let mut map = BTreeMap::new();
        map.insert("cpu".to_string(), limits.cpu.clone());
        map.insert("memory".to_string(), limits.memory.clone());
        ResourceRequirements { limits: map }
    });

    let container = Container {
        image: config.container.image.clone(),
        ports: vec![ContainerPort {
            container_port: config.container.port,
        }],
        resources,
        env: env.to_vec(),
        volume_mounts: mounts,
    };

    let scaling = config.container.scaling.as_ref();
    let template = RevisionTemplate {
        service_account: config.service_account.clone(),
        scaling: scaling.map(|policy| RevisionScaling {
            min_instance_count: policy.min_instances,
            max_instance_count: policy.max_instances,
        }),
        max_instance_request_concurrency: scaling.map(|policy| policy.concurrency),
        containers: vec![container],
        volumes,
    };

    Service {
        template,
        traffic: config.traffic.iter().map(traffic_spec).collect(),
        ..Service::default()
    }
}

/// The sanitized name is both the volume name and the secret reference.
fn secret_volume(secret: &SecretMount) -> (Volume, VolumeMount) {
    let volume_name = sanitize_secret_name(&secret.name);
    let volume = Volume {
        name: volume_name.clone(),
        secret: Some(SecretVolumeSource {
            secret: volume_name.clone(),
            items: vec![VersionToPath {
                path: volume_name.clone(),
                version: secret.version.clone(),
            }],
        }),
        ..Volume::default()
    };
    let mount = VolumeMount {
        name: volume_name,
        mount_path: secret.effective_mount_path(),
        read_only: true,
    };
    (volume, mount)
}

/// Bucket-backed when a bucket is named, claim-backed (claim = volume name)
/// otherwise.
fn storage_volume(declared: &VolumeConfig) -> (Volume, VolumeMount) {
    let read_only = declared.kind == VolumeKind::ReadOnly;
    let mut volume = Volume {
        name: declared.name.clone(),
        ..Volume::default()
    };
    match &declared.bucket {
        Some(bucket) => {
            volume.gcs = Some(GcsVolumeSource {
                bucket: bucket.clone(),
                read_only,
            })
        }
        None => {
            volume.persistent_volume_claim = Some(ClaimVolumeSource {
                claim_name: declared.name.clone(),
                read_only,
            })
        }
    }
    let mount = VolumeMount {
        name: declared.name.clone(),
        mount_path: declared.path.clone(),
        read_only,
    };
    (volume, mount)
}

fn traffic_spec(target: &TrafficTarget) -> TrafficTargetSpec {
    let kind = if target.revision.is_some() {
        TrafficAllocationType::Revision
    } else {
        TrafficAllocationType::Latest
    };
    TrafficTargetSpec {
        kind,
        revision: target.revision.clone(),
        percent: target.percent,
        tag: target.tag.clone(),
    }
}
