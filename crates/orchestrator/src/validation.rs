use std::collections::HashSet;
use std::sync::LazyLock;

use common::config::{DeployConfig, ResourceLimits, ScalingPolicy, TrafficTarget};
use regex::Regex;
use tracing::warn;

use crate::error::ConfigError;

const MAX_CONCURRENCY: i64 = 1000;

static SERVICE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z][a-z0-9-]{0,48}[a-z0-9]$").expect("service name pattern compiles")
});

static CPU: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]+(\.[0-9]+)?|[0-9]+m)$").expect("cpu pattern compiles"));

static MEMORY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]+[KMGTPEZYkmgtpezy]?i?[Bb]?$").expect("memory pattern compiles")
});

/// Check every field of the document that the platform would otherwise reject
/// late (or silently misinterpret).
pub fn validate_config(config: &DeployConfig) -> Result<(), ConfigError> {
    validate_service_name(&config.name)?;
    require_non_empty("project_id", &config.project_id)?;
    require_non_empty("region", &config.region)?;
    require_non_empty("container.image", &config.container.image)?;
    if config.container.port == 0 {
        return Err(ConfigError::Port);
    }
    if let Some(resources) = &config.container.resources {
        validate_resources(resources)?;
    }
    if let Some(scaling) = &config.container.scaling {
        validate_scaling(scaling)?;
    }
    validate_traffic(&config.traffic)?;
    validate_volume_names(config)?;
    Ok(())
}

pub fn validate_service_name(name: &str) -> Result<(), ConfigError> {
    if SERVICE_NAME.is_match(name) {
        Ok(())
    } else {
        Err(ConfigError::ServiceName(name.to_string()))
    }
}

pub fn validate_cpu(cpu: &str) -> Result<(), ConfigError> {
    if CPU.is_match(cpu) {
        Ok(())
    } else {
        Err(ConfigError::Cpu(cpu.to_string()))
    }
}

/// A bare number is rejected: the platform reads it as bytes.
pub fn validate_memory(memory: &str) -> Result<(), ConfigError> {
    let bare_number = memory.chars().all(|c| c.is_ascii_digit());
    if MEMORY.is_match(memory) && !bare_number {
        Ok(())
    } else {
        Err(ConfigError::Memory(memory.to_string()))
    }
}

fn validate_resources(resources: &ResourceLimits) -> Result<(), ConfigError> {
    validate_cpu(&resources.cpu)?;
    validate_memory(&resources.memory)
}

pub fn validate_scaling(scaling: &ScalingPolicy) -> Result<(), ConfigError> {
    if scaling.min_instances < 0 {
        return Err(ConfigError::Scaling(format!(
            "min_instances must be >= 0 (got {})",
            scaling.min_instances
        )));
    }
    if scaling.max_instances < scaling.min_instances {
        return Err(ConfigError::Scaling(format!(
            "max_instances ({}) must be >= min_instances ({})",
            scaling.max_instances, scaling.min_instances
        )));
    }
    if !(1..=MAX_CONCURRENCY).contains(&scaling.concurrency) {
        return Err(ConfigError::Scaling(format!(
            "concurrency must be between 1 and {MAX_CONCURRENCY} (got {})",
            scaling.concurrency
        )));
    }
    Ok(())
}

/// Percentages must each lie in 0..=100. A split that does not add up to 100
/// is only logged; the platform has the final word on it.
pub fn validate_traffic(traffic: &[TrafficTarget]) -> Result<(), ConfigError> {
    let mut total = 0;
    for target in traffic {
        let Some(percent) = target.percent else {
            continue;
        };
        if !(0..=100).contains(&percent) {
            return Err(ConfigError::Traffic(format!(
                "percent must be between 0 and 100 (got {percent})"
            )));
        }
        total += percent;
    }
    let declares_percent = traffic.iter().any(|target| target.percent.is_some());
    if declares_percent && total != 100 {
        warn!(total, "traffic percentages do not add up to 100");
    }
    Ok(())
}

/// Replace every character outside `[A-Za-z0-9_-]` with `_`.
pub fn sanitize_secret_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn validate_volume_names(config: &DeployConfig) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    let secret_names = config
        .secrets
        .iter()
        .map(|secret| sanitize_secret_name(&secret.name));
    let volume_names = config.volumes.iter().map(|volume| volume.name.clone());
    for name in secret_names.chain(volume_names) {
        if !seen.insert(name.clone()) {
            return Err(ConfigError::DuplicateVolume(name));
        }
    }
    Ok(())
}

fn require_non_empty(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        Err(ConfigError::Empty { field })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_config;
    use common::config::{SecretMount, VolumeConfig, VolumeKind};
    use proptest::prelude::*;

    #[test]
    fn service_name_rules() {
        for ok in ["ab", "my-svc", "a1", "svc-2"] {
            assert!(validate_service_name(ok).is_ok(), "{ok}");
        }
        let too_long = format!("a{}", "b".repeat(50));
        for bad in ["a", "1abc", "My-Svc", "svc-", "svc_name", too_long.as_str()] {
            assert!(validate_service_name(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn cpu_quantities() {
        for ok in ["1", "2", "0.5", "500m"] {
            assert!(validate_cpu(ok).is_ok(), "{ok}");
        }
        for bad in ["", "1.", ".5", "500mm", "one", "abc", "1.5.2", "\u{665}", "\u{665}00m"] {
            assert!(validate_cpu(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn memory_requires_unit() {
        for ok in ["256Mi", "1Gi", "512M", "2G"] {
            assert!(validate_memory(ok).is_ok(), "{ok}");
        }
        for bad in ["256", "", "Mi", "256 Mi", "1.5Gi", "\u{662}\u{665}\u{666}Mi"] {
            assert!(validate_memory(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn scaling_bounds() {
        let ok = ScalingPolicy {
            min_instances: 0,
            max_instances: 3,
            concurrency: 80,
        };
        assert!(validate_scaling(&ok).is_ok());

        let negative = ScalingPolicy {
            min_instances: -1,
            ..ok
        };
        assert!(validate_scaling(&negative).is_err());

        let inverted = ScalingPolicy {
            min_instances: 3,
            max_instances: 1,
            ..ok
        };
        let err = validate_scaling(&inverted).unwrap_err();
        assert!(err.to_string().contains("max_instances (1)"), "{err}");

        for concurrency in [0, 1001] {
            let bad = ScalingPolicy { concurrency, ..ok };
            assert!(validate_scaling(&bad).is_err(), "{concurrency}");
        }
        for concurrency in [1, MAX_CONCURRENCY] {
            let edge = ScalingPolicy { concurrency, ..ok };
            assert!(validate_scaling(&edge).is_ok(), "{concurrency}");
        }

        let scale_to_zero = ScalingPolicy {
            min_instances: 0,
            max_instances: 0,
            ..ok
        };
        assert!(validate_scaling(&scale_to_zero).is_ok());
    }

    #[test]
    fn traffic_percent_range() {
        let split = vec![
            TrafficTarget::revision("a", 90),
            TrafficTarget::revision("b", 10),
        ];
        assert!(validate_traffic(&split).is_ok());

        let over = vec![TrafficTarget::revision("a", 101)];
        assert!(validate_traffic(&over).is_err());

        let under_total = vec![TrafficTarget::revision("a", 40)];
        assert!(validate_traffic(&under_total).is_ok());
    }

    #[test]
    fn sanitize_is_idempotent_and_restricted() {
        let once = sanitize_secret_name("api.key/v2 prod");
        assert_eq!(once, "api_key_v2_prod");
        assert_eq!(sanitize_secret_name(&once), once);
        assert_eq!(sanitize_secret_name("plain-name_1"), "plain-name_1");
    }

    #[test]
    fn sanitized_secret_names_must_not_collide() {
        let mut config = sample_config();
        config.secrets = vec![
            SecretMount {
                name: "api.key".into(),
                version: "latest".into(),
                mount_path: None,
            },
            SecretMount {
                name: "api_key".into(),
                version: "1".into(),
                mount_path: None,
            },
        ];
        let err = validate_config(&config).unwrap_err();
        assert_eq!(err, ConfigError::DuplicateVolume("api_key".into()));

        config.secrets.truncate(1);
        config.volumes = vec![VolumeConfig {
            name: "api_key".into(),
            path: "/data".into(),
            kind: VolumeKind::ReadWrite,
            bucket: None,
        }];
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn rejects_zero_port_and_empty_image() {
        let mut config = sample_config();
        config.container.port = 0;
        assert_eq!(validate_config(&config), Err(ConfigError::Port));

        let mut config = sample_config();
        config.container.image = " ".into();
        assert_eq!(
            validate_config(&config),
            Err(ConfigError::Empty {
                field: "container.image"
            })
        );
    }

    proptest! {
        #[test]
        fn sanitize_output_is_stable_and_restricted(name in "\\PC{0,40}") {
            let once = sanitize_secret_name(&name);
            prop_assert_eq!(sanitize_secret_name(&once), once.clone());
            prop_assert_eq!(once.chars().count(), name.chars().count());
            prop_assert!(
                once.chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            );
        }

        #[test]
        fn scaling_accepts_exactly_the_ordered_bounded_policies(
            min_instances in -5i64..50,
            max_instances in -5i64..50,
            concurrency in -5i64..1100,
        ) {
            let policy = ScalingPolicy {
                min_instances,
                max_instances,
                concurrency,
            };
            let expected = min_instances >= 0
                && max_instances >= min_instances
                && (1..=MAX_CONCURRENCY).contains(&concurrency);
            prop_assert_eq!(validate_scaling(&policy).is_ok(), expected);
        }
    }
}
