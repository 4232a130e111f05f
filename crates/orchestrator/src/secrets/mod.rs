use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use common::config::EnvVar;
use common::platform::EnvVarValue;
use regex::{Captures, Regex};
use thiserror::Error;

use crate::platform::PlatformError;

mod secret_manager;

pub use secret_manager::{DEFAULT_SECRETS_ENDPOINT, SecretManagerApi};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\(([A-Za-z0-9_.-]+)\)").expect("placeholder pattern compiles")
});

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("secret '{name}' was not found")]
    NotFound { name: String },
    #[error("secret '{name}' has a payload that is not valid UTF-8")]
    InvalidPayload { name: String },
    #[error("failed to access secret '{name}': {source}")]
    Platform {
        name: String,
        #[source]
        source: PlatformError,
    },
}

/// Read access to the latest value of a named secret.
#[async_trait]
pub trait SecretResolver: Send + Sync {
    async fn access(&self, project_id: &str, name: &str) -> Result<String, SecretError>;
}

pub type DynSecretResolver = Arc<dyn SecretResolver>;

/// Turn declared env entries into plain name/value pairs: secret references
/// are replaced by the secret's latest value and `$(NAME)` placeholders inside
/// literals are expanded. Each secret is read at most once.
pub async fn resolve_env(
    project_id: &str,
    env: &[EnvVar],
    resolver: &dyn SecretResolver,
) -> Result<Vec<EnvVarValue>, SecretError> {
    let mut cache: HashMap<String, String> = HashMap::new();
    let mut resolved = Vec::with_capacity(env.len());

    for var in env {
        let value = match var {
            EnvVar::SecretRef { secret_name, .. } => {
                lookup(project_id, secret_name, resolver, &mut cache).await?
            }
            EnvVar::Literal { value, .. } => {
                for name in placeholder_names(value) {
                    lookup(project_id, &name, resolver, &mut cache).await?;
                }
                PLACEHOLDER
                    .replace_all(value, |caps: &Captures<'_>| {
                        cache.get(&caps[1]).cloned().unwrap_or_default()
                    })
                    .into_owned()
            }
        };
        resolved.push(EnvVarValue {
            name: var.name().to_string(),
            value,
        });
    }
    Ok(resolved)
}

fn placeholder_names(value: &str) -> Vec<String> {
    PLACEHOLDER
        .captures_iter(value)
        .map(|caps| caps[1].to_string())
        .collect()
}

async fn lookup(
    project_id: &str,
    name: &str,
    resolver: &dyn SecretResolver,
    cache: &mut HashMap<String, String>,
) -> Result<String, SecretError> {
    if let Some(value) = cache.get(name) {
        return Ok(value.clone());
    }
    let value = resolver.access(project_id, name).await?;
    cache.insert(name.to_string(), value.clone());
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeSecrets;

    #[tokio::test]
    async fn secret_refs_and_placeholders_are_resolved() {
        let secrets = FakeSecrets::with(&[("db-password", "hunter2"), ("api.key", "k-1")]);
        let env = vec![
            EnvVar::literal("MODE", "production"),
            EnvVar::secret_ref("DB_PASSWORD", "db-password"),
            EnvVar::literal("DSN", "postgres://app:$(db-password)@db/app?key=$(api.key)"),
        ];

        let resolved = resolve_env("demo", &env, &secrets).await.expect("resolve");
        let values: Vec<(&str, &str)> = resolved
            .iter()
            .map(|v| (v.name.as_str(), v.value.as_str()))
            .collect();
        assert_eq!(
            values,
            vec![
                ("MODE", "production"),
                ("DB_PASSWORD", "hunter2"),
                ("DSN", "postgres://app:hunter2@db/app?key=k-1"),
            ]
        );
        assert_eq!(secrets.accessed(), vec!["db-password", "api.key"]);
    }

    #[tokio::test]
    async fn missing_secret_fails_resolution() {
        let secrets = FakeSecrets::with(&[]);
        let env = vec![EnvVar::secret_ref("TOKEN", "absent")];
        let err = resolve_env("demo", &env, &secrets).await.unwrap_err();
        assert!(matches!(err, SecretError::NotFound { ref name } if name == "absent"));
    }

    #[tokio::test]
    async fn text_without_placeholders_is_untouched() {
        let secrets = FakeSecrets::with(&[]);
        let env = vec![EnvVar::literal("CMD", "echo $(unterminated and $HOME")];
        let resolved = resolve_env("demo", &env, &secrets).await.expect("resolve");
        assert_eq!(resolved[0].value, "echo $(unterminated and $HOME");
        assert!(secrets.accessed().is_empty());
    }
}
