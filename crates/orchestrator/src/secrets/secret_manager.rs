use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use common::platform::{
    AccessSecretVersionResponse, AddSecretVersionRequest, SecretList, SecretPayload,
    SecretResource,
};
use reqwest::Client;
use serde_json::json;
use tracing::{debug, info};

use super::{SecretError, SecretResolver};
use crate::platform::{PlatformError, RestClient};

pub const DEFAULT_SECRETS_ENDPOINT: &str = "https://secretmanager.googleapis.com/v1";

/// REST client for the secret store.
#[derive(Clone)]
pub struct SecretManagerApi {
    rest: RestClient,
}

impl SecretManagerApi {
    pub fn new(client: Client, base: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            rest: RestClient::new(client, base, token),
        }
    }

    /// Create the secret if needed, then store `value` as its newest version.
    pub async fn create(
        &self,
        project_id: &str,
        name: &str,
        value: &str,
    ) -> Result<(), PlatformError> {
        let parent = format!("projects/{project_id}/secrets");
        let resource = SecretResource {
            replication: Some(json!({"automatic": {}})),
            ..SecretResource::default()
        };
        match self
            .rest
            .post_json(&parent, &[("secretId", name)], &resource, "create secret")
            .await
        {
            Ok(()) => info!(secret = name, "created secret"),
            Err(err) if err.is_already_exists() => {
                debug!(secret = name, "secret exists, adding a new version")
            }
            Err(err) => return Err(err),
        }

        let body = AddSecretVersionRequest {
            payload: SecretPayload {
                data: STANDARD.encode(value.as_bytes()),
            },
        };
        let no_query: [(&str, &str); 0] = [];
        self.rest
            .post_json(
                &format!("{parent}/{name}:addVersion"),
                &no_query,
                &body,
                "add secret version",
            )
            .await
    }

    pub async fn delete(&self, project_id: &str, name: &str) -> Result<(), PlatformError> {
        self.rest
            .delete_no_body(
                &format!("projects/{project_id}/secrets/{name}"),
                "delete secret",
            )
            .await
    }

    /// Short names of every secret in the project.
    pub async fn list(&self, project_id: &str) -> Result<Vec<String>, PlatformError> {
        let path = format!("projects/{project_id}/secrets");
        let mut names = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let query: Vec<(&str, &str)> = page_token
                .as_deref()
                .map(|token| vec![("pageToken", token)])
                .unwrap_or_default();
            let page: SecretList = self
                .rest
                .get_with_query(&path, &query, "list secrets")
                .await?;
            names.extend(
                page.secrets
                    .iter()
                    .map(|secret| secret.short_name().to_string()),
            );
            match page.next_page_token.filter(|token| !token.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(names)
    }
}

#[async_trait]
impl SecretResolver for SecretManagerApi {
    async fn access(&self, project_id: &str, name: &str) -> Result<String, SecretError> {
        let path = format!("projects/{project_id}/secrets/{name}/versions/latest:access");
        let response: AccessSecretVersionResponse = self
            .rest
            .get(&path, "access secret")
            .await
            .map_err(|source| {
                if source.is_not_found() {
                    SecretError::NotFound {
                        name: name.to_string(),
                    }
                } else {
                    SecretError::Platform {
                        name: name.to_string(),
                        source,
                    }
                }
            })?;
        let bytes = STANDARD
            .decode(response.payload.data.as_bytes())
            .map_err(|_| SecretError::InvalidPayload {
                name: name.to_string(),
            })?;
        String::from_utf8(bytes).map_err(|_| SecretError::InvalidPayload {
            name: name.to_string(),
        })
    }
}
