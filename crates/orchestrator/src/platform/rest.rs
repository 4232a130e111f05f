use anyhow::anyhow;
use common::platform::ApiErrorEnvelope;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use super::PlatformError;

/// Bearer-authenticated JSON client shared by the platform and secret store
/// APIs.
#[derive(Clone)]
pub struct RestClient {
    client: Client,
    base: String,
    token: String,
}

impl RestClient {
    pub fn new(client: Client, base: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client,
            base: base.into(),
            token: token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        let trimmed = path.trim_start_matches('/');
        format!("{}/{}", self.base.trim_end_matches('/'), trimmed)
    }

    async fn send(
        &self,
        req: RequestBuilder,
        context: &'static str,
    ) -> Result<Response, PlatformError> {
        let res = req.bearer_auth(&self.token).send().await.map_err(|err| {
            warn!(context, error = %err, "platform request failed");
            PlatformError::Transport {
                context,
                source: err.into(),
            }
        })?;
        handle_platform_response(res, context).await
    }

    async fn decode<T>(res: Response, context: &'static str) -> Result<T, PlatformError>
    where
        T: DeserializeOwned,
    {
        res.json().await.map_err(|err| PlatformError::Transport {
            context,
            source: err.into(),
        })
    }

    pub async fn get<T>(&self, path: &str, context: &'static str) -> Result<T, PlatformError>
    where
        T: DeserializeOwned,
    {
        let res = self.send(self.client.get(self.url(path)), context).await?;
        Self::decode(res, context).await
    }

    pub async fn get_with_query<Q, T>(
        &self,
        path: &str,
        query: &Q,
        context: &'static str,
    ) -> Result<T, PlatformError>
    where
        Q: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let req = self.client.get(self.url(path)).query(query);
        let res = self.send(req, context).await?;
        Self::decode(res, context).await
    }

    /// POST a JSON body; the response body is discarded.
    pub async fn post_json<Q, B>(
        &self,
        path: &str,
        query: &Q,
        body: &B,
        context: &'static str,
    ) -> Result<(), PlatformError>
    where
        Q: Serialize + ?Sized,
        B: Serialize + ?Sized,
    {
        let req = self.client.post(self.url(path)).query(query).json(body);
        let res = self.send(req, context).await?;
        drain(res, context).await
    }

    pub async fn patch_json<Q, B>(
        &self,
        path: &str,
        query: &Q,
        body: &B,
        context: &'static str,
    ) -> Result<(), PlatformError>
    where
        Q: Serialize + ?Sized,
        B: Serialize + ?Sized,
    {
        let req = self.client.patch(self.url(path)).query(query).json(body);
        let res = self.send(req, context).await?;
        drain(res, context).await
    }

    pub async fn delete_no_body(
        &self,
        path: &str,
        context: &'static str,
    ) -> Result<(), PlatformError> {
        let req = self.client.delete(self.url(path));
        let res = self.send(req, context).await?;
        drain(res, context).await
    }
}

async fn drain(res: Response, context: &'static str) -> Result<(), PlatformError> {
    res.bytes()
        .await
        .map(|_| ())
        .map_err(|err| PlatformError::Transport {
            context,
            source: err.into(),
        })
}

async fn handle_platform_response(
    res: Response,
    context: &'static str,
) -> Result<Response, PlatformError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let body = res.text().await.unwrap_or_default();
    Err(error_from_body(status, &body, context))
}

/// Structured envelopes become [`PlatformError::Api`]; anything else is
/// treated as a transport-level failure.
pub(crate) fn error_from_body(
    status: StatusCode,
    body: &str,
    context: &'static str,
) -> PlatformError {
    if let Ok(envelope) = serde_json::from_str::<ApiErrorEnvelope>(body) {
        return PlatformError::Api {
            code: envelope.error.code,
            status: envelope.error.status,
            details: envelope.error.message,
        };
    }
    let trimmed = body.trim();
    let message = if trimmed.is_empty() {
        format!("request failed with status {status}")
    } else {
        format!("request failed with status {status}: {trimmed}")
    };
    PlatformError::Transport {
        context,
        source: anyhow!(message),
    }
}
