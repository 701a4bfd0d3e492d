/**
 * HTTP/JSON Float Plan Client
 *
 * Sends queued operations to a REST backend and classifies every outcome
 * into the retry taxonomy:
 *
 * - 2xx → success
 * - 408, 429, 5xx, connect errors, timeouts → retryable
 * - any other 4xx → fatal
 */

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};

use crate::config::Config;
use crate::offline::{HttpVerb, Operation};
use crate::remote::{RemoteApi, RemoteError, ResourceKind};

/// Default per-request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// reqwest-backed implementation of [`RemoteApi`]
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpRemote {
    /// Build a client for the configured server
    pub fn new(config: &Config) -> Result<Self, RemoteError> {
        Self::with_base_url(config.server_url(), config.get_token().cloned())
    }

    /// Build a client for an explicit base URL
    pub fn with_base_url(base_url: &str, token: Option<String>) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| RemoteError::fatal(None, format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let request = self.client.request(method, self.url(path));
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

fn method_for(verb: HttpVerb) -> Method {
    match verb {
        HttpVerb::Post => Method::POST,
        HttpVerb::Patch => Method::PATCH,
        HttpVerb::Delete => Method::DELETE,
    }
}

/// Map a response status onto the retry taxonomy
pub fn classify_status(status: StatusCode, body: &str) -> Result<(), RemoteError> {
    if status.is_success() {
        return Ok(());
    }
    let message = if body.is_empty() {
        status.to_string()
    } else {
        format!("{} - {}", status, body)
    };
    if status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
    {
        Err(RemoteError::retryable(message))
    } else {
        Err(RemoteError::fatal(Some(status.as_u16()), message))
    }
}

fn transport_error(err: reqwest::Error) -> RemoteError {
    // Anything that failed before a status arrived is treated as offline.
    RemoteError::retryable(format!("Network error: {}", err))
}

#[async_trait]
impl RemoteApi for HttpRemote {
    async fn apply(&self, operation: &Operation) -> Result<(), RemoteError> {
        let mut request = self.request(method_for(operation.verb), &operation.resource_path);
        if !operation.payload.is_null() {
            request = request.json(&operation.payload);
        }
        request = request.header("Idempotency-Key", operation.id.to_string());

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let body = if status.is_success() {
            String::new()
        } else {
            response.text().await.unwrap_or_default()
        };

        tracing::debug!(
            "[SYNC] {} {} -> {}",
            operation.verb.as_str(),
            operation.resource_path,
            status
        );
        classify_status(status, &body)
    }

    async fn list(&self, kind: ResourceKind) -> Result<Vec<serde_json::Value>, RemoteError> {
        let response = self
            .request(Method::GET, kind.path())
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return classify_status(status, &body).map(|()| Vec::new());
        }

        response.json::<Vec<serde_json::Value>>().await.map_err(|e| {
            if e.is_decode() {
                RemoteError::fatal(Some(status.as_u16()), format!("Malformed list response: {}", e))
            } else {
                transport_error(e)
            }
        })
    }
}
