//! HTTP handler for the shop REST API.
//!
//! Maps each `(kind, action)` pair onto one request:
//! - create: `POST {base}/api/v1/{kind}`
//! - update: `PUT {base}/api/v1/{kind}/{id}`
//! - delete: `DELETE {base}/api/v1/{kind}/{id}`
//!
//! Remote ids are sent as one escaped path segment. Ids that cannot be one
//! (empty, `.` or `..`) fail permanently.
//!
//! Any non-2xx response is a failure. 5xx, 401, 408 and 429 are retried;
//! other 4xx responses are permanent.

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode, Url};

use super::handler::{FailureClass, Handler, HandlerError};
use super::operation::{Action, Payload};
use crate::config::ApiConfig;
use crate::error::ShopsyncError;

/// Handler that replays operations over HTTP.
#[derive(Debug, Clone)]
pub struct HttpHandler {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpHandler {
    /// Create a handler from API settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: &ApiConfig) -> Result<Self, ShopsyncError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            ShopsyncError::Config(format!("Invalid api.base_url '{}': {e}", config.base_url))
        })?;
        let client = Client::builder().timeout(config.timeout()).build()?;

        Ok(Self {
            client,
            base_url,
            token: config.token.clone(),
        })
    }

    /// Method and URL for an operation.
    ///
    /// # Errors
    ///
    /// Update and delete without a usable remote id are permanent failures.
    pub fn route(&self, action: Action, payload: &Payload) -> Result<(Method, Url), HandlerError> {
        let kind = payload.kind();
        let mut segments = vec!["api", "v1", kind.as_str()];

        let method = match action {
            Action::Create => Method::POST,
            Action::Update => Method::PUT,
            Action::Delete => Method::DELETE,
        };

        if action != Action::Create {
            let id = payload.remote_id().ok_or_else(|| {
                HandlerError::permanent(format!("{action} {kind} requires a remote id"))
            })?;
            if matches!(id, "" | "." | "..") {
                return Err(HandlerError::permanent(format!(
                    "{action} {kind} has an unusable remote id '{id}'"
                )));
            }
            segments.push(id);
        }

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                HandlerError::permanent(format!("{} cannot hold an API path", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);

        Ok((method, url))
    }
}

/// Retry class for a non-success status.
#[must_use]
pub fn classify_status(status: StatusCode) -> FailureClass {
    if status.is_server_error()
        || matches!(
            status,
            StatusCode::UNAUTHORIZED
                | StatusCode::REQUEST_TIMEOUT
                | StatusCode::TOO_MANY_REQUESTS
        )
    {
        FailureClass::Transient
    } else {
        FailureClass::Permanent
    }
}

#[async_trait]
impl Handler for HttpHandler {
    async fn handle(
        &self,
        action: Action,
        payload: &Payload,
    ) -> Result<serde_json::Value, HandlerError> {
        let (method, url) = self.route(action, payload)?;
        let mut request = self.client.request(method.clone(), url.clone());

        if action != Action::Delete {
            let body = payload
                .body()
                .map_err(|e| HandlerError::permanent(format!("Invalid payload: {e}")))?;
            request = request.json(&body);
        }

        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        tracing::debug!(%method, %url, "Sending sync request");

        let response = request
            .send()
            .await
            .map_err(|e| HandlerError::transient(format!("Request to {url} failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| HandlerError::transient(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            let message = if text.is_empty() {
                format!("{method} {url} returned {status}")
            } else {
                format!("{method} {url} returned {status}: {text}")
            };
            return Err(HandlerError {
                class: classify_status(status),
                message,
            });
        }

        if text.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text)))
    }
}
