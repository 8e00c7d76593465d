//! HTTP plumbing for the note API.
//!
//! [`RetryClient`] attaches session cookies to every request and applies the
//! [`RetryPolicy`] around a pluggable [`HttpTransport`]. The default transport
//! is [`ReqwestTransport`].

use crate::auth::Session;
use crate::config::Config;
use crate::error::{PublishError, RequestError, Result};
use crate::retry::{Outcome, RetryDecision, RetryPolicy, RetryState};
use crate::traits::HttpTransport;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{ACCEPT, COOKIE};
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

pub use reqwest::Method;

/// Request body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Empty,
    Json(serde_json::Value),
    /// A single file sent as `multipart/form-data`.
    Multipart(FilePart),
}

/// One file field of a multipart body.
#[derive(Clone, PartialEq)]
pub struct FilePart {
    pub field: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl fmt::Debug for FilePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilePart")
            .field("field", &self.field)
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// A fully-resolved request handed to the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    /// Value of the `Cookie` header.
    pub cookie_header: String,
    pub payload: Payload,
}

/// Status and raw body of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    status: u16,
    body: Bytes,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decodes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, RequestError> {
        serde_json::from_slice(&self.body).map_err(|e| RequestError::Decode {
            message: e.to_string(),
        })
    }
}

/// A request that did not produce a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    message: String,
    retryable: bool,
}

impl TransportError {
    /// A failure worth retrying (connection reset, timeout, ...).
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }

    /// A failure that will recur on every attempt (malformed request, ...).
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for TransportError {}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            Self::fatal(err.to_string())
        } else {
            Self::retryable(err.to_string())
        }
    }
}

/// [`HttpTransport`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout())
            .build()
            .map_err(|e| PublishError::config_error(format!("cannot build HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method, &request.url)
            .header(ACCEPT, "application/json")
            .header(COOKIE, request.cookie_header);

        builder = match request.payload {
            Payload::Empty => builder,
            Payload::Json(value) => builder.json(&value),
            Payload::Multipart(file) => {
                let part = Part::bytes(file.bytes.to_vec())
                    .file_name(file.file_name)
                    .mime_str(&file.content_type)?;
                builder.multipart(Form::new().part(file.field, part))
            }
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;

        Ok(ApiResponse::new(status, body))
    }
}

/// Sends requests with session cookies, retrying per the [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryClient {
    transport: Arc<dyn HttpTransport>,
    policy: RetryPolicy,
}

impl RetryClient {
    pub fn new(transport: Arc<dyn HttpTransport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// Sends one logical request.
    ///
    /// Returns the first accepted response, [`RequestError::Rejected`] on a
    /// non-retryable 4xx, or [`RequestError::Exhausted`] when every attempt
    /// failed with a retryable outcome.
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        session: &Session,
        payload: Payload,
    ) -> Result<ApiResponse, RequestError> {
        let cookie_header = session.cookie_header();
        let mut state = RetryState::default();

        loop {
            let request = ApiRequest {
                method: method.clone(),
                url: url.to_string(),
                cookie_header: cookie_header.clone(),
                payload: payload.clone(),
            };

            debug!("{} {} (attempt {})", method, url, state.attempts());
            let (outcome, response) = match self.transport.execute(request).await {
                Ok(response) => {
                    let outcome = Outcome::Status(response.status());
                    state.record(outcome, None);
                    (outcome, Some(response))
                }
                Err(err) if err.is_retryable() => {
                    state.record(Outcome::Transport, Some(err.to_string()));
                    (Outcome::Transport, None)
                }
                Err(err) => {
                    return Err(RequestError::Transport {
                        message: err.to_string(),
                    })
                }
            };

            match (self.policy.decide(state.attempt, outcome), response) {
                (RetryDecision::Accept, Some(response)) => return Ok(response),
                (RetryDecision::Reject, Some(response)) => {
                    return Err(RequestError::Rejected {
                        status: response.status(),
                        body: response.text(),
                    })
                }
                (RetryDecision::RetryAfter { delay, reason }, _) => {
                    warn!(
                        url,
                        attempt = state.attempts(),
                        max_attempts = self.policy.max_attempts(),
                        ?reason,
                        last_error = state.last_error.as_deref(),
                        "retrying in {}s",
                        delay.as_secs_f64()
                    );
                    tokio::time::sleep(delay).await;
                    state.attempt += 1;
                }
                _ => {
                    warn!(
                        url,
                        attempts = state.attempts(),
                        last_status = state.last_status,
                        "giving up"
                    );
                    return Err(RequestError::Exhausted {
                        attempts: state.attempts(),
                        last_status: state.last_status,
                    });
                }
            }
        }
    }
}
