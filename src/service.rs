//! Reply service client
//!
//! Sends user text to the remote assistant and returns its reply. One attempt
//! per call: failures surface immediately, nothing is retried, cached or queued.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::Result;
use crate::config::ServiceConfig;
use crate::error::ErrorKind;

/// Successful reply from the assistant
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceReply {
    /// Reply text
    pub response: String,
}

/// Why a submission failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// Connection, DNS, TLS or timeout failure
    #[error("network failure: {0}")]
    NetworkFailure(String),

    /// The service answered with a non-2xx status
    #[error("service returned status {code}{}", detail_suffix(.detail))]
    NonSuccessStatus {
        /// HTTP status code
        code: u16,
        /// `response` text from the error body, when the service sent one
        detail: Option<String>,
    },

    /// The body was not a JSON reply object
    #[error("malformed reply: {0}")]
    MalformedBody(String),

    /// Submission text was empty
    #[error("nothing to submit")]
    EmptyText,
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail.as_ref().map(|d| format!(": {d}")).unwrap_or_default()
}

impl ServiceError {
    /// Session-level failure kind for this error
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NetworkFailure(_) | Self::NonSuccessStatus { .. } => {
                ErrorKind::ServiceUnreachable
            }
            Self::MalformedBody(_) => ErrorKind::InvalidReply,
            Self::EmptyText => ErrorKind::EmptyInput,
        }
    }
}

/// Something that answers user text
#[async_trait]
pub trait ResponseService: Send + Sync {
    /// Submit `text` and wait for the reply
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] if the request fails or the reply is unusable
    async fn submit(&self, text: &str) -> std::result::Result<ServiceReply, ServiceError>;
}

#[derive(Serialize)]
struct SubmitRequest<'a> {
    text: &'a str,
}

/// JSON-over-HTTP reply service
///
/// Sends `POST {"text": ...}` and expects `{"response": ...}`.
pub struct HttpResponseService {
    client: reqwest::Client,
    url: Url,
}

impl HttpResponseService {
    /// Create a client for the configured endpoint
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }

    /// Endpoint this client posts to
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl ResponseService for HttpResponseService {
    async fn submit(&self, text: &str) -> std::result::Result<ServiceReply, ServiceError> {
        if text.trim().is_empty() {
            return Err(ServiceError::EmptyText);
        }

        tracing::debug!(url = %self.url, bytes = text.len(), "submitting to reply service");

        let response = self
            .client
            .post(self.url.clone())
            .json(&SubmitRequest { text })
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "reply service request failed");
                ServiceError::NetworkFailure(e.to_string())
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ServiceError::NetworkFailure(e.to_string()))?;

        tracing::debug!(status = %status, bytes = body.len(), "received reply");

        if !status.is_success() {
            let detail = serde_json::from_str::<ServiceReply>(&body)
                .ok()
                .map(|r| r.response);
            tracing::warn!(status = %status, detail = ?detail, "reply service error");
            return Err(ServiceError::NonSuccessStatus {
                code: status.as_u16(),
                detail,
            });
        }

        serde_json::from_str::<ServiceReply>(&body).map_err(|e| {
            tracing::warn!(error = %e, "failed to parse reply");
            ServiceError::MalformedBody(e.to_string())
        })
    }
}
