//! Dispatch orchestration: validate, track, delegate.
//!
//! The orchestrator owns one send request transiently, produces the tracked
//! message, and hands transport to the downstream submission service. It
//! never retries; retry/backoff belongs to the downstream side.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::tracking::{self, TransformError};

/// One outgoing message as received from the caller. Not persisted here.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailDispatchRequest {
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub tracking_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub filename: String,
    pub content_ref: String,
}

/// What the downstream service receives: the tracked body plus the original
/// envelope fields.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPayload {
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

/// Returned to the caller on success.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchReceipt {
    pub message_id: String,
    pub tracking_id: String,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("{0}")]
    Validation(&'static str),

    #[error("failed to prepare tracked message: {0}")]
    Transform(String),

    /// The downstream service rejected or failed; status and message are
    /// passed through verbatim, never reinterpreted.
    #[error("{message}")]
    Downstream { status: u16, message: String },
}

impl From<TransformError> for DispatchError {
    fn from(err: TransformError) -> Self {
        DispatchError::Transform(err.to_string())
    }
}

/// Seam to the downstream message-submission service.
///
/// Implement this to provide alternative backends or test doubles.
#[async_trait]
pub trait Submitter: Send + Sync + 'static {
    /// Submit a tracked message, forwarding the caller's bearer credential.
    /// Returns the downstream's opaque message identifier.
    async fn submit(&self, payload: &SubmissionPayload, bearer: &str)
        -> Result<String, DispatchError>;
}

#[async_trait]
impl<S: Submitter + ?Sized> Submitter for std::sync::Arc<S> {
    async fn submit(
        &self,
        payload: &SubmissionPayload,
        bearer: &str,
    ) -> Result<String, DispatchError> {
        (**self).submit(payload, bearer).await
    }
}

/// HTTP submitter POSTing to the downstream submission endpoint.
#[derive(Clone)]
pub struct HttpSubmitter {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSubmitter {
    pub fn new(endpoint: String) -> HttpSubmitter {
        HttpSubmitter {
            client: reqwest::Client::new(),
            endpoint,
        }
    }
}

#[async_trait]
impl Submitter for HttpSubmitter {
    async fn submit(
        &self,
        payload: &SubmissionPayload,
        bearer: &str,
    ) -> Result<String, DispatchError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(bearer)
            .json(payload)
            .send()
            .await
            .map_err(|err| DispatchError::Downstream {
                status: 502,
                message: err.to_string(),
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(DispatchError::Downstream {
                status: status.as_u16(),
                message: downstream_error_message(&body),
            });
        }

        message_id_from_body(&body).ok_or_else(|| DispatchError::Downstream {
            status: status.as_u16(),
            message: "downstream response did not contain a message id".to_string(),
        })
    }
}

/// Extract `messageId` (or `id`) from a success body; either may be a
/// string or a number.
fn message_id_from_body(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let id = value.get("messageId").or_else(|| value.get("id"))?;
    match id {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Prefer the downstream's `error.message`, then `message`, then the raw
/// body, preserving the origin service's wording.
fn downstream_error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(msg) = value
            .pointer("/error/message")
            .or_else(|| value.get("message"))
            .and_then(Value::as_str)
        {
            return msg.to_string();
        }
    }
    body.to_string()
}

/// Coordinates validation, tracking transform, and delegation for one
/// outgoing message at a time. Stateless across calls.
pub struct Dispatcher<M: Submitter = HttpSubmitter> {
    submitter: M,
    tracking_base_url: String,
}

impl<M: Submitter> Dispatcher<M> {
    pub fn new(submitter: M, tracking_base_url: String) -> Dispatcher<M> {
        Dispatcher {
            submitter,
            tracking_base_url,
        }
    }

    /// Validate, resolve a tracking id, transform the body, and forward to
    /// the downstream service.
    ///
    /// Validation short-circuits on the first failure; nothing is
    /// transformed and no network call is attempted.
    pub async fn dispatch(
        &self,
        req: EmailDispatchRequest,
        bearer: &str,
    ) -> Result<DispatchReceipt, DispatchError> {
        if req.to.is_empty() {
            return Err(DispatchError::Validation("recipients must not be empty"));
        }
        if req.subject.is_empty() {
            return Err(DispatchError::Validation("subject must not be empty"));
        }
        if req.html.is_empty() {
            return Err(DispatchError::Validation("html body must not be empty"));
        }

        let tracking_id = req
            .tracking_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let html = tracking::apply(&req.html, &tracking_id, &self.tracking_base_url)?;

        let payload = SubmissionPayload {
            to: req.to,
            subject: req.subject,
            html,
            attachments: req.attachments,
        };

        tracing::debug!(tracking_id = %tracking_id, recipients = payload.to.len(), "dispatching tracked message");

        let message_id = self.submitter.submit(&payload, bearer).await?;

        Ok(DispatchReceipt {
            message_id,
            tracking_id,
        })
    }
}
