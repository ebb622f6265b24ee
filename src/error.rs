//! Subsystem error taxonomy and its HTTP mapping.
//!
//! Probe failures are deliberately absent: probing is a query operation and
//! always answers with a `{success, message}` body, never an error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::dispatch::DispatchError;
use crate::vault::VaultError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required dispatch field was missing or empty. Fails fast; no
    /// transform or network call was attempted.
    #[error("{0}")]
    Validation(String),

    /// Unexpected failure while rewriting the HTML body.
    #[error("failed to prepare tracked message: {0}")]
    Transform(String),

    /// The downstream submission service rejected or failed. Status and
    /// message are surfaced unchanged.
    #[error("{message}")]
    Downstream { status: u16, message: String },

    /// A stored secret failed authentication-tag verification. The
    /// credential is unusable; retrying with the same inputs cannot help.
    #[error("stored credential could not be decrypted")]
    Decryption,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Internal Server Error: {0:?}")]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    pub fn http_code(&self) -> StatusCode {
        match self {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Transform(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Downstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Error::Decryption => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::Anyhow(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn http_message(&self) -> String {
        match self {
            Error::Anyhow(_) => "an internal server error occurred".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<DispatchError> for Error {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Validation(msg) => Error::Validation(msg.to_string()),
            DispatchError::Transform(msg) => Error::Transform(msg),
            DispatchError::Downstream { status, message } => {
                Error::Downstream { status, message }
            }
        }
    }
}

impl From<VaultError> for Error {
    fn from(err: VaultError) -> Self {
        match err {
            VaultError::Decryption => Error::Decryption,
            VaultError::Encrypt(msg) => Error::Anyhow(anyhow::anyhow!(msg)),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Trace server errors since the response body hides the detail
        if self.http_code().is_server_error() {
            tracing::error!("Error Status {}: {}", self.http_code(), self);
        }

        let body = Json(json!({
            "code": self.http_code().as_u16(),
            "message": self.http_message(),
        }));
        (self.http_code(), body).into_response()
    }
}
