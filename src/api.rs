//! Inbound HTTP surface: dispatch and credential-verification routes.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts, State};
use axum::http::request::Parts;
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::{Authorization, HeaderMapExt};
use serde_json::{json, Value};

use crate::config::Config;
use crate::dispatch::{DispatchReceipt, Dispatcher, EmailDispatchRequest, HttpSubmitter};
use crate::error::Error;
use crate::probe::{self, ErrorCategory, MailCredentials, ProbeOutcome};
use crate::vault::Vault;

#[derive(Clone, FromRef)]
pub struct Context {
    pub config: Arc<Config>,
    pub dispatcher: Arc<Dispatcher<HttpSubmitter>>,
    pub vault: Arc<Vault>,
}

/// The caller's bearer credential, forwarded verbatim to the downstream
/// submission service. Absent or malformed → unauthenticated failure.
pub struct BearerToken(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let bearer: Authorization<Bearer> =
            parts.headers.typed_get().ok_or(Error::Unauthorized)?;
        Ok(BearerToken(bearer.token().to_string()))
    }
}

pub fn api_router(ctx: Context) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/email/send", post(send_email))
        .route("/api/email/verify-smtp", post(verify_smtp))
        .route("/api/email/verify-imap", post(verify_imap))
        .with_state(ctx)
}

async fn health() -> Json<Value> {
    Json(json!({"ok": true}))
}

async fn send_email(
    BearerToken(token): BearerToken,
    State(dispatcher): State<Arc<Dispatcher<HttpSubmitter>>>,
    Json(req): Json<EmailDispatchRequest>,
) -> Result<Json<DispatchReceipt>, Error> {
    let receipt = dispatcher.dispatch(req, &token).await?;
    Ok(Json(receipt))
}

/// Probe outcomes are data: both verify handlers always answer 200 with a
/// `{success, message}` body, never an error status.
async fn verify_smtp(
    _auth: BearerToken,
    State(vault): State<Arc<Vault>>,
    Json(mut cred): Json<MailCredentials>,
) -> Json<ProbeOutcome> {
    match unseal_secret(&vault, &mut cred) {
        Ok(()) => Json(probe::verify_smtp(&cred).await),
        Err(outcome) => Json(outcome),
    }
}

async fn verify_imap(
    _auth: BearerToken,
    State(vault): State<Arc<Vault>>,
    Json(mut cred): Json<MailCredentials>,
) -> Json<ProbeOutcome> {
    match unseal_secret(&vault, &mut cred) {
        Ok(()) => Json(probe::verify_imap(&cred).await),
        Err(outcome) => Json(outcome),
    }
}

/// Secrets arriving from the credential store are vault blobs; secrets
/// typed in by the user are plaintext. Decrypt the former before probing.
fn unseal_secret(vault: &Vault, cred: &mut MailCredentials) -> Result<(), ProbeOutcome> {
    if vault.is_encrypted(&cred.password) {
        match vault.decrypt(&cred.password) {
            Ok(plain) => cred.password = plain,
            Err(_) => {
                return Err(ProbeOutcome::fail_with(
                    ErrorCategory::Unknown,
                    "stored credential could not be decrypted",
                ))
            }
        }
    }
    Ok(())
}
