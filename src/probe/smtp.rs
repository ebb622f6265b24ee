//! Outbound (SMTP) credential verification.

use std::time::Duration;

use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::transport::smtp::response::Severity;
use lettre::{AsyncSmtpTransport, Tokio1Executor};

use super::{classify_source_chain, ErrorCategory, MailCredentials, ProbeOutcome};

/// Bound on connect + greeting + handshake + auth, applied both as the
/// transport timeout and as an outer wall-clock deadline.
const SMTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Verify that an SMTP credential set connects and authenticates.
///
/// No test message is sent; this is the cheap connection-and-credentials
/// round trip, so send-time restrictions (e.g. relay denial for certain
/// senders) are not detected here.
pub async fn verify_smtp(cred: &MailCredentials) -> ProbeOutcome {
    verify_smtp_with_timeout(cred, SMTP_TIMEOUT).await
}

/// [`verify_smtp`] with an explicit deadline. Whichever finishes first wins:
/// a completed probe cancels the timer, an elapsed timer drops the in-flight
/// connection and any late completion is ignored.
pub async fn verify_smtp_with_timeout(cred: &MailCredentials, bound: Duration) -> ProbeOutcome {
    let transport = match build_transport(cred, bound) {
        Ok(transport) => transport,
        Err(err) => return outcome_from_error(&err),
    };

    match tokio::time::timeout(bound, transport.test_connection()).await {
        Ok(Ok(true)) => ProbeOutcome::ok("SMTP connection verified"),
        Ok(Ok(false)) => ProbeOutcome::fail_with(
            ErrorCategory::Unknown,
            "SMTP server rejected the connection check",
        ),
        Ok(Err(err)) => outcome_from_error(&err),
        Err(_) => ProbeOutcome::fail(ErrorCategory::Timeout),
    }
}

fn build_transport(
    cred: &MailCredentials,
    bound: Duration,
) -> Result<AsyncSmtpTransport<Tokio1Executor>, lettre::transport::smtp::Error> {
    let tls_params = TlsParameters::new(cred.host.clone())?;

    // secure = implicit TLS from the first byte; otherwise upgrade via
    // STARTTLS when the server offers it
    let tls = if cred.secure {
        Tls::Wrapper(tls_params)
    } else {
        Tls::Opportunistic(tls_params)
    };

    let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&cred.host)
        .port(cred.port)
        .tls(tls)
        .timeout(Some(bound))
        .credentials(Credentials::new(
            cred.username.clone(),
            cred.password.clone(),
        ))
        .build();

    Ok(transport)
}

fn outcome_from_error(err: &lettre::transport::smtp::Error) -> ProbeOutcome {
    ProbeOutcome::classified(classify_smtp_error(err), err.to_string())
}

fn classify_smtp_error(err: &lettre::transport::smtp::Error) -> ErrorCategory {
    if err.is_timeout() {
        return ErrorCategory::Timeout;
    }
    if err.is_tls() {
        return ErrorCategory::CertificateError;
    }
    if let Some(code) = err.status() {
        // during verification no mail is in flight, so a permanent
        // rejection is an authentication-rejection signal
        return match code.severity {
            Severity::PermanentNegativeCompletion => ErrorCategory::AuthenticationFailed,
            _ => ErrorCategory::Unknown,
        };
    }
    if let Some(category) = classify_source_chain(err) {
        return category;
    }
    ErrorCategory::Unknown
}
