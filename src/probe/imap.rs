//! Inbound (IMAP) credential verification.

use std::fmt;
use std::time::Duration;

use async_native_tls::TlsConnector;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use super::{classify_io, ErrorCategory, MailCredentials, ProbeOutcome};

/// Wall-clock bound on the whole connect + login + examine sequence.
const IMAP_TIMEOUT: Duration = Duration::from_secs(15);

/// Verify that an IMAP credential set authenticates and grants real mailbox
/// access by opening INBOX read-only.
///
/// Authentication alone is insufficient: a credential that logs in but
/// cannot open any mailbox is reported as a failure naming the
/// mailbox-access error.
pub async fn verify_imap(cred: &MailCredentials) -> ProbeOutcome {
    verify_imap_with_timeout(cred, IMAP_TIMEOUT).await
}

/// [`verify_imap`] with an explicit deadline. If the timer fires first the
/// in-flight connection is dropped, which forcibly tears it down; a late
/// completion has nowhere to land and is a no-op.
pub async fn verify_imap_with_timeout(cred: &MailCredentials, bound: Duration) -> ProbeOutcome {
    match tokio::time::timeout(bound, probe(cred)).await {
        Ok(outcome) => outcome,
        Err(_) => ProbeOutcome::fail(ErrorCategory::Timeout),
    }
}

async fn probe(cred: &MailCredentials) -> ProbeOutcome {
    let tcp = match TcpStream::connect((cred.host.as_str(), cred.port)).await {
        Ok(stream) => stream,
        Err(err) => return ProbeOutcome::classified(classify_io(&err), err.to_string()),
    };

    if cred.secure {
        let connector = TlsConnector::new().danger_accept_invalid_certs(cred.accept_invalid_certs);
        match connector.connect(&cred.host, tcp).await {
            Ok(tls) => login_and_examine(tls, cred).await,
            // TLS trust failures, including self-signed rejections when the
            // relaxation was not requested
            Err(err) => {
                ProbeOutcome::classified(ErrorCategory::CertificateError, err.to_string())
            }
        }
    } else {
        login_and_examine(tcp, cred).await
    }
}

async fn login_and_examine<S>(stream: S, cred: &MailCredentials) -> ProbeOutcome
where
    S: AsyncRead + AsyncWrite + Unpin + fmt::Debug + Send,
{
    let client = async_imap::Client::new(stream);

    let mut session = match client.login(&cred.username, &cred.password).await {
        Ok(session) => session,
        // dropping the returned client closes the connection
        Err((err, _client)) => {
            return ProbeOutcome::classified(classify_imap_error(&err, Phase::Login), err.to_string())
        }
    };

    let outcome = match session.examine("INBOX").await {
        Ok(_mailbox) => ProbeOutcome::ok("IMAP connection verified"),
        Err(err) => ProbeOutcome::fail_with(
            classify_imap_error(&err, Phase::Examine),
            format!("could not open INBOX: {err}"),
        ),
    };

    session.logout().await.ok();
    outcome
}

#[derive(Clone, Copy, PartialEq)]
enum Phase {
    Login,
    Examine,
}

fn classify_imap_error(err: &async_imap::error::Error, phase: Phase) -> ErrorCategory {
    use async_imap::error::Error;

    match err {
        // a NO/BAD while logging in is the server rejecting the credential;
        // the same response while examining is a mailbox-access problem
        Error::No(..) | Error::Bad(..) if phase == Phase::Login => {
            ErrorCategory::AuthenticationFailed
        }
        Error::Io(io_err) => classify_io(io_err),
        _ => ErrorCategory::Unknown,
    }
}
