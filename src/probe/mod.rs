//! Mailbox connectivity probing.
//!
//! Exercises a candidate credential set against the real server (SMTP
//! outbound, IMAP inbound) before it is trusted. Probe failures are data,
//! not faults: every probe returns a [`ProbeOutcome`] and never propagates
//! an error to the caller.

mod imap;
mod smtp;

pub use imap::{verify_imap, verify_imap_with_timeout};
pub use smtp::{verify_smtp, verify_smtp_with_timeout};

use serde::{Deserialize, Serialize};

/// A credential set under test.
///
/// The secret arrives in plaintext and lives in memory only for the probe's
/// lifetime; at rest it is a vault blob.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailCredentials {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Implicit TLS when true, STARTTLS/plain upgrade otherwise.
    #[serde(default)]
    pub secure: bool,
    /// Caller-opted relaxation for self-signed certificates (IMAP only).
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

/// Stable classification of probe failures, independent of the underlying
/// mail library's error strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    ConnectionRefused,
    HostNotFound,
    AuthenticationFailed,
    Timeout,
    CertificateError,
    Unknown,
}

impl ErrorCategory {
    /// The stable user-facing message for this category.
    pub fn message(&self) -> &'static str {
        match self {
            ErrorCategory::ConnectionRefused => {
                "The server refused the connection. Check the host and port."
            }
            ErrorCategory::HostNotFound => {
                "The mail server host could not be found. Check the hostname."
            }
            ErrorCategory::AuthenticationFailed => {
                "Authentication failed. Check the username and password."
            }
            ErrorCategory::Timeout => "The connection to the mail server timed out.",
            ErrorCategory::CertificateError => {
                "The server's TLS certificate could not be verified."
            }
            ErrorCategory::Unknown => "The mail server could not be verified.",
        }
    }
}

/// Result of one probe invocation. Returned directly to the caller, never
/// stored.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<ErrorCategory>,
    pub message: String,
}

impl ProbeOutcome {
    pub fn ok(message: impl Into<String>) -> ProbeOutcome {
        ProbeOutcome {
            success: true,
            category: None,
            message: message.into(),
        }
    }

    pub fn fail(category: ErrorCategory) -> ProbeOutcome {
        ProbeOutcome {
            success: false,
            category: Some(category),
            message: category.message().to_string(),
        }
    }

    /// Failure with a detail message replacing the stock category text,
    /// used where the raw error carries information the caller needs
    /// (e.g. which mailbox could not be opened).
    pub fn fail_with(category: ErrorCategory, message: impl Into<String>) -> ProbeOutcome {
        ProbeOutcome {
            success: false,
            category: Some(category),
            message: message.into(),
        }
    }

    /// Failure using the category's stable message, except `Unknown`, which
    /// carries the raw underlying error text as its human-readable detail.
    pub fn classified(category: ErrorCategory, raw: impl Into<String>) -> ProbeOutcome {
        match category {
            ErrorCategory::Unknown => Self::fail_with(ErrorCategory::Unknown, raw),
            other => Self::fail(other),
        }
    }
}

/// Map a transport-level I/O error onto the stable taxonomy.
pub(crate) fn classify_io(err: &std::io::Error) -> ErrorCategory {
    use std::io::ErrorKind;

    match err.kind() {
        ErrorKind::ConnectionRefused => ErrorCategory::ConnectionRefused,
        ErrorKind::TimedOut => ErrorCategory::Timeout,
        ErrorKind::NotFound => ErrorCategory::HostNotFound,
        _ => {
            // getaddrinfo failures surface as uncategorized io errors;
            // match the resolver's message instead of the kind
            let msg = err.to_string().to_lowercase();
            if msg.contains("failed to lookup")
                || msg.contains("name or service not known")
                || msg.contains("nodename nor servname")
                || msg.contains("no such host")
            {
                ErrorCategory::HostNotFound
            } else {
                ErrorCategory::Unknown
            }
        }
    }
}

/// Walk an error's source chain looking for an I/O error to classify.
pub(crate) fn classify_source_chain(err: &(dyn std::error::Error + 'static)) -> Option<ErrorCategory> {
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<std::io::Error>() {
            return Some(classify_io(io_err));
        }
        source = cause.source();
    }
    None
}
