//! Open/click tracking transforms for outgoing HTML email bodies.
//!
//! Both transforms are pure string rewrites with no I/O. The dispatch
//! orchestrator runs [`inject_open_pixel`] first and
//! [`wrap_links_for_tracking`] second, exactly once each per message.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::{Captures, Regex};
use thiserror::Error;

/// Percent-encoding set equivalent to JS `encodeURIComponent`:
/// everything except alphanumerics and `- _ . ! ~ * ' ( )` is escaped.
const URL_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Matches an anchor tag's href attribute, capturing everything up to the
/// attribute value (1) and the quoted value itself (3 = double, 4 = single).
const HREF_PATTERN: &str = r#"(?i)(<a\b[^>]*?\bhref\s*=\s*)("([^"]*)"|'([^']*)')"#;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("anchor scan failed: {0}")]
    Scan(#[from] regex::Error),
}

/// Insert an invisible 1×1 open-tracking pixel into an HTML body.
///
/// The pixel is placed immediately before the first `</body>` when one
/// exists, otherwise appended at the end of the document.
///
/// Not idempotent: applying it twice inserts two pixels.
pub fn inject_open_pixel(html: &str, tracking_id: &str, base_url: &str) -> String {
    let pixel = format!(
        r#"<img src="{base_url}/api/track/open/{tracking_id}" width="1" height="1" style="opacity:0;position:absolute;left:-9999px;border:0;" alt=""/>"#
    );

    match html.find("</body>") {
        Some(idx) => {
            let mut out = String::with_capacity(html.len() + pixel.len());
            out.push_str(&html[..idx]);
            out.push_str(&pixel);
            out.push_str(&html[idx..]);
            out
        }
        None => {
            let mut out = html.to_string();
            out.push_str(&pixel);
            out
        }
    }
}

/// Rewrite anchor hrefs to route clicks through the tracking redirect,
/// preserving every other attribute byte-for-byte.
///
/// A href is left untouched when it starts with `#`, `mailto:` or `tel:`,
/// contains `/track/`, or contains `unsubscribe` in any casing.
///
/// The scan is attribute-pattern based rather than a full HTML parse, so
/// malformed or unusually escaped anchors may be mis-rewritten.
pub fn wrap_links_for_tracking(
    html: &str,
    tracking_id: &str,
    base_url: &str,
) -> Result<String, TransformError> {
    let href_re = Regex::new(HREF_PATTERN)?;

    let out = href_re.replace_all(html, |caps: &Captures| {
        let (quote, url) = match (caps.get(3), caps.get(4)) {
            (Some(m), _) => ('"', m.as_str()),
            (_, Some(m)) => ('\'', m.as_str()),
            _ => return caps[0].to_string(),
        };

        if is_excluded(url) {
            return caps[0].to_string();
        }

        let encoded = utf8_percent_encode(url, URL_COMPONENT);
        format!(
            "{}{quote}{base_url}/api/track/click/{tracking_id}?url={encoded}{quote}",
            &caps[1]
        )
    });

    Ok(out.into_owned())
}

fn is_excluded(url: &str) -> bool {
    url.starts_with('#')
        || url.starts_with("mailto:")
        || url.starts_with("tel:")
        || url.contains("/track/")
        || url.to_lowercase().contains("unsubscribe")
}

/// Apply both tracking transforms in dispatch order: pixel, then links.
pub fn apply(html: &str, tracking_id: &str, base_url: &str) -> Result<String, TransformError> {
    let with_pixel = inject_open_pixel(html, tracking_id, base_url);
    wrap_links_for_tracking(&with_pixel, tracking_id, base_url)
}
