//! Small helpers for tokens, redirects and the success page.

use anyhow::{Context, Result};
use axum::http::Uri;
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};

/// Create an unguessable token for session ids, `state` and `nonce`.
pub(super) fn generate_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate random token")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// Path and query of the original request, used as the post-login target.
pub(super) fn request_target(uri: &Uri) -> String {
    uri.path_and_query()
        .map_or_else(|| "/".to_string(), |pq| pq.as_str().to_string())
}

/// Keep only same-origin absolute paths; anything else becomes `/`.
pub(super) fn safe_return_path(return_to: Option<&str>) -> &str {
    match return_to {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.contains('\\')
                && !path.chars().any(char::is_control) =>
        {
            path
        }
        _ => "/",
    }
}

/// A provider-supplied redirect must be an absolute http(s) URL.
pub(super) fn is_safe_redirect(location: &url::Url) -> bool {
    matches!(location.scheme(), "http" | "https") && location.host_str().is_some()
}

pub(super) fn html_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
