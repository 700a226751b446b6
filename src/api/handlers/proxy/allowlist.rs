//! Node routes reachable through the proxy.
//!
//! The node's API is much wider than what the admin UI needs. Only the
//! (method, path) pairs below are forwarded; every other request under the
//! proxy prefix is denied. Changing this table changes what the UI can do.

use axum::http::Method;
use regex::Regex;
use thiserror::Error;

/// One path segment. Dots are allowed inside a segment; `.` and `..` segments
/// are rejected during normalization.
const SEG: &str = r"[a-zA-Z0-9_\-:.~%]+";

/// (method, pattern) pairs; `{seg}` stands for one path segment.
pub const ALLOWED_PROXY_ROUTES: &[(&str, &str)] = &[
    // list discovery services
    ("GET", "/internal/discovery/v1"),
    // search presentations on a discovery service
    ("GET", "/internal/discovery/v1/{seg}"),
    // activate a discovery service for a subject
    ("POST", "/internal/discovery/v1/{seg}/{seg}"),
    // deactivate a discovery service for a subject
    ("DELETE", "/internal/discovery/v1/{seg}/{seg}"),
    // issue a credential
    ("POST", "/internal/vcr/v2/issuer/vc"),
    // search issued credentials
    ("GET", "/internal/vcr/v2/issuer/vc/search"),
    // load a credential into a wallet
    ("POST", "/internal/vcr/v2/holder/{seg}/vc"),
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("malformed percent escape")]
    MalformedEscape,
    #[error("dot segment")]
    DotSegment,
    #[error("encoded separator")]
    EncodedSeparator,
}

#[derive(Debug, Error)]
pub enum AllowlistError {
    #[error("invalid method in allowlist: {0}")]
    Method(String),
    #[error("invalid pattern in allowlist: {0}")]
    Pattern(#[from] regex::Error),
}

#[derive(Debug, Clone)]
struct AllowedRoute {
    method: Method,
    pattern: Regex,
}

/// Compiled allowlist, immutable after startup.
#[derive(Debug, Clone)]
pub struct Allowlist {
    routes: Vec<AllowedRoute>,
}

impl Allowlist {
    /// Compile a route table.
    ///
    /// # Errors
    /// Returns an error if a method or pattern is invalid.
    pub fn compile(routes: &[(&str, &str)]) -> Result<Self, AllowlistError> {
        let routes = routes
            .iter()
            .map(|(method, pattern)| {
                let method = Method::from_bytes(method.as_bytes())
                    .map_err(|_| AllowlistError::Method((*method).to_string()))?;
                let pattern = Regex::new(&format!("^(?:{})$", pattern.replace("{seg}", SEG)))?;
                Ok(AllowedRoute { method, pattern })
            })
            .collect::<Result<Vec<_>, AllowlistError>>()?;
        Ok(Self { routes })
    }

    /// The built-in node route table.
    ///
    /// # Errors
    /// Returns an error if the table does not compile.
    pub fn default_routes() -> Result<Self, AllowlistError> {
        Self::compile(ALLOWED_PROXY_ROUTES)
    }

    /// Whether `(method, path)` may be forwarded. `path` must be normalized.
    #[must_use]
    pub fn is_allowed(&self, method: &Method, path: &str) -> bool {
        self.routes
            .iter()
            .any(|route| route.method == *method && route.pattern.is_match(path))
    }

    #[cfg(test)]
    fn matching(&self, method: &Method, path: &str) -> usize {
        self.routes
            .iter()
            .filter(|route| route.method == *method && route.pattern.is_match(path))
            .count()
    }
}

/// Canonical form of the path below the proxy prefix.
///
/// Empty segments are dropped, escaped unreserved characters are decoded,
/// other escapes get uppercase hex digits and the result has a single
/// leading `/`.
///
/// # Errors
/// Rejects malformed escapes, `.`/`..` segments in any encoding and encoded
/// path separators.
pub fn normalize_path(path: &str) -> Result<String, PathError> {
    let mut normalized = String::with_capacity(path.len() + 1);
    for segment in path.split('/').filter(|segment| !segment.is_empty()) {
        normalized.push('/');
        normalized.push_str(&normalize_segment(segment)?);
    }
    if normalized.is_empty() {
        normalized.push('/');
    }
    Ok(normalized)
}

fn normalize_segment(segment: &str) -> Result<String, PathError> {
    if segment.contains('\\') {
        return Err(PathError::EncodedSeparator);
    }

    let bytes = segment.as_bytes();
    let mut out = String::with_capacity(segment.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let (Some(hi), Some(lo)) = (
                bytes.get(i + 1).and_then(|b| hex_value(*b)),
                bytes.get(i + 2).and_then(|b| hex_value(*b)),
            ) else {
                return Err(PathError::MalformedEscape);
            };
            let byte = (hi << 4) | lo;
            match byte {
                b'/' | b'\\' => return Err(PathError::EncodedSeparator),
                // RFC 3986 unreserved characters mean the same encoded or not
                b if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~') => {
                    out.push(char::from(b));
                }
                b => {
                    out.push('%');
                    out.push(char::from(HEX_UPPER[usize::from(b >> 4)]));
                    out.push(char::from(HEX_UPPER[usize::from(b & 0x0f)]));
                }
            }
            i += 3;
        } else {
            let end = segment[i..]
                .find('%')
                .map_or(segment.len(), |offset| i + offset);
            out.push_str(&segment[i..end]);
            i = end;
        }
    }

    if out == "." || out == ".." {
        return Err(PathError::DotSegment);
    }

    Ok(out)
}

const HEX_UPPER: &[u8; 16] = b"0123456789ABCDEF";

const fn hex_value(digit: u8) -> Option<u8> {
    match digit {
        b'0'..=b'9' => Some(digit - b'0'),
        b'a'..=b'f' => Some(digit - b'a' + 10),
        b'A'..=b'F' => Some(digit - b'A' + 10),
        _ => None,
    }
}
