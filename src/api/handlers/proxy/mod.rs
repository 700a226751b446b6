//! Allowlisted reverse proxy to the node REST API.
//!
//! Everything under [`PROXY_PREFIX`] is handled here and never reaches the
//! router. The remainder of the path is normalized, checked against the
//! [`Allowlist`] and forwarded only on a match. Denied requests get `403`.

mod allowlist;
mod forward;

pub use allowlist::{normalize_path, Allowlist, AllowlistError, PathError, ALLOWED_PROXY_ROUTES};
pub use forward::Forwarder;

use crate::api::{ApiError, AppState};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{info, warn};

pub const PROXY_PREFIX: &str = "/api/proxy";

#[derive(Debug)]
pub struct ProxyState {
    allowlist: Allowlist,
    forwarder: Forwarder,
}

impl ProxyState {
    #[must_use]
    pub fn new(allowlist: Allowlist, forwarder: Forwarder) -> Self {
        Self {
            allowlist,
            forwarder,
        }
    }
}

/// Path below the proxy prefix, or `None` for requests not aimed at the proxy.
fn proxied_path(path: &str) -> Option<&str> {
    let rest = path.strip_prefix(PROXY_PREFIX)?;
    if rest.is_empty() || rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}

/// Forward allowlisted proxy requests, deny the rest.
pub async fn filter(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(rest) = proxied_path(request.uri().path()) else {
        return next.run(request).await;
    };

    let method = request.method().clone();
    let path = match normalize_path(rest) {
        Ok(path) => path,
        Err(err) => {
            warn!("Proxy request denied: {method} {rest}: {err}");
            return ApiError::forbidden("proxy route not allowed").into_response();
        }
    };

    if !state.proxy.allowlist.is_allowed(&method, &path) {
        warn!("Proxy request denied: {method} {path}");
        return ApiError::forbidden("proxy route not allowed").into_response();
    }

    info!("Proxying {method} {path}");
    state.proxy.forwarder.forward(request, &path).await
}
