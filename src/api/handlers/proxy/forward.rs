use crate::{api::ApiError, node::NodeTokenGenerator, APP_USER_AGENT};
use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use std::{sync::Arc, time::Duration};
use tracing::{debug, error};
use url::Url;

/// Largest request body relayed to the node.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Connection-scoped headers, never forwarded in either direction.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Sends allowed requests to the node.
pub struct Forwarder {
    base: String,
    client: reqwest::Client,
    tokens: Option<Arc<NodeTokenGenerator>>,
}

impl Forwarder {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        node_address: Url,
        tokens: Option<Arc<NodeTokenGenerator>>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("Failed to build node HTTP client")?;

        Ok(Self {
            base: node_address.as_str().trim_end_matches('/').to_string(),
            client,
            tokens,
        })
    }

    /// Relay `request` to `path` on the node and stream the answer back.
    ///
    /// `path` must already be normalized and allowed.
    pub async fn forward(&self, request: Request, path: &str) -> Response {
        let (parts, body) = request.into_parts();

        let body = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
            Ok(body) => body,
            Err(err) => {
                debug!("Rejected proxy request body: {err}");
                return ApiError::new(StatusCode::PAYLOAD_TOO_LARGE, "request body too large")
                    .into_response();
            }
        };

        let target = match parts.uri.query() {
            Some(query) => format!("{}{path}?{query}", self.base),
            None => format!("{}{path}", self.base),
        };

        let mut headers = forwardable_headers(&parts.headers);
        headers.remove(header::HOST);
        headers.remove(header::COOKIE);
        headers.remove(header::AUTHORIZATION);
        headers.remove(header::CONTENT_LENGTH);

        if let Some(tokens) = &self.tokens {
            let bearer = tokens
                .generate()
                .map_err(|err| err.to_string())
                .and_then(|token| {
                    HeaderValue::from_str(&format!("Bearer {token}")).map_err(|e| e.to_string())
                });
            match bearer {
                Ok(value) => {
                    headers.insert(header::AUTHORIZATION, value);
                }
                Err(err) => {
                    error!("Failed to sign node API token: {err}");
                    return ApiError::internal().into_response();
                }
            }
        }

        let upstream = self
            .client
            .request(parts.method, &target)
            .headers(headers)
            .body(body)
            .send()
            .await;

        match upstream {
            Ok(upstream) => {
                let mut response = Response::builder().status(upstream.status());
                if let Some(response_headers) = response.headers_mut() {
                    *response_headers = forwardable_headers(upstream.headers());
                    response_headers.remove(header::CONTENT_LENGTH);
                }
                response
                    .body(Body::from_stream(upstream.bytes_stream()))
                    .unwrap_or_else(|err| {
                        error!("Failed to build proxy response: {err}");
                        ApiError::internal().into_response()
                    })
            }
            Err(err) => {
                error!("Node request to {target} failed: {err}");
                ApiError::bad_gateway().into_response()
            }
        }
    }
}

impl std::fmt::Debug for Forwarder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Forwarder")
            .field("base", &self.base)
            .field("signed", &self.tokens.is_some())
            .finish_non_exhaustive()
    }
}

/// Copy `headers` without hop-by-hop headers or those named in `Connection`.
fn forwardable_headers(headers: &HeaderMap) -> HeaderMap {
    let listed: Vec<String> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect();

    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if HOP_BY_HOP.contains(&name.as_str()) || listed.iter().any(|l| l == name.as_str()) {
            continue;
        }
        out.append(name.clone(), value.clone());
    }
    out
}
