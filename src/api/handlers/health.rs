use crate::GIT_COMMIT_HASH;
use axum::{
    http::{HeaderMap, HeaderValue},
    response::IntoResponse,
};
use tracing::error;

#[utoipa::path(
    get,
    path = "/status",
    responses(
        (status = 200, description = "Service is running", body = String, content_type = "text/plain")
    ),
    tag = "status"
)]
// axum handler for status
pub async fn status() -> impl IntoResponse {
    let short_hash = if GIT_COMMIT_HASH.len() > 7 {
        &GIT_COMMIT_HASH[0..7]
    } else {
        ""
    };

    let mut headers = HeaderMap::new();
    match HeaderValue::from_str(&format!(
        "{}:{}:{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        short_hash
    )) {
        Ok(value) => {
            headers.insert("X-App", value);
        }
        Err(err) => error!("Failed to build X-App header: {err}"),
    }

    (headers, "OK")
}
