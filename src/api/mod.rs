use crate::api::handlers::{auth, health, me, proxy};
use anyhow::Result;
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    middleware,
    routing::{get, post},
    Router,
};
use std::{path::PathBuf, sync::Arc};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, services::ServeDir, set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{error, info, info_span, Span};
use ulid::Ulid;

pub mod error;
pub mod handlers;
mod openapi;

pub use error::ApiError;
pub use openapi::openapi;

/// Shared state for every handler and middleware.
///
/// `auth` is `None` when OIDC login is disabled; secured paths are then open.
#[derive(Clone)]
pub struct AppState {
    pub auth: Option<Arc<auth::AuthState>>,
    pub proxy: Arc<proxy::ProxyState>,
}

#[derive(Debug, Clone)]
pub struct RouterOptions {
    pub assets_dir: Option<PathBuf>,
    pub access_logs: bool,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            assets_dir: None,
            access_logs: true,
        }
    }
}

/// Build the application router.
///
/// Layer order, outermost first: request id, access log, authentication
/// gateway, proxy allowlist, routes.
pub fn router(state: AppState, options: &RouterOptions) -> Router {
    let app = Router::new()
        .route("/status", get(health::status))
        .route("/openapi.json", get(openapi::openapi_json))
        .route("/api/me", get(me::me))
        .route("/auth/callback", get(auth::callback))
        .route("/auth/success", get(auth::success))
        .route("/auth/logout", post(auth::logout));

    let app = match &options.assets_dir {
        Some(dir) => app.fallback_service(ServeDir::new(dir)),
        None => app.fallback(handlers::not_found),
    };

    let app = app
        .layer(middleware::from_fn_with_state(state.clone(), proxy::filter))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::authenticate,
        ))
        .with_state(state);

    let app = if options.access_logs {
        app.layer(TraceLayer::new_for_http().make_span_with(make_span))
    } else {
        app
    };

    app.layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static("x-request-id"),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                "x-request-id",
            ))),
    )
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, state: AppState, options: RouterOptions) -> Result<()> {
    let app = router(state, &options);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!("Failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Gracefully shutdown");
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
