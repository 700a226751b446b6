//! Session gate in front of secured paths.

use super::{
    session::extract_session_id,
    state::AuthState,
    types::AuthenticatedUser,
    utils::{is_safe_redirect, request_target},
};
use crate::api::{ApiError, AppState};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::{debug, error, info};

/// Require a live session on secured paths.
///
/// Requests with a valid `sid` cookie continue with an [`AuthenticatedUser`]
/// extension. Others are sent to the provider's login page. When OIDC is
/// disabled every request passes.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(auth) = state.auth.as_deref() else {
        return next.run(request).await;
    };

    let session = extract_session_id(request.headers())
        .and_then(|session_id| auth.sessions().get(&session_id));

    if let Some(session) = &session {
        request
            .extensions_mut()
            .insert(AuthenticatedUser::from(session));
    }

    if !auth.config().is_secured(request.uri().path()) || session.is_some() {
        return next.run(request).await;
    }

    let return_to = request_target(request.uri());
    match begin_login(auth, return_to).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

/// Record a login attempt and redirect to the provider.
async fn begin_login(auth: &AuthState, return_to: String) -> Result<Response, ApiError> {
    let client = auth.oidc().get(auth.config()).await.map_err(|err| {
        error!("OIDC provider unavailable: {err}");
        ApiError::internal()
    })?;

    let pending = auth.pending().issue(return_to).await.map_err(|err| {
        error!("Failed to start login: {err:#}");
        ApiError::internal()
    })?;

    let location = client.authorization_url(&pending.state, &pending.nonce);
    if !is_safe_redirect(&location) {
        error!(
            "Refusing login redirect with scheme {}",
            location.scheme()
        );
        auth.pending().take(&pending.state).await;
        return Err(ApiError::internal());
    }

    info!("Redirecting to login, return_to={}", pending.return_to);
    debug!("Authorization endpoint {}", client.metadata().authorization_endpoint);

    Ok(Redirect::temporary(location.as_str()).into_response())
}
