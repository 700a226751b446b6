//! Provider callback, post-login landing page and logout.

use super::{
    oidc::OidcError,
    pending::PendingAuthorization,
    session::{clear_session_cookie, extract_session_id, session_cookie, Session},
    state::AuthState,
    utils::{generate_token, html_escape, safe_return_path},
};
use crate::api::{ApiError, AppState};
use axum::{
    extract::{Query, State},
    http::{
        header::{CACHE_CONTROL, LOCATION, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{Html, IntoResponse, Response},
};
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info, warn};
use utoipa::IntoParams;

/// Seconds the success page waits before leaving.
const SUCCESS_REDIRECT_DELAY_SECONDS: u32 = 2;

#[derive(Deserialize, IntoParams, Debug, Default)]
#[into_params(parameter_in = Query)]
pub struct CallbackParams {
    /// Authorization code
    code: Option<String>,
    /// Value issued with the login redirect
    state: Option<String>,
    /// Error reported by the provider
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Deserialize, IntoParams, Debug, Default)]
#[into_params(parameter_in = Query)]
pub struct SuccessParams {
    /// Path to continue to, must start with `/`
    return_to: Option<String>,
}

#[derive(Debug, Error)]
enum CallbackError {
    #[error("missing state")]
    MissingState,
    #[error("unknown or expired state")]
    UnknownState,
    #[error("provider error: {0}")]
    Provider(String),
    #[error("missing code")]
    MissingCode,
    #[error("provider unavailable: {0}")]
    Unavailable(#[source] OidcError),
    #[error("code exchange failed: {0}")]
    Exchange(#[source] OidcError),
    #[error("token response has no id_token")]
    MissingIdToken,
    #[error("id token rejected: {0}")]
    IdToken(#[source] OidcError),
    #[error("failed to create session: {0}")]
    Session(String),
}

impl IntoResponse for CallbackError {
    fn into_response(self) -> Response {
        match self {
            Self::Unavailable(_) | Self::Session(_) => {
                error!("Login callback failed: {self}");
                ApiError::internal().into_response()
            }
            _ => {
                warn!("Login callback rejected: {self}");
                ApiError::unauthorized().into_response()
            }
        }
    }
}

#[utoipa::path(
    get,
    path = "/auth/callback",
    params(CallbackParams),
    responses(
        (status = 307, description = "Session created, continue to the success page"),
        (status = 401, description = "Login rejected", body = crate::api::error::ErrorBody),
        (status = 500, description = "Provider unavailable", body = crate::api::error::ErrorBody)
    ),
    tag = "auth"
)]
/// Complete a login: check `state`, exchange the code, verify the ID token
/// and create a session.
pub async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Response {
    let Some(auth) = state.auth.as_deref() else {
        return ApiError::not_found().into_response();
    };

    match complete_login(auth, params).await {
        Ok((session_id, pending)) => {
            let cookie = match session_cookie(auth.config(), &session_id) {
                Ok(cookie) => cookie,
                Err(err) => {
                    auth.sessions().evict(&session_id);
                    return CallbackError::Session(err.to_string()).into_response();
                }
            };

            let return_to = safe_return_path(Some(&pending.return_to));
            let location = format!(
                "/auth/success?return_to={}",
                url::form_urlencoded::byte_serialize(return_to.as_bytes()).collect::<String>()
            );

            let mut headers = HeaderMap::new();
            headers.insert(SET_COOKIE, cookie);
            match HeaderValue::from_str(&location) {
                Ok(value) => {
                    headers.insert(LOCATION, value);
                }
                Err(err) => return CallbackError::Session(err.to_string()).into_response(),
            }
            (StatusCode::TEMPORARY_REDIRECT, headers).into_response()
        }
        Err(err) => err.into_response(),
    }
}

async fn complete_login(
    auth: &AuthState,
    params: CallbackParams,
) -> Result<(String, PendingAuthorization), CallbackError> {
    let state = params
        .state
        .filter(|state| !state.is_empty())
        .ok_or(CallbackError::MissingState)?;

    // Consumed before anything else so a state is never usable twice.
    let pending = auth
        .pending()
        .take(&state)
        .await
        .ok_or(CallbackError::UnknownState)?;

    if let Some(error) = params.error {
        let description = params.error_description.unwrap_or_default();
        return Err(CallbackError::Provider(format!("{error} {description}")));
    }

    let code = params
        .code
        .filter(|code| !code.is_empty())
        .ok_or(CallbackError::MissingCode)?;

    let client = auth
        .oidc()
        .get(auth.config())
        .await
        .map_err(CallbackError::Unavailable)?;

    let tokens = client
        .exchange_code(&code)
        .await
        .map_err(CallbackError::Exchange)?;

    let id_token = tokens.id_token.ok_or(CallbackError::MissingIdToken)?;

    let claims = client
        .verify_id_token(&id_token, &pending.nonce)
        .await
        .map_err(CallbackError::IdToken)?;

    let session_id = generate_token().map_err(|err| CallbackError::Session(format!("{err:#}")))?;
    let name = claims.name.or(claims.preferred_username);
    auth.sessions().put(
        session_id.clone(),
        Session::new(
            claims.sub.clone(),
            claims.iss,
            claims.email,
            name,
            auth.config().session_ttl(),
        ),
    );

    info!("Login completed for subject {}", claims.sub);

    Ok((session_id, pending))
}

#[utoipa::path(
    get,
    path = "/auth/success",
    params(SuccessParams),
    responses(
        (status = 200, description = "Page that continues to the application", content_type = "text/html")
    ),
    tag = "auth"
)]
/// Landing page after login. Redirects to the application after a short delay.
pub async fn success(
    State(state): State<AppState>,
    Query(params): Query<SuccessParams>,
) -> Response {
    let Some(auth) = state.auth.as_deref() else {
        return ApiError::not_found().into_response();
    };

    let target = format!(
        "{}{}",
        auth.config().base_origin(),
        safe_return_path(params.return_to.as_deref())
    );

    let mut headers = HeaderMap::new();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    (headers, Html(success_page(&target))).into_response()
}

fn success_page(target: &str) -> String {
    let target = html_escape(target);
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta http-equiv="refresh" content="{SUCCESS_REDIRECT_DELAY_SECONDS};url={target}">
<title>Signed in</title>
</head>
<body>
<p>Login successful. Continuing to <a href="{target}">{target}</a>.</p>
</body>
</html>
"#
    )
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 204, description = "Session cleared")
    ),
    tag = "auth"
)]
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let secure = state
        .auth
        .as_deref()
        .is_some_and(|auth| auth.config().session_cookie_secure());

    if let (Some(auth), Some(session_id)) = (state.auth.as_deref(), extract_session_id(&headers)) {
        if auth.sessions().evict(&session_id).is_some() {
            info!("Session ended");
        }
    }

    // Always clear the cookie, even if the session was missing.
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_session_cookie(secure) {
        response_headers.insert(SET_COOKIE, cookie);
    }
    (StatusCode::NO_CONTENT, response_headers).into_response()
}
