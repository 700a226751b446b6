use super::auth::AuthenticatedUser;
use crate::api::ApiError;
use axum::{extract::Extension, Json};

#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "The signed-in user", body = AuthenticatedUser),
        (status = 401, description = "No session", body = crate::api::error::ErrorBody)
    ),
    tag = "auth"
)]
/// Identity of the current session, for the UI header.
pub async fn me(
    user: Option<Extension<AuthenticatedUser>>,
) -> Result<Json<AuthenticatedUser>, ApiError> {
    user.map(|Extension(user)| Json(user))
        .ok_or_else(ApiError::unauthorized)
}
