pub mod auth;
pub mod health;
pub mod me;
pub mod proxy;

use super::ApiError;

/// Fallback for unknown routes when no UI assets are served.
pub async fn not_found() -> ApiError {
    ApiError::not_found()
}
