//! OpenID Connect login and server-side sessions.
//!
//! ## Flow
//!
//! 1. A request to a secured path without a live session is redirected to the
//!    provider's authorization endpoint with fresh `state` and `nonce` values.
//! 2. The provider calls back on `/auth/callback`. The `state` is consumed, the
//!    code exchanged, and the ID token verified (signature, issuer, audience,
//!    expiry, nonce).
//! 3. A random session id is stored server-side and set as the `sid` cookie,
//!    and the browser lands on `/auth/success`, which continues to the
//!    original path.
//!
//! Sessions expire server-side after the configured TTL regardless of what the
//! browser does with the cookie.

pub(crate) mod callback;
mod gateway;
pub(crate) mod oidc;
mod pending;
mod session;
mod state;
mod types;
mod utils;

pub use callback::{callback, logout, success};
pub use gateway::authenticate;
pub use oidc::{LazyOidcClient, OidcClient, OidcError};
pub use pending::{PendingAuthorization, PendingStore};
pub use session::{InMemorySessionStore, Session, SessionStore};
pub use state::{AuthConfig, AuthState};
pub use types::AuthenticatedUser;
