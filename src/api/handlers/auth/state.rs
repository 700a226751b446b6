//! Auth configuration and shared state.

use super::{
    oidc::LazyOidcClient,
    pending::PendingStore,
    session::{InMemorySessionStore, SessionStore},
};
use crate::APP_USER_AGENT;
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const DEFAULT_SESSION_TTL_SECONDS: u64 = 15 * 60;
const DEFAULT_PENDING_TTL_SECONDS: u64 = 10 * 60;
const DEFAULT_HTTP_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_SCOPES: [&str; 3] = ["openid", "profile", "email"];
const DEFAULT_SECURED_PATHS: [&str; 2] = ["/", "/api"];

/// Paths that must stay reachable without a session.
const AUTH_PREFIX: &str = "/auth/";

#[derive(Clone, Debug)]
pub struct AuthConfig {
    issuer: String,
    client_id: String,
    client_secret: SecretString,
    base_url: Url,
    scopes: Vec<String>,
    secured_paths: Vec<String>,
    session_ttl: Duration,
    pending_ttl: Duration,
    http_timeout: Duration,
}

impl AuthConfig {
    #[must_use]
    pub fn new(
        issuer: String,
        client_id: String,
        client_secret: SecretString,
        base_url: Url,
    ) -> Self {
        Self {
            issuer,
            client_id,
            client_secret,
            base_url,
            scopes: DEFAULT_SCOPES.iter().map(ToString::to_string).collect(),
            secured_paths: DEFAULT_SECURED_PATHS
                .iter()
                .map(ToString::to_string)
                .collect(),
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECONDS),
            pending_ttl: Duration::from_secs(DEFAULT_PENDING_TTL_SECONDS),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECONDS),
        }
    }

    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    #[must_use]
    pub fn with_secured_paths(mut self, secured_paths: Vec<String>) -> Self {
        self.secured_paths = secured_paths;
        self
    }

    #[must_use]
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_pending_ttl(mut self, ttl: Duration) -> Self {
        self.pending_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub(super) fn client_secret(&self) -> &SecretString {
        &self.client_secret
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    #[must_use]
    pub fn secured_paths(&self) -> &[String] {
        &self.secured_paths
    }

    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    #[must_use]
    pub fn pending_ttl(&self) -> Duration {
        self.pending_ttl
    }

    /// The callback URL registered with the provider.
    #[must_use]
    pub fn redirect_url(&self) -> String {
        format!("{}/auth/callback", self.base_origin())
    }

    /// Base URL without a trailing slash.
    pub(super) fn base_origin(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    pub(super) fn session_cookie_secure(&self) -> bool {
        self.base_url.scheme() == "https"
    }

    /// Whether a request path requires a session.
    ///
    /// `/` protects the root path only; other entries protect the path and
    /// everything below it. Callback and success pages are never protected.
    #[must_use]
    pub fn is_secured(&self, path: &str) -> bool {
        if path.starts_with(AUTH_PREFIX) {
            return false;
        }
        self.secured_paths.iter().any(|secured| {
            if secured == "/" {
                return path == "/";
            }
            let prefix = secured.trim_end_matches('/');
            path == prefix
                || path
                    .strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }
}

pub struct AuthState {
    config: AuthConfig,
    sessions: Arc<dyn SessionStore>,
    pending: PendingStore,
    oidc: LazyOidcClient,
}

impl AuthState {
    /// Auth state with an in-memory session store.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: AuthConfig) -> Result<Self> {
        Self::with_session_store(config, Arc::new(InMemorySessionStore::new()))
    }

    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_session_store(config: AuthConfig, sessions: Arc<dyn SessionStore>) -> Result<Self> {
        // The provider must not be able to bounce the token request elsewhere.
        let http = reqwest::Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(config.http_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("Failed to build OIDC HTTP client")?;

        Ok(Self {
            pending: PendingStore::new(config.pending_ttl),
            oidc: LazyOidcClient::new(http),
            config,
            sessions,
        })
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn sessions(&self) -> &dyn SessionStore {
        self.sessions.as_ref()
    }

    #[must_use]
    pub fn pending(&self) -> &PendingStore {
        &self.pending
    }

    #[must_use]
    pub fn oidc(&self) -> &LazyOidcClient {
        &self.oidc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AuthConfig {
        AuthConfig::new(
            "https://idp.example.org".to_string(),
            "admin-ui".to_string(),
            SecretString::from("changeme"),
            Url::parse("https://admin.example.org/").expect("url"),
        )
    }

    #[test]
    fn auth_config_defaults_and_overrides() {
        let config = config();
        assert_eq!(config.scopes(), ["openid", "profile", "email"]);
        assert_eq!(config.secured_paths(), ["/", "/api"]);
        assert_eq!(
            config.session_ttl(),
            Duration::from_secs(DEFAULT_SESSION_TTL_SECONDS)
        );
        assert_eq!(
            config.redirect_url(),
            "https://admin.example.org/auth/callback"
        );
        assert!(config.session_cookie_secure());

        let config = config
            .with_scopes(vec!["openid".to_string()])
            .with_session_ttl(Duration::from_secs(60))
            .with_pending_ttl(Duration::from_secs(30));
        assert_eq!(config.scopes(), ["openid"]);
        assert_eq!(config.session_ttl(), Duration::from_secs(60));
        assert_eq!(config.pending_ttl(), Duration::from_secs(30));
    }

    #[test]
    fn root_entry_is_exact_match() {
        let config = config();
        assert!(config.is_secured("/"));
        assert!(!config.is_secured("/index.html"));
        assert!(!config.is_secured("/status"));
    }

    #[test]
    fn prefix_entries_cover_subpaths() {
        let config = config();
        assert!(config.is_secured("/api"));
        assert!(config.is_secured("/api/me"));
        assert!(config.is_secured("/api/proxy/internal/discovery/v1"));
        assert!(!config.is_secured("/apiary"));
    }

    #[test]
    fn auth_pages_are_never_secured() {
        let config = config().with_secured_paths(vec!["/".to_string(), "/auth".to_string()]);
        assert!(!config.is_secured("/auth/callback"));
        assert!(!config.is_secured("/auth/success"));
    }

    #[test]
    fn plain_http_cookies_are_not_secure() {
        let config = AuthConfig::new(
            "http://localhost:8080".to_string(),
            "admin-ui".to_string(),
            SecretString::from("changeme"),
            Url::parse("http://localhost:1305").expect("url"),
        );
        assert!(!config.session_cookie_secure());
        assert_eq!(config.redirect_url(), "http://localhost:1305/auth/callback");
    }

    #[test]
    fn auth_state_starts_without_provider() {
        let state = AuthState::new(config()).expect("state");
        assert!(!state.oidc().is_initialized());
        assert_eq!(state.config().client_id(), "admin-ui");
    }
}
