//! OpenID Connect relying party: discovery, authorization URL, code exchange
//! and ID token verification.
//!
//! The provider is contacted lazily. [`LazyOidcClient::get`] runs discovery on
//! first use; a failure is returned to the caller and retried on the next call.

use super::state::AuthConfig;
use jsonwebtoken::{
    decode, decode_header,
    jwk::{Jwk, JwkSet},
    Algorithm, DecodingKey, Validation,
};
use reqwest::{header::ACCEPT, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fmt;
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, info};
use url::Url;

const CLOCK_SKEW_SECONDS: u64 = 60;

#[derive(Debug, thiserror::Error)]
pub enum OidcError {
    #[error("discovery failed: {0}")]
    Discovery(String),
    #[error("issuer mismatch: expected {expected}, provider reported {found}")]
    IssuerMismatch { expected: String, found: String },
    #[error("token endpoint returned {0}")]
    TokenEndpoint(StatusCode),
    #[error("unsupported algorithm")]
    UnsupportedAlgorithm,
    #[error("jwks key not found")]
    JwksKeyNotFound,
    #[error("nonce mismatch")]
    NonceMismatch,
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("jwt error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

/// Subset of the provider metadata document this client relies on.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub jwks_uri: String,
}

/// Token endpoint response.
#[derive(Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("token_type", &self.token_type)
            .field("id_token", &self.id_token.as_ref().map(|_| "***"))
            .field("expires_in", &self.expires_in)
            .finish_non_exhaustive()
    }
}

/// Verified ID token claims.
#[derive(Debug, Clone, Deserialize)]
pub struct IdTokenClaims {
    pub iss: String,
    pub sub: String,
    pub exp: i64,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub preferred_username: Option<String>,
}

/// A discovered provider, ready to build login URLs and verify tokens.
pub struct OidcClient {
    http: reqwest::Client,
    metadata: ProviderMetadata,
    authorization_endpoint: Url,
    client_id: String,
    client_secret: SecretString,
    redirect_url: String,
    scopes: Vec<String>,
    jwks: RwLock<JwkSet>,
}

impl OidcClient {
    /// Fetch provider metadata and signing keys.
    ///
    /// # Errors
    /// Returns an error if the metadata or JWKS cannot be fetched, or the
    /// provider reports a different issuer than configured.
    pub async fn discover(config: &AuthConfig, http: reqwest::Client) -> Result<Self, OidcError> {
        let discovery_url = format!(
            "{}/.well-known/openid-configuration",
            config.issuer().trim_end_matches('/')
        );
        debug!("Fetching OIDC discovery from {discovery_url}");

        let response = http
            .get(&discovery_url)
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(OidcError::Discovery(format!(
                "{discovery_url} returned {}",
                response.status()
            )));
        }
        let metadata: ProviderMetadata = response.json().await?;

        if metadata.issuer.trim_end_matches('/') != config.issuer().trim_end_matches('/') {
            return Err(OidcError::IssuerMismatch {
                expected: config.issuer().to_string(),
                found: metadata.issuer,
            });
        }

        let authorization_endpoint = Url::parse(&metadata.authorization_endpoint)
            .map_err(|err| OidcError::Discovery(format!("invalid authorization_endpoint: {err}")))?;

        let jwks = fetch_jwks(&http, &metadata.jwks_uri).await?;

        info!("OIDC provider {} discovered", metadata.issuer);

        Ok(Self {
            http,
            authorization_endpoint,
            client_id: config.client_id().to_string(),
            client_secret: config.client_secret().clone(),
            redirect_url: config.redirect_url(),
            scopes: config.scopes().to_vec(),
            jwks: RwLock::new(jwks),
            metadata,
        })
    }

    #[must_use]
    pub fn metadata(&self) -> &ProviderMetadata {
        &self.metadata
    }

    /// Authorization request URL for a login attempt.
    #[must_use]
    pub fn authorization_url(&self, state: &str, nonce: &str) -> Url {
        let mut url = self.authorization_endpoint.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_url)
            .append_pair("scope", &self.scopes.join(" "))
            .append_pair("state", state)
            .append_pair("nonce", nonce);
        url
    }

    /// Exchange an authorization code at the token endpoint.
    ///
    /// # Errors
    /// Returns an error if the request fails or the provider rejects the code.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, OidcError> {
        let response = self
            .http
            .post(&self.metadata.token_endpoint)
            .basic_auth(&self.client_id, Some(self.client_secret.expose_secret()))
            .header(ACCEPT, "application/json")
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_url.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(OidcError::TokenEndpoint(status));
        }

        Ok(response.json().await?)
    }

    /// Verify an ID token signature and claims, including the expected nonce.
    ///
    /// # Errors
    /// Returns an error for unsupported algorithms, unknown keys, invalid
    /// signature, issuer, audience or expiry, and nonce mismatch.
    pub async fn verify_id_token(
        &self,
        id_token: &str,
        expected_nonce: &str,
    ) -> Result<IdTokenClaims, OidcError> {
        let header = decode_header(id_token)?;
        if !is_algorithm_allowed(header.alg) {
            return Err(OidcError::UnsupportedAlgorithm);
        }

        let key = match self.find_key(header.kid.as_deref()).await {
            Some(jwk) => DecodingKey::from_jwk(&jwk)?,
            None => {
                // Provider may have rotated keys since discovery.
                self.refresh_jwks().await?;
                let jwk = self
                    .find_key(header.kid.as_deref())
                    .await
                    .ok_or(OidcError::JwksKeyNotFound)?;
                DecodingKey::from_jwk(&jwk)?
            }
        };

        let mut validation = Validation::new(header.alg);
        validation.set_issuer(&[self.metadata.issuer.as_str()]);
        validation.set_audience(&[self.client_id.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.leeway = CLOCK_SKEW_SECONDS;

        let claims = decode::<IdTokenClaims>(id_token, &key, &validation)?.claims;

        if claims.nonce.as_deref() != Some(expected_nonce) {
            return Err(OidcError::NonceMismatch);
        }

        Ok(claims)
    }

    async fn find_key(&self, kid: Option<&str>) -> Option<Jwk> {
        let jwks = self.jwks.read().await;
        match kid {
            Some(kid) => jwks.find(kid).cloned(),
            None if jwks.keys.len() == 1 => jwks.keys.first().cloned(),
            None => None,
        }
    }

    async fn refresh_jwks(&self) -> Result<(), OidcError> {
        let jwks = fetch_jwks(&self.http, &self.metadata.jwks_uri).await?;
        *self.jwks.write().await = jwks;
        Ok(())
    }
}

async fn fetch_jwks(http: &reqwest::Client, jwks_uri: &str) -> Result<JwkSet, OidcError> {
    let response = http
        .get(jwks_uri)
        .header(ACCEPT, "application/json")
        .send()
        .await?;
    if !response.status().is_success() {
        return Err(OidcError::Discovery(format!(
            "{jwks_uri} returned {}",
            response.status()
        )));
    }
    Ok(response.json().await?)
}

const fn is_algorithm_allowed(alg: Algorithm) -> bool {
    matches!(
        alg,
        Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512
            | Algorithm::ES256
            | Algorithm::ES384
            | Algorithm::EdDSA
    )
}

/// Provider client initialized on first use.
pub struct LazyOidcClient {
    http: reqwest::Client,
    cell: OnceCell<OidcClient>,
}

impl LazyOidcClient {
    #[must_use]
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            cell: OnceCell::new(),
        }
    }

    /// The discovered client, running discovery if it has not succeeded yet.
    ///
    /// Concurrent callers wait on a single discovery.
    ///
    /// # Errors
    /// Returns the discovery error; nothing is cached on failure.
    pub async fn get(&self, config: &AuthConfig) -> Result<&OidcClient, OidcError> {
        self.cell
            .get_or_try_init(|| OidcClient::discover(config, self.http.clone()))
            .await
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }
}
