use jsonwebtoken::{encode, get_current_timestamp, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Lifetime of a node API token. Tokens are minted per request.
pub const NODE_TOKEN_TTL_SECONDS: u64 = 5;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeApiClaims {
    pub iss: String,
    pub aud: String,
    pub iat: u64,
    pub nbf: u64,
    pub exp: u64,
    pub jti: String,
}

#[derive(Debug, Error)]
pub enum NodeTokenError {
    #[error("unsupported signing algorithm: {0}")]
    UnsupportedAlg(String),
    #[error("failed to parse signing key")]
    KeyParse(#[source] jsonwebtoken::errors::Error),
    #[error("failed to sign token")]
    Sign(#[from] jsonwebtoken::errors::Error),
}

/// Signs bearer tokens for the node REST API.
pub struct NodeTokenGenerator {
    key: EncodingKey,
    algorithm: Algorithm,
    issuer: String,
    audience: String,
}

impl NodeTokenGenerator {
    /// Build a generator from a PEM private key.
    ///
    /// `ES256`/`ES384` expect an EC key, `PS*`/`RS256` an RSA key, PKCS#1 or PKCS#8.
    ///
    /// # Errors
    /// Returns an error if the algorithm is not supported or the key does not
    /// match it.
    pub fn from_pem(
        pem: &[u8],
        algorithm: &str,
        issuer: &str,
        audience: &str,
    ) -> Result<Self, NodeTokenError> {
        let algorithm = Algorithm::from_str(algorithm)
            .map_err(|_| NodeTokenError::UnsupportedAlg(algorithm.to_string()))?;

        let key = match algorithm {
            Algorithm::ES256 | Algorithm::ES384 => EncodingKey::from_ec_pem(pem),
            Algorithm::PS256 | Algorithm::PS384 | Algorithm::PS512 | Algorithm::RS256 => {
                EncodingKey::from_rsa_pem(pem)
            }
            other => return Err(NodeTokenError::UnsupportedAlg(format!("{other:?}"))),
        }
        .map_err(NodeTokenError::KeyParse)?;

        Ok(Self {
            key,
            algorithm,
            issuer: issuer.to_string(),
            audience: audience.to_string(),
        })
    }

    #[must_use]
    pub const fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Mint a fresh token.
    ///
    /// # Errors
    /// Returns an error if signing fails.
    pub fn generate(&self) -> Result<String, NodeTokenError> {
        let now = get_current_timestamp();
        let claims = NodeApiClaims {
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now,
            nbf: now,
            exp: now + NODE_TOKEN_TTL_SECONDS,
            jti: Uuid::new_v4().to_string(),
        };

        Ok(encode(&Header::new(self.algorithm), &claims, &self.key)?)
    }
}

impl std::fmt::Debug for NodeTokenGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeTokenGenerator")
            .field("algorithm", &self.algorithm)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_keys::{EC_PRIVATE_KEY, EC_X, EC_Y, RSA_PRIVATE_KEY, RSA_PUBLIC_KEY};
    use jsonwebtoken::{decode, decode_header, DecodingKey, Validation};

    fn validation(algorithm: Algorithm) -> Validation {
        let mut validation = Validation::new(algorithm);
        validation.set_issuer(&["admin"]);
        validation.set_audience(&["node.example.org"]);
        validation.set_required_spec_claims(&["exp", "nbf", "iss", "aud"]);
        validation.validate_nbf = true;
        validation
    }

    #[test]
    fn signs_rsa_pss_tokens() {
        let generator = NodeTokenGenerator::from_pem(
            RSA_PRIVATE_KEY.as_bytes(),
            "PS512",
            "admin",
            "node.example.org",
        )
        .expect("generator");
        let token = generator.generate().expect("token");

        let header = decode_header(&token).expect("header");
        assert_eq!(header.alg, Algorithm::PS512);

        let key = DecodingKey::from_rsa_pem(RSA_PUBLIC_KEY.as_bytes()).expect("public key");
        let data = decode::<NodeApiClaims>(&token, &key, &validation(Algorithm::PS512))
            .expect("valid token");
        assert_eq!(data.claims.iss, "admin");
        assert_eq!(data.claims.aud, "node.example.org");
        assert_eq!(data.claims.nbf, data.claims.iat);
        assert_eq!(data.claims.exp, data.claims.iat + NODE_TOKEN_TTL_SECONDS);
        assert!(Uuid::parse_str(&data.claims.jti).is_ok());
    }

    #[test]
    fn signs_ec_tokens() {
        let generator = NodeTokenGenerator::from_pem(
            EC_PRIVATE_KEY.as_bytes(),
            "ES256",
            "admin",
            "node.example.org",
        )
        .expect("generator");
        assert_eq!(generator.algorithm(), Algorithm::ES256);
        let token = generator.generate().expect("token");

        let key = DecodingKey::from_ec_components(EC_X, EC_Y).expect("public key");
        let data = decode::<NodeApiClaims>(&token, &key, &validation(Algorithm::ES256))
            .expect("valid token");
        assert_eq!(data.claims.iss, "admin");
    }

    #[test]
    fn every_token_is_unique() {
        let generator = NodeTokenGenerator::from_pem(
            RSA_PRIVATE_KEY.as_bytes(),
            "RS256",
            "admin",
            "node.example.org",
        )
        .expect("generator");
        let key = DecodingKey::from_rsa_pem(RSA_PUBLIC_KEY.as_bytes()).expect("public key");
        let first = decode::<NodeApiClaims>(
            &generator.generate().expect("token"),
            &key,
            &validation(Algorithm::RS256),
        )
        .expect("valid token");
        let second = decode::<NodeApiClaims>(
            &generator.generate().expect("token"),
            &key,
            &validation(Algorithm::RS256),
        )
        .expect("valid token");
        assert_ne!(first.claims.jti, second.claims.jti);
    }

    #[test]
    fn rejects_key_of_wrong_family() {
        let err = NodeTokenGenerator::from_pem(
            RSA_PRIVATE_KEY.as_bytes(),
            "ES256",
            "admin",
            "node.example.org",
        )
        .unwrap_err();
        assert!(matches!(err, NodeTokenError::KeyParse(_)));
    }

    #[test]
    fn rejects_unsupported_algorithms() {
        let err = NodeTokenGenerator::from_pem(b"secret", "HS256", "admin", "node")
            .unwrap_err();
        assert!(matches!(err, NodeTokenError::UnsupportedAlg(_)));

        let err = NodeTokenGenerator::from_pem(b"secret", "none", "admin", "node").unwrap_err();
        assert!(matches!(err, NodeTokenError::UnsupportedAlg(_)));
    }
}
