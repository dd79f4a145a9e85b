//! Token verification for the chat engine
//!
//! The identity issuer is external; this module only validates its
//! HS256 tokens and extracts the caller identity. `issue` exists for
//! tests and local tooling.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use storechat_shared::Role;
use time::{Duration, OffsetDateTime};

/// Claims contract with the identity issuer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    pub email: String,
    pub name: String,
    pub role: Role,
    /// Issued at
    pub iat: i64,
    /// Expiration
    pub exp: i64,
}

/// Verified caller identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i64,
    pub email: String,
    pub name: String,
    pub role: Role,
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Identity {
            user_id: claims.user_id,
            email: claims.email,
            name: claims.name,
            role: claims.role,
        }
    }
}

/// Stateless token verifier, safe to call concurrently from any number
/// of connections.
#[derive(Clone)]
pub struct TokenVerifier {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Validate a token and extract the caller identity.
    ///
    /// Explicit algorithm prevents algorithm confusion attacks.
    pub fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 60; // 60 second clock skew tolerance

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims.into())
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::Malformed,
            })
    }

    /// Mint a token for the given identity. Used by tests and the local
    /// token endpoint; production tokens come from the identity issuer.
    pub fn issue(&self, identity: &Identity, ttl: Duration) -> Result<String, AuthError> {
        let now = OffsetDateTime::now_utc();
        let claims = Claims {
            user_id: identity.user_id,
            email: identity.email.clone(),
            name: identity.name.clone(),
            role: identity.role,
            iat: now.unix_timestamp(),
            exp: (now + ttl).unix_timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Encoding(e.to_string()))
    }
}

/// Both `Expired` and `Malformed` are terminal for a connection
/// attempt; there is no retry path.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Token expired")]
    Expired,
    #[error("Invalid token")]
    Malformed,
    #[error("Token encoding failed: {0}")]
    Encoding(String),
}
