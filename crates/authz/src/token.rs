//! HS256 token verification.

use bookstore_http::AppError;
use bookstore_kernel::settings::AuthSettings;
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Identity, Role};

/// Claims carried by bearer tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id, as a decimal string.
    pub sub: String,
    pub username: String,
    #[serde(default)]
    pub role: Role,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    Missing,

    #[error("invalid token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),

    #[error("invalid token subject '{0}'")]
    Subject(String),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::unauthorized(err.to_string())
    }
}

/// Verifies (and, for tooling, issues) bearer tokens.
pub struct TokenVerifier {
    issuer: String,
    ttl_secs: u64,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenVerifier {
    pub fn new(secret: &str, issuer: impl Into<String>, ttl_secs: u64) -> Self {
        Self {
            issuer: issuer.into(),
            ttl_secs,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn from_settings(settings: &AuthSettings) -> Self {
        Self::new(&settings.jwt_secret, &settings.issuer, settings.token_ttl_secs)
    }

    /// Verify signature, issuer and expiry, then map claims to an identity.
    pub fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);

        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &validation)?;
        let claims = data.claims;

        let id = claims
            .sub
            .parse::<i64>()
            .map_err(|_| AuthError::Subject(claims.sub.clone()))?;

        Ok(Identity {
            id,
            username: claims.username,
            role: claims.role,
        })
    }

    /// Issue a token for `identity` valid for the configured TTL.
    pub fn issue(&self, identity: &Identity) -> anyhow::Result<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: identity.id.to_string(),
            username: identity.username.clone(),
            role: identity.role,
            iss: self.issuer.clone(),
            iat: now,
            exp: now + i64::try_from(self.ttl_secs)?,
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;
        Ok(token)
    }
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("issuer", &self.issuer)
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}
