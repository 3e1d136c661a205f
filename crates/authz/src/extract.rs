//! Axum extractor resolving the bearer token into an [`Identity`].

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use bookstore_http::AppError;

use crate::{token::AuthError, Identity, TokenVerifier};

/// Authenticated caller. Rejects with 401 when the token is missing or invalid.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Identity);

impl<S> FromRequestParts<S> for AuthUser
where
    Arc<TokenVerifier>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(AuthError::Missing)?;
        let verifier = Arc::<TokenVerifier>::from_ref(state);

        match verifier.verify(token) {
            Ok(identity) => Ok(AuthUser(identity)),
            Err(e) => {
                tracing::debug!(error = %e, "rejected bearer token");
                Err(e.into())
            }
        }
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
