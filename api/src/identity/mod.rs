use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, StatusCode, header, request::Parts},
};
use serde::Deserialize;

use crate::{
    App,
    error::{ApiRequestError, AppError},
};

pub mod firebase;
pub mod routes;
pub mod shared_secret;

pub use firebase::FirebaseVerifier;
pub use shared_secret::SharedSecretVerifier;

/// The authenticated principal behind a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Caller {
    pub uid: String,
    /// The `admin` custom claim on the token. Not the same thing as the
    /// `isAdmin` flag on the user's profile document.
    pub admin_claim: bool,
}

#[derive(thiserror::Error, Debug)]
pub enum AuthenticationError {
    #[error("You must be logged in to perform this action")]
    MissingBearer,

    #[error("Your session is invalid or has expired, please sign in again")]
    InvalidToken(String),

    #[error("Could not verify your session right now, please try again")]
    KeysUnavailable(String),
}

impl ApiRequestError for AuthenticationError {
    fn status_code(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }

    fn code(&self) -> &'static str {
        "unauthenticated"
    }
}

impl From<AuthenticationError> for AppError {
    fn from(e: AuthenticationError) -> Self {
        match &e {
            AuthenticationError::InvalidToken(reason) => {
                tracing::debug!(%reason, "Rejected bearer token");
            }
            AuthenticationError::KeysUnavailable(reason) => {
                tracing::warn!(%reason, "Could not load token signing keys");
            }
            AuthenticationError::MissingBearer => {}
        }
        AppError::request(e)
    }
}

/// Claims read from a verified ID token.
#[derive(Deserialize, Debug)]
struct Claims {
    sub: String,
    #[serde(default)]
    admin: bool,
}

impl TryFrom<Claims> for Caller {
    type Error = AuthenticationError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        if claims.sub.is_empty() {
            return Err(AuthenticationError::InvalidToken(
                "token has an empty subject".into(),
            ));
        }

        Ok(Caller {
            uid: claims.sub,
            admin_claim: claims.admin,
        })
    }
}

/// Maps a bearer credential to a caller identity.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Caller, AuthenticationError>;
}

pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthenticationError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthenticationError::MissingBearer)
}

pub struct AuthUser(pub Caller);

impl FromRequestParts<App> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &App) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;
        let caller = state.verifier.verify(token).await?;

        Ok(AuthUser(caller))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(authorization: Option<&'static str>) -> HeaderMap {
        let mut h = HeaderMap::new();
        if let Some(v) = authorization {
            h.insert(header::AUTHORIZATION, HeaderValue::from_static(v));
        }
        h
    }

    #[test]
    fn bearer_token_is_extracted() {
        assert_eq!(bearer_token(&headers(Some("Bearer abc.def"))).unwrap(), "abc.def");
    }

    #[test]
    fn missing_or_malformed_authorization_is_rejected() {
        for h in [
            headers(None),
            headers(Some("Basic dXNlcjpwYXNz")),
            headers(Some("Bearer ")),
            headers(Some("bearer abc")),
        ] {
            assert!(matches!(
                bearer_token(&h),
                Err(AuthenticationError::MissingBearer)
            ));
        }
    }

    #[test]
    fn empty_subject_is_not_a_caller() {
        let claims = Claims {
            sub: String::new(),
            admin: false,
        };
        assert!(Caller::try_from(claims).is_err());
    }
}
