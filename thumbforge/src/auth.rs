//! Caller identity extraction.
//!
//! Authentication itself is delegated to the hosted auth provider: clients
//! send the provider-issued JWT as a bearer token, and this module only
//! verifies the HS256 signature against the shared secret and extracts the
//! account identity. There are no sessions or passwords here.

use axum::{extract::FromRequestParts, http::header::AUTHORIZATION, http::request::Parts};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;

use crate::AppState;
use crate::errors::Error;
use crate::types::UserId;

/// Claims we care about from the auth provider's token.
#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    email: Option<String>,
}

/// The authenticated caller, extracted from the `Authorization` header.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: UserId,
    pub email: String,
}

/// Decode and verify a bearer token, returning the caller identity.
pub fn verify_token(token: &str, jwt_secret: &str) -> Result<CurrentUser, Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    // The provider sets its own audience; we only rely on signature + expiry
    validation.validate_aud = false;

    let data = decode::<Claims>(token, &DecodingKey::from_secret(jwt_secret.as_bytes()), &validation).map_err(|e| {
        Error::Unauthenticated {
            message: Some(format!("Invalid bearer token: {e}")),
        }
    })?;

    let id: UserId = data.claims.sub.parse().map_err(|_| Error::Unauthenticated {
        message: Some("Bearer token subject is not a valid account id".to_string()),
    })?;

    Ok(CurrentUser {
        id,
        email: data.claims.email.unwrap_or_default(),
    })
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(Error::Unauthenticated { message: None })?;

        let token = header.strip_prefix("Bearer ").ok_or(Error::Unauthenticated {
            message: Some("Authorization header is not a bearer token".to_string()),
        })?;

        verify_token(token, &state.config.auth.jwt_secret)
    }
}
