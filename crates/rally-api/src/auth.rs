//! Bearer-token authentication.
//!
//! Tokens are HS256 JWTs whose `sub` is the user id. Issuing tokens is not
//! part of the HTTP surface; the server binary has a helper mode for it.

use axum::{
  extract::FromRequestParts,
  http::{header, request::Parts},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
  Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
  errors::ErrorKind,
};
use rally_core::store::DiscoveryStore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

/// JWT claims carried by an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
  pub sub: Uuid,
  pub iat: i64,
  pub exp: i64,
}

/// Signing and verification keys for access tokens.
pub struct JwtKeys {
  encoding:   EncodingKey,
  decoding:   DecodingKey,
  validation: Validation,
  ttl:        Duration,
}

impl JwtKeys {
  pub fn new(secret: &[u8], ttl: Duration) -> Self {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_required_spec_claims(&["exp", "sub"]);

    Self {
      encoding: EncodingKey::from_secret(secret),
      decoding: DecodingKey::from_secret(secret),
      validation,
      ttl,
    }
  }

  /// Sign a token for `user_id` valid from now.
  pub fn issue(&self, user_id: Uuid) -> jsonwebtoken::errors::Result<String> {
    self.issue_at(user_id, Utc::now())
  }

  /// Sign a token for `user_id` as if issued at `issued_at`.
  pub fn issue_at(
    &self,
    user_id: Uuid,
    issued_at: DateTime<Utc>,
  ) -> jsonwebtoken::errors::Result<String> {
    let claims = Claims {
      sub: user_id,
      iat: issued_at.timestamp(),
      exp: (issued_at + self.ttl).timestamp(),
    };
    encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
  }

  pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(token, &self.decoding, &self.validation)
      .map(|data| data.claims)
      .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => ApiError::TokenExpired,
        _ => {
          tracing::debug!(error = %e, "rejected bearer token");
          ApiError::TokenMalformed
        }
      })
  }
}

/// The token from an `Authorization: Bearer …` header, if one was sent.
///
/// A header that is present but not a bearer token counts as malformed.
fn bearer_token(parts: &Parts) -> Result<Option<&str>, ApiError> {
  let Some(value) = parts.headers.get(header::AUTHORIZATION) else {
    return Ok(None);
  };

  value
    .to_str()
    .ok()
    .and_then(|v| v.strip_prefix("Bearer "))
    .map(str::trim)
    .filter(|t| !t.is_empty())
    .map(Some)
    .ok_or(ApiError::TokenMalformed)
}

// ─── Extractors ──────────────────────────────────────────────────────────────

/// The authenticated caller. Rejects requests without a valid token.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Uuid);

impl<S> FromRequestParts<AppState<S>> for AuthUser
where
  S: DiscoveryStore + Clone + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let token = bearer_token(parts)?.ok_or_else(ApiError::unauthenticated)?;
    Ok(AuthUser(state.jwt.verify(token)?.sub))
  }
}

/// The caller if a token was sent, `None` for anonymous requests.
///
/// A token that is sent but invalid is still rejected.
#[derive(Debug, Clone, Copy)]
pub struct MaybeAuthUser(pub Option<Uuid>);

impl<S> FromRequestParts<AppState<S>> for MaybeAuthUser
where
  S: DiscoveryStore + Clone + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    match bearer_token(parts)? {
      Some(token) => Ok(MaybeAuthUser(Some(state.jwt.verify(token)?.sub))),
      None => Ok(MaybeAuthUser(None)),
    }
  }
}
