//! Handlers for `/users` endpoints.
//!
//! | Method   | Path              | Notes |
//! |----------|-------------------|-------|
//! | `POST`   | `/users`          | Body: [`NewUser`]; 201, duplicate email 409 |
//! | `GET`    | `/users/me`       | Caller's full record |
//! | `PATCH`  | `/users/me`       | Body: [`UserPatch`] |
//! | `DELETE` | `/users/me`       | Cascades to everything the user owns |
//! | `GET`    | `/users/me/rsvps` | |
//! | `GET`    | `/users/me/saved` | |
//! | `GET`    | `/users/{id}`     | Profile; phone hidden when private |

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use rally_core::{
  rsvp::{Rsvp, SavedEvent},
  store::DiscoveryStore,
  user::{NewUser, User, UserPatch, UserProfile},
};
use uuid::Uuid;

use crate::{
  AppState,
  auth::{AuthUser, MaybeAuthUser},
  error::ApiError,
  extract::{Json, Path},
};

fn validate_email(email: &str) -> Result<(), ApiError> {
  match email.split_once('@') {
    Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
    _ => Err(ApiError::invalid_field("email", "must be a valid email address")),
  }
}

fn validate_name(name: &str) -> Result<(), ApiError> {
  if name.trim().is_empty() {
    return Err(ApiError::invalid_field("name", "must not be empty"));
  }
  Ok(())
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /users`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  Json(mut body): Json<NewUser>,
) -> Result<impl IntoResponse, ApiError>
where
  S: DiscoveryStore + Clone + 'static,
{
  body.email = body.email.trim().to_lowercase();
  validate_email(&body.email)?;
  validate_name(&body.name)?;

  let user = state.store.create_user(body).await.map_err(ApiError::store)?;
  tracing::info!(user_id = %user.id, "created user");
  Ok((StatusCode::CREATED, Json(user)))
}

// ─── Read ─────────────────────────────────────────────────────────────────────

/// `GET /users/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  MaybeAuthUser(viewer): MaybeAuthUser,
  Path(id): Path<Uuid>,
) -> Result<Json<UserProfile>, ApiError>
where
  S: DiscoveryStore + Clone + 'static,
{
  let user = state
    .store
    .get_user(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::not_found("user"))?;
  Ok(Json(user.profile_for(viewer)))
}

/// `GET /users/me`
pub async fn get_me<S>(
  State(state): State<AppState<S>>,
  AuthUser(me): AuthUser,
) -> Result<Json<User>, ApiError>
where
  S: DiscoveryStore + Clone + 'static,
{
  let user = state
    .store
    .get_user(me)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::not_found("user"))?;
  Ok(Json(user))
}

// ─── Update / delete ──────────────────────────────────────────────────────────

/// `PATCH /users/me`
pub async fn update_me<S>(
  State(state): State<AppState<S>>,
  AuthUser(me): AuthUser,
  Json(patch): Json<UserPatch>,
) -> Result<Json<User>, ApiError>
where
  S: DiscoveryStore + Clone + 'static,
{
  if patch.is_empty() {
    return Err(ApiError::Validation {
      details: serde_json::json!({ "message": "no fields to update" }),
    });
  }
  if let Some(name) = &patch.name {
    validate_name(name)?;
  }

  let user = state
    .store
    .update_user(me, patch)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::not_found("user"))?;
  Ok(Json(user))
}

/// `DELETE /users/me`
pub async fn delete_me<S>(
  State(state): State<AppState<S>>,
  AuthUser(me): AuthUser,
) -> Result<StatusCode, ApiError>
where
  S: DiscoveryStore + Clone + 'static,
{
  if !state.store.delete_user(me).await.map_err(ApiError::store)? {
    return Err(ApiError::not_found("user"));
  }
  tracing::info!(user_id = %me, "deleted account");
  Ok(StatusCode::NO_CONTENT)
}

// ─── Caller's relations ───────────────────────────────────────────────────────

/// `GET /users/me/rsvps`
pub async fn my_rsvps<S>(
  State(state): State<AppState<S>>,
  AuthUser(me): AuthUser,
) -> Result<Json<Vec<Rsvp>>, ApiError>
where
  S: DiscoveryStore + Clone + 'static,
{
  let rsvps = state.store.list_user_rsvps(me).await.map_err(ApiError::store)?;
  Ok(Json(rsvps))
}

/// `GET /users/me/saved`
pub async fn my_saved<S>(
  State(state): State<AppState<S>>,
  AuthUser(me): AuthUser,
) -> Result<Json<Vec<SavedEvent>>, ApiError>
where
  S: DiscoveryStore + Clone + 'static,
{
  let saved = state.store.list_saved_events(me).await.map_err(ApiError::store)?;
  Ok(Json(saved))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn email_needs_local_part_and_dotted_domain() {
    assert!(validate_email("ada@example.com").is_ok());
    assert!(validate_email("ada@localhost").is_err());
    assert!(validate_email("@example.com").is_err());
    assert!(validate_email("ada.example.com").is_err());
  }
}
