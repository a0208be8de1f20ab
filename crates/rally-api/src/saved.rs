//! Handlers for `/events/{id}/save`.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use rally_core::store::DiscoveryStore;
use uuid::Uuid;

use crate::{
  AppState,
  auth::AuthUser,
  error::ApiError,
  extract::{Json, Path},
};

/// `POST /events/{id}/save`. 409 if already saved.
pub async fn save<S>(
  State(state): State<AppState<S>>,
  AuthUser(me): AuthUser,
  Path(event_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError>
where
  S: DiscoveryStore + Clone + 'static,
{
  let saved = state
    .store
    .save_event(me, event_id)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(saved)))
}

/// `DELETE /events/{id}/save`
pub async fn unsave<S>(
  State(state): State<AppState<S>>,
  AuthUser(me): AuthUser,
  Path(event_id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: DiscoveryStore + Clone + 'static,
{
  if !state.store.unsave_event(me, event_id).await.map_err(ApiError::store)? {
    return Err(ApiError::not_found("saved event"));
  }
  Ok(StatusCode::NO_CONTENT)
}
