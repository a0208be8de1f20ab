//! Handlers for `/events/{id}/rsvp` and `/events/{id}/rsvps`.
//!
//! At most one RSVP exists per (caller, event). Creating a second one is a
//! 409 from the store's unique constraint; nothing here looks first.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use rally_core::{
  rsvp::{Rsvp, RsvpStatus},
  store::DiscoveryStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  AppState,
  auth::AuthUser,
  error::ApiError,
  extract::{Json, Path, Query},
};

#[derive(Debug, Deserialize)]
pub struct RsvpBody {
  pub status: RsvpStatus,
}

/// `POST /events/{id}/rsvp`, body: `{"status":"going"}`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  AuthUser(me): AuthUser,
  Path(event_id): Path<Uuid>,
  Json(body): Json<RsvpBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: DiscoveryStore + Clone + 'static,
{
  let rsvp = state
    .store
    .create_rsvp(me, event_id, body.status)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(rsvp)))
}

/// `PATCH /events/{id}/rsvp`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  AuthUser(me): AuthUser,
  Path(event_id): Path<Uuid>,
  Json(body): Json<RsvpBody>,
) -> Result<Json<Rsvp>, ApiError>
where
  S: DiscoveryStore + Clone + 'static,
{
  let rsvp = state
    .store
    .update_rsvp(me, event_id, body.status)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::not_found("rsvp"))?;
  Ok(Json(rsvp))
}

/// `DELETE /events/{id}/rsvp`
pub async fn delete<S>(
  State(state): State<AppState<S>>,
  AuthUser(me): AuthUser,
  Path(event_id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: DiscoveryStore + Clone + 'static,
{
  if !state.store.delete_rsvp(me, event_id).await.map_err(ApiError::store)? {
    return Err(ApiError::not_found("rsvp"));
  }
  Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub status: Option<RsvpStatus>,
}

/// `GET /events/{id}/rsvps[?status=going|maybe|not_going]`. 404 if the
/// event does not exist.
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Path(event_id): Path<Uuid>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Rsvp>>, ApiError>
where
  S: DiscoveryStore + Clone + 'static,
{
  state
    .store
    .get_event(event_id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::not_found("event"))?;

  let rsvps = state
    .store
    .list_event_rsvps(event_id, params.status)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(rsvps))
}
