//! Handlers for `/events` endpoints.
//!
//! | Method   | Path           | Notes |
//! |----------|----------------|-------|
//! | `POST`   | `/events`      | Unknown `venue_id` is 400 "Invalid reference" |
//! | `GET`    | `/events`      | Optional `venue_id`, `category`, `limit`, `offset` |
//! | `GET`    | `/events/{id}` | 404 if not found |
//! | `DELETE` | `/events/{id}` | Venue owner only, when the venue is owned |

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use chrono::{DateTime, Utc};
use rally_core::{
  event::{Event, EventQuery, NewEvent},
  store::DiscoveryStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  AppState, MAX_PAGE_SIZE,
  auth::AuthUser,
  error::ApiError,
  extract::{Json, Path, Query},
};

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct EventBody {
  pub venue_id:    Uuid,
  pub title:       String,
  pub description: Option<String>,
  pub category:    Option<String>,
  pub starts_at:   DateTime<Utc>,
  pub ends_at:     Option<DateTime<Utc>>,
}

impl TryFrom<EventBody> for NewEvent {
  type Error = ApiError;

  fn try_from(b: EventBody) -> Result<Self, ApiError> {
    if b.title.trim().is_empty() {
      return Err(ApiError::invalid_field("title", "must not be empty"));
    }
    if b.ends_at.is_some_and(|end| end < b.starts_at) {
      return Err(ApiError::invalid_field("ends_at", "must not be before starts_at"));
    }

    Ok(NewEvent {
      venue_id:    b.venue_id,
      title:       b.title,
      description: b.description,
      category:    b.category,
      starts_at:   b.starts_at,
      ends_at:     b.ends_at,
    })
  }
}

/// `POST /events`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  AuthUser(_): AuthUser,
  Json(body): Json<EventBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: DiscoveryStore + Clone + 'static,
{
  let event = state
    .store
    .create_event(NewEvent::try_from(body)?)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(event)))
}

// ─── List / get ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub venue_id: Option<Uuid>,
  pub category: Option<String>,
  pub limit:    Option<usize>,
  pub offset:   Option<usize>,
}

/// `GET /events[?venue_id=..][&category=..][&limit=..][&offset=..]`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Event>>, ApiError>
where
  S: DiscoveryStore + Clone + 'static,
{
  let query = EventQuery {
    venue_id: params.venue_id,
    category: params.category,
    limit:    Some(params.limit.unwrap_or(MAX_PAGE_SIZE).min(MAX_PAGE_SIZE)),
    offset:   params.offset,
  };
  let events = state.store.list_events(&query).await.map_err(ApiError::store)?;
  Ok(Json(events))
}

/// `GET /events/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Event>, ApiError>
where
  S: DiscoveryStore + Clone + 'static,
{
  let event = state
    .store
    .get_event(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::not_found("event"))?;
  Ok(Json(event))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /events/{id}`. Cascades to the event's RSVPs and saves.
pub async fn delete_one<S>(
  State(state): State<AppState<S>>,
  AuthUser(me): AuthUser,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: DiscoveryStore + Clone + 'static,
{
  let event = state
    .store
    .get_event(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::not_found("event"))?;

  let owner = state
    .store
    .get_venue(event.venue_id)
    .await
    .map_err(ApiError::store)?
    .and_then(|v| v.user_id);
  if owner.is_some_and(|owner| owner != me) {
    return Err(ApiError::forbidden());
  }

  if !state.store.delete_event(id).await.map_err(ApiError::store)? {
    return Err(ApiError::not_found("event"));
  }
  Ok(StatusCode::NO_CONTENT)
}
