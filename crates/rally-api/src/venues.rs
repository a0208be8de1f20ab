//! Handlers for `/venues` endpoints.
//!
//! | Method   | Path           | Notes |
//! |----------|----------------|-------|
//! | `POST`   | `/venues`      | Owned by the caller; 201 |
//! | `GET`    | `/venues`      | Optional `?owner=<uuid>` |
//! | `GET`    | `/venues/{id}` | 404 if not found |
//! | `DELETE` | `/venues/{id}` | Owner only; cascades to its events |

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use rally_core::{
  store::DiscoveryStore,
  venue::{NewVenue, Venue},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  AppState,
  auth::AuthUser,
  error::ApiError,
  extract::{Json, Path, Query},
};

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct VenueBody {
  pub name:      String,
  pub address:   Option<String>,
  pub city:      Option<String>,
  pub latitude:  Option<f64>,
  pub longitude: Option<f64>,
}

impl VenueBody {
  fn validate(&self) -> Result<(), ApiError> {
    if self.name.trim().is_empty() {
      return Err(ApiError::invalid_field("name", "must not be empty"));
    }
    if self.latitude.is_some_and(|lat| !(-90.0..=90.0).contains(&lat)) {
      return Err(ApiError::invalid_field("latitude", "must be between -90 and 90"));
    }
    if self.longitude.is_some_and(|lon| !(-180.0..=180.0).contains(&lon)) {
      return Err(ApiError::invalid_field("longitude", "must be between -180 and 180"));
    }
    Ok(())
  }
}

/// `POST /venues`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  AuthUser(me): AuthUser,
  Json(body): Json<VenueBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: DiscoveryStore + Clone + 'static,
{
  body.validate()?;

  let venue = state
    .store
    .create_venue(NewVenue {
      name:      body.name,
      address:   body.address,
      city:      body.city,
      latitude:  body.latitude,
      longitude: body.longitude,
      user_id:   Some(me),
    })
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(venue)))
}

// ─── List / get ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub owner: Option<Uuid>,
}

/// `GET /venues[?owner=<uuid>]`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Venue>>, ApiError>
where
  S: DiscoveryStore + Clone + 'static,
{
  let venues = state.store.list_venues(params.owner).await.map_err(ApiError::store)?;
  Ok(Json(venues))
}

/// `GET /venues/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Venue>, ApiError>
where
  S: DiscoveryStore + Clone + 'static,
{
  let venue = state
    .store
    .get_venue(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::not_found("venue"))?;
  Ok(Json(venue))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /venues/{id}`
pub async fn delete_one<S>(
  State(state): State<AppState<S>>,
  AuthUser(me): AuthUser,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: DiscoveryStore + Clone + 'static,
{
  let venue = state
    .store
    .get_venue(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::not_found("venue"))?;
  if venue.user_id != Some(me) {
    return Err(ApiError::forbidden());
  }

  if !state.store.delete_venue(id).await.map_err(ApiError::store)? {
    return Err(ApiError::not_found("venue"));
  }
  Ok(StatusCode::NO_CONTENT)
}
