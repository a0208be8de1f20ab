//! Handlers for `/analytics`.
//!
//! | Method | Path         | Notes |
//! |--------|--------------|-------|
//! | `POST` | `/analytics` | Anonymous allowed; 201 |
//! | `GET`  | `/analytics` | Caller's own records, newest first |

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use rally_core::{
  analytics::{AnalyticsEvent, AnalyticsQuery, NewAnalyticsEvent},
  store::DiscoveryStore,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{
  AppState, MAX_PAGE_SIZE,
  auth::{AuthUser, MaybeAuthUser},
  error::ApiError,
  extract::{Json, Query},
};

#[derive(Debug, Deserialize)]
pub struct AnalyticsBody {
  pub event_type: String,
  pub event_id:   Option<Uuid>,
  #[serde(default)]
  pub properties: Map<String, Value>,
}

/// `POST /analytics`
pub async fn record<S>(
  State(state): State<AppState<S>>,
  MaybeAuthUser(user_id): MaybeAuthUser,
  Json(body): Json<AnalyticsBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: DiscoveryStore + Clone + 'static,
{
  let event_type = body.event_type.trim();
  if event_type.is_empty() {
    return Err(ApiError::invalid_field("event_type", "must not be empty"));
  }

  let recorded = state
    .store
    .record_analytics(NewAnalyticsEvent {
      user_id,
      event_type: event_type.to_owned(),
      event_id: body.event_id,
      properties: body.properties,
    })
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(recorded)))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub event_type: Option<String>,
  pub event_id:   Option<Uuid>,
  pub limit:      Option<usize>,
}

/// `GET /analytics[?event_type=..][&event_id=..][&limit=..]`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  AuthUser(me): AuthUser,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<AnalyticsEvent>>, ApiError>
where
  S: DiscoveryStore + Clone + 'static,
{
  let query = AnalyticsQuery {
    user_id:    Some(me),
    event_type: params.event_type,
    event_id:   params.event_id,
    limit:      Some(params.limit.unwrap_or(MAX_PAGE_SIZE).min(MAX_PAGE_SIZE)),
  };
  let records = state.store.list_analytics(&query).await.map_err(ApiError::store)?;
  Ok(Json(records))
}
