//! `GET /health`: always 200; `database` reports whether the store answers.

use axum::extract::State;
use chrono::{DateTime, Utc};
use rally_core::store::DiscoveryStore;
use serde::Serialize;

use crate::{AppState, extract::Json};

#[derive(Debug, Serialize)]
pub struct Health {
  pub status:    &'static str,
  pub timestamp: DateTime<Utc>,
  pub database:  &'static str,
}

pub async fn handler<S>(State(state): State<AppState<S>>) -> Json<Health>
where
  S: DiscoveryStore + Clone + 'static,
{
  let database = match state.store.ping().await {
    Ok(()) => "up",
    Err(e) => {
      tracing::warn!(error = %e, "database ping failed");
      "down"
    }
  };

  Json(Health { status: "OK", timestamp: Utc::now(), database })
}
