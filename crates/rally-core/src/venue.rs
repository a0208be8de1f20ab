//! Venues: physical locations that host events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A physical location. Deleting the owning user deletes the venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Venue {
  pub id:         Uuid,
  pub name:       String,
  pub address:    Option<String>,
  pub city:       Option<String>,
  pub latitude:   Option<f64>,
  pub longitude:  Option<f64>,
  /// Owning user, if any.
  pub user_id:    Option<Uuid>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// Input to [`crate::store::DiscoveryStore::create_venue`].
#[derive(Debug, Clone, Default)]
pub struct NewVenue {
  pub name:      String,
  pub address:   Option<String>,
  pub city:      Option<String>,
  pub latitude:  Option<f64>,
  pub longitude: Option<f64>,
  pub user_id:   Option<Uuid>,
}
