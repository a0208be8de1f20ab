//! Events: occurrences at a venue that users RSVP to and save.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
  pub id:          Uuid,
  pub venue_id:    Uuid,
  pub title:       String,
  pub description: Option<String>,
  pub category:    Option<String>,
  pub starts_at:   DateTime<Utc>,
  pub ends_at:     Option<DateTime<Utc>>,
  pub created_at:  DateTime<Utc>,
  pub updated_at:  DateTime<Utc>,
}

/// Input to [`crate::store::DiscoveryStore::create_event`].
#[derive(Debug, Clone)]
pub struct NewEvent {
  pub venue_id:    Uuid,
  pub title:       String,
  pub description: Option<String>,
  pub category:    Option<String>,
  pub starts_at:   DateTime<Utc>,
  pub ends_at:     Option<DateTime<Utc>>,
}

/// Parameters for [`crate::store::DiscoveryStore::list_events`].
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
  pub venue_id: Option<Uuid>,
  pub category: Option<String>,
  pub limit:    Option<usize>,
  pub offset:   Option<usize>,
}
