//! Analytics events: a write-once log of client activity.
//!
//! There is no update or delete path. Rows disappear only when the user they
//! belong to is deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsEvent {
  pub id:         Uuid,
  /// `None` for anonymous activity.
  pub user_id:    Option<Uuid>,
  /// Free-form, e.g. `"event_viewed"` or `"search"`.
  pub event_type: String,
  /// Correlates the record with a domain event; not a foreign key.
  pub event_id:   Option<Uuid>,
  pub properties: serde_json::Map<String, serde_json::Value>,
  /// Set by the store at insertion time.
  pub timestamp:  DateTime<Utc>,
}

/// Input to [`crate::store::DiscoveryStore::record_analytics`].
#[derive(Debug, Clone, Default)]
pub struct NewAnalyticsEvent {
  pub user_id:    Option<Uuid>,
  pub event_type: String,
  pub event_id:   Option<Uuid>,
  pub properties: serde_json::Map<String, serde_json::Value>,
}

/// Parameters for [`crate::store::DiscoveryStore::list_analytics`].
#[derive(Debug, Clone, Default)]
pub struct AnalyticsQuery {
  pub user_id:    Option<Uuid>,
  pub event_type: Option<String>,
  pub event_id:   Option<Uuid>,
  pub limit:      Option<usize>,
}
