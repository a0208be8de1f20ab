//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 UTC strings with millisecond
//! precision, matching the column defaults. UUIDs are stored as hyphenated
//! lowercase strings. Analytics properties are stored as compact JSON.

use chrono::{DateTime, SecondsFormat, Utc};
use rally_core::{
  analytics::AnalyticsEvent,
  event::Event,
  rsvp::{Rsvp, RsvpStatus, SavedEvent},
  user::User,
  venue::Venue,
};
use rusqlite::Row;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

fn decode_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
  s.as_deref().map(decode_uuid).transpose()
}

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Properties ──────────────────────────────────────────────────────────────

pub fn encode_properties(
  props: &serde_json::Map<String, serde_json::Value>,
) -> Result<String> {
  Ok(serde_json::to_string(props)?)
}

pub fn decode_properties(
  s: &str,
) -> Result<serde_json::Map<String, serde_json::Value>> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const USER_COLUMNS: &str =
  "id, email, name, phone, phone_privacy, created_at, updated_at";

/// Raw values read directly from a `users` row.
pub struct RawUser {
  pub id:            String,
  pub email:         String,
  pub name:          String,
  pub phone:         Option<String>,
  pub phone_privacy: Option<bool>,
  pub created_at:    String,
  pub updated_at:    String,
}

impl RawUser {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:            row.get(0)?,
      email:         row.get(1)?,
      name:          row.get(2)?,
      phone:         row.get(3)?,
      phone_privacy: row.get(4)?,
      created_at:    row.get(5)?,
      updated_at:    row.get(6)?,
    })
  }

  pub fn into_user(self) -> Result<User> {
    Ok(User {
      id:            decode_uuid(&self.id)?,
      email:         self.email,
      name:          self.name,
      phone:         self.phone,
      phone_privacy: self.phone_privacy.unwrap_or(false),
      created_at:    decode_dt(&self.created_at)?,
      updated_at:    decode_dt(&self.updated_at)?,
    })
  }
}

pub const VENUE_COLUMNS: &str =
  "id, name, address, city, latitude, longitude, user_id, created_at, updated_at";

/// Raw values read directly from a `venues` row.
pub struct RawVenue {
  pub id:         String,
  pub name:       String,
  pub address:    Option<String>,
  pub city:       Option<String>,
  pub latitude:   Option<f64>,
  pub longitude:  Option<f64>,
  pub user_id:    Option<String>,
  pub created_at: String,
  pub updated_at: String,
}

impl RawVenue {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:         row.get(0)?,
      name:       row.get(1)?,
      address:    row.get(2)?,
      city:       row.get(3)?,
      latitude:   row.get(4)?,
      longitude:  row.get(5)?,
      user_id:    row.get(6)?,
      created_at: row.get(7)?,
      updated_at: row.get(8)?,
    })
  }

  pub fn into_venue(self) -> Result<Venue> {
    Ok(Venue {
      id:         decode_uuid(&self.id)?,
      name:       self.name,
      address:    self.address,
      city:       self.city,
      latitude:   self.latitude,
      longitude:  self.longitude,
      user_id:    decode_opt_uuid(self.user_id)?,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

pub const EVENT_COLUMNS: &str = "id, venue_id, title, description, category, \
                                 starts_at, ends_at, created_at, updated_at";

/// Raw values read directly from an `events` row.
pub struct RawEvent {
  pub id:          String,
  pub venue_id:    String,
  pub title:       String,
  pub description: Option<String>,
  pub category:    Option<String>,
  pub starts_at:   String,
  pub ends_at:     Option<String>,
  pub created_at:  String,
  pub updated_at:  String,
}

impl RawEvent {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:          row.get(0)?,
      venue_id:    row.get(1)?,
      title:       row.get(2)?,
      description: row.get(3)?,
      category:    row.get(4)?,
      starts_at:   row.get(5)?,
      ends_at:     row.get(6)?,
      created_at:  row.get(7)?,
      updated_at:  row.get(8)?,
    })
  }

  pub fn into_event(self) -> Result<Event> {
    Ok(Event {
      id:          decode_uuid(&self.id)?,
      venue_id:    decode_uuid(&self.venue_id)?,
      title:       self.title,
      description: self.description,
      category:    self.category,
      starts_at:   decode_dt(&self.starts_at)?,
      ends_at:     self.ends_at.as_deref().map(decode_dt).transpose()?,
      created_at:  decode_dt(&self.created_at)?,
      updated_at:  decode_dt(&self.updated_at)?,
    })
  }
}

pub const RSVP_COLUMNS: &str =
  "id, user_id, event_id, status, created_at, updated_at";

/// Raw values read directly from an `rsvps` row.
pub struct RawRsvp {
  pub id:         String,
  pub user_id:    String,
  pub event_id:   String,
  pub status:     String,
  pub created_at: String,
  pub updated_at: String,
}

impl RawRsvp {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:         row.get(0)?,
      user_id:    row.get(1)?,
      event_id:   row.get(2)?,
      status:     row.get(3)?,
      created_at: row.get(4)?,
      updated_at: row.get(5)?,
    })
  }

  pub fn into_rsvp(self) -> Result<Rsvp> {
    Ok(Rsvp {
      id:         decode_uuid(&self.id)?,
      user_id:    decode_uuid(&self.user_id)?,
      event_id:   decode_uuid(&self.event_id)?,
      status:     self.status.parse::<RsvpStatus>()?,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

pub const SAVED_COLUMNS: &str = "id, user_id, event_id, created_at";

/// Raw values read directly from a `user_saved_events` row.
pub struct RawSaved {
  pub id:         String,
  pub user_id:    String,
  pub event_id:   String,
  pub created_at: String,
}

impl RawSaved {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:         row.get(0)?,
      user_id:    row.get(1)?,
      event_id:   row.get(2)?,
      created_at: row.get(3)?,
    })
  }

  pub fn into_saved(self) -> Result<SavedEvent> {
    Ok(SavedEvent {
      id:         decode_uuid(&self.id)?,
      user_id:    decode_uuid(&self.user_id)?,
      event_id:   decode_uuid(&self.event_id)?,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

pub const ANALYTICS_COLUMNS: &str =
  "id, user_id, event_type, event_id, properties, timestamp";

/// Raw values read directly from an `analytics_events` row.
pub struct RawAnalytics {
  pub id:         String,
  pub user_id:    Option<String>,
  pub event_type: String,
  pub event_id:   Option<String>,
  pub properties: String,
  pub timestamp:  String,
}

impl RawAnalytics {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:         row.get(0)?,
      user_id:    row.get(1)?,
      event_type: row.get(2)?,
      event_id:   row.get(3)?,
      properties: row.get(4)?,
      timestamp:  row.get(5)?,
    })
  }

  pub fn into_analytics(self) -> Result<AnalyticsEvent> {
    Ok(AnalyticsEvent {
      id:         decode_uuid(&self.id)?,
      user_id:    decode_opt_uuid(self.user_id)?,
      event_type: self.event_type,
      event_id:   decode_opt_uuid(self.event_id)?,
      properties: decode_properties(&self.properties)?,
      timestamp:  decode_dt(&self.timestamp)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn timestamps_match_column_default_format() {
    let dt = decode_dt("2026-10-16T09:30:00.250Z").unwrap();
    assert_eq!(encode_dt(dt), "2026-10-16T09:30:00.250Z");
  }

  #[test]
  fn offset_timestamps_are_normalised_to_utc() {
    let dt = decode_dt("2026-10-16T11:30:00+02:00").unwrap();
    assert_eq!(encode_dt(dt), "2026-10-16T09:30:00.000Z");
  }

  #[test]
  fn bad_timestamp_is_a_date_parse_error() {
    assert!(matches!(decode_dt("yesterday"), Err(Error::DateParse(_))));
  }
}
