//! RSVPs and saved events, the two (user, event) relations.
//!
//! Each relation admits at most one row per `(user_id, event_id)` pair. The
//! invariant is a storage constraint, not an application check: two racing
//! inserts for the same pair leave exactly one row behind.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

/// A user's answer to an event invitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RsvpStatus {
  Going,
  Maybe,
  NotGoing,
}

impl RsvpStatus {
  /// The value stored in the `status` column.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Going => "going",
      Self::Maybe => "maybe",
      Self::NotGoing => "not_going",
    }
  }
}

impl fmt::Display for RsvpStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for RsvpStatus {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "going" => Ok(Self::Going),
      "maybe" => Ok(Self::Maybe),
      "not_going" => Ok(Self::NotGoing),
      other => Err(Error::UnknownRsvpStatus(other.to_owned())),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rsvp {
  pub id:         Uuid,
  pub user_id:    Uuid,
  pub event_id:   Uuid,
  pub status:     RsvpStatus,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// A bookmark of an event by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedEvent {
  pub id:         Uuid,
  pub user_id:    Uuid,
  pub event_id:   Uuid,
  pub created_at: DateTime<Utc>,
}
