//! Error type for `rally-store-sqlite`.
//!
//! Constraint failures are recognised from SQLite's extended result codes and
//! tagged with a [`Violation`] as they are converted, so nothing above this
//! crate ever has to look at a driver error.

use rally_core::{StoreError, Violation};
use rusqlite::ffi;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] rally_core::Error),

  #[error("constraint violation: {message}")]
  Constraint {
    violation: Violation,
    message:   String,
  },

  #[error("database error: {0}")]
  Database(tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(rusqlite::Error),

  #[error("migration {version} ({name}) failed: {source}")]
  Migration {
    version: i64,
    name:    &'static str,
    #[source]
    source:  rusqlite::Error,
  },

  #[error("migration {version} left {count} dangling foreign key(s)")]
  ForeignKeyCheck { version: i64, count: usize },

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl StoreError for Error {
  fn violation(&self) -> Option<&Violation> {
    match self {
      Error::Constraint { violation, .. } => Some(violation),
      _ => None,
    }
  }
}

impl From<rusqlite::Error> for Error {
  fn from(err: rusqlite::Error) -> Self {
    match classify(&err) {
      Some((violation, message)) => Error::Constraint { violation, message },
      None => Error::Sqlite(err),
    }
  }
}

impl From<tokio_rusqlite::Error> for Error {
  fn from(err: tokio_rusqlite::Error) -> Self {
    match err {
      tokio_rusqlite::Error::Rusqlite(e) => Error::from(e),
      other => Error::Database(other),
    }
  }
}

/// Recognise a constraint failure by its extended result code.
fn classify(err: &rusqlite::Error) -> Option<(Violation, String)> {
  let rusqlite::Error::SqliteFailure(failure, message) = err else {
    return None;
  };
  if failure.code != rusqlite::ErrorCode::ConstraintViolation {
    return None;
  }

  let message = message.clone().unwrap_or_else(|| failure.to_string());
  let violation = match failure.extended_code {
    ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
      unique_violation(&message)
    }
    ffi::SQLITE_CONSTRAINT_FOREIGNKEY => Violation::ForeignKey,
    _ => Violation::Check(message.clone()),
  };
  Some((violation, message))
}

/// Parse `"UNIQUE constraint failed: rsvps.user_id, rsvps.event_id"`.
fn unique_violation(message: &str) -> Violation {
  let qualified = message.split_once(": ").map_or("", |(_, cols)| cols);

  let mut table = String::new();
  let mut columns = Vec::new();
  for col in qualified.split(", ") {
    if let Some((t, c)) = col.split_once('.') {
      table = t.to_owned();
      columns.push(c);
    }
  }

  Violation::Unique { table, columns: columns.join(", ") }
}
