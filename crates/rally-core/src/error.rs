//! Error types for `rally-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown rsvp status: {0:?}")]
  UnknownRsvpStatus(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

// ─── Storage classification ──────────────────────────────────────────────────

/// A storage constraint that rejected a write.
///
/// Backends attach this tag at the point of failure so that callers can
/// classify the error with a `match` instead of inspecting driver codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
  /// A UNIQUE or PRIMARY KEY constraint (SQLSTATE `23505`).
  Unique { table: String, columns: String },
  /// A FOREIGN KEY constraint (SQLSTATE `23503`).
  ForeignKey,
  /// A CHECK or NOT NULL constraint.
  Check(String),
}

impl Violation {
  /// The SQLSTATE class code conventionally used for this violation.
  pub fn sqlstate(&self) -> &'static str {
    match self {
      Self::Unique { .. } => "23505",
      Self::ForeignKey => "23503",
      Self::Check(_) => "23514",
    }
  }
}

/// The error bound every [`crate::store::DiscoveryStore`] backend satisfies.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  /// The constraint violation behind this error, if any.
  fn violation(&self) -> Option<&Violation>;
}
