//! The `DiscoveryStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `rally-store-sqlite`).
//! Higher layers (`rally-api`, `rally-server`) depend on this abstraction, not
//! on any concrete backend.
//!
//! Uniqueness of RSVPs and saves, and cascading deletes, are the backend's
//! responsibility and must be enforced by the storage engine itself. Callers
//! never check for an existing row before inserting; a duplicate surfaces as
//! an error whose [`StoreError::violation`] is [`Violation::Unique`].
//!
//! [`Violation::Unique`]: crate::Violation::Unique

use std::future::Future;

use uuid::Uuid;

use crate::{
  StoreError,
  analytics::{AnalyticsEvent, AnalyticsQuery, NewAnalyticsEvent},
  event::{Event, EventQuery, NewEvent},
  rsvp::{Rsvp, RsvpStatus, SavedEvent},
  user::{NewUser, User, UserPatch},
  venue::{NewVenue, Venue},
};

/// Abstraction over a Rally storage backend.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait DiscoveryStore: Send + Sync {
  type Error: StoreError;

  /// Cheap liveness probe of the underlying storage.
  fn ping(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Users ─────────────────────────────────────────────────────────────

  /// Insert a user. A duplicate email is a unique violation.
  fn create_user(
    &self,
    input: NewUser,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  fn get_user(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  /// Apply `patch` and bump `updated_at`. Returns `None` if the user is gone.
  fn update_user(
    &self,
    id: Uuid,
    patch: UserPatch,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  /// Delete a user together with every venue, RSVP, saved event and
  /// analytics record that references them, atomically.
  ///
  /// Returns `false` if no such user existed.
  fn delete_user(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Venues ────────────────────────────────────────────────────────────

  fn create_venue(
    &self,
    input: NewVenue,
  ) -> impl Future<Output = Result<Venue, Self::Error>> + Send + '_;

  fn get_venue(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Venue>, Self::Error>> + Send + '_;

  /// List venues, optionally restricted to those owned by `owner`.
  fn list_venues(
    &self,
    owner: Option<Uuid>,
  ) -> impl Future<Output = Result<Vec<Venue>, Self::Error>> + Send + '_;

  /// Delete a venue and, by cascade, its events.
  fn delete_venue(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Events ────────────────────────────────────────────────────────────

  /// Insert an event. An unknown `venue_id` is a foreign-key violation.
  fn create_event(
    &self,
    input: NewEvent,
  ) -> impl Future<Output = Result<Event, Self::Error>> + Send + '_;

  fn get_event(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Event>, Self::Error>> + Send + '_;

  /// List events ordered by start time.
  fn list_events<'a>(
    &'a self,
    query: &'a EventQuery,
  ) -> impl Future<Output = Result<Vec<Event>, Self::Error>> + Send + 'a;

  /// Delete an event and, by cascade, its RSVPs and saves.
  fn delete_event(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── RSVPs ─────────────────────────────────────────────────────────────

  /// Insert the RSVP for `(user_id, event_id)`.
  ///
  /// Fails with a unique violation if the pair already has one.
  fn create_rsvp(
    &self,
    user_id: Uuid,
    event_id: Uuid,
    status: RsvpStatus,
  ) -> impl Future<Output = Result<Rsvp, Self::Error>> + Send + '_;

  fn get_rsvp(
    &self,
    user_id: Uuid,
    event_id: Uuid,
  ) -> impl Future<Output = Result<Option<Rsvp>, Self::Error>> + Send + '_;

  /// Change the status of an existing RSVP and bump `updated_at`.
  /// Returns `None` if the pair has no RSVP.
  fn update_rsvp(
    &self,
    user_id: Uuid,
    event_id: Uuid,
    status: RsvpStatus,
  ) -> impl Future<Output = Result<Option<Rsvp>, Self::Error>> + Send + '_;

  fn delete_rsvp(
    &self,
    user_id: Uuid,
    event_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn list_event_rsvps(
    &self,
    event_id: Uuid,
    status: Option<RsvpStatus>,
  ) -> impl Future<Output = Result<Vec<Rsvp>, Self::Error>> + Send + '_;

  fn list_user_rsvps(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Rsvp>, Self::Error>> + Send + '_;

  // ── Saved events ──────────────────────────────────────────────────────

  /// Bookmark `event_id` for `user_id`.
  ///
  /// Fails with a unique violation if the pair is already saved.
  fn save_event(
    &self,
    user_id: Uuid,
    event_id: Uuid,
  ) -> impl Future<Output = Result<SavedEvent, Self::Error>> + Send + '_;

  fn unsave_event(
    &self,
    user_id: Uuid,
    event_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn list_saved_events(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Vec<SavedEvent>, Self::Error>> + Send + '_;

  // ── Analytics (append-only) ──────────────────────────────────────────

  fn record_analytics(
    &self,
    input: NewAnalyticsEvent,
  ) -> impl Future<Output = Result<AnalyticsEvent, Self::Error>> + Send + '_;

  /// Most recent first.
  fn list_analytics<'a>(
    &'a self,
    query: &'a AnalyticsQuery,
  ) -> impl Future<Output = Result<Vec<AnalyticsEvent>, Self::Error>> + Send + 'a;
}
