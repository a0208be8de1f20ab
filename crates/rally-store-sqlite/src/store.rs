//! [`SqliteStore`], the SQLite implementation of [`DiscoveryStore`].
//!
//! Ids and timestamps are produced by column defaults and read back with
//! `RETURNING`. Uniqueness of `(user_id, event_id)` and cascading deletes are
//! left entirely to the schema: there is no read-before-write anywhere here.

use std::path::Path;

use chrono::Utc;
use rusqlite::{OptionalExtension as _, params};
use uuid::Uuid;

use rally_core::{
  analytics::{AnalyticsEvent, AnalyticsQuery, NewAnalyticsEvent},
  event::{Event, EventQuery, NewEvent},
  rsvp::{Rsvp, RsvpStatus, SavedEvent},
  store::DiscoveryStore,
  user::{NewUser, User, UserPatch},
  venue::{NewVenue, Venue},
};

use crate::{
  Result,
  encode::{
    ANALYTICS_COLUMNS, EVENT_COLUMNS, RSVP_COLUMNS, RawAnalytics, RawEvent,
    RawRsvp, RawSaved, RawUser, RawVenue, SAVED_COLUMNS, USER_COLUMNS,
    VENUE_COLUMNS, encode_dt, encode_properties, encode_uuid,
  },
  migrations,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Rally store backed by a single SQLite file.
///
/// Clones share one background connection.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and bring the schema up to date.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init().await?;
    Ok(store)
  }

  /// Open a private in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init().await?;
    Ok(store)
  }

  async fn init(&self) -> Result<()> {
    let applied = self
      .conn
      .call(|conn| {
        conn.execute_batch(
          "PRAGMA journal_mode = WAL;
           PRAGMA foreign_keys = ON;",
        )?;
        Ok(migrations::migrate_up(conn, None))
      })
      .await??;

    if !applied.is_empty() {
      tracing::info!(?applied, "schema migrated");
    }
    Ok(())
  }

  /// The schema version currently recorded in the database.
  pub async fn schema_version(&self) -> Result<i64> {
    self
      .conn
      .call(|conn| Ok(migrations::current_version(conn)))
      .await?
  }

  /// Revert the schema down to `target`. Returns the reverted versions.
  pub async fn migrate_down(&self, target: i64) -> Result<Vec<i64>> {
    self
      .conn
      .call(move |conn| Ok(migrations::migrate_down(conn, target)))
      .await?
  }

  /// Close the underlying connection. Clones of this store fail afterwards.
  pub async fn close(self) -> Result<()> {
    self.conn.close().await?;
    Ok(())
  }

  #[cfg(test)]
  pub(crate) async fn count_rows(&self, table: &'static str) -> Result<i64> {
    Ok(
      self
        .conn
        .call(move |conn| {
          Ok(conn.query_row(&format!("SELECT count(*) FROM {table}"), [], |r| {
            r.get(0)
          })?)
        })
        .await?,
    )
  }
}

// ─── DiscoveryStore impl ─────────────────────────────────────────────────────

impl DiscoveryStore for SqliteStore {
  type Error = crate::Error;

  async fn ping(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn create_user(&self, input: NewUser) -> Result<User> {
    let NewUser { email, name, phone, phone_privacy } = input;

    let raw: RawUser = self
      .conn
      .call(move |conn| {
        // Leaving `phone_privacy` out of the column list lets the column
        // default apply.
        let raw = match phone_privacy {
          Some(private) => conn.query_row(
            &format!(
              "INSERT INTO users (email, name, phone, phone_privacy)
               VALUES (?1, ?2, ?3, ?4)
               RETURNING {USER_COLUMNS}"
            ),
            params![email, name, phone, private],
            RawUser::from_row,
          )?,
          None => conn.query_row(
            &format!(
              "INSERT INTO users (email, name, phone)
               VALUES (?1, ?2, ?3)
               RETURNING {USER_COLUMNS}"
            ),
            params![email, name, phone],
            RawUser::from_row,
          )?,
        };
        Ok(raw)
      })
      .await?;

    raw.into_user()
  }

  async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
              params![id_str],
              RawUser::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }

  async fn update_user(&self, id: Uuid, patch: UserPatch) -> Result<Option<User>> {
    let id_str = encode_uuid(id);
    let now_str = encode_dt(Utc::now());
    let UserPatch { name, phone, phone_privacy } = patch;
    let set_phone = phone.is_some();
    let phone = phone.flatten();

    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "UPDATE users SET
                   name          = COALESCE(?2, name),
                   phone         = CASE WHEN ?6 THEN ?3 ELSE phone END,
                   phone_privacy = COALESCE(?4, phone_privacy),
                   updated_at    = ?5
                 WHERE id = ?1
                 RETURNING {USER_COLUMNS}"
              ),
              params![id_str, name, phone, phone_privacy, now_str, set_phone],
              RawUser::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }

  async fn delete_user(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);

    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM users WHERE id = ?1", params![id_str])?)
      })
      .await?;

    if deleted > 0 {
      tracing::debug!(user_id = %id, "deleted user and dependents");
    }
    Ok(deleted > 0)
  }

  // ── Venues ────────────────────────────────────────────────────────────────

  async fn create_venue(&self, input: NewVenue) -> Result<Venue> {
    let NewVenue { name, address, city, latitude, longitude, user_id } = input;
    let user_id_str = user_id.map(encode_uuid);

    let raw: RawVenue = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          &format!(
            "INSERT INTO venues (name, address, city, latitude, longitude, user_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             RETURNING {VENUE_COLUMNS}"
          ),
          params![name, address, city, latitude, longitude, user_id_str],
          RawVenue::from_row,
        )?)
      })
      .await?;

    raw.into_venue()
  }

  async fn get_venue(&self, id: Uuid) -> Result<Option<Venue>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawVenue> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {VENUE_COLUMNS} FROM venues WHERE id = ?1"),
              params![id_str],
              RawVenue::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawVenue::into_venue).transpose()
  }

  async fn list_venues(&self, owner: Option<Uuid>) -> Result<Vec<Venue>> {
    let owner_str = owner.map(encode_uuid);

    let raws: Vec<RawVenue> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {VENUE_COLUMNS} FROM venues
           WHERE (?1 IS NULL OR user_id = ?1)
           ORDER BY created_at, rowid"
        ))?;
        let rows = stmt
          .query_map(params![owner_str], RawVenue::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawVenue::into_venue).collect()
  }

  async fn delete_venue(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);

    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM venues WHERE id = ?1", params![id_str])?)
      })
      .await?;
    Ok(deleted > 0)
  }

  // ── Events ────────────────────────────────────────────────────────────────

  async fn create_event(&self, input: NewEvent) -> Result<Event> {
    let venue_id_str  = encode_uuid(input.venue_id);
    let starts_at_str = encode_dt(input.starts_at);
    let ends_at_str   = input.ends_at.map(encode_dt);
    let NewEvent { title, description, category, .. } = input;

    let raw: RawEvent = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          &format!(
            "INSERT INTO events (venue_id, title, description, category, starts_at, ends_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             RETURNING {EVENT_COLUMNS}"
          ),
          params![venue_id_str, title, description, category, starts_at_str, ends_at_str],
          RawEvent::from_row,
        )?)
      })
      .await?;

    raw.into_event()
  }

  async fn get_event(&self, id: Uuid) -> Result<Option<Event>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawEvent> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1"),
              params![id_str],
              RawEvent::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawEvent::into_event).transpose()
  }

  async fn list_events(&self, query: &EventQuery) -> Result<Vec<Event>> {
    let venue_str  = query.venue_id.map(encode_uuid);
    let category   = query.category.clone();
    let limit_val  = query.limit.unwrap_or(100) as i64;
    let offset_val = query.offset.unwrap_or(0) as i64;

    let raws: Vec<RawEvent> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {EVENT_COLUMNS} FROM events
           WHERE (?1 IS NULL OR venue_id = ?1)
             AND (?2 IS NULL OR category = ?2)
           ORDER BY starts_at, rowid
           LIMIT ?3 OFFSET ?4"
        ))?;
        let rows = stmt
          .query_map(
            params![venue_str, category, limit_val, offset_val],
            RawEvent::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEvent::into_event).collect()
  }

  async fn delete_event(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);

    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM events WHERE id = ?1", params![id_str])?)
      })
      .await?;
    Ok(deleted > 0)
  }

  // ── RSVPs ─────────────────────────────────────────────────────────────────

  async fn create_rsvp(
    &self,
    user_id:  Uuid,
    event_id: Uuid,
    status:   RsvpStatus,
  ) -> Result<Rsvp> {
    let user_str  = encode_uuid(user_id);
    let event_str = encode_uuid(event_id);

    let raw: RawRsvp = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          &format!(
            "INSERT INTO rsvps (user_id, event_id, status)
             VALUES (?1, ?2, ?3)
             RETURNING {RSVP_COLUMNS}"
          ),
          params![user_str, event_str, status.as_str()],
          RawRsvp::from_row,
        )?)
      })
      .await?;

    raw.into_rsvp()
  }

  async fn get_rsvp(&self, user_id: Uuid, event_id: Uuid) -> Result<Option<Rsvp>> {
    let user_str  = encode_uuid(user_id);
    let event_str = encode_uuid(event_id);

    let raw: Option<RawRsvp> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {RSVP_COLUMNS} FROM rsvps WHERE user_id = ?1 AND event_id = ?2"
              ),
              params![user_str, event_str],
              RawRsvp::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawRsvp::into_rsvp).transpose()
  }

  async fn update_rsvp(
    &self,
    user_id:  Uuid,
    event_id: Uuid,
    status:   RsvpStatus,
  ) -> Result<Option<Rsvp>> {
    let user_str  = encode_uuid(user_id);
    let event_str = encode_uuid(event_id);
    let now_str   = encode_dt(Utc::now());

    let raw: Option<RawRsvp> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "UPDATE rsvps SET status = ?3, updated_at = ?4
                 WHERE user_id = ?1 AND event_id = ?2
                 RETURNING {RSVP_COLUMNS}"
              ),
              params![user_str, event_str, status.as_str(), now_str],
              RawRsvp::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawRsvp::into_rsvp).transpose()
  }

  async fn delete_rsvp(&self, user_id: Uuid, event_id: Uuid) -> Result<bool> {
    let user_str  = encode_uuid(user_id);
    let event_str = encode_uuid(event_id);

    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM rsvps WHERE user_id = ?1 AND event_id = ?2",
          params![user_str, event_str],
        )?)
      })
      .await?;
    Ok(deleted > 0)
  }

  async fn list_event_rsvps(
    &self,
    event_id: Uuid,
    status:   Option<RsvpStatus>,
  ) -> Result<Vec<Rsvp>> {
    let event_str  = encode_uuid(event_id);
    let status_str = status.map(RsvpStatus::as_str);

    let raws: Vec<RawRsvp> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {RSVP_COLUMNS} FROM rsvps
           WHERE event_id = ?1 AND (?2 IS NULL OR status = ?2)
           ORDER BY created_at, rowid"
        ))?;
        let rows = stmt
          .query_map(params![event_str, status_str], RawRsvp::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRsvp::into_rsvp).collect()
  }

  async fn list_user_rsvps(&self, user_id: Uuid) -> Result<Vec<Rsvp>> {
    let user_str = encode_uuid(user_id);

    let raws: Vec<RawRsvp> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {RSVP_COLUMNS} FROM rsvps WHERE user_id = ?1 ORDER BY created_at, rowid"
        ))?;
        let rows = stmt
          .query_map(params![user_str], RawRsvp::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRsvp::into_rsvp).collect()
  }

  // ── Saved events ──────────────────────────────────────────────────────────

  async fn save_event(&self, user_id: Uuid, event_id: Uuid) -> Result<SavedEvent> {
    let user_str  = encode_uuid(user_id);
    let event_str = encode_uuid(event_id);

    let raw: RawSaved = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          &format!(
            "INSERT INTO user_saved_events (user_id, event_id)
             VALUES (?1, ?2)
             RETURNING {SAVED_COLUMNS}"
          ),
          params![user_str, event_str],
          RawSaved::from_row,
        )?)
      })
      .await?;

    raw.into_saved()
  }

  async fn unsave_event(&self, user_id: Uuid, event_id: Uuid) -> Result<bool> {
    let user_str  = encode_uuid(user_id);
    let event_str = encode_uuid(event_id);

    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM user_saved_events WHERE user_id = ?1 AND event_id = ?2",
          params![user_str, event_str],
        )?)
      })
      .await?;
    Ok(deleted > 0)
  }

  async fn list_saved_events(&self, user_id: Uuid) -> Result<Vec<SavedEvent>> {
    let user_str = encode_uuid(user_id);

    let raws: Vec<RawSaved> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {SAVED_COLUMNS} FROM user_saved_events
           WHERE user_id = ?1
           ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt
          .query_map(params![user_str], RawSaved::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSaved::into_saved).collect()
  }

  // ── Analytics (append-only) ──────────────────────────────────────────────

  async fn record_analytics(&self, input: NewAnalyticsEvent) -> Result<AnalyticsEvent> {
    let user_str   = input.user_id.map(encode_uuid);
    let event_str  = input.event_id.map(encode_uuid);
    let props_str  = encode_properties(&input.properties)?;
    let event_type = input.event_type;

    let raw: RawAnalytics = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          &format!(
            "INSERT INTO analytics_events (user_id, event_type, event_id, properties)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING {ANALYTICS_COLUMNS}"
          ),
          params![user_str, event_type, event_str, props_str],
          RawAnalytics::from_row,
        )?)
      })
      .await?;

    raw.into_analytics()
  }

  async fn list_analytics(&self, query: &AnalyticsQuery) -> Result<Vec<AnalyticsEvent>> {
    let user_str   = query.user_id.map(encode_uuid);
    let event_type = query.event_type.clone();
    let event_str  = query.event_id.map(encode_uuid);
    let limit_val  = query.limit.unwrap_or(100) as i64;

    let raws: Vec<RawAnalytics> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {ANALYTICS_COLUMNS} FROM analytics_events
           WHERE (?1 IS NULL OR user_id = ?1)
             AND (?2 IS NULL OR event_type = ?2)
             AND (?3 IS NULL OR event_id = ?3)
           ORDER BY timestamp DESC, rowid DESC
           LIMIT ?4"
        ))?;
        let rows = stmt
          .query_map(
            params![user_str, event_type, event_str, limit_val],
            RawAnalytics::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAnalytics::into_analytics).collect()
  }
}
