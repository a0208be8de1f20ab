//! Versioned schema migrations for the Rally SQLite store.
//!
//! The applied version lives in `PRAGMA user_version`. Migrations run in
//! ascending order on the way up and descending order on the way down, one
//! transaction each; a failure rolls back that migration only and leaves
//! `user_version` at the last one that committed.
//!
//! Foreign-key enforcement is suspended while a migration runs (it is a no-op
//! inside a transaction anyway) so that tables can be rebuilt without
//! triggering cascades. `PRAGMA foreign_key_check` must come back clean before
//! the migration commits.

use rusqlite::{Connection, Transaction};

use crate::{Error, Result};

/// A random RFC 4122 version-4 UUID, generated by SQLite on insert.
macro_rules! uuid_default {
  () => {
    "(lower(hex(randomblob(4)) || '-' || hex(randomblob(2)) || '-4' || \
     substr(hex(randomblob(2)), 2) || '-' || substr('89AB', 1 + (random() & 3), 1) || \
     substr(hex(randomblob(2)), 2) || '-' || hex(randomblob(6))))"
  };
}

/// Insertion time as RFC 3339 UTC with millisecond precision.
macro_rules! now_default {
  () => {
    "(strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))"
  };
}

/// One schema step. `down` must undo exactly what `up` does.
#[derive(Debug)]
pub struct Migration {
  pub version: i64,
  pub name:    &'static str,
  up_sql:      &'static str,
  down_sql:    &'static str,
}

impl Migration {
  pub fn up(&self, tx: &Transaction<'_>) -> rusqlite::Result<()> {
    tx.execute_batch(self.up_sql)
  }

  pub fn down(&self, tx: &Transaction<'_>) -> rusqlite::Result<()> {
    tx.execute_batch(self.down_sql)
  }
}

/// Every migration, in strictly increasing version order.
pub const MIGRATIONS: &[Migration] = &[
  Migration {
    version:  1,
    name:     "create_users_venues_events",
    up_sql:   concat!(
      "CREATE TABLE users (
         id         TEXT PRIMARY KEY NOT NULL DEFAULT ", uuid_default!(), ",
         email      TEXT NOT NULL UNIQUE,
         name       TEXT NOT NULL,
         phone      TEXT,
         created_at TEXT NOT NULL DEFAULT ", now_default!(), ",
         updated_at TEXT NOT NULL DEFAULT ", now_default!(), "
       );

       CREATE TABLE venues (
         id         TEXT PRIMARY KEY NOT NULL DEFAULT ", uuid_default!(), ",
         name       TEXT NOT NULL,
         address    TEXT,
         city       TEXT,
         latitude   REAL,
         longitude  REAL,
         created_at TEXT NOT NULL DEFAULT ", now_default!(), ",
         updated_at TEXT NOT NULL DEFAULT ", now_default!(), "
       );

       CREATE TABLE events (
         id          TEXT PRIMARY KEY NOT NULL DEFAULT ", uuid_default!(), ",
         venue_id    TEXT NOT NULL REFERENCES venues(id) ON DELETE CASCADE,
         title       TEXT NOT NULL,
         description TEXT,
         category    TEXT,
         starts_at   TEXT NOT NULL,
         ends_at     TEXT,
         created_at  TEXT NOT NULL DEFAULT ", now_default!(), ",
         updated_at  TEXT NOT NULL DEFAULT ", now_default!(), "
       );

       CREATE INDEX events_venue_id_idx  ON events(venue_id);
       CREATE INDEX events_starts_at_idx ON events(starts_at);"
    ),
    down_sql: "DROP TABLE events;
               DROP TABLE venues;
               DROP TABLE users;",
  },
  Migration {
    version:  2,
    name:     "add_users_phone_privacy",
    up_sql:   "ALTER TABLE users ADD COLUMN phone_privacy INTEGER DEFAULT 0;",
    down_sql: "ALTER TABLE users DROP COLUMN phone_privacy;",
  },
  // A column that carries a foreign key cannot be dropped in place, so the
  // reverse step rebuilds `venues` in its version-1 shape.
  Migration {
    version:  3,
    name:     "add_venues_user_id",
    up_sql:   "ALTER TABLE venues ADD COLUMN user_id TEXT REFERENCES users(id) ON DELETE CASCADE;
               CREATE INDEX venues_user_id_idx ON venues(user_id);",
    down_sql: concat!(
      "DROP INDEX venues_user_id_idx;

       CREATE TABLE venues_rebuild (
         id         TEXT PRIMARY KEY NOT NULL DEFAULT ", uuid_default!(), ",
         name       TEXT NOT NULL,
         address    TEXT,
         city       TEXT,
         latitude   REAL,
         longitude  REAL,
         created_at TEXT NOT NULL DEFAULT ", now_default!(), ",
         updated_at TEXT NOT NULL DEFAULT ", now_default!(), "
       );

       INSERT INTO venues_rebuild
         (id, name, address, city, latitude, longitude, created_at, updated_at)
       SELECT id, name, address, city, latitude, longitude, created_at, updated_at
       FROM venues;

       DROP TABLE venues;
       ALTER TABLE venues_rebuild RENAME TO venues;"
    ),
  },
  Migration {
    version:  4,
    name:     "create_rsvps",
    up_sql:   concat!(
      "CREATE TABLE rsvps (
         id         TEXT PRIMARY KEY NOT NULL DEFAULT ", uuid_default!(), ",
         user_id    TEXT NOT NULL REFERENCES users(id)  ON DELETE CASCADE,
         event_id   TEXT NOT NULL REFERENCES events(id) ON DELETE CASCADE,
         status     TEXT NOT NULL CHECK (status IN ('going', 'maybe', 'not_going')),
         created_at TEXT NOT NULL DEFAULT ", now_default!(), ",
         updated_at TEXT NOT NULL DEFAULT ", now_default!(), ",
         UNIQUE (user_id, event_id)
       );

       CREATE INDEX rsvps_user_id_idx  ON rsvps(user_id);
       CREATE INDEX rsvps_event_id_idx ON rsvps(event_id);
       CREATE INDEX rsvps_status_idx   ON rsvps(status);"
    ),
    down_sql: "DROP TABLE rsvps;",
  },
  Migration {
    version:  5,
    name:     "create_user_saved_events",
    up_sql:   concat!(
      "CREATE TABLE user_saved_events (
         id         TEXT PRIMARY KEY NOT NULL DEFAULT ", uuid_default!(), ",
         user_id    TEXT NOT NULL REFERENCES users(id)  ON DELETE CASCADE,
         event_id   TEXT NOT NULL REFERENCES events(id) ON DELETE CASCADE,
         created_at TEXT NOT NULL DEFAULT ", now_default!(), ",
         UNIQUE (user_id, event_id)
       );

       CREATE INDEX user_saved_events_user_id_idx  ON user_saved_events(user_id);
       CREATE INDEX user_saved_events_event_id_idx ON user_saved_events(event_id);"
    ),
    down_sql: "DROP TABLE user_saved_events;",
  },
  // Append-only. `event_id` only correlates with a domain event, so the log
  // outlives the events it mentions.
  Migration {
    version:  6,
    name:     "create_analytics_events",
    up_sql:   concat!(
      "CREATE TABLE analytics_events (
         id         TEXT PRIMARY KEY NOT NULL DEFAULT ", uuid_default!(), ",
         user_id    TEXT REFERENCES users(id) ON DELETE CASCADE,
         event_type TEXT NOT NULL,
         event_id   TEXT,
         properties TEXT NOT NULL DEFAULT '{}',
         timestamp  TEXT NOT NULL DEFAULT ", now_default!(), "
       );

       CREATE INDEX analytics_events_user_id_idx    ON analytics_events(user_id);
       CREATE INDEX analytics_events_event_type_idx ON analytics_events(event_type);
       CREATE INDEX analytics_events_event_id_idx   ON analytics_events(event_id);
       CREATE INDEX analytics_events_timestamp_idx  ON analytics_events(timestamp);"
    ),
    down_sql: "DROP TABLE analytics_events;",
  },
];

/// The latest schema version this build knows about.
pub fn latest_version() -> i64 {
  MIGRATIONS.last().map_or(0, |m| m.version)
}

/// The version recorded in the database header.
pub fn current_version(conn: &Connection) -> Result<i64> {
  Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

/// Apply every pending migration up to and including `target` (all of them
/// when `None`). Returns the versions applied, in order.
pub fn migrate_up(conn: &mut Connection, target: Option<i64>) -> Result<Vec<i64>> {
  run_up(conn, MIGRATIONS, target)
}

/// Revert every applied migration above `target`, newest first. Returns the
/// versions reverted, in order.
pub fn migrate_down(conn: &mut Connection, target: i64) -> Result<Vec<i64>> {
  run_down(conn, MIGRATIONS, target)
}

#[derive(Clone, Copy)]
enum Direction {
  Up,
  Down,
}

fn run_up(
  conn:       &mut Connection,
  migrations: &[Migration],
  target:     Option<i64>,
) -> Result<Vec<i64>> {
  let current = current_version(conn)?;
  let mut applied = Vec::new();

  for m in migrations {
    if m.version <= current || target.is_some_and(|t| m.version > t) {
      continue;
    }
    apply(conn, m, m.version, Direction::Up)?;
    tracing::info!(version = m.version, name = m.name, "applied migration");
    applied.push(m.version);
  }

  Ok(applied)
}

fn run_down(
  conn:       &mut Connection,
  migrations: &[Migration],
  target:     i64,
) -> Result<Vec<i64>> {
  let current = current_version(conn)?;
  let mut reverted = Vec::new();

  for (idx, m) in migrations.iter().enumerate().rev() {
    if m.version > current || m.version <= target {
      continue;
    }
    let previous = idx.checked_sub(1).map_or(0, |i| migrations[i].version);
    apply(conn, m, previous, Direction::Down)?;
    tracing::info!(version = m.version, name = m.name, "reverted migration");
    reverted.push(m.version);
  }

  Ok(reverted)
}

/// Run one migration step and record `new_version` in the same transaction.
fn apply(
  conn:        &mut Connection,
  m:           &Migration,
  new_version: i64,
  direction:   Direction,
) -> Result<()> {
  conn.pragma_update(None, "foreign_keys", false)?;
  let outcome = apply_in_transaction(conn, m, new_version, direction);
  conn.pragma_update(None, "foreign_keys", true)?;
  outcome
}

fn apply_in_transaction(
  conn:        &mut Connection,
  m:           &Migration,
  new_version: i64,
  direction:   Direction,
) -> Result<()> {
  let tx = conn.transaction()?;

  match direction {
    Direction::Up => m.up(&tx),
    Direction::Down => m.down(&tx),
  }
  .map_err(|source| Error::Migration { version: m.version, name: m.name, source })?;

  let dangling = {
    let mut stmt = tx.prepare("PRAGMA foreign_key_check")?;
    let rows = stmt.query_map([], |_| Ok(()))?;
    rows.count()
  };
  if dangling > 0 {
    return Err(Error::ForeignKeyCheck { version: m.version, count: dangling });
  }

  tx.pragma_update(None, "user_version", new_version)?;
  tx.commit()?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn conn() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.pragma_update(None, "foreign_keys", true).unwrap();
    conn
  }

  fn tables(conn: &Connection) -> Vec<String> {
    let mut stmt = conn
      .prepare(
        "SELECT name FROM sqlite_master
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
         ORDER BY name",
      )
      .unwrap();
    stmt
      .query_map([], |row| row.get(0))
      .unwrap()
      .collect::<rusqlite::Result<Vec<String>>>()
      .unwrap()
  }

  fn columns(conn: &Connection, table: &str) -> Vec<String> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})")).unwrap();
    stmt
      .query_map([], |row| row.get(1))
      .unwrap()
      .collect::<rusqlite::Result<Vec<String>>>()
      .unwrap()
  }

  #[test]
  fn versions_are_strictly_increasing() {
    assert!(MIGRATIONS.windows(2).all(|w| w[0].version < w[1].version));
    assert_eq!(MIGRATIONS[0].version, 1);
    assert_eq!(latest_version(), 6);
  }

  #[test]
  fn migrate_up_creates_all_tables() {
    let mut c = conn();
    let applied = migrate_up(&mut c, None).unwrap();

    assert_eq!(applied, vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(current_version(&c).unwrap(), 6);
    assert_eq!(tables(&c), [
      "analytics_events",
      "events",
      "rsvps",
      "user_saved_events",
      "users",
      "venues",
    ]);
  }

  #[test]
  fn migrate_up_is_idempotent() {
    let mut c = conn();
    migrate_up(&mut c, None).unwrap();
    assert!(migrate_up(&mut c, None).unwrap().is_empty());
  }

  #[test]
  fn migrate_up_stops_at_target() {
    let mut c = conn();
    assert_eq!(migrate_up(&mut c, Some(3)).unwrap(), vec![1, 2, 3]);
    assert_eq!(current_version(&c).unwrap(), 3);
    assert!(!tables(&c).contains(&"rsvps".to_string()));
  }

  #[test]
  fn migrate_down_reverses_in_descending_order() {
    let mut c = conn();
    migrate_up(&mut c, None).unwrap();

    let reverted = migrate_down(&mut c, 0).unwrap();
    assert_eq!(reverted, vec![6, 5, 4, 3, 2, 1]);
    assert_eq!(current_version(&c).unwrap(), 0);
    assert!(tables(&c).is_empty());
  }

  #[test]
  fn full_round_trip_restores_schema() {
    let mut c = conn();
    migrate_up(&mut c, None).unwrap();
    migrate_down(&mut c, 0).unwrap();
    migrate_up(&mut c, None).unwrap();
    assert_eq!(current_version(&c).unwrap(), 6);
    assert!(columns(&c, "venues").contains(&"user_id".to_string()));
  }

  #[test]
  fn phone_privacy_backfills_existing_rows_with_false() {
    let mut c = conn();
    migrate_up(&mut c, Some(1)).unwrap();
    c.execute("INSERT INTO users (email, name) VALUES ('a@example.com', 'A')", [])
      .unwrap();

    migrate_up(&mut c, Some(2)).unwrap();
    let privacy: bool = c
      .query_row("SELECT phone_privacy FROM users", [], |row| row.get(0))
      .unwrap();
    assert!(!privacy);

    migrate_down(&mut c, 1).unwrap();
    assert!(!columns(&c, "users").contains(&"phone_privacy".to_string()));
  }

  #[test]
  fn venue_ownership_down_keeps_venues_and_their_events() {
    let mut c = conn();
    migrate_up(&mut c, Some(3)).unwrap();
    let venue_id: String = c
      .query_row("INSERT INTO venues (name) VALUES ('Hall') RETURNING id", [], |row| {
        row.get(0)
      })
      .unwrap();
    c.execute(
      "INSERT INTO events (venue_id, title, starts_at) VALUES (?1, 'Gig', '2026-01-01T20:00:00.000Z')",
      [&venue_id],
    )
    .unwrap();

    migrate_down(&mut c, 2).unwrap();

    assert!(!columns(&c, "venues").contains(&"user_id".to_string()));
    let events: i64 = c
      .query_row("SELECT count(*) FROM events WHERE venue_id = ?1", [&venue_id], |row| {
        row.get(0)
      })
      .unwrap();
    assert_eq!(events, 1);
  }

  #[test]
  fn generated_ids_are_v4_uuids() {
    let mut c = conn();
    migrate_up(&mut c, None).unwrap();
    let id: String = c
      .query_row("INSERT INTO venues (name) VALUES ('Hall') RETURNING id", [], |row| {
        row.get(0)
      })
      .unwrap();
    let parsed = uuid::Uuid::parse_str(&id).unwrap();
    assert_eq!(parsed.get_version_num(), 4);
  }

  #[test]
  fn failed_migration_leaves_previous_version() {
    let broken = [
      Migration {
        version:  1,
        name:     "ok",
        up_sql:   "CREATE TABLE a (id INTEGER PRIMARY KEY);",
        down_sql: "DROP TABLE a;",
      },
      Migration {
        version:  2,
        name:     "broken",
        up_sql:   "CREATE TABLE b (id INTEGER PRIMARY KEY); CREATE TABLE a (id INTEGER);",
        down_sql: "DROP TABLE b;",
      },
    ];

    let mut c = conn();
    let err = run_up(&mut c, &broken, None).unwrap_err();

    assert!(matches!(err, Error::Migration { version: 2, .. }));
    assert_eq!(current_version(&c).unwrap(), 1);
    assert_eq!(tables(&c), ["a"]);
  }
}
