//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{Duration, Utc};
use rally_core::{
  StoreError, Violation,
  analytics::{AnalyticsQuery, NewAnalyticsEvent},
  event::{Event, EventQuery, NewEvent},
  rsvp::RsvpStatus,
  store::DiscoveryStore,
  user::{NewUser, User, UserPatch},
  venue::{NewVenue, Venue},
};
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

async fn user(s: &SqliteStore, email: &str) -> User {
  s.create_user(NewUser {
    email: email.into(),
    name: email.split('@').next().unwrap_or_default().into(),
    ..Default::default()
  })
  .await
  .unwrap()
}

async fn venue(s: &SqliteStore, owner: Option<Uuid>) -> Venue {
  s.create_venue(NewVenue {
    name: "The Roundhouse".into(),
    city: Some("London".into()),
    user_id: owner,
    ..Default::default()
  })
  .await
  .unwrap()
}

fn new_event(venue_id: Uuid, title: &str, starts_in_days: i64) -> NewEvent {
  NewEvent {
    venue_id,
    title: title.into(),
    description: None,
    category: Some("music".into()),
    starts_at: Utc::now() + Duration::days(starts_in_days),
    ends_at: None,
  }
}

async fn event(s: &SqliteStore, venue_id: Uuid) -> Event {
  s.create_event(new_event(venue_id, "Late show", 7)).await.unwrap()
}

// ─── Schema ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn open_applies_every_migration() {
  let s = store().await;
  assert_eq!(s.schema_version().await.unwrap(), crate::migrations::latest_version());
}

#[tokio::test]
async fn ping_succeeds_until_closed() {
  let s = store().await;
  let clone = s.clone();
  assert!(s.ping().await.is_ok());

  s.close().await.unwrap();
  assert!(clone.ping().await.is_err());
}

// ─── Users ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn phone_privacy_defaults_to_false() {
  let s = store().await;
  let u = user(&s, "ada@example.com").await;
  assert!(!u.phone_privacy);

  let fetched = s.get_user(u.id).await.unwrap().unwrap();
  assert!(!fetched.phone_privacy);
}

#[tokio::test]
async fn ids_and_timestamps_are_generated_by_the_store() {
  let s = store().await;
  let before = Utc::now() - Duration::seconds(1);
  let u = user(&s, "ada@example.com").await;

  assert_eq!(u.id.get_version_num(), 4);
  assert!(u.created_at >= before);
  assert_eq!(u.created_at, u.updated_at);
}

#[tokio::test]
async fn duplicate_email_is_a_unique_violation() {
  let s = store().await;
  user(&s, "ada@example.com").await;

  let err = s
    .create_user(NewUser {
      email: "ada@example.com".into(),
      name: "Other Ada".into(),
      ..Default::default()
    })
    .await
    .unwrap_err();

  assert!(matches!(
    err.violation(),
    Some(Violation::Unique { table, columns }) if table == "users" && columns == "email"
  ));
}

#[tokio::test]
async fn update_user_patches_only_given_fields() {
  let s = store().await;
  let u = s
    .create_user(NewUser {
      email: "ada@example.com".into(),
      name: "Ada".into(),
      phone: Some("555-0100".into()),
      phone_privacy: None,
    })
    .await
    .unwrap();

  let updated = s
    .update_user(u.id, UserPatch { phone_privacy: Some(true), ..Default::default() })
    .await
    .unwrap()
    .unwrap();

  assert!(updated.phone_privacy);
  assert_eq!(updated.name, "Ada");
  assert_eq!(updated.phone.as_deref(), Some("555-0100"));
  assert!(updated.updated_at >= u.updated_at);
}

#[tokio::test]
async fn update_user_sets_and_clears_phone() {
  let s = store().await;
  let u = s
    .create_user(NewUser {
      email: "ada@example.com".into(),
      name: "Ada".into(),
      phone: Some("555-0100".into()),
      phone_privacy: None,
    })
    .await
    .unwrap();

  let changed = s
    .update_user(u.id, UserPatch { phone: Some(Some("555-0199".into())), ..Default::default() })
    .await
    .unwrap()
    .unwrap();
  assert_eq!(changed.phone.as_deref(), Some("555-0199"));

  let cleared = s
    .update_user(u.id, UserPatch { phone: Some(None), ..Default::default() })
    .await
    .unwrap()
    .unwrap();
  assert_eq!(cleared.phone, None);
  assert_eq!(cleared.name, "Ada");
}

#[tokio::test]
async fn update_missing_user_returns_none() {
  let s = store().await;
  let result = s
    .update_user(Uuid::new_v4(), UserPatch { name: Some("x".into()), ..Default::default() })
    .await
    .unwrap();
  assert!(result.is_none());
}

// ─── Venues & events ─────────────────────────────────────────────────────────

#[tokio::test]
async fn list_venues_filters_by_owner() {
  let s = store().await;
  let ada = user(&s, "ada@example.com").await;
  venue(&s, Some(ada.id)).await;
  venue(&s, None).await;

  assert_eq!(s.list_venues(None).await.unwrap().len(), 2);
  let owned = s.list_venues(Some(ada.id)).await.unwrap();
  assert_eq!(owned.len(), 1);
  assert_eq!(owned[0].user_id, Some(ada.id));
}

#[tokio::test]
async fn event_at_unknown_venue_is_a_foreign_key_violation() {
  let s = store().await;
  let err = s
    .create_event(new_event(Uuid::new_v4(), "Nowhere", 1))
    .await
    .unwrap_err();
  assert_eq!(err.violation(), Some(&Violation::ForeignKey));
}

#[tokio::test]
async fn list_events_orders_by_start_and_filters() {
  let s = store().await;
  let v1 = venue(&s, None).await;
  let v2 = venue(&s, None).await;

  let later = s.create_event(new_event(v1.id, "Later", 10)).await.unwrap();
  let sooner = s.create_event(new_event(v1.id, "Sooner", 2)).await.unwrap();
  s.create_event(new_event(v2.id, "Elsewhere", 5)).await.unwrap();

  let at_v1 = s
    .list_events(&EventQuery { venue_id: Some(v1.id), ..Default::default() })
    .await
    .unwrap();
  let ids: Vec<_> = at_v1.iter().map(|e| e.id).collect();
  assert_eq!(ids, [sooner.id, later.id]);

  let page = s
    .list_events(&EventQuery { limit: Some(1), offset: Some(1), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(page.len(), 1);
  assert_eq!(page[0].title, "Elsewhere");
}

// ─── RSVPs ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn rsvp_create_get_update_delete() {
  let s = store().await;
  let u = user(&s, "ada@example.com").await;
  let v = venue(&s, None).await;
  let e = event(&s, v.id).await;

  let rsvp = s.create_rsvp(u.id, e.id, RsvpStatus::Maybe).await.unwrap();
  assert_eq!(rsvp.status, RsvpStatus::Maybe);

  let updated = s
    .update_rsvp(u.id, e.id, RsvpStatus::Going)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(updated.id, rsvp.id);
  assert_eq!(updated.status, RsvpStatus::Going);
  assert_eq!(updated.created_at, rsvp.created_at);

  let fetched = s.get_rsvp(u.id, e.id).await.unwrap().unwrap();
  assert_eq!(fetched.status, RsvpStatus::Going);

  assert!(s.delete_rsvp(u.id, e.id).await.unwrap());
  assert!(!s.delete_rsvp(u.id, e.id).await.unwrap());
  assert!(s.get_rsvp(u.id, e.id).await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_rsvp_is_a_unique_violation() {
  let s = store().await;
  let u = user(&s, "ada@example.com").await;
  let v = venue(&s, None).await;
  let e = event(&s, v.id).await;

  s.create_rsvp(u.id, e.id, RsvpStatus::Going).await.unwrap();
  let err = s.create_rsvp(u.id, e.id, RsvpStatus::NotGoing).await.unwrap_err();

  assert!(matches!(
    err.violation(),
    Some(Violation::Unique { table, columns })
      if table == "rsvps" && columns == "user_id, event_id"
  ));
  let stored = s.get_rsvp(u.id, e.id).await.unwrap().unwrap();
  assert_eq!(stored.status, RsvpStatus::Going);
}

#[tokio::test]
async fn concurrent_rsvps_for_same_pair_commit_exactly_once() {
  let s = store().await;
  let u = user(&s, "ada@example.com").await;
  let v = venue(&s, None).await;
  let e = event(&s, v.id).await;

  let (uid, eid) = (u.id, e.id);
  let (a, b) = (s.clone(), s.clone());
  let (r1, r2) = tokio::join!(
    tokio::spawn(async move { a.create_rsvp(uid, eid, RsvpStatus::Going).await }),
    tokio::spawn(async move { b.create_rsvp(uid, eid, RsvpStatus::Maybe).await }),
  );
  let results = [r1.unwrap(), r2.unwrap()];

  assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
  let err = results.iter().find_map(|r| r.as_ref().err()).unwrap();
  assert!(matches!(err.violation(), Some(Violation::Unique { .. })));
  assert_eq!(s.list_event_rsvps(e.id, None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn rsvp_for_unknown_event_is_a_foreign_key_violation() {
  let s = store().await;
  let u = user(&s, "ada@example.com").await;
  let err = s
    .create_rsvp(u.id, Uuid::new_v4(), RsvpStatus::Going)
    .await
    .unwrap_err();
  assert_eq!(err.violation(), Some(&Violation::ForeignKey));
}

#[tokio::test]
async fn list_event_rsvps_filters_by_status() {
  let s = store().await;
  let v = venue(&s, None).await;
  let e = event(&s, v.id).await;
  for (email, status) in [
    ("a@example.com", RsvpStatus::Going),
    ("b@example.com", RsvpStatus::Going),
    ("c@example.com", RsvpStatus::Maybe),
  ] {
    let u = user(&s, email).await;
    s.create_rsvp(u.id, e.id, status).await.unwrap();
  }

  assert_eq!(s.list_event_rsvps(e.id, None).await.unwrap().len(), 3);
  let going = s
    .list_event_rsvps(e.id, Some(RsvpStatus::Going))
    .await
    .unwrap();
  assert_eq!(going.len(), 2);
  assert!(going.iter().all(|r| r.status == RsvpStatus::Going));
}

// ─── Saved events ────────────────────────────────────────────────────────────

#[tokio::test]
async fn save_and_unsave_event() {
  let s = store().await;
  let u = user(&s, "ada@example.com").await;
  let v = venue(&s, None).await;
  let e = event(&s, v.id).await;

  let saved = s.save_event(u.id, e.id).await.unwrap();
  assert_eq!(saved.event_id, e.id);
  assert_eq!(s.list_saved_events(u.id).await.unwrap(), vec![saved]);

  assert!(s.unsave_event(u.id, e.id).await.unwrap());
  assert!(s.list_saved_events(u.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn concurrent_saves_for_same_pair_commit_exactly_once() {
  let s = store().await;
  let u = user(&s, "ada@example.com").await;
  let v = venue(&s, None).await;
  let e = event(&s, v.id).await;

  let (uid, eid) = (u.id, e.id);
  let (a, b) = (s.clone(), s.clone());
  let (r1, r2) = tokio::join!(
    tokio::spawn(async move { a.save_event(uid, eid).await }),
    tokio::spawn(async move { b.save_event(uid, eid).await }),
  );
  let results = [r1.unwrap(), r2.unwrap()];

  assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
  let err = results.iter().find_map(|r| r.as_ref().err()).unwrap();
  assert!(matches!(
    err.violation(),
    Some(Violation::Unique { table, .. }) if table == "user_saved_events"
  ));
}

// ─── Cascades ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn deleting_user_cascades_to_every_dependent() {
  let s = store().await;
  let ada = user(&s, "ada@example.com").await;
  let bob = user(&s, "bob@example.com").await;

  let ada_venue = venue(&s, Some(ada.id)).await;
  let ada_event = event(&s, ada_venue.id).await;
  let bob_venue = venue(&s, Some(bob.id)).await;
  let bob_event = event(&s, bob_venue.id).await;

  s.create_rsvp(ada.id, bob_event.id, RsvpStatus::Going).await.unwrap();
  s.create_rsvp(bob.id, ada_event.id, RsvpStatus::Maybe).await.unwrap();
  s.save_event(ada.id, bob_event.id).await.unwrap();
  s.save_event(bob.id, ada_event.id).await.unwrap();
  s.record_analytics(NewAnalyticsEvent {
    user_id: Some(ada.id),
    event_type: "event_viewed".into(),
    event_id: Some(bob_event.id),
    ..Default::default()
  })
  .await
  .unwrap();

  assert!(s.delete_user(ada.id).await.unwrap());

  assert!(s.get_user(ada.id).await.unwrap().is_none());
  assert!(s.list_venues(Some(ada.id)).await.unwrap().is_empty());
  assert!(s.get_event(ada_event.id).await.unwrap().is_none());
  assert!(s.list_user_rsvps(ada.id).await.unwrap().is_empty());
  assert!(s.list_saved_events(ada.id).await.unwrap().is_empty());
  let ada_analytics = s
    .list_analytics(&AnalyticsQuery { user_id: Some(ada.id), ..Default::default() })
    .await
    .unwrap();
  assert!(ada_analytics.is_empty());

  // Bob's rows that pointed at Ada's event went with it; the rest survive.
  assert!(s.list_user_rsvps(bob.id).await.unwrap().is_empty());
  assert!(s.list_saved_events(bob.id).await.unwrap().is_empty());
  assert!(s.get_event(bob_event.id).await.unwrap().is_some());

  assert_eq!(s.count_rows("users").await.unwrap(), 1);
  assert_eq!(s.count_rows("venues").await.unwrap(), 1);
  assert_eq!(s.count_rows("events").await.unwrap(), 1);
  assert_eq!(s.count_rows("rsvps").await.unwrap(), 0);
  assert_eq!(s.count_rows("user_saved_events").await.unwrap(), 0);
  assert_eq!(s.count_rows("analytics_events").await.unwrap(), 0);
}

#[tokio::test]
async fn deleting_event_cascades_rsvps_and_saves() {
  let s = store().await;
  let u = user(&s, "ada@example.com").await;
  let v = venue(&s, None).await;
  let doomed = event(&s, v.id).await;
  let kept = event(&s, v.id).await;

  s.create_rsvp(u.id, doomed.id, RsvpStatus::Going).await.unwrap();
  s.create_rsvp(u.id, kept.id, RsvpStatus::Going).await.unwrap();
  s.save_event(u.id, doomed.id).await.unwrap();

  assert!(s.delete_event(doomed.id).await.unwrap());
  assert!(!s.delete_event(doomed.id).await.unwrap());

  assert!(s.list_event_rsvps(doomed.id, None).await.unwrap().is_empty());
  assert!(s.list_saved_events(u.id).await.unwrap().is_empty());
  let remaining = s.list_user_rsvps(u.id).await.unwrap();
  assert_eq!(remaining.len(), 1);
  assert_eq!(remaining[0].event_id, kept.id);
}

// ─── Analytics ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn anonymous_analytics_are_accepted() {
  let s = store().await;
  let mut props = serde_json::Map::new();
  props.insert("query".into(), serde_json::json!("jazz"));

  let rec = s
    .record_analytics(NewAnalyticsEvent {
      event_type: "search".into(),
      properties: props.clone(),
      ..Default::default()
    })
    .await
    .unwrap();

  assert!(rec.user_id.is_none());
  assert_eq!(rec.properties, props);
}

#[tokio::test]
async fn analytics_outlive_the_event_they_mention() {
  let s = store().await;
  let v = venue(&s, None).await;
  let e = event(&s, v.id).await;
  s.record_analytics(NewAnalyticsEvent {
    event_type: "event_viewed".into(),
    event_id: Some(e.id),
    ..Default::default()
  })
  .await
  .unwrap();

  s.delete_event(e.id).await.unwrap();

  let left = s
    .list_analytics(&AnalyticsQuery { event_id: Some(e.id), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(left.len(), 1);
}

#[tokio::test]
async fn list_analytics_is_newest_first_and_filtered() {
  let s = store().await;
  let u = user(&s, "ada@example.com").await;
  for kind in ["search", "event_viewed", "search"] {
    s.record_analytics(NewAnalyticsEvent {
      user_id: Some(u.id),
      event_type: kind.into(),
      ..Default::default()
    })
    .await
    .unwrap();
  }

  let all = s
    .list_analytics(&AnalyticsQuery { user_id: Some(u.id), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(all.len(), 3);
  assert!(all.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));

  let searches = s
    .list_analytics(&AnalyticsQuery {
      user_id: Some(u.id),
      event_type: Some("search".into()),
      limit: Some(1),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(searches.len(), 1);
  assert_eq!(searches[0].event_type, "search");
}

#[tokio::test]
async fn migrate_down_to_zero_removes_everything() {
  let s = store().await;
  user(&s, "ada@example.com").await;

  let reverted = s.migrate_down(0).await.unwrap();
  assert_eq!(reverted, vec![6, 5, 4, 3, 2, 1]);
  assert_eq!(s.schema_version().await.unwrap(), 0);
}
