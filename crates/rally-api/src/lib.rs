//! JSON REST API for Rally.
//!
//! Exposes an axum [`Router`] backed by any [`DiscoveryStore`]. Every failure
//! leaves through the classifier in [`error`], so clients only ever see the
//! body `{error, details?, timestamp, path}`.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = rally_api::api_router(state);
//! axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
//! ```

pub mod analytics;
pub mod auth;
pub mod error;
pub mod events;
pub mod extract;
pub mod health;
pub mod ratelimit;
pub mod rsvps;
pub mod saved;
pub mod users;
pub mod venues;

use std::sync::Arc;

use axum::{
  Router, middleware,
  routing::{get, post},
};
use rally_core::store::DiscoveryStore;
use tower_http::trace::TraceLayer;

pub use auth::JwtKeys;
pub use error::ApiError;
pub use ratelimit::RateLimiter;

/// Upper bound on `limit` for list endpoints.
pub const MAX_PAGE_SIZE: usize = 100;

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<S: DiscoveryStore> {
  pub store:   Arc<S>,
  pub jwt:     Arc<JwtKeys>,
  pub limiter: Arc<RateLimiter>,
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the fully-layered API router for `state`.
pub fn api_router<S>(state: AppState<S>) -> Router<()>
where
  S: DiscoveryStore + Clone + 'static,
{
  let limiter = state.limiter.clone();

  // Probes must keep answering once a client's budget is spent.
  let unmetered = Router::new().route("/health", get(health::handler::<S>));

  Router::new()
    // Users
    .route("/users", post(users::create::<S>))
    .route(
      "/users/me",
      get(users::get_me::<S>)
        .patch(users::update_me::<S>)
        .delete(users::delete_me::<S>),
    )
    .route("/users/me/rsvps", get(users::my_rsvps::<S>))
    .route("/users/me/saved", get(users::my_saved::<S>))
    .route("/users/{id}", get(users::get_one::<S>))
    // Venues
    .route("/venues", get(venues::list::<S>).post(venues::create::<S>))
    .route("/venues/{id}", get(venues::get_one::<S>).delete(venues::delete_one::<S>))
    // Events
    .route("/events", get(events::list::<S>).post(events::create::<S>))
    .route("/events/{id}", get(events::get_one::<S>).delete(events::delete_one::<S>))
    .route(
      "/events/{id}/rsvp",
      post(rsvps::create::<S>)
        .patch(rsvps::update::<S>)
        .delete(rsvps::delete::<S>),
    )
    .route("/events/{id}/rsvps", get(rsvps::list::<S>))
    .route("/events/{id}/save", post(saved::save::<S>).delete(saved::unsave::<S>))
    // Analytics
    .route("/analytics", get(analytics::list::<S>).post(analytics::record::<S>))
    .fallback(unknown_route)
    .layer(middleware::from_fn_with_state(limiter, ratelimit::enforce))
    .merge(unmetered)
    .with_state(state)
    .layer(middleware::from_fn(error::envelope))
    .layer(TraceLayer::new_for_http())
}

async fn unknown_route() -> ApiError { ApiError::not_found("route") }
