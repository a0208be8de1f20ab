//! Fixed-window, per-client request limiter.

use std::{
  net::SocketAddr,
  sync::{Arc, Mutex},
  time::{Duration, Instant},
};

use axum::{
  extract::{ConnectInfo, Request, State},
  middleware::Next,
  response::Response,
};
use dashmap::DashMap;

use crate::error::ApiError;

#[derive(Debug, Clone, Copy)]
struct Window {
  started: Instant,
  used:    u32,
}

/// Allows `max_requests` per client in each `window`.
///
/// Expired windows are dropped at most once per `window`, so idle clients do
/// not accumulate.
pub struct RateLimiter {
  max_requests: u32,
  window:       Duration,
  buckets:      DashMap<String, Window>,
  last_sweep:   Mutex<Instant>,
}

impl RateLimiter {
  pub fn new(max_requests: u32, window: Duration) -> Self {
    Self {
      max_requests,
      window,
      buckets: DashMap::new(),
      last_sweep: Mutex::new(Instant::now()),
    }
  }

  /// Count one request for `key`. On refusal, returns how long until the
  /// window resets.
  pub fn check(&self, key: &str) -> Result<(), Duration> {
    self.check_at(key, Instant::now())
  }

  fn check_at(&self, key: &str, now: Instant) -> Result<(), Duration> {
    self.sweep_at(now);

    let mut entry = self
      .buckets
      .entry(key.to_owned())
      .or_insert(Window { started: now, used: 0 });

    let elapsed = now.saturating_duration_since(entry.started);
    if elapsed >= self.window {
      *entry = Window { started: now, used: 0 };
    }

    if entry.used >= self.max_requests {
      return Err(self.window.saturating_sub(elapsed));
    }
    entry.used += 1;
    Ok(())
  }

  fn sweep_at(&self, now: Instant) {
    // Another request is already sweeping.
    let Ok(mut last) = self.last_sweep.try_lock() else { return };
    if now.saturating_duration_since(*last) < self.window {
      return;
    }
    *last = now;
    drop(last);

    let before = self.buckets.len();
    self
      .buckets
      .retain(|_, w| now.saturating_duration_since(w.started) < self.window);
    let dropped = before.saturating_sub(self.buckets.len());
    tracing::trace!(dropped, "swept rate limit windows");
  }
}

/// Clients are keyed by peer IP when the server exposes it.
fn client_key(req: &Request) -> String {
  req
    .extensions()
    .get::<ConnectInfo<SocketAddr>>()
    .map(|ConnectInfo(addr)| addr.ip().to_string())
    .unwrap_or_else(|| "local".to_owned())
}

/// Middleware: refuse the request with 429 once the client's window is spent.
pub async fn enforce(
  State(limiter): State<Arc<RateLimiter>>,
  req: Request,
  next: Next,
) -> Result<Response, ApiError> {
  limiter
    .check(&client_key(&req))
    .map_err(|retry| ApiError::RateLimited {
      retry_after_secs: retry.as_secs().max(1),
    })?;
  Ok(next.run(req).await)
}
