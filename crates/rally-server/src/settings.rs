//! Runtime configuration: an optional TOML file layered under `RALLY_*`
//! environment variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Deserialize;

/// Longest accepted token lifetime (ten years).
const MAX_TOKEN_TTL_HOURS: i64 = 10 * 366 * 24;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host:            String,
  pub port:            u16,
  pub database_path:   PathBuf,
  /// HS256 secret for bearer tokens. Required.
  pub jwt_secret:      String,
  pub token_ttl_hours: i64,
  pub rate_limit:      RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
  pub max_requests: u32,
  pub window_secs:  u64,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:            "127.0.0.1".to_owned(),
      port:            3000,
      database_path:   PathBuf::from("rally.db"),
      jwt_secret:      String::new(),
      token_ttl_hours: 24,
      rate_limit:      RateLimitConfig::default(),
    }
  }
}

impl Default for RateLimitConfig {
  fn default() -> Self { Self { max_requests: 100, window_secs: 60 } }
}

impl ServerConfig {
  /// Read `path` (if it exists) and `RALLY_*` variables. Nested keys use a
  /// double underscore, e.g. `RALLY_RATE_LIMIT__MAX_REQUESTS`.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("RALLY")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()
      .context("failed to read config file")?;

    let cfg: Self = settings
      .try_deserialize()
      .context("failed to deserialise ServerConfig")?;
    cfg.validate()?;
    Ok(cfg)
  }

  fn validate(&self) -> anyhow::Result<()> {
    anyhow::ensure!(
      !self.jwt_secret.is_empty(),
      "jwt_secret must be set (config file or RALLY_JWT_SECRET)"
    );
    anyhow::ensure!(
      (1..=MAX_TOKEN_TTL_HOURS).contains(&self.token_ttl_hours),
      "token_ttl_hours must be between 1 and {MAX_TOKEN_TTL_HOURS}"
    );
    anyhow::ensure!(self.rate_limit.window_secs > 0, "rate_limit.window_secs must be positive");
    Ok(())
  }

  /// Bearer token lifetime.
  pub fn token_ttl(&self) -> anyhow::Result<chrono::Duration> {
    chrono::Duration::try_hours(self.token_ttl_hours)
      .with_context(|| format!("token_ttl_hours out of range: {}", self.token_ttl_hours))
  }

  /// `database_path` with a leading `~` expanded to the home directory.
  pub fn database_path(&self) -> PathBuf {
    let s = self.database_path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/")
      && let Ok(home) = std::env::var("HOME")
    {
      return PathBuf::from(home).join(rest);
    }
    self.database_path.clone()
  }
}
