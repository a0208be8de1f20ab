//! rally-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) plus `RALLY_*`
//! environment variables, opens the SQLite store (migrating it to the latest
//! schema), and serves the REST API over HTTP.
//!
//! # Token issuance
//!
//! Registration and login live outside this service. To mint a bearer token
//! for an existing user id:
//!
//! ```
//! cargo run -p rally-server -- --issue-token <USER_ID>
//! ```

mod settings;

use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context as _;
use clap::Parser;
use rally_api::{AppState, JwtKeys, RateLimiter};
use rally_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use settings::ServerConfig;

#[derive(Parser)]
#[command(author, version, about = "Rally event-discovery API server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print a bearer token for this user id and exit.
  #[arg(long, value_name = "USER_ID")]
  issue_token: Option<Uuid>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let cfg = ServerConfig::load(&cli.config)?;

  let jwt = JwtKeys::new(cfg.jwt_secret.as_bytes(), cfg.token_ttl()?);

  // Helper mode: sign a token and exit.
  if let Some(user_id) = cli.issue_token {
    let token = jwt.issue(user_id).context("failed to sign token")?;
    println!("{token}");
    return Ok(());
  }

  let db_path = cfg.database_path();
  let store = SqliteStore::open(&db_path)
    .await
    .with_context(|| format!("failed to open store at {db_path:?}"))?;
  let version = store.schema_version().await.context("failed to read schema version")?;
  tracing::info!(?db_path, version, "store ready");

  let state = AppState {
    store:   Arc::new(store),
    jwt:     Arc::new(jwt),
    limiter: Arc::new(RateLimiter::new(
      cfg.rate_limit.max_requests,
      Duration::from_secs(cfg.rate_limit.window_secs),
    )),
  };

  let app = rally_api::api_router(state);
  let address = format!("{}:{}", cfg.host, cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(error = %e, "failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  tracing::info!("shutting down");
}
