//! warden-server binary.
//!
//! Reads `warden.toml` (or the path given with `--config`) layered under
//! `WARDEN_*` environment variables, opens the SQLite store and serves the
//! API over HTTP.
//!
//! # Development tokens
//!
//! To mint a bearer token for an existing user:
//!
//! ```text
//! cargo run -p warden-api --bin warden-server -- --issue-token <USER_ID> --role lecturer
//! ```

use std::{
  net::SocketAddr,
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::Context as _;
use chrono::{TimeDelta, Utc};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;
use warden_api::{AppState, ServerConfig, credential::TokenIssuer};
use warden_store_sqlite::SqliteStore;

#[derive(Parser)]
#[command(author, version, about = "Warden authorization server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "warden.toml")]
  config: PathBuf,

  /// Print a signed bearer token for this user id and exit.
  #[arg(long, value_name = "USER_ID")]
  issue_token: Option<Uuid>,

  /// Role claim to embed in the issued token.
  #[arg(long, requires = "issue_token")]
  role: Option<String>,

  /// Lifetime of the issued token, in minutes.
  #[arg(long, default_value_t = 60)]
  ttl_minutes: i64,
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

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config.clone()).required(false))
    .add_source(
      config::Environment::with_prefix("WARDEN")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true),
    )
    .build()
    .context("failed to read configuration")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;
  anyhow::ensure!(!server_cfg.jwt_secret.is_empty(), "jwt_secret must not be empty");
  anyhow::ensure!(server_cfg.rate_limit.window_secs > 0, "rate_limit.window_secs must be positive");

  // Helper mode: mint a token and exit.
  if let Some(user_id) = cli.issue_token {
    let token = TokenIssuer::new(&server_cfg.jwt_secret, TimeDelta::minutes(cli.ttl_minutes))
      .issue(user_id, cli.role.as_deref())
      .context("failed to sign token")?;
    println!("{token}");
    return Ok(());
  }

  let store_path = expand_tilde(&server_cfg.store_path);
  if let Some(parent) = store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }

  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let (state, activity_worker) = AppState::new(store, server_cfg.clone());

  // Forget idle rate windows periodically.
  let limiter = Arc::clone(&state.limiter);
  let every = Duration::from_secs(server_cfg.rate_limit.sweep_interval_secs.max(1));
  let sweeper = tokio::spawn(async move {
    let mut ticker = tokio::time::interval(every);
    loop {
      ticker.tick().await;
      limiter.sweep(Utc::now()).await;
    }
  });

  let app = warden_api::router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  sweeper.abort();
  if let Err(e) = activity_worker.await {
    tracing::warn!(error = %e, "activity worker ended abnormally");
  }
  tracing::info!("shut down");

  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::warn!(error = %e, "failed to listen for ctrl-c");
    std::future::pending::<()>().await;
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
