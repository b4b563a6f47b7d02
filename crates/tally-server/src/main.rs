//! tally-server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens the
//! SQLite store, starts the publish scheduler, and serves the JSON API over
//! HTTP.
//!
//! # Bootstrapping a user
//!
//! ```
//! cargo run -p tally-server -- --add-user admin
//! ```
//!
//! The password is read from stdin.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use tally_core::store::SurveyStore as _;
use tally_server::{AppState, ServerConfig, auth::hash_password, scheduler::PublishScheduler};
use tally_store_sqlite::SqliteStore;
use tokio::{net::TcpListener, sync::watch};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Tally survey server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Create a management user (password read from stdin) and exit.
  #[arg(long, value_name = "USERNAME")]
  add_user: Option<String>,
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
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("TALLY"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  anyhow::ensure!(
    server_cfg.publish_interval_secs > 0,
    "publish_interval_secs must be greater than zero"
  );

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?
    .with_answer_policy(server_cfg.answer_policy);
  tracing::info!(path = ?store_path, policy = ?store.answer_policy(), "opened store");

  // Helper mode: create a user and exit.
  if let Some(username) = cli.add_user {
    let password = read_password()?;
    anyhow::ensure!(!password.is_empty(), "password must not be empty");
    let hash = hash_password(&password)?;
    let user = store
      .create_user(username, hash)
      .await
      .context("failed to create user")?;
    println!("created user {} (id {})", user.username, user.user_id);
    return Ok(());
  }

  let store = Arc::new(store);

  let (shutdown_tx, shutdown_rx) = watch::channel(false);
  let scheduler = tokio::spawn(
    PublishScheduler::new(store.clone(), server_cfg.publish_interval()).run(shutdown_rx),
  );

  let app = tally_server::router(AppState { store });
  let address = server_cfg.address();

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  shutdown_tx.send(true).ok();
  scheduler.await.context("publish scheduler panicked")?;

  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(error = %e, "failed to listen for ctrl-c");
    std::future::pending::<()>().await;
  }
  tracing::info!("shutting down");
}

/// Read a password from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  let stdin = io::stdin();
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  stdin.lock().read_line(&mut line)?;
  Ok(
    line
      .trim_end_matches('\n')
      .trim_end_matches('\r')
      .to_string(),
  )
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
