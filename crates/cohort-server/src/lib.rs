//! HTTP server bootstrap for Cohort.
//!
//! Wraps the [`cohort_api`] router with request tracing and serves it until a
//! shutdown signal arrives, giving in-flight requests a bounded grace period.

use std::{
  future::{Future, IntoFuture as _},
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use axum::Router;
use cohort_core::{SegmentService, clock::Clock, store::SegmentStore};
use serde::Deserialize;
use tokio::{net::TcpListener, sync::oneshot};
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `COHORT_*` environment variables.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
  pub host:                  String,
  pub port:                  u16,
  /// SQLite file, or `:memory:` for a throwaway in-memory database.
  pub store_path:            PathBuf,
  pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:                  "127.0.0.1".to_string(),
      port:                  8080,
      store_path:            PathBuf::from("cohort.db"),
      shutdown_timeout_secs: 10,
    }
  }
}

impl ServerConfig {
  pub const IN_MEMORY: &'static str = ":memory:";

  /// Layer the optional TOML file at `path` under `COHORT_*` environment
  /// variables, falling back to the defaults for anything unset.
  pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("COHORT").try_parsing(true))
      .build()?
      .try_deserialize()
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  pub fn is_in_memory(&self) -> bool { self.store_path.as_os_str() == Self::IN_MEMORY }

  pub fn shutdown_timeout(&self) -> Duration { Duration::from_secs(self.shutdown_timeout_secs) }
}

// ─── Application ──────────────────────────────────────────────────────────────

/// The API router with per-request tracing spans.
pub fn app<S, C>(service: Arc<SegmentService<S, C>>) -> Router
where
  S: SegmentStore + 'static,
  C: Clock + 'static,
{
  cohort_api::api_router(service).layer(TraceLayer::new_for_http())
}

/// Serve `app` on `listener` until `signal` resolves, then wait at most
/// `grace` for in-flight requests before giving up on them.
pub async fn serve_until<F>(
  listener: TcpListener,
  app: Router,
  signal: F,
  grace: Duration,
) -> std::io::Result<()>
where
  F: Future<Output = ()> + Send + 'static,
{
  let (started_tx, started_rx) = oneshot::channel();
  let server = axum::serve(listener, app)
    .with_graceful_shutdown(async move {
      signal.await;
      let _ = started_tx.send(());
    })
    .into_future();
  tokio::pin!(server);

  tokio::select! {
    res = &mut server => res,
    Ok(()) = started_rx => {
      tracing::info!("shutting down, waiting up to {grace:?} for in-flight requests");
      match tokio::time::timeout(grace, &mut server).await {
        Ok(res) => res,
        Err(_) => {
          tracing::warn!("shutdown grace period elapsed with requests still in flight");
          Ok(())
        }
      }
    }
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use axum::{
    body::Body,
    http::{Request, StatusCode},
  };
  use cohort_core::memory::MemoryStore;
  use tower::ServiceExt as _;

  use super::*;

  #[test]
  fn missing_config_file_yields_defaults() {
    let cfg = ServerConfig::load(Path::new("/nonexistent/cohort-config.toml")).unwrap();
    assert_eq!(cfg.port, ServerConfig::default().port);
    assert_eq!(cfg.store_path, PathBuf::from("cohort.db"));
    assert_eq!(cfg.shutdown_timeout(), Duration::from_secs(10));
  }

  #[test]
  fn toml_overrides_some_fields() {
    let cfg: ServerConfig = config::Config::builder()
      .add_source(config::File::from_str(
        "port = 9090\nstore_path = \":memory:\"",
        config::FileFormat::Toml,
      ))
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap();
    assert_eq!(cfg.address(), "127.0.0.1:9090");
    assert!(cfg.is_in_memory());
  }

  #[test]
  fn tilde_is_expanded_only_as_prefix() {
    assert_eq!(expand_tilde(Path::new("data/~/x.db")), PathBuf::from("data/~/x.db"));
    if let Ok(home) = std::env::var("HOME") {
      assert_eq!(expand_tilde(Path::new("~/x.db")), PathBuf::from(home).join("x.db"));
    }
  }

  #[tokio::test]
  async fn traced_app_serves_api() {
    let service = Arc::new(SegmentService::new(MemoryStore::new()));
    let resp = app(service)
      .oneshot(Request::builder().uri("/segments").body(Body::empty()).unwrap())
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(serde_json::from_slice::<serde_json::Value>(&bytes).unwrap(), serde_json::json!([]));
  }

  #[tokio::test]
  async fn server_stops_on_signal() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let service = Arc::new(SegmentService::new(MemoryStore::new()));
    let res = tokio::time::timeout(
      Duration::from_secs(5),
      serve_until(listener, app(service), async {}, Duration::from_secs(1)),
    )
    .await;
    assert!(matches!(res, Ok(Ok(()))));
  }
}
