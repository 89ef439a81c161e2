//! Purpose: Provide the `kvitd` HTTP/JSON read server.
//! Exports: `ServeConfig`, `serve`, `router`, `init_tracing`.
//! Role: Axum server exposing `list-keys` and `get` over one shared SQLite store.
//! Invariants: Success bodies are JSON arrays of strings; failures are plain text.
//! Invariants: Internal errors map to 500, wrong methods to 405.
//! Notes: No authentication or TLS; non-loopback binds are allowed but logged.

use axum::extract::{Path as AxumPath, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use std::future::IntoFuture;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::{Error, ErrorKind, LocalClient, SqliteStore, Store, split_key, values};

#[derive(Clone, Debug)]
pub struct ServeConfig {
    pub bind: SocketAddr,
    pub db_path: PathBuf,
}

struct AppState {
    store: Arc<dyn Store>,
}

pub async fn serve(config: ServeConfig) -> Result<(), Error> {
    init_tracing("info");

    if !is_loopback(config.bind.ip()) {
        warn!(
            bind = %config.bind,
            "listening on a non-loopback address; data is served unencrypted and unauthenticated"
        );
    }

    let store: Arc<SqliteStore> = Arc::new(
        LocalClient::new()
            .with_db_path(&config.db_path)
            .open_store()?,
    );
    let app = router(store.clone());

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to bind server")
                .with_source(err)
        })?;
    info!(bind = %config.bind, db = %config.db_path.display(), "kvitd listening");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            result.map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("server failed")
                    .with_source(err)
            })?;
        }
        _ = shutdown_signal() => {
            info!("shutting down");
            let _ = shutdown_tx.send(());
            match tokio::time::timeout(Duration::from_secs(10), &mut server).await {
                Ok(result) => result.map_err(|err| {
                    Error::new(ErrorKind::Io)
                        .with_message("server failed")
                        .with_source(err)
                })?,
                Err(_) => {
                    return Err(Error::new(ErrorKind::Io).with_message("server shutdown timed out"));
                }
            }
        }
    };
    store.close()
}

/// Routes over any store. Methods other than GET get axum's 405.
pub fn router(store: Arc<dyn Store>) -> Router {
    let state = Arc::new(AppState { store });
    Router::new()
        .route("/healthz", get(healthz))
        .route("/list-keys", get(list_keys))
        .route("/get/", get(get_empty_key))
        .route("/get/*key", get(get_values))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Installs the fmt subscriber once, honoring `RUST_LOG` over `default_level`.
pub fn init_tracing(default_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn is_loopback(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(addr) => addr.is_loopback(),
        IpAddr::V6(addr) => addr.is_loopback(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    #[cfg(not(unix))]
    ctrl_c.await;
}

async fn healthz() -> Response {
    Json(json!({ "ok": true })).into_response()
}

async fn list_keys(State(state): State<Arc<AppState>>) -> Response {
    with_store(state, |store| values::list_keys(store)).await
}

async fn get_values(
    State(state): State<Arc<AppState>>,
    AxumPath(key): AxumPath<String>,
) -> Response {
    with_store(state, move |store| {
        let (bucket, subkey) = split_key(&key);
        values::get(store, bucket, subkey)
    })
    .await
}

// The catch-all route never matches an empty key.
async fn get_empty_key(State(state): State<Arc<AppState>>) -> Response {
    with_store(state, |store| values::get(store, "", "")).await
}

/// Runs a store operation off the async workers and renders it as JSON.
async fn with_store<T, F>(state: Arc<AppState>, op: F) -> Response
where
    T: Serialize + Send + 'static,
    F: FnOnce(&dyn Store) -> Result<T, Error> + Send + 'static,
{
    match tokio::task::spawn_blocking(move || op(state.store.as_ref())).await {
        Ok(Ok(value)) => Json(value).into_response(),
        Ok(Err(err)) => error_response(err),
        Err(err) => error_response(
            Error::new(ErrorKind::Internal)
                .with_message("store task failed")
                .with_source(err),
        ),
    }
}

fn error_response(err: Error) -> Response {
    warn!(error = %err, "request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
}
