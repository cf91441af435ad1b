//! HTTP surface (C13): router wiring, admission control, the rebuild-gate
//! middleware, and the background rebuild scheduler (C11).

pub mod dto;
pub mod error;
pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{http::StatusCode, Json, Router};
use tower::limit::ConcurrencyLimitLayer;
use tracing::info;

use crate::config::Config;
use crate::engine::Engine;

/// Rejects requests with 400 while a rebuild (C11) is swapping the index —
/// readers would otherwise observe a half-built `IndexData`.
async fn rebuild_gate_middleware(
    State(engine): State<Arc<Engine>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if engine.is_rebuilding() {
        return (StatusCode::BAD_REQUEST, Json(serde_json::json!({}))).into_response();
    }
    next.run(req).await
}

pub fn create_router(engine: Arc<Engine>, admission_limit: usize) -> Router {
    Router::new()
        .route("/accounts/filter/", get(handlers::filter_accounts))
        .route("/accounts/group/", get(handlers::group_accounts))
        .route("/accounts/:id/recommend/", get(handlers::recommend_accounts))
        .route("/accounts/:id/suggest/", get(handlers::suggest_accounts))
        .route("/accounts/new/", post(handlers::create_account))
        .route("/accounts/likes/", post(handlers::likes_batch))
        .route("/accounts/:id/", post(handlers::update_account))
        .layer(middleware::from_fn_with_state(
            engine.clone(),
            rebuild_gate_middleware,
        ))
        .layer(ConcurrencyLimitLayer::new(admission_limit))
        .with_state(engine)
}

/// Polls `engine.due_for_rebuild` and fires `run_rebuild` once the write
/// stream has gone quiet for the configured window (C11). Cancelled via the
/// shutdown watch channel so it doesn't outlive the server.
fn spawn_rebuild_scheduler(
    engine: Arc<Engine>,
    window: Duration,
    mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(200));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if engine.due_for_rebuild(window) {
                        let start = Instant::now();
                        engine.run_rebuild();
                        info!(elapsed_ms = start.elapsed().as_millis() as u64, "rebuild_complete");
                    }
                }
                _ = shutdown_rx.changed() => {
                    info!("rebuild_scheduler_shutdown");
                    break;
                }
            }
        }
    });
}

/// Starts the HTTP server with graceful shutdown support.
///
/// Listens for SIGINT (ctrl-c) and SIGTERM. On shutdown: stops accepting
/// connections and cancels the background rebuild scheduler.
pub async fn start_http_server(
    engine: Arc<Engine>,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = create_router(engine.clone(), config.server.admission_limit);

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    spawn_rebuild_scheduler(engine, config.server.rebuild_window(), shutdown_rx);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!(%addr, "http_server_listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    Ok(())
}

/// Wait for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { info!("received SIGINT, shutting down"); }
        _ = terminate => { info!("received SIGTERM, shutting down"); }
    }
}
