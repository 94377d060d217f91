//! HTTP and media WebSocket listeners.
//!
//! The call signaling endpoint is served on `PORT`, the media stream socket on
//! `PORT + 1`. Both share one [`AppState`].

mod media_stream;
mod signaling;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::Config;
use crate::registry::SessionRegistry;

pub use media_stream::media_stream_handler;
pub use signaling::{health_check, inbound_call};

/// Path the platform opens its media WebSocket on.
pub const MEDIA_STREAM_PATH: &str = "/media-stream";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            registry: Arc::new(SessionRegistry::new()),
        }
    }
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, [(CONTENT_TYPE, "text/plain")], "Not Found")
}

/// `GET /` and `POST /inbound`; anything else is a 404.
pub fn http_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health_check).fallback(not_found))
        .route("/inbound", post(inbound_call).fallback(not_found))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The media stream WebSocket; anything else is a 404.
pub fn media_router(state: AppState) -> Router {
    Router::new()
        .route(MEDIA_STREAM_PATH, get(media_stream_handler).fallback(not_found))
        .fallback(not_found)
        .with_state(state)
}

/// Binds both listeners from `config` and serves until Ctrl-C.
pub async fn run(config: Config) -> Result<()> {
    let media_port = config
        .media_port()
        .ok_or_else(|| anyhow!("PORT {} leaves no room for the media socket", config.port))?;
    let http_addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let media_addr = SocketAddr::from(([0, 0, 0, 0], media_port));

    let http = TcpListener::bind(http_addr)
        .await
        .with_context(|| format!("Failed to bind HTTP listener on {}", http_addr))?;
    let media = TcpListener::bind(media_addr)
        .await
        .with_context(|| format!("Failed to bind media listener on {}", media_addr))?;

    info!("HTTP server running at http://{}", http_addr);
    info!("WebSocket server running at ws://{}{}", media_addr, MEDIA_STREAM_PATH);

    serve(http, media, AppState::new(config), shutdown_signal()).await
}

/// Serves both routers on already bound listeners until `shutdown` resolves
/// or either server fails, then tears down every remaining call.
pub async fn serve<F>(http: TcpListener, media: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown.await;
        let _ = stop_tx.send(true);
    });

    let registry = state.registry.clone();
    let http_app = http_router(state.clone());
    let media_app = media_router(state);
    let http_stop = wait_for_stop(stop_rx.clone());
    let media_stop = wait_for_stop(stop_rx);

    let http_server = async move {
        axum::serve(http, http_app)
            .with_graceful_shutdown(http_stop)
            .await
            .context("HTTP server failed")
    };
    let media_server = async move {
        axum::serve(media, media_app)
            .with_graceful_shutdown(media_stop)
            .await
            .context("media socket server failed")
    };

    let result = tokio::try_join!(http_server, media_server);
    registry.shutdown().await;
    info!("servers stopped");
    result.map(|_| ())
}

async fn wait_for_stop(mut stop: watch::Receiver<bool>) {
    let _ = stop.wait_for(|stop| *stop).await;
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
