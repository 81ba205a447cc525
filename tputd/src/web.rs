//! HTTP front end. Exposes the same test operations as the stream
//! transport, plus the stats snapshot, behind permissive CORS so
//! browser-based test pages can call it from anywhere.

mod ping;
mod server_stats;

use crate::stats::TestStats;
use anyhow::Result;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Extension, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tput_config::Config;
use tracing::info;

/// Launches the axum webserver on an already-bound listener. TLS, if
/// any, is the caller's business: hand this function a listener that
/// is already fronted or wrapped appropriately.
pub async fn spawn_webserver(
    listener: TcpListener,
    config: Arc<Config>,
    stats: Arc<TestStats>,
) -> Result<()> {
    info!("Webserver listening on: [{}]", listener.local_addr()?);
    axum::serve(listener, router(config, stats)).await?;
    Ok(())
}

/// Builds the route table. Separated from the serve loop so tests
/// can exercise the router without a socket.
pub(crate) fn router(config: Arc<Config>, stats: Arc<TestStats>) -> Router {
    Router::new()
        .route(
            "/",
            get(download_test::download_test).post(post_tests::post_test),
        )
        .route("/test", get(download_test::download_test))
        .route("/ping", get(ping::ping))
        .route("/stats", get(server_stats::server_stats))
        .fallback(not_found)
        .layer(Extension(config))
        .layer(Extension(stats))
        .layer(CorsLayer::very_permissive())
}

async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not Found")
}
