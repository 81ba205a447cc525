mod clock;
mod stats;
mod stream_server;
mod web;

use crate::stats::TestStats;
use anyhow::Result;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing::{error, info, warn};

/// Configure console logging from the RUST_LOG environment variable.
pub fn set_console_logging() -> Result<()> {
    let level = if let Ok(level) = std::env::var("RUST_LOG") {
        match level.to_lowercase().as_str() {
            "trace" => LevelFilter::TRACE,
            "debug" => LevelFilter::DEBUG,
            "info" => LevelFilter::INFO,
            "warn" => LevelFilter::WARN,
            "error" => LevelFilter::ERROR,
            _ => LevelFilter::INFO,
        }
    } else {
        LevelFilter::INFO
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        // Use a more compact, abbreviated log format
        .compact()
        // Display source code file paths
        .with_file(true)
        // Display source code line numbers
        .with_line_number(true)
        .with_thread_ids(false)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    set_console_logging()?;
    info!("Throughput Test Daemon Starting");

    let config = Arc::new(tput_config::load_config()?);
    let stats = Arc::new(TestStats::new());

    // A failed bind is fatal: report which address and get out.
    let stream_listener = bind_or_die(&config.stream_listen).await;
    let web_listener = bind_or_die(&config.web_listen).await;

    let stream_stats = stats.clone();
    tokio::spawn(async move {
        if let Err(e) = stream_server::run(stream_listener, stream_stats).await {
            error!("Stream transport failed: {e:?}");
        }
    });

    let web_config = config.clone();
    let web_stats = stats.clone();
    tokio::spawn(async move {
        if let Err(e) = web::spawn_webserver(web_listener, web_config, web_stats).await {
            error!("Webserver failed: {e:?}");
        }
    });

    tokio::signal::ctrl_c().await?;
    warn!("Terminating on SIGINT");
    let snap = stats.snapshot();
    info!(
        "Served {} connections, {} bytes total",
        snap.total_connections, snap.total_bytes_sent
    );
    Ok(())
}

async fn bind_or_die(address: &str) -> TcpListener {
    match TcpListener::bind(address).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Unable to bind {address}: {e:?}");
            std::process::exit(1);
        }
    }
}
