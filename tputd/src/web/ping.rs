use crate::clock::{server_time_iso, unix_now};
use crate::stats::{TestStats, Transport};
use axum::{Extension, Json};
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
pub struct Pong {
    pub status: &'static str,
    pub timestamp: f64,
    pub server_time: String,
}

/// Latency probe. No processing beyond stamping the clock, so the
/// response time is as close to pure path latency as HTTP gets.
pub async fn ping(Extension(stats): Extension<Arc<TestStats>>) -> Json<Pong> {
    let _session = stats.begin_session(Transport::Web, None);
    Json(Pong {
        status: "pong",
        timestamp: unix_now(),
        server_time: server_time_iso(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ping_stamps_the_clock() {
        let stats = Arc::new(TestStats::new());
        let Json(pong) = ping(Extension(stats.clone())).await;
        assert_eq!(pong.status, "pong");
        assert!(pong.timestamp > 1_600_000_000.0);
        assert!(!pong.server_time.is_empty());
        let snap = stats.snapshot();
        assert_eq!(snap.web_connections, 1);
        assert_eq!(snap.active_connections, 0);
    }
}
