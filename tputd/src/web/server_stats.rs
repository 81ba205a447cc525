use crate::stats::{StatsSnapshot, TestStats, Transport};
use axum::{Extension, Json};
use std::sync::Arc;

/// Point-in-time counters for dashboards and operators. The request
/// itself counts as a web session, so `active_connections` is at
/// least 1 in its own snapshot.
pub async fn server_stats(Extension(stats): Extension<Arc<TestStats>>) -> Json<StatsSnapshot> {
    let _session = stats.clone().begin_session(Transport::Web, None);
    Json(stats.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn snapshot_reflects_traffic() {
        let stats = Arc::new(TestStats::new());
        stats.add_bytes(512);
        let Json(snap) = server_stats(Extension(stats.clone())).await;
        assert_eq!(snap.total_bytes_sent, 512);
        assert_eq!(snap.active_connections, 1);
        assert_eq!(stats.snapshot().active_connections, 0);
    }
}
