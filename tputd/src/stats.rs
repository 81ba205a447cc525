//! Process-wide traffic counters, shared by every session on both
//! transports.
//!
//! The registry is an explicitly constructed instance handed to each
//! worker as an `Arc`, not a global, so several independent servers
//! can coexist in one process (and in tests). The mutex is held only
//! for the counter update itself, never across I/O.

use serde::Serialize;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::debug;

/// Which front end a session arrived on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transport {
    Stream,
    Web,
}

#[derive(Debug)]
struct StatsInner {
    active_connections: u64,
    total_connections: u64,
    total_bytes_sent: u64,
    stream_connections: u64,
    web_connections: u64,
    start_time: Instant,
}

impl StatsInner {
    fn zeroed() -> Self {
        Self {
            active_connections: 0,
            total_connections: 0,
            total_bytes_sent: 0,
            stream_connections: 0,
            web_connections: 0,
            start_time: Instant::now(),
        }
    }
}

/// Aggregate counters for the lifetime of the server.
pub struct TestStats {
    inner: Mutex<StatsInner>,
}

impl TestStats {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StatsInner::zeroed()),
        }
    }

    /// Opens a session on `transport`, bumping the connection
    /// counters. The returned guard decrements the active count when
    /// dropped, on every exit path.
    pub fn begin_session(
        self: Arc<Self>,
        transport: Transport,
        peer: Option<SocketAddr>,
    ) -> SessionGuard {
        self.increment_connection(transport);
        SessionGuard {
            stats: self,
            transport,
            peer,
            started: Instant::now(),
            bytes: 0,
        }
    }

    pub(crate) fn increment_connection(&self, transport: Transport) {
        let mut inner = lock(&self.inner);
        inner.active_connections += 1;
        inner.total_connections += 1;
        match transport {
            Transport::Stream => inner.stream_connections += 1,
            Transport::Web => inner.web_connections += 1,
        }
    }

    /// Floors at zero: an extra decrement can never drive the active
    /// count negative.
    pub(crate) fn decrement_connection(&self) {
        let mut inner = lock(&self.inner);
        inner.active_connections = inner.active_connections.saturating_sub(1);
    }

    pub fn add_bytes(&self, n: u64) {
        lock(&self.inner).total_bytes_sent += n;
    }

    /// Derives a point-in-time view of the counters, including
    /// uptime and average throughput.
    pub fn snapshot(&self) -> StatsSnapshot {
        let inner = lock(&self.inner);
        let uptime_seconds = inner.start_time.elapsed().as_secs_f64();
        let average_bytes_per_second = if uptime_seconds > 0.0 {
            inner.total_bytes_sent as f64 / uptime_seconds
        } else {
            0.0
        };
        StatsSnapshot {
            active_connections: inner.active_connections,
            total_connections: inner.total_connections,
            total_bytes_sent: inner.total_bytes_sent,
            stream_connections: inner.stream_connections,
            web_connections: inner.web_connections,
            uptime_seconds,
            average_bytes_per_second,
        }
    }

    /// Zeroes every counter and restarts the uptime clock.
    pub fn reset(&self) {
        *lock(&self.inner) = StatsInner::zeroed();
    }
}

impl Default for TestStats {
    fn default() -> Self {
        Self::new()
    }
}

fn lock(inner: &Mutex<StatsInner>) -> std::sync::MutexGuard<'_, StatsInner> {
    // Counter updates can't panic while holding the lock, so a
    // poisoned mutex only means a panicking peer thread; the counters
    // themselves are still coherent.
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// One live session on either transport. Owns the session-scoped
/// bookkeeping: transport kind, peer, start time and bytes moved.
pub struct SessionGuard {
    stats: Arc<TestStats>,
    transport: Transport,
    peer: Option<SocketAddr>,
    started: Instant,
    bytes: u64,
}

impl SessionGuard {
    /// Credits `n` transferred bytes to this session and the
    /// process-wide total.
    pub fn record_bytes(&mut self, n: u64) {
        self.bytes += n;
        self.stats.add_bytes(n);
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.stats.decrement_connection();
        debug!(
            "Session closed: {:?} {:?}, {} bytes in {:?}",
            self.transport,
            self.peer,
            self.bytes,
            self.started.elapsed()
        );
    }
}

/// Immutable view of the registry, served verbatim as `/stats` JSON.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct StatsSnapshot {
    pub active_connections: u64,
    pub total_connections: u64,
    pub total_bytes_sent: u64,
    pub stream_connections: u64,
    pub web_connections: u64,
    pub uptime_seconds: f64,
    pub average_bytes_per_second: f64,
}
