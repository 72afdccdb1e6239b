//! Runtime counters, logged on a fixed cadence and surfaced on `/status`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::info;

/// How often the summary line is considered for logging.
const SUMMARY_INTERVAL: Duration = Duration::from_secs(10);

/// Counter registry shared across rooms and connections.
#[derive(Debug)]
pub struct Metrics {
    /// Room broadcasts performed (one per non-idle tick per room).
    pub broadcasts: AtomicU64,
    /// Bounds/speed move rejections.
    pub violations: AtomicU64,
    /// Inbound frames received, malformed ones included.
    pub frames_received: AtomicU64,
    /// Outbound messages queued to clients.
    pub messages_sent: AtomicU64,
    /// Currently open WebSocket connections.
    pub connections_active: AtomicU64,
    /// Pickups consumed since start.
    pub pickups_collected: AtomicU64,
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            broadcasts: AtomicU64::new(0),
            violations: AtomicU64::new(0),
            frames_received: AtomicU64::new(0),
            messages_sent: AtomicU64::new(0),
            connections_active: AtomicU64::new(0),
            pickups_collected: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            broadcasts: self.broadcasts.load(Ordering::Relaxed),
            violations: self.violations.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            pickups_collected: self.pickups_collected.load(Ordering::Relaxed),
            uptime_seconds: self.uptime_seconds(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time counter values for the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub broadcasts: u64,
    pub violations: u64,
    pub frames_received: u64,
    pub messages_sent: u64,
    pub connections_active: u64,
    pub pickups_collected: u64,
    pub uptime_seconds: u64,
}

/// Log a summary line every 10 seconds while there is traffic. Quiet servers
/// stay quiet.
pub fn spawn_summary_task(metrics: Arc<Metrics>) {
    tokio::spawn(async move {
        let mut last_broadcasts = 0u64;
        let mut last_violations = 0u64;
        let mut ticker = tokio::time::interval(SUMMARY_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;

            let broadcasts = metrics.broadcasts.load(Ordering::Relaxed);
            let violations = metrics.violations.load(Ordering::Relaxed);
            let new_broadcasts = broadcasts - last_broadcasts;
            let new_violations = violations - last_violations;

            if new_broadcasts > 0 || new_violations > 0 {
                info!(
                    "broadcast rate {:.1} Hz | violations +{} | connections {}",
                    new_broadcasts as f64 / SUMMARY_INTERVAL.as_secs_f64(),
                    new_violations,
                    metrics.connections_active.load(Ordering::Relaxed),
                );
            }
            last_broadcasts = broadcasts;
            last_violations = violations;
        }
    });
}
