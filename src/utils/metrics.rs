//! Observability and Metrics
//!
//! Counters for model activity: requests issued, replies accepted or
//! dropped, transfer outcomes and server traffic.
//!
//! Uses atomic counters so one instance can be shared between models.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Metrics collector for Generic Byte models
#[derive(Debug)]
pub struct Metrics {
    /// Acknowledged Set/Get requests handed to the access layer
    pub reliable_requests: AtomicU64,
    /// Unacknowledged Set frames sent (each repeat counts)
    pub unreliable_sent: AtomicU64,
    /// Status replies reported to the application
    pub replies_accepted: AtomicU64,
    /// Status dropped because the sender is not the publish destination
    pub replies_bad_source: AtomicU64,
    /// Status dropped because the value is outside the valid range
    pub replies_out_of_range: AtomicU64,
    /// Status dropped because no request was waiting for it
    pub replies_unsolicited: AtomicU64,
    /// Reliable transfers that timed out
    pub transfers_timed_out: AtomicU64,
    /// Reliable transfers that were cancelled
    pub transfers_cancelled: AtomicU64,
    /// Set and Set-Unreliable handled by a server
    pub server_sets: AtomicU64,
    /// Get handled by a server
    pub server_gets: AtomicU64,
    /// Status publishes sent by a server
    pub status_published: AtomicU64,
    /// Replies or publishes the access layer refused
    pub send_failures: AtomicU64,
    /// Inbound frames dropped as malformed
    pub malformed_frames: AtomicU64,
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            reliable_requests: AtomicU64::new(0),
            unreliable_sent: AtomicU64::new(0),
            replies_accepted: AtomicU64::new(0),
            replies_bad_source: AtomicU64::new(0),
            replies_out_of_range: AtomicU64::new(0),
            replies_unsolicited: AtomicU64::new(0),
            transfers_timed_out: AtomicU64::new(0),
            transfers_cancelled: AtomicU64::new(0),
            server_sets: AtomicU64::new(0),
            server_gets: AtomicU64::new(0),
            status_published: AtomicU64::new(0),
            send_failures: AtomicU64::new(0),
            malformed_frames: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    #[inline]
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn reliable_request(&self) {
        Self::bump(&self.reliable_requests);
    }

    pub fn unreliable_sent(&self) {
        Self::bump(&self.unreliable_sent);
    }

    pub fn reply_accepted(&self) {
        Self::bump(&self.replies_accepted);
    }

    pub fn reply_bad_source(&self) {
        Self::bump(&self.replies_bad_source);
    }

    pub fn reply_out_of_range(&self) {
        Self::bump(&self.replies_out_of_range);
    }

    pub fn reply_unsolicited(&self) {
        Self::bump(&self.replies_unsolicited);
    }

    pub fn transfer_timed_out(&self) {
        Self::bump(&self.transfers_timed_out);
    }

    pub fn transfer_cancelled(&self) {
        Self::bump(&self.transfers_cancelled);
    }

    pub fn server_set(&self) {
        Self::bump(&self.server_sets);
    }

    pub fn server_get(&self) {
        Self::bump(&self.server_gets);
    }

    pub fn status_published(&self) {
        Self::bump(&self.status_published);
    }

    pub fn send_failure(&self) {
        Self::bump(&self.send_failures);
    }

    pub fn malformed_frame(&self) {
        Self::bump(&self.malformed_frames);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            reliable_requests: self.reliable_requests.load(Ordering::Relaxed),
            unreliable_sent: self.unreliable_sent.load(Ordering::Relaxed),
            replies_accepted: self.replies_accepted.load(Ordering::Relaxed),
            replies_bad_source: self.replies_bad_source.load(Ordering::Relaxed),
            replies_out_of_range: self.replies_out_of_range.load(Ordering::Relaxed),
            replies_unsolicited: self.replies_unsolicited.load(Ordering::Relaxed),
            transfers_timed_out: self.transfers_timed_out.load(Ordering::Relaxed),
            transfers_cancelled: self.transfers_cancelled.load(Ordering::Relaxed),
            server_sets: self.server_sets.load(Ordering::Relaxed),
            server_gets: self.server_gets.load(Ordering::Relaxed),
            status_published: self.status_published.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            malformed_frames: self.malformed_frames.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            reliable_requests = snapshot.reliable_requests,
            unreliable_sent = snapshot.unreliable_sent,
            replies_accepted = snapshot.replies_accepted,
            replies_bad_source = snapshot.replies_bad_source,
            replies_out_of_range = snapshot.replies_out_of_range,
            replies_unsolicited = snapshot.replies_unsolicited,
            transfers_timed_out = snapshot.transfers_timed_out,
            transfers_cancelled = snapshot.transfers_cancelled,
            server_sets = snapshot.server_sets,
            server_gets = snapshot.server_gets,
            status_published = snapshot.status_published,
            send_failures = snapshot.send_failures,
            malformed_frames = snapshot.malformed_frames,
            uptime_seconds = snapshot.uptime_seconds,
            "Model metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub reliable_requests: u64,
    pub unreliable_sent: u64,
    pub replies_accepted: u64,
    pub replies_bad_source: u64,
    pub replies_out_of_range: u64,
    pub replies_unsolicited: u64,
    pub transfers_timed_out: u64,
    pub transfers_cancelled: u64,
    pub server_sets: u64,
    pub server_gets: u64,
    pub status_published: u64,
    pub send_failures: u64,
    pub malformed_frames: u64,
    pub uptime_seconds: u64,
}

impl MetricsSnapshot {
    /// Status messages the client saw but did not report
    pub fn replies_dropped(&self) -> u64 {
        self.replies_bad_source + self.replies_out_of_range + self.replies_unsolicited
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = Metrics::new();
        metrics.reliable_request();
        metrics.reliable_request();
        metrics.reply_accepted();
        metrics.reply_bad_source();
        metrics.reply_out_of_range();
        metrics.transfer_timed_out();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.reliable_requests, 2);
        assert_eq!(snapshot.replies_accepted, 1);
        assert_eq!(snapshot.replies_dropped(), 2);
        assert_eq!(snapshot.transfers_timed_out, 1);
        assert_eq!(snapshot.transfers_cancelled, 0);
    }
}
