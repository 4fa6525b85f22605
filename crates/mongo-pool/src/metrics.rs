//! Pool lifecycle counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counters updated by the pool.
///
/// Counters use `Relaxed` ordering; a snapshot is not a consistent cut
/// across fields.
#[derive(Debug, Default)]
pub(crate) struct PoolMetrics {
    acquisitions: AtomicU64,
    reused: AtomicU64,
    connections_created: AtomicU64,
    overflow_connections: AtomicU64,
    connect_failures: AtomicU64,
    rejected: AtomicU64,
    connections_closed: AtomicU64,
    close_failures: AtomicU64,
    probes_performed: AtomicU64,
    probes_failed: AtomicU64,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Event {
    Acquired,
    Reused,
    Created,
    Overflow,
    ConnectFailed,
    Rejected,
    Closed,
    CloseFailed,
    Probed,
    ProbeFailed,
}

impl PoolMetrics {
    pub(crate) fn record(&self, event: Event) {
        let counter = match event {
            Event::Acquired => &self.acquisitions,
            Event::Reused => &self.reused,
            Event::Created => &self.connections_created,
            Event::Overflow => &self.overflow_connections,
            Event::ConnectFailed => &self.connect_failures,
            Event::Rejected => &self.rejected,
            Event::Closed => &self.connections_closed,
            Event::CloseFailed => &self.close_failures,
            Event::Probed => &self.probes_performed,
            Event::ProbeFailed => &self.probes_failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> PoolMetricsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        PoolMetricsSnapshot {
            acquisitions: load(&self.acquisitions),
            reused: load(&self.reused),
            connections_created: load(&self.connections_created),
            overflow_connections: load(&self.overflow_connections),
            connect_failures: load(&self.connect_failures),
            rejected: load(&self.rejected),
            connections_closed: load(&self.connections_closed),
            close_failures: load(&self.close_failures),
            probes_performed: load(&self.probes_performed),
            probes_failed: load(&self.probes_failed),
        }
    }
}

/// Point-in-time copy of the pool counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct PoolMetricsSnapshot {
    /// Successful acquires, tracked or overflow.
    pub acquisitions: u64,
    /// Acquires served by an existing idle connection.
    pub reused: u64,
    /// Tracked connections opened.
    pub connections_created: u64,
    /// Untracked connections opened after capacity ran out.
    pub overflow_connections: u64,
    /// Connects that failed or timed out.
    pub connect_failures: u64,
    /// Acquires rejected by the busy-error policy.
    pub rejected: u64,
    /// Sessions closed by release, return, init or close.
    pub connections_closed: u64,
    /// Closes the driver reported as failed.
    pub close_failures: u64,
    /// Liveness probes issued.
    pub probes_performed: u64,
    /// Liveness probes that failed or timed out.
    pub probes_failed: u64,
}

impl PoolMetricsSnapshot {
    /// Fraction of acquires served from an idle connection.
    #[must_use]
    pub fn reuse_rate(&self) -> f64 {
        if self.acquisitions == 0 {
            0.0
        } else {
            self.reused as f64 / self.acquisitions as f64
        }
    }

    /// Fraction of probes that classified a connection as busy.
    #[must_use]
    pub fn probe_failure_rate(&self) -> f64 {
        if self.probes_performed == 0 {
            0.0
        } else {
            self.probes_failed as f64 / self.probes_performed as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_snapshot() {
        let metrics = PoolMetrics::default();
        metrics.record(Event::Acquired);
        metrics.record(Event::Acquired);
        metrics.record(Event::Reused);
        metrics.record(Event::Probed);
        metrics.record(Event::Probed);
        metrics.record(Event::ProbeFailed);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.acquisitions, 2);
        assert_eq!(snapshot.reused, 1);
        assert!((snapshot.reuse_rate() - 0.5).abs() < f64::EPSILON);
        assert!((snapshot.probe_failure_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rates_on_empty_snapshot() {
        let snapshot = PoolMetricsSnapshot::default();
        assert_eq!(snapshot.reuse_rate(), 0.0);
        assert_eq!(snapshot.probe_failure_rate(), 0.0);
    }
}
