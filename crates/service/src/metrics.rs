//! Per-command request counters and a bounded latency window.
//!
//! Every sample is mirrored into the prometheus registry
//! ([`crate::observability`]) so `/metrics` and the chat `/stats` reply agree.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::observability::{COMMANDS_TOTAL, COMMAND_DURATION};

pub const DEFAULT_LATENCY_WINDOW: usize = 1000;

/// Shared request metrics. Cloning hands out another handle to the same data.
#[derive(Debug, Clone)]
pub struct RequestMetrics {
    inner: Arc<RequestMetricsInner>,
}

#[derive(Debug)]
struct RequestMetricsInner {
    counts: DashMap<String, AtomicU64>,
    latencies: Mutex<VecDeque<f64>>,
    window: usize,
    started_at: Instant,
}

/// Point-in-time view returned by [`RequestMetrics::snapshot`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub requests_by_command: BTreeMap<String, u64>,
    pub avg_response_time_ms: f64,
    pub uptime_seconds: f64,
}

impl Default for RequestMetrics {
    fn default() -> Self {
        Self::new(DEFAULT_LATENCY_WINDOW)
    }
}

impl RequestMetrics {
    /// Creates a collector keeping the most recent `window` latency samples.
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            inner: Arc::new(RequestMetricsInner {
                counts: DashMap::new(),
                latencies: Mutex::new(VecDeque::with_capacity(window)),
                window,
                started_at: Instant::now(),
            }),
        }
    }

    pub fn window(&self) -> usize {
        self.inner.window
    }

    /// Counts one invocation of `command` and stores its duration.
    pub fn record(&self, command: &str, duration: Duration) {
        match self.inner.counts.get(command) {
            Some(counter) => {
                counter.fetch_add(1, Ordering::Relaxed);
            }
            None => {
                self.inner
                    .counts
                    .entry(command.to_string())
                    .or_insert_with(|| AtomicU64::new(0))
                    .fetch_add(1, Ordering::Relaxed);
            }
        }

        let seconds = duration.as_secs_f64();
        {
            let mut latencies = self.latencies();
            if latencies.len() == self.inner.window {
                latencies.pop_front();
            }
            latencies.push_back(seconds);
        }

        COMMANDS_TOTAL.with_label_values(&[command]).inc();
        COMMAND_DURATION.with_label_values(&[command]).observe(seconds);
    }

    /// Starts a timer that records under `command` when dropped.
    pub fn measure(&self, command: &'static str) -> RequestTimer {
        RequestTimer { metrics: self.clone(), command, started: Instant::now() }
    }

    /// Invocation count for a single command.
    pub fn count(&self, command: &str) -> u64 {
        self.inner
            .counts
            .get(command)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Retained latency samples in seconds, oldest first.
    pub fn recent_latencies(&self) -> Vec<f64> {
        self.latencies().iter().copied().collect()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let requests_by_command: BTreeMap<String, u64> = self
            .inner
            .counts
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().load(Ordering::Relaxed)))
            .collect();
        let total_requests = requests_by_command.values().sum();

        let avg_seconds = {
            let latencies = self.latencies();
            if latencies.is_empty() {
                0.0
            } else {
                latencies.iter().sum::<f64>() / latencies.len() as f64
            }
        };

        MetricsSnapshot {
            total_requests,
            requests_by_command,
            avg_response_time_ms: round2(avg_seconds * 1000.0),
            uptime_seconds: round2(self.inner.started_at.elapsed().as_secs_f64()),
        }
    }

    // A panic while holding the lock leaves the deque structurally intact.
    fn latencies(&self) -> MutexGuard<'_, VecDeque<f64>> {
        self.inner
            .latencies
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Scope guard from [`RequestMetrics::measure`].
#[must_use = "the timer records when dropped; binding it to `_` records immediately"]
pub struct RequestTimer {
    metrics: RequestMetrics,
    command: &'static str,
    started: Instant,
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        self.metrics.record(self.command, self.started.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_keeps_most_recent_samples_in_order() {
        let metrics = RequestMetrics::new(1000);
        for i in 0..10_000u64 {
            metrics.record("get_post", Duration::from_micros(i));
        }
        let latencies = metrics.recent_latencies();
        assert_eq!(latencies.len(), 1000);
        let expected: Vec<f64> = (9_000..10_000u64)
            .map(|i| Duration::from_micros(i).as_secs_f64())
            .collect();
        assert_eq!(latencies, expected);
        assert_eq!(metrics.count("get_post"), 10_000);
    }

    #[test]
    fn snapshot_reports_counts_and_average() {
        let metrics = RequestMetrics::new(10);
        metrics.record("get_post", Duration::from_millis(10));
        metrics.record("get_post", Duration::from_millis(30));
        metrics.record("add_link", Duration::from_millis(20));

        let snap = metrics.snapshot();
        assert_eq!(snap.total_requests, 3);
        assert_eq!(snap.requests_by_command.get("get_post"), Some(&2));
        assert_eq!(snap.requests_by_command.get("add_link"), Some(&1));
        assert_eq!(snap.avg_response_time_ms, 20.0);
        assert!(snap.uptime_seconds >= 0.0);
    }

    #[test]
    fn empty_collector_has_zero_average() {
        let snap = RequestMetrics::default().snapshot();
        assert_eq!(snap.total_requests, 0);
        assert_eq!(snap.avg_response_time_ms, 0.0);
    }

    #[test]
    fn timer_records_on_early_return() {
        fn failing(metrics: &RequestMetrics) -> Result<(), &'static str> {
            let _timer = metrics.measure("stats");
            Err("boom")
        }
        let metrics = RequestMetrics::new(5);
        assert!(failing(&metrics).is_err());
        assert_eq!(metrics.count("stats"), 1);
        assert_eq!(metrics.recent_latencies().len(), 1);
    }

    #[test]
    fn concurrent_recording_keeps_every_count() {
        let metrics = RequestMetrics::new(100);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let m = metrics.clone();
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        m.record("get_post", Duration::from_micros(5));
                        let _ = m.snapshot();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(metrics.count("get_post"), 4000);
        assert_eq!(metrics.recent_latencies().len(), 100);
    }
}
