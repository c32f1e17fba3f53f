//! Rolling latency and hit-rate statistics over recent resolutions.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::resolver::types::Tier;

pub const DEFAULT_WINDOW: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSample {
    pub timestamp: DateTime<Utc>,
    pub response_time_ms: f64,
    pub command: String,
    pub tier: Tier,
    pub success: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Excellent,
    Good,
    Poor,
    Critical,
}

impl HealthStatus {
    pub fn classify(avg_ms: f64, hit_rate: f64) -> Self {
        if avg_ms < 200.0 && hit_rate > 0.6 {
            HealthStatus::Excellent
        } else if avg_ms < 500.0 && hit_rate > 0.4 {
            HealthStatus::Good
        } else if avg_ms < 1000.0 && hit_rate > 0.2 {
            HealthStatus::Poor
        } else {
            HealthStatus::Critical
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    pub response_time_ms: f64,
    pub average_response_time_ms: f64,
    /// (direct + cached) / successful.
    pub cache_hit_rate: f64,
    pub direct_command_rate: f64,
    pub total_requests: usize,
    pub last_command: String,
    pub status: HealthStatus,
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self {
            response_time_ms: 0.0,
            average_response_time_ms: 0.0,
            cache_hit_rate: 0.0,
            direct_command_rate: 0.0,
            total_requests: 0,
            last_command: String::new(),
            status: HealthStatus::Excellent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedStats {
    pub total_requests: usize,
    pub direct_commands: usize,
    pub cached_requests: usize,
    pub inferred_requests: usize,
    pub average_response_time_ms: f64,
    pub median_response_time_ms: f64,
    pub p95_response_time_ms: f64,
    pub fastest: Option<PerformanceSample>,
    pub slowest: Option<PerformanceSample>,
}

#[derive(Debug)]
struct MonitorState {
    samples: VecDeque<PerformanceSample>,
    current: PerformanceMetrics,
}

/// Bounded window of resolution samples. Only successful samples feed the
/// aggregate figures; failed ones are kept for the historical view.
#[derive(Debug, Clone)]
pub struct PerformanceMonitor {
    state: Arc<Mutex<MonitorState>>,
    capacity: usize,
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl PerformanceMonitor {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(MonitorState {
                samples: VecDeque::with_capacity(capacity),
                current: PerformanceMetrics::default(),
            })),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn record(&self, command: &str, elapsed: Duration, tier: Tier, success: bool) {
        let sample = PerformanceSample {
            timestamp: Utc::now(),
            response_time_ms: elapsed.as_secs_f64() * 1000.0,
            command: command.to_string(),
            tier,
            success,
        };
        let mut state = self.lock();
        state.samples.push_back(sample.clone());
        while state.samples.len() > self.capacity {
            state.samples.pop_front();
        }

        let ok: Vec<&PerformanceSample> = state.samples.iter().filter(|s| s.success).collect();
        if ok.is_empty() {
            return;
        }
        let total = ok.len();
        let average = ok.iter().map(|s| s.response_time_ms).sum::<f64>() / total as f64;
        let hits = ok
            .iter()
            .filter(|s| matches!(s.tier, Tier::Direct | Tier::Cached))
            .count();
        let direct = ok.iter().filter(|s| s.tier == Tier::Direct).count();
        let hit_rate = hits as f64 / total as f64;

        state.current = PerformanceMetrics {
            response_time_ms: sample.response_time_ms,
            average_response_time_ms: average,
            cache_hit_rate: hit_rate,
            direct_command_rate: direct as f64 / total as f64,
            total_requests: total,
            last_command: sample.command,
            status: HealthStatus::classify(average, hit_rate),
        };
    }

    pub fn metrics(&self) -> PerformanceMetrics {
        self.lock().current.clone()
    }

    pub fn detailed_stats(&self) -> DetailedStats {
        let state = self.lock();
        let mut ok: Vec<PerformanceSample> =
            state.samples.iter().filter(|s| s.success).cloned().collect();
        let total = ok.len();
        let count = |tier: Tier| ok.iter().filter(|s| s.tier == tier).count();
        let (direct, cached, inferred) = (count(Tier::Direct), count(Tier::Cached), count(Tier::Inferred));
        if total == 0 {
            return DetailedStats {
                total_requests: 0,
                direct_commands: 0,
                cached_requests: 0,
                inferred_requests: 0,
                average_response_time_ms: 0.0,
                median_response_time_ms: 0.0,
                p95_response_time_ms: 0.0,
                fastest: None,
                slowest: None,
            };
        }

        let average = ok.iter().map(|s| s.response_time_ms).sum::<f64>() / total as f64;
        ok.sort_by(|a, b| a.response_time_ms.total_cmp(&b.response_time_ms));
        let at = |idx: usize| ok[idx.min(total - 1)].response_time_ms;

        DetailedStats {
            total_requests: total,
            direct_commands: direct,
            cached_requests: cached,
            inferred_requests: inferred,
            average_response_time_ms: average,
            median_response_time_ms: at(total / 2),
            p95_response_time_ms: at((total as f64 * 0.95) as usize),
            fastest: ok.first().cloned(),
            slowest: ok.last().cloned(),
        }
    }

    /// Samples newer than `window`, successful or not.
    pub fn historical(&self, window: Duration) -> Vec<PerformanceSample> {
        let cutoff = chrono::Duration::from_std(window)
            .ok()
            .and_then(|w| Utc::now().checked_sub_signed(w));
        self.lock()
            .samples
            .iter()
            .filter(|s| cutoff.map_or(true, |c| s.timestamp > c))
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.samples.clear();
        state.current = PerformanceMetrics::default();
    }
}
