use std::collections::VecDeque;

use serde::Serialize;

/// Samples kept per tracker; older fetches fall out of the report.
pub const FETCH_LATENCY_WINDOW: usize = 1_024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LatencyPercentiles {
    pub count: usize,
    pub p50_micros: u64,
    pub p90_micros: u64,
    pub p95_micros: u64,
    pub p99_micros: u64,
    pub max_micros: u64,
}

/// Rolling window of gateway fetch round-trip times, shared by all sessions.
#[derive(Debug, Clone)]
pub struct FetchLatencyMetrics {
    window: VecDeque<u64>,
    capacity: usize,
}

impl Default for FetchLatencyMetrics {
    fn default() -> Self {
        Self::with_window(FETCH_LATENCY_WINDOW)
    }
}

impl FetchLatencyMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_window(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn record_latency_micros(&mut self, latency_micros: u64) {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(latency_micros);
    }

    /// Nearest-rank percentiles over the current window.
    pub fn percentiles(&self) -> Option<LatencyPercentiles> {
        let mut sorted: Vec<u64> = self.window.iter().copied().collect();
        sorted.sort_unstable();
        let max_micros = *sorted.last()?;
        let at = |percentile: usize| {
            let rank = (percentile * sorted.len()).div_ceil(100);
            sorted[rank.saturating_sub(1)]
        };

        Some(LatencyPercentiles {
            count: sorted.len(),
            p50_micros: at(50),
            p90_micros: at(90),
            p95_micros: at(95),
            p99_micros: at(99),
            max_micros,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::FetchLatencyMetrics;

    #[test]
    fn fetch_latency_percentiles_are_reported() {
        let mut metrics = FetchLatencyMetrics::new();

        for micros in [900, 1_200, 1_500, 2_000, 40_000] {
            metrics.record_latency_micros(micros);
        }

        let report = metrics.percentiles().expect("percentiles should exist");

        assert_eq!(report.count, 5);
        assert_eq!(report.p50_micros, 1_500);
        assert_eq!(report.p95_micros, 40_000);
        assert_eq!(report.max_micros, 40_000);
    }

    #[test]
    fn old_samples_leave_the_window() {
        let mut metrics = FetchLatencyMetrics::with_window(3);

        for micros in [90_000, 10, 20, 30] {
            metrics.record_latency_micros(micros);
        }

        let report = metrics.percentiles().unwrap();
        assert_eq!(report.count, 3);
        assert_eq!(report.max_micros, 30);
        assert_eq!(report.p50_micros, 20);
    }

    #[test]
    fn no_fetches_means_no_report() {
        assert!(FetchLatencyMetrics::new().percentiles().is_none());
    }
}
