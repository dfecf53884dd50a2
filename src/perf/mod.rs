/// Performance measurement utilities
/// Scope timers report through `log::debug!`; counters live in `profiling`.
pub mod profiling;

pub use profiling::{CounterSnapshot, FunctionCounters, FUNCTION_COUNTERS};

use std::time::{Duration, Instant};

pub struct PerfTimer {
    name: &'static str,
    start: Instant,
}

impl PerfTimer {
    #[inline]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            start: Instant::now(),
        }
    }

    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for PerfTimer {
    fn drop(&mut self) {
        let elapsed = self.elapsed();
        log::debug!("[PERF] {}: {}μs", self.name, elapsed.as_micros());
    }
}

/// Running min/mean/max over repeated timings of one stage.
#[derive(Debug, Clone, Copy)]
pub struct PerfStats {
    pub samples: u32,
    pub total_us: f64,
    pub min_us: f64,
    pub max_us: f64,
}

impl PerfStats {
    pub fn new() -> Self {
        Self {
            samples: 0,
            total_us: 0.0,
            min_us: f64::INFINITY,
            max_us: 0.0,
        }
    }

    pub fn record(&mut self, elapsed: Duration) {
        let us = elapsed.as_secs_f64() * 1e6;
        self.samples += 1;
        self.total_us += us;
        self.min_us = self.min_us.min(us);
        self.max_us = self.max_us.max(us);
    }

    pub fn mean_us(&self) -> f64 {
        if self.samples == 0 {
            0.0
        } else {
            self.total_us / self.samples as f64
        }
    }

    pub fn log_summary(&self, name: &str) {
        log::info!(
            "{:<14} {:>4} runs  mean {:10.1}μs  min {:10.1}μs  max {:10.1}μs",
            name,
            self.samples,
            self.mean_us(),
            self.min_us,
            self.max_us
        );
    }
}

impl Default for PerfStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Macro for easy performance measurement
#[macro_export]
macro_rules! perf_scope {
    ($name:expr) => {
        let _timer = $crate::perf::PerfTimer::new($name);
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_accumulate() {
        let mut stats = PerfStats::new();
        stats.record(Duration::from_micros(10));
        stats.record(Duration::from_micros(30));
        assert_eq!(stats.samples, 2);
        assert!((stats.mean_us() - 20.0).abs() < 1e-6);
        assert!((stats.min_us - 10.0).abs() < 1e-6);
        assert!((stats.max_us - 30.0).abs() < 1e-6);
    }
}
