/// Pipeline event counters.
/// Incremented from hot paths through `count_call!` / `count_add!`, which
/// compile to nothing unless the `profiling` feature is enabled.
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for the pipeline stages.
pub struct FunctionCounters {
    // Geometry
    pub vertices_shaded: AtomicU64,
    pub triangles_submitted: AtomicU64,
    pub triangles_clipped: AtomicU64,
    pub triangles_culled: AtomicU64,
    pub triangles_degenerate: AtomicU64,

    // Rasterization
    pub lines_drawn: AtomicU64,
    pub points_drawn: AtomicU64,
    pub spans: AtomicU64,
    pub affine_spans: AtomicU64,
    pub fragments: AtomicU64,

    // Multisampling
    pub coverage_emits: AtomicU64,
}

impl FunctionCounters {
    pub const fn new() -> Self {
        Self {
            vertices_shaded: AtomicU64::new(0),
            triangles_submitted: AtomicU64::new(0),
            triangles_clipped: AtomicU64::new(0),
            triangles_culled: AtomicU64::new(0),
            triangles_degenerate: AtomicU64::new(0),
            lines_drawn: AtomicU64::new(0),
            points_drawn: AtomicU64::new(0),
            spans: AtomicU64::new(0),
            affine_spans: AtomicU64::new(0),
            fragments: AtomicU64::new(0),
            coverage_emits: AtomicU64::new(0),
        }
    }

    fn all(&self) -> [&AtomicU64; 11] {
        [
            &self.vertices_shaded,
            &self.triangles_submitted,
            &self.triangles_clipped,
            &self.triangles_culled,
            &self.triangles_degenerate,
            &self.lines_drawn,
            &self.points_drawn,
            &self.spans,
            &self.affine_spans,
            &self.fragments,
            &self.coverage_emits,
        ]
    }

    /// Reset all counters to zero
    pub fn reset(&self) {
        for c in self.all() {
            c.store(0, Ordering::Relaxed);
        }
    }

    /// Get snapshot of all counters
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            vertices_shaded: self.vertices_shaded.load(Ordering::Relaxed),
            triangles_submitted: self.triangles_submitted.load(Ordering::Relaxed),
            triangles_clipped: self.triangles_clipped.load(Ordering::Relaxed),
            triangles_culled: self.triangles_culled.load(Ordering::Relaxed),
            triangles_degenerate: self.triangles_degenerate.load(Ordering::Relaxed),
            lines_drawn: self.lines_drawn.load(Ordering::Relaxed),
            points_drawn: self.points_drawn.load(Ordering::Relaxed),
            spans: self.spans.load(Ordering::Relaxed),
            affine_spans: self.affine_spans.load(Ordering::Relaxed),
            fragments: self.fragments.load(Ordering::Relaxed),
            coverage_emits: self.coverage_emits.load(Ordering::Relaxed),
        }
    }
}

impl Default for FunctionCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of counter values at a point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub vertices_shaded: u64,
    pub triangles_submitted: u64,
    pub triangles_clipped: u64,
    pub triangles_culled: u64,
    pub triangles_degenerate: u64,
    pub lines_drawn: u64,
    pub points_drawn: u64,
    pub spans: u64,
    pub affine_spans: u64,
    pub fragments: u64,
    pub coverage_emits: u64,
}

impl CounterSnapshot {
    /// Write a formatted report through the `log` facade.
    pub fn log_report(&self) {
        log::info!("=== Pipeline Counters ===");
        log::info!("geometry:");
        log::info!("  vertices shaded:       {:12}", self.vertices_shaded);
        log::info!("  triangles submitted:   {:12}", self.triangles_submitted);
        log::info!("  triangles clipped:     {:12}", self.triangles_clipped);
        log::info!("  triangles culled:      {:12}", self.triangles_culled);
        log::info!("  triangles degenerate:  {:12}", self.triangles_degenerate);
        log::info!("rasterization:");
        log::info!("  lines:                 {:12}", self.lines_drawn);
        log::info!("  points:                {:12}", self.points_drawn);
        log::info!("  spans:                 {:12}", self.spans);
        log::info!("  affine sub-spans:      {:12}", self.affine_spans);
        log::info!("  fragments:             {:12}", self.fragments);
        if self.spans > 0 {
            let per_span = self.affine_spans as f64 / self.spans as f64;
            log::info!("  sub-spans per span:    {:12.2}", per_span);
        }
        log::info!("multisampling:");
        log::info!("  coverage emits:        {:12}", self.coverage_emits);
    }
}

/// Global function counters instance
pub static FUNCTION_COUNTERS: FunctionCounters = FunctionCounters::new();

/// Macro for incrementing a counter (only when profiling feature is enabled)
#[macro_export]
macro_rules! count_call {
    ($counter:expr) => {
        #[cfg(feature = "profiling")]
        {
            $counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }
    };
}

/// Macro for adding to a counter (only when profiling feature is enabled)
#[macro_export]
macro_rules! count_add {
    ($counter:expr, $value:expr) => {
        #[cfg(feature = "profiling")]
        {
            $counter.fetch_add($value as u64, std::sync::atomic::Ordering::Relaxed);
        }
    };
}
