//! Opt-in timing hooks for the ink pipeline.
//!
//! Timing is only collected when the `ink_engine_metrics` feature is enabled
//! and the target is not WASM (`std::time::Instant` is unavailable there).
//! Otherwise every call compiles down to running the closure.
//!
//! ```ignore
//! use ink_engine::geom::{InkMetrics, TimingBucket};
//!
//! let mut metrics = InkMetrics::default();
//! metrics.begin();
//! let polyline = metrics.time(TimingBucket::Segment, || segment_polyline(&points, options, tol));
//! if let Some(report) = metrics.end() {
//!     println!("segmenting took {} ns", report.segment_ns);
//! }
//! ```

/// Phases of stroke processing that can be timed separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimingBucket {
    /// Ribbon mesh generation (incremental and batch).
    Vectorize,
    /// Bottleneck DP polyline segmentation.
    Segment,
    /// Direct least-squares ellipse fitting.
    EllipseFit,
    /// Triangle/rectangle regularization.
    Regularize,
    /// The remainder of the recognition pipeline (resampling, bookkeeping).
    Recognize,
}

/// Cumulative nanoseconds per bucket.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InkTimingReport {
    pub vectorize_ns: u64,
    pub segment_ns: u64,
    pub ellipse_fit_ns: u64,
    pub regularize_ns: u64,
    pub recognize_ns: u64,
}

impl InkTimingReport {
    #[must_use]
    pub fn total_ns(&self) -> u64 {
        self.vectorize_ns
            .saturating_add(self.segment_ns)
            .saturating_add(self.ellipse_fit_ns)
            .saturating_add(self.regularize_ns)
            .saturating_add(self.recognize_ns)
    }

    /// Returns the total time in milliseconds (for display purposes).
    #[must_use]
    pub fn total_ms(&self) -> f64 {
        self.total_ns() as f64 / 1_000_000.0
    }
}

/// Accumulator carried by the toolbox.
///
/// When the `ink_engine_metrics` feature is disabled (or on WASM), all methods
/// are no-ops and [`end`](Self::end) returns `None`.
#[derive(Debug, Default, Clone)]
pub struct InkMetrics {
    #[cfg(all(feature = "ink_engine_metrics", not(target_arch = "wasm32")))]
    report: InkTimingReport,
}

impl InkMetrics {
    /// Resets all timing counters to zero.
    pub fn begin(&mut self) {
        #[cfg(all(feature = "ink_engine_metrics", not(target_arch = "wasm32")))]
        {
            self.report = InkTimingReport::default();
        }
    }

    /// Returns the accumulated report, or `None` if metrics are compiled out.
    #[must_use]
    pub fn end(&self) -> Option<InkTimingReport> {
        #[cfg(all(feature = "ink_engine_metrics", not(target_arch = "wasm32")))]
        {
            Some(self.report.clone())
        }
        #[cfg(not(all(feature = "ink_engine_metrics", not(target_arch = "wasm32"))))]
        {
            None
        }
    }

    /// Times `f` and adds the elapsed time to `bucket`.
    pub fn time<R>(&mut self, bucket: TimingBucket, f: impl FnOnce() -> R) -> R {
        #[cfg(all(feature = "ink_engine_metrics", not(target_arch = "wasm32")))]
        {
            let start = std::time::Instant::now();
            let result = f();
            let nanos = start.elapsed().as_nanos().min(u128::from(u64::MAX)) as u64;
            self.add_to_bucket(bucket, nanos);
            result
        }

        #[cfg(not(all(feature = "ink_engine_metrics", not(target_arch = "wasm32"))))]
        {
            let _ = bucket;
            f()
        }
    }

    #[cfg(all(feature = "ink_engine_metrics", not(target_arch = "wasm32")))]
    fn add_to_bucket(&mut self, bucket: TimingBucket, nanos: u64) {
        let slot = match bucket {
            TimingBucket::Vectorize => &mut self.report.vectorize_ns,
            TimingBucket::Segment => &mut self.report.segment_ns,
            TimingBucket::EllipseFit => &mut self.report.ellipse_fit_ns,
            TimingBucket::Regularize => &mut self.report.regularize_ns,
            TimingBucket::Recognize => &mut self.report.recognize_ns,
        };
        *slot = slot.saturating_add(nanos);
    }
}
