//! Dominant-vertex extraction for hand-drawn strokes.
//!
//! The stroke is approximated by the fewest straight segments whose *worst*
//! segment fits within `wobbliness_threshold` (a bottleneck dynamic program:
//! `dp[k][i] = min_j max(dp[k-1][j], cost(j, i))`). Segment cost is the sum of
//! squared perpendicular distances of the covered samples to the chord,
//! divided by the sample span and the squared chord length, which keeps it
//! independent of scale and sampling density.
//!
//! Nearly coincident ends are then snapped closed, and a closing corner that
//! is almost straight is dropped so a closed square does not come out as a
//! pentagon.

use serde::{Deserialize, Serialize};

use super::core::{Rect, Tolerance, Vec2, corner_angle};
use super::stroke::StrokePoint;

/// Tuning for [`segment_polyline`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SegmenterOptions {
    /// Hard cap on the number of segments.
    pub max_segments: usize,
    /// Sparse strokes may use up to this many segments even when `N / 3` is
    /// smaller (still never more than `N - 1`).
    pub min_segment_budget: usize,
    /// Largest acceptable per-segment cost.
    pub wobbliness_threshold: f64,
    /// Ends closer than this fraction of the bounding diagonal are joined.
    pub closing_distance_ratio: f64,
    /// Closing corners wider than this (degrees) are treated as spurious.
    pub closing_straight_angle_deg: f64,
    /// Interior output timestamps are rescaled as `t0 + (t - t0) * scale`.
    pub timestamp_scale: f64,
}

impl SegmenterOptions {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_segments: 20,
            min_segment_budget: 8,
            wobbliness_threshold: 0.002,
            closing_distance_ratio: 0.1,
            closing_straight_angle_deg: 162.0,
            timestamp_scale: 1.0,
        }
    }

    #[must_use]
    pub const fn max_segments(mut self, max: usize) -> Self {
        self.max_segments = max;
        self
    }

    #[must_use]
    pub const fn wobbliness_threshold(mut self, threshold: f64) -> Self {
        self.wobbliness_threshold = threshold;
        self
    }

    #[must_use]
    pub const fn timestamp_scale(mut self, scale: f64) -> Self {
        self.timestamp_scale = scale;
        self
    }

    /// Segment budget for a stroke of `n` samples.
    #[must_use]
    pub fn segment_budget(&self, n: usize) -> usize {
        if n < 2 {
            return 0;
        }
        let sparse = (n - 1).min(self.min_segment_budget);
        (n / 3).max(sparse).min(self.max_segments).max(1)
    }
}

impl Default for SegmenterOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of [`segment_polyline`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Segmentation {
    /// Polyline vertices (original samples, possibly snapped at the seam).
    pub points: Vec<StrokePoint>,
    /// Sample index of each corner chosen by the DP, before loop closing.
    pub corners: Vec<usize>,
    /// Best bottleneck cost for 1, 2, ... segments, as far as evaluated.
    pub layer_costs: Vec<f64>,
    /// Whether the polyline ends were snapped together.
    pub closed: bool,
}

impl Segmentation {
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.points.len().saturating_sub(1)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Cost statistics
// ─────────────────────────────────────────────────────────────────────────────

/// Running sums over a contiguous run of samples.
#[derive(Debug, Clone, Copy, Default)]
struct SegmentStats {
    n: f64,
    sx: f64,
    sy: f64,
    sxx: f64,
    syy: f64,
    sxy: f64,
}

impl SegmentStats {
    fn add(&mut self, p: Vec2) {
        self.n += 1.0;
        self.sx += p.x;
        self.sy += p.y;
        self.sxx += p.x * p.x;
        self.syy += p.y * p.y;
        self.sxy += p.x * p.y;
    }

    /// Normalized squared distance of the accumulated samples to the chord `a-b`.
    fn chord_cost(&self, a: Vec2, b: Vec2, span: usize, tol: Tolerance) -> f64 {
        if span <= 1 {
            return 0.0;
        }
        let chord = b - a;
        let len_sq = chord.length_squared();
        if len_sq <= tol.eps_squared() {
            return f64::INFINITY;
        }
        let u = chord / len_sq.sqrt();

        let sdx2 = self.sxx - 2.0 * a.x * self.sx + self.n * a.x * a.x;
        let sdy2 = self.syy - 2.0 * a.y * self.sy + self.n * a.y * a.y;
        let sdxdy = self.sxy - a.x * self.sy - a.y * self.sx + self.n * a.x * a.y;
        let sse = (u.x * u.x * sdy2 - 2.0 * u.x * u.y * sdxdy + u.y * u.y * sdx2).max(0.0);

        sse / (span as f64 * len_sq)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// DP state
// ─────────────────────────────────────────────────────────────────────────────

/// Layered bottleneck DP tables for one stroke; layer `k` covers `k + 1`
/// segments.
#[derive(Debug)]
pub struct PolylineSegmenterState {
    /// Samples shifted to their centroid to keep the running sums well
    /// conditioned.
    points: Vec<Vec2>,
    /// Chords no longer than `tol.eps` are degenerate.
    tol: Tolerance,
    costs: Vec<Vec<f64>>,
    back: Vec<Vec<usize>>,
}

impl PolylineSegmenterState {
    #[must_use]
    pub fn new(samples: &[StrokePoint], tol: Tolerance) -> Self {
        let n = samples.len().max(1) as f64;
        let centroid = samples
            .iter()
            .fold(Vec2::ZERO, |acc, p| acc + p.position())
            / n;
        Self {
            points: samples.iter().map(|p| p.position() - centroid).collect(),
            tol,
            costs: Vec::new(),
            back: Vec::new(),
        }
    }

    #[must_use]
    pub fn layer_count(&self) -> usize {
        self.costs.len()
    }

    /// Best bottleneck cost of the most recent layer at the last sample.
    #[must_use]
    pub fn best_cost(&self) -> f64 {
        match (self.costs.last(), self.points.len()) {
            (Some(layer), n) if n > 0 => layer[n - 1],
            _ => f64::INFINITY,
        }
    }

    /// Computes the next layer and returns its cost at the last sample.
    pub fn push_layer(&mut self) -> f64 {
        let n = self.points.len();
        let k = self.costs.len();
        let mut layer = vec![f64::INFINITY; n];
        let mut back = vec![0usize; n];

        if k == 0 {
            let mut stats = SegmentStats::default();
            for i in 0..n {
                stats.add(self.points[i]);
                layer[i] = stats.chord_cost(self.points[0], self.points[i], i, self.tol);
            }
        } else {
            let previous = &self.costs[k - 1];
            for i in (k + 1)..n {
                let mut stats = SegmentStats::default();
                stats.add(self.points[i]);
                let mut best = (f64::INFINITY, k);
                for j in (k..i).rev() {
                    stats.add(self.points[j]);
                    if previous[j] >= best.0 {
                        continue;
                    }
                    let chord = stats.chord_cost(self.points[j], self.points[i], i - j, self.tol);
                    let cost = previous[j].max(chord);
                    if cost < best.0 || (cost == best.0 && j < best.1) {
                        best = (cost, j);
                    }
                }
                layer[i] = best.0;
                back[i] = best.1;
            }
        }

        self.costs.push(layer);
        self.back.push(back);
        self.best_cost()
    }

    /// Sample indices of the corners for `segments` segments ending at the
    /// last sample.
    #[must_use]
    pub fn corners(&self, segments: usize) -> Vec<usize> {
        let n = self.points.len();
        if n == 0 || segments == 0 || segments > self.back.len() {
            return Vec::new();
        }
        let mut corners = vec![n - 1];
        let mut i = n - 1;
        for layer in (1..segments).rev() {
            i = self.back[layer][i];
            corners.push(i);
        }
        corners.push(0);
        corners.reverse();
        corners
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Entry point
// ─────────────────────────────────────────────────────────────────────────────

/// Reduces a dense stroke to its dominant vertices.
#[must_use]
pub fn segment_polyline(points: &[StrokePoint], options: &SegmenterOptions, tol: Tolerance) -> Segmentation {
    if points.len() < 2 {
        return Segmentation {
            points: points.to_vec(),
            corners: (0..points.len()).collect(),
            ..Segmentation::default()
        };
    }

    let budget = options.segment_budget(points.len());
    let mut state = PolylineSegmenterState::new(points, tol);
    let mut layer_costs = Vec::with_capacity(budget);
    let mut chosen = None;

    for segments in 1..=budget {
        let cost = state.push_layer();
        log::trace!("segmenter: {segments} segment(s) -> bottleneck cost {cost:.6}");
        layer_costs.push(cost);
        if cost <= options.wobbliness_threshold {
            chosen = Some(segments);
            break;
        }
    }

    // Nothing met the threshold: fall back to the best layer evaluated.
    let segments = chosen.unwrap_or_else(|| {
        layer_costs
            .iter()
            .enumerate()
            .fold((0, f64::INFINITY), |best, (idx, &cost)| {
                if cost < best.1 { (idx, cost) } else { best }
            })
            .0
            + 1
    });
    log::debug!(
        "segmenter: {} samples -> {segments} segment(s) (budget {budget})",
        points.len()
    );

    let corners = state.corners(segments);
    let mut vertices: Vec<StrokePoint> = corners.iter().map(|&i| points[i]).collect();
    let closed = close_loop(&mut vertices, options);
    rescale_timestamps(&mut vertices, options.timestamp_scale);

    Segmentation {
        points: vertices,
        corners,
        layer_costs,
        closed,
    }
}

/// Snaps nearly coincident ends to their midpoint. Returns whether the
/// polyline is closed afterwards.
fn close_loop(vertices: &mut Vec<StrokePoint>, options: &SegmenterOptions) -> bool {
    let len = vertices.len();
    if len < 3 {
        return false;
    }
    let Some(bounds) = Rect::from_points(vertices.iter().map(StrokePoint::position)) else {
        return false;
    };

    let (first, last) = (vertices[0], vertices[len - 1]);
    if first.distance_to(&last) > options.closing_distance_ratio * bounds.diagonal() {
        return false;
    }

    let seam = first.position().midpoint(last.position());
    vertices[0] = first.with_position(seam);
    vertices[len - 1] = last.with_position(seam);

    // Dropping the seam must still leave a triangle.
    if len >= 5 {
        let angle = corner_angle(vertices[len - 2].position(), seam, vertices[1].position());
        if angle.to_degrees() > options.closing_straight_angle_deg {
            vertices.remove(0);
            vertices.pop();
            let reopened = vertices[0];
            vertices[0].timestamp = first.timestamp;
            vertices.push(StrokePoint {
                timestamp: last.timestamp,
                ..reopened
            });
        }
    }
    true
}

/// Rescales interior timestamps about the first one. The endpoints keep the
/// stroke's own first and last timestamps.
fn rescale_timestamps(vertices: &mut [StrokePoint], scale: f64) {
    if (scale - 1.0).abs() <= f64::EPSILON || vertices.len() < 3 {
        return;
    }
    let t0 = vertices[0].timestamp;
    let last = vertices.len() - 1;
    for vertex in &mut vertices[1..last] {
        vertex.timestamp = t0 + (vertex.timestamp - t0) * scale;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(x: f64, y: f64, t: f64) -> StrokePoint {
        StrokePoint::new(x, y, 0.5, t)
    }

    #[test]
    fn test_budget_for_sparse_and_dense_input() {
        let options = SegmenterOptions::default();
        assert_eq!(options.segment_budget(1), 0);
        assert_eq!(options.segment_budget(2), 1);
        assert_eq!(options.segment_budget(5), 4);
        assert_eq!(options.segment_budget(30), 10);
        assert_eq!(options.segment_budget(300), 20);
    }

    #[test]
    fn test_straight_line_is_one_segment() {
        let points: Vec<_> = (0..20).map(|i| sample(i as f64 * 0.1, 0.05 * i as f64, i as f64)).collect();
        let seg = segment_polyline(&points, &SegmenterOptions::default(), Tolerance::default());
        assert_eq!(seg.segment_count(), 1);
        assert_eq!(seg.points[0], points[0]);
        assert_eq!(seg.points[1], points[19]);
        assert!(!seg.closed);
    }

    #[test]
    fn test_cost_is_scale_invariant() {
        let wobbly = |scale: f64| -> Vec<StrokePoint> {
            (0..30)
                .map(|i| {
                    let x = i as f64 / 29.0;
                    sample(x * scale, (x * 9.0).sin() * 0.02 * scale, i as f64)
                })
                .collect()
        };
        let mut small = PolylineSegmenterState::new(&wobbly(1.0), Tolerance::default());
        let mut large = PolylineSegmenterState::new(&wobbly(1000.0), Tolerance::default());
        let a = small.push_layer();
        let b = large.push_layer();
        assert!((a - b).abs() <= 1e-9 * a.max(1e-12), "{a} vs {b}");
    }

    #[test]
    fn test_coincident_ends_cannot_be_one_segment() {
        let points = vec![sample(0.0, 0.0, 0.0), sample(1.0, 0.0, 1.0), sample(0.0, 0.0, 2.0)];
        let mut state = PolylineSegmenterState::new(&points, Tolerance::default());
        assert!(state.push_layer().is_infinite());
    }

    #[test]
    fn test_spurious_closing_corner_is_dropped() {
        // A square whose seam sits in the middle of the bottom edge.
        let mut vertices = vec![
            sample(0.5, 0.0, 0.0),
            sample(1.0, 0.0, 1.0),
            sample(1.0, 1.0, 2.0),
            sample(0.0, 1.0, 3.0),
            sample(0.0, 0.0, 4.0),
            sample(0.5, 0.0, 5.0),
        ];
        assert!(close_loop(&mut vertices, &SegmenterOptions::default()));
        assert_eq!(vertices.len(), 5);
        assert_eq!(vertices[0].position(), Vec2::new(1.0, 0.0));
        assert_eq!(vertices[0].position(), vertices[4].position());
        assert_eq!(vertices[0].timestamp, 0.0);
        assert_eq!(vertices[4].timestamp, 5.0);
    }

    #[test]
    fn test_two_sided_loop_is_closed() {
        let mut vertices = vec![sample(0.0, 0.0, 0.0), sample(0.5, 1.0, 1.0), sample(0.05, 0.0, 2.0)];
        assert!(close_loop(&mut vertices, &SegmenterOptions::default()));
        assert_eq!(vertices.len(), 3);
        assert_eq!(vertices[0].position(), Vec2::new(0.025, 0.0));
        assert_eq!(vertices[0].position(), vertices[2].position());
        assert_eq!(vertices[2].timestamp, 2.0);
    }

    #[test]
    fn test_chords_below_tolerance_are_degenerate() {
        let points: Vec<_> = (0..5).map(|i| sample(i as f64 * 1e-7, 0.0, i as f64)).collect();
        let mut fine = PolylineSegmenterState::new(&points, Tolerance::default());
        assert_eq!(fine.push_layer(), 0.0);
        let mut coarse = PolylineSegmenterState::new(&points, Tolerance::LOOSE);
        assert!(coarse.push_layer().is_infinite());
    }

    #[test]
    fn test_timestamp_scale_keeps_endpoints() {
        let mut vertices = vec![sample(0.0, 0.0, 10.0), sample(1.0, 0.0, 12.0), sample(2.0, 0.0, 14.0)];
        rescale_timestamps(&mut vertices, 0.5);
        assert_eq!(vertices[0].timestamp, 10.0);
        assert_eq!(vertices[1].timestamp, 11.0);
        assert_eq!(vertices[2].timestamp, 14.0);
    }
}
